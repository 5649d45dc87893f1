use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use rodio::{buffer::SamplesBuffer, OutputStream, Sink};
use tracing::info;

use orature_audio::{parse_reference, to_biblical_reference, AudioFormat, AudioMarker, BurritoAlignmentMetadata, OratureAudioFile};
use orature_player::{marker_ranges, play_range, play_reader, AudioBackend};

const MAX_QUEUED_BLOCKS: usize = 4;

#[derive(Parser)]
#[command(name = "orature")]
#[command(about = "Inspect and edit verse markers in WAV recordings", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show format, length and markers of a recording
    Info {
        input: PathBuf,

        /// Book slug used to print markers as references
        #[arg(long)]
        book: Option<String>,

        /// Chapter used to print markers as references
        #[arg(long, default_value_t = 1)]
        chapter: u32,
    },

    /// Create an empty recording
    Create {
        output: PathBuf,

        #[arg(long, default_value_t = AudioFormat::default().channels)]
        channels: u16,

        #[arg(long, default_value_t = AudioFormat::default().sample_rate)]
        sample_rate: u32,

        #[arg(long, default_value_t = AudioFormat::default().bits_per_sample)]
        bits: u16,
    },

    /// Add a cue at a frame offset
    AddMarker {
        input: PathBuf,

        #[arg(short, long)]
        location: u32,

        /// Cue label, e.g. orature-vm-3
        #[arg(long)]
        label: String,
    },

    /// Write the markers to an alignment sidecar
    ExportBurrito {
        input: PathBuf,

        #[arg(long)]
        book: String,

        #[arg(long)]
        chapter: u32,

        /// Sidecar path, defaults to the recording with a .json extension
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Export every cue with the full label grammar instead of the classified markers
        #[arg(long)]
        all: bool,
    },

    /// Add the markers of an alignment sidecar to the recording
    ImportBurrito {
        input: PathBuf,

        #[arg(short, long)]
        sidecar: Option<PathBuf>,

        /// Remove existing cues first
        #[arg(long)]
        replace: bool,
    },

    /// Parse a reference such as "GEN 1:2-4"
    Reference {
        text: String,

        #[arg(short, long, default_value_t = 0)]
        location: u32,
    },

    /// Play a recording, or the span of one marker
    Play {
        input: PathBuf,

        /// Index into the markers sorted by location
        #[arg(short, long)]
        marker: Option<usize>,
    },
}

struct Config {
    verbose: bool,
    debug: bool,
}

fn init(config: &Config) {
    if config.verbose || config.debug {
        let level = if config.debug { "debug" } else { "info" };
        tracing_subscriber::fmt().with_env_filter(level).with_writer(std::io::stderr).init();
    }
}

struct RodioBackend {
    _output_stream: OutputStream,
    sink: Sink,
}

impl RodioBackend {
    fn new() -> anyhow::Result<Self> {
        let (output_stream, stream_handle) = OutputStream::try_default()?;
        let sink = Sink::try_new(&stream_handle)?;
        Ok(Self {
            _output_stream: output_stream,
            sink,
        })
    }
}

#[async_trait(?Send)]
impl AudioBackend for RodioBackend {
    async fn play_wave(&self, channels: u16, sample_rate: u32, samples: &[i16]) {
        while self.sink.len() > MAX_QUEUED_BLOCKS {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.sink.append(SamplesBuffer::new(channels, sample_rate, samples));
    }
}

fn print_marker(marker: &AudioMarker, book: Option<&str>, chapter: u32) {
    let reference = book.and_then(|x| to_biblical_reference(marker, x, chapter));
    match reference {
        Some(reference) => println!("  {:>10}  {:<24} {}", marker.location(), marker.format_marker_text(), reference),
        None => println!("  {:>10}  {}", marker.location(), marker.format_marker_text()),
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Info { input, book, chapter } => {
            let file = OratureAudioFile::open(&input)?;
            let wav = file.wav_file();

            println!("{}", input.display());
            println!(
                "  {} ch, {} Hz, {} bit, {} frames ({:.2}s)",
                wav.channels(),
                wav.sample_rate(),
                wav.bits_per_sample(),
                wav.total_frames(),
                wav.duration().as_secs_f64()
            );
            println!("  metadata: {} bytes", wav.metadata().total_size());

            println!("markers ({}):", file.markers().len());
            for marker in file.markers() {
                print_marker(marker, book.as_deref(), chapter);
            }
            if !file.extra_cues().is_empty() {
                println!("extra cues ({}):", file.extra_cues().len());
                for cue in file.extra_cues() {
                    println!("  {:>10}  {:?}", cue.location, cue.label);
                }
            }
        }
        Commands::Create {
            output,
            channels,
            sample_rate,
            bits,
        } => {
            OratureAudioFile::create(&output, AudioFormat::new(channels, sample_rate, bits))?;
            info!(path = %output.display(), "created");
        }
        Commands::AddMarker { input, location, label } => {
            let mut file = OratureAudioFile::open(&input)?;
            let total_frames = file.wav_file().total_frames();
            if location > total_frames {
                anyhow::bail!("location {} is past the end of the audio ({} frames)", location, total_frames);
            }
            file.add_cue(location, &label);
            file.update()?;
            info!(location, label = %label, "added cue");
        }
        Commands::ExportBurrito {
            input,
            book,
            chapter,
            output,
            all,
        } => {
            let file = OratureAudioFile::open(&input)?;
            let sidecar = output.map_or_else(|| BurritoAlignmentMetadata::for_audio_file(&input), BurritoAlignmentMetadata::new);
            let markers = if all { file.all_markers() } else { file.markers().to_vec() };

            sidecar.write(&markers, &book, chapter, file.wav_file().total_frames())?;
            println!("{} markers written to {}", markers.len(), sidecar.path().display());
        }
        Commands::ImportBurrito { input, sidecar, replace } => {
            let mut file = OratureAudioFile::open(&input)?;
            let sidecar = sidecar.map_or_else(|| BurritoAlignmentMetadata::for_audio_file(&input), BurritoAlignmentMetadata::new);

            let mut markers = sidecar.parse_timings()?;
            AudioMarker::sort_by_location(&mut markers);

            if replace {
                file.clear_markers();
            }
            file.import_markers(&markers);
            file.update()?;
            println!("{} markers imported from {}", markers.len(), sidecar.path().display());
        }
        Commands::Reference { text, location } => match parse_reference(&text, location) {
            Some(marker) => println!("{}", marker),
            None => anyhow::bail!("not a biblical reference: {:?}", text),
        },
        Commands::Play { input, marker } => {
            let file = OratureAudioFile::open(&input)?;
            let backend = RodioBackend::new()?;

            match marker {
                Some(index) => {
                    let ranges = marker_ranges(file.markers(), file.wav_file().total_frames());
                    let range = ranges
                        .get(index)
                        .ok_or_else(|| anyhow::anyhow!("marker {} out of range, file has {}", index, ranges.len()))?;
                    play_range(&file, range, &backend).await?;
                }
                None => play_reader(&mut file.reader()?, &backend).await?,
            }

            backend.sink.sleep_until_end();
        }
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init(&Config {
        verbose: cli.verbose,
        debug: cli.debug,
    });

    run(cli.command).await
}
