use std::path::Path;

use tracing::debug;

use crate::{
    classify::classify_cues,
    cue::WavCue,
    markers::{AudioMarker, MarkerKind},
    reader::WavFileReader,
    wav::{AudioFormat, WavFile},
    Result,
};

/// A WAV recording together with its typed marker view.
///
/// The WAV cue list stays the source of truth on disk. Markers are classified once
/// when the file is opened; cues added afterwards are appended to both lists without
/// reclassifying.
#[derive(Debug)]
pub struct OratureAudioFile {
    wav: WavFile,
    markers: Vec<AudioMarker>,
    extra_cues: Vec<WavCue>,
}

impl OratureAudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_wav_file(WavFile::open(path)?))
    }

    pub fn create(path: impl AsRef<Path>, format: AudioFormat) -> Result<Self> {
        Ok(Self::from_wav_file(WavFile::create(path, format)?))
    }

    pub fn from_wav_file(wav: WavFile) -> Self {
        let (markers, extra_cues) = classify_cues(wav.metadata().cues());
        debug!(path = %wav.path().display(), markers = markers.len(), extra = extra_cues.len(), "loaded markers");

        Self { wav, markers, extra_cues }
    }

    pub fn wav_file(&self) -> &WavFile {
        &self.wav
    }

    /// Adds a cue to the WAV and the marker parsed from its label to the marker list.
    pub fn add_cue(&mut self, location: u32, label: &str) {
        self.wav.add_cue(location, label);
        self.markers.push(AudioMarker::from_label(label, location));
    }

    pub fn add_marker(&mut self, marker: AudioMarker) {
        self.wav.add_cue(marker.location(), marker.format_marker_text());
        self.markers.push(marker);
    }

    pub fn import_markers<'a>(&mut self, markers: impl IntoIterator<Item = &'a AudioMarker>) {
        for marker in markers {
            self.add_marker(marker.clone());
        }
    }

    /// Removes every cue, classified or not.
    pub fn clear_markers(&mut self) {
        self.wav.clear_cues();
        self.markers.clear();
        self.extra_cues.clear();
    }

    /// Classified markers, in cue order.
    pub fn markers(&self) -> &[AudioMarker] {
        &self.markers
    }

    /// Cues present when the file was opened that classification did not capture.
    pub fn extra_cues(&self) -> &[WavCue] {
        &self.extra_cues
    }

    fn markers_of_kind(&self, kind: MarkerKind) -> Vec<AudioMarker> {
        let mut result = self.markers.iter().filter(|x| x.kind() == kind).cloned().collect::<Vec<_>>();
        AudioMarker::sort_by_location(&mut result);
        result
    }

    pub fn verse_markers(&self) -> Vec<AudioMarker> {
        self.markers_of_kind(MarkerKind::Verse)
    }

    pub fn chapter_markers(&self) -> Vec<AudioMarker> {
        self.markers_of_kind(MarkerKind::Chapter)
    }

    pub fn book_markers(&self) -> Vec<AudioMarker> {
        self.markers_of_kind(MarkerKind::Book)
    }

    pub fn chunk_markers(&self) -> Vec<AudioMarker> {
        self.markers_of_kind(MarkerKind::Chunk)
    }

    /// Every cue in the WAV parsed with the full `orature-*` label grammar, sorted by location.
    ///
    /// Unlike [`Self::markers`] this also recognizes chapter, book, chunk and verse range
    /// labels, and reflects cues added since the file was opened.
    pub fn all_markers(&self) -> Vec<AudioMarker> {
        let mut result = self
            .wav
            .metadata()
            .cues()
            .iter()
            .map(|x| AudioMarker::from_label(&x.label, x.location))
            .collect::<Vec<_>>();
        AudioMarker::sort_by_location(&mut result);
        result
    }

    pub fn append(&mut self, audio: &[u8]) -> Result<()> {
        self.wav.append(audio)
    }

    pub fn update(&mut self) -> Result<()> {
        self.wav.update()
    }

    pub fn reader(&self) -> Result<WavFileReader> {
        self.wav.reader()
    }

    pub fn reader_range(&self, start: Option<u32>, end: Option<u32>) -> Result<WavFileReader> {
        self.wav.reader_range(start, end)
    }
}
