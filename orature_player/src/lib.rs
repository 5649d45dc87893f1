mod pcm;

use std::iter;

use async_trait::async_trait;
use futures::{stream, Stream, StreamExt};
use tracing::debug;

use orature_audio::{AudioFileReader, AudioMarker, OratureAudioFile, Result};

pub use self::pcm::decode_pcm;

pub const DEFAULT_BLOCK_FRAMES: usize = 4096;

#[async_trait(?Send)]
pub trait AudioBackend {
    async fn play_wave(&self, channels: u16, sample_rate: u32, samples: &[i16]);
}

/// Playback span of one marker: from its location to the next marker or the end of audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerRange {
    pub marker: AudioMarker,
    pub start: u32,
    pub end: u32,
}

pub fn marker_ranges(markers: &[AudioMarker], total_frames: u32) -> Vec<MarkerRange> {
    let mut sorted = markers.to_vec();
    AudioMarker::sort_by_location(&mut sorted);

    let ends = sorted.iter().skip(1).map(AudioMarker::location).chain(iter::once(total_frames)).collect::<Vec<_>>();

    sorted
        .into_iter()
        .zip(ends)
        .map(|(marker, end)| MarkerRange {
            start: marker.location().min(total_frames),
            end: end.min(total_frames),
            marker,
        })
        .collect()
}

/// Decoded blocks of at most `frames_per_block` frames, until the reader is exhausted or fails.
pub fn pcm_blocks<'a, R: AudioFileReader + 'a>(reader: &'a mut R, frames_per_block: usize) -> impl Stream<Item = Result<Vec<i16>>> + 'a {
    let bits = reader.sample_size();
    let frame_size = reader.channels() as usize * (bits as usize / 8);
    let mut buffer = vec![0u8; frames_per_block.max(1) * frame_size];
    let mut failed = false;

    stream::iter(iter::from_fn(move || {
        if failed || !reader.has_remaining() {
            return None;
        }
        match reader.get_pcm_buffer(&mut buffer) {
            Ok(0) => None,
            Ok(frames) => Some(Ok(decode_pcm(&buffer[..frames * frame_size], bits))),
            Err(e) => {
                failed = true;
                Some(Err(e))
            }
        }
    }))
}

pub async fn play_reader<R: AudioFileReader, B: AudioBackend + ?Sized>(reader: &mut R, backend: &B) -> Result<()> {
    let channels = reader.channels();
    let sample_rate = reader.sample_rate();
    debug!(frames = reader.total_frames(), channels, sample_rate, "playing");

    let mut blocks = pcm_blocks(reader, DEFAULT_BLOCK_FRAMES);
    while let Some(block) = blocks.next().await {
        backend.play_wave(channels, sample_rate, &block?).await;
    }
    Ok(())
}

pub async fn play_range<B: AudioBackend + ?Sized>(file: &OratureAudioFile, range: &MarkerRange, backend: &B) -> Result<()> {
    debug!(marker = %range.marker, start = range.start, end = range.end, "playing marker");
    let mut reader = file.reader_range(Some(range.start), Some(range.end))?;
    play_reader(&mut reader, backend).await
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use futures::executor::block_on;
    use orature_audio::AudioFormat;

    use super::*;

    #[derive(Default)]
    struct RecordingBackend {
        played: RefCell<Vec<(u16, u32, Vec<i16>)>>,
    }

    #[async_trait(?Send)]
    impl AudioBackend for RecordingBackend {
        async fn play_wave(&self, channels: u16, sample_rate: u32, samples: &[i16]) {
            self.played.borrow_mut().push((channels, sample_rate, samples.to_vec()));
        }
    }

    fn recording(dir: &std::path::Path) -> anyhow::Result<OratureAudioFile> {
        let mut file = OratureAudioFile::create(dir.join("verses.wav"), AudioFormat::new(1, 8000, 16))?;
        let audio = (0..10i16).flat_map(|x| x.to_le_bytes()).collect::<Vec<_>>();
        file.append(&audio)?;
        file.add_marker(AudioMarker::verse(2, 2, 6));
        file.add_marker(AudioMarker::verse(1, 1, 0));
        file.update()?;
        Ok(file)
    }

    #[test]
    fn ranges_run_to_the_next_marker() {
        let markers = [AudioMarker::verse(2, 2, 6), AudioMarker::verse(1, 1, 0), AudioMarker::verse(3, 3, 20)];
        let ranges = marker_ranges(&markers, 10);

        assert_eq!(
            ranges.iter().map(|x| (x.marker.label(), x.start, x.end)).collect::<Vec<_>>(),
            vec![("1".into(), 0, 6), ("2".into(), 6, 10), ("3".into(), 10, 10)]
        );
    }

    #[test]
    fn plays_whole_reader_in_blocks() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let file = recording(dir.path())?;
        let backend = RecordingBackend::default();

        let mut reader = file.reader()?;
        block_on(play_reader(&mut reader, &backend))?;

        let played = backend.played.into_inner();
        assert_eq!(played.len(), 1);
        assert_eq!(played[0], (1, 8000, (0..10).collect()));
        Ok(())
    }

    #[test]
    fn blocks_respect_block_size() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let file = recording(dir.path())?;

        let mut reader = file.reader()?;
        let blocks = block_on(pcm_blocks(&mut reader, 4).collect::<Vec<_>>());
        let sizes = blocks.into_iter().map(|x| x.map(|x| x.len())).collect::<Result<Vec<_>>>()?;
        assert_eq!(sizes, vec![4, 4, 2]);
        Ok(())
    }

    #[test]
    fn plays_one_marker_range() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let file = recording(dir.path())?;
        let backend = RecordingBackend::default();

        let ranges = marker_ranges(file.markers(), file.wav_file().total_frames());
        block_on(play_range(&file, &ranges[1], &backend))?;

        assert_eq!(backend.played.into_inner()[0].2, vec![6, 7, 8, 9]);
        Ok(())
    }
}
