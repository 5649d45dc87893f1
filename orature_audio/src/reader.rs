use std::{
    fs::File,
    io::{BufReader, Seek, SeekFrom},
    path::Path,
};

use tracing::trace;

use crate::{riff::read_full, wav::AudioFormat, Result};

/// Frame-addressable pull access to PCM audio, as consumed by playback.
pub trait AudioFileReader {
    fn sample_rate(&self) -> u32;
    fn channels(&self) -> u16;
    /// Bits per sample.
    fn sample_size(&self) -> u16;
    /// Current frame, relative to the start of the readable range.
    fn frame_position(&self) -> u32;
    fn total_frames(&self) -> u32;

    fn has_remaining(&self) -> bool {
        self.frame_position() < self.total_frames()
    }

    /// Fills `buffer` with as many whole frames as fit and remain. Returns the number of frames read.
    fn get_pcm_buffer(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Moves to `frame`, clamped to the readable range.
    fn seek(&mut self, frame: u32) -> Result<()>;
}

pub struct WavFileReader {
    reader: BufReader<File>,
    format: AudioFormat,
    data_offset: u64,
    start: u32,
    end: u32,
    position: u32,
}

impl WavFileReader {
    pub(crate) fn open(path: &Path, format: AudioFormat, data_offset: u64, start: u32, end: u32) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        reader.seek(SeekFrom::Start(data_offset + start as u64 * format.frame_size() as u64))?;

        Ok(Self {
            reader,
            format,
            data_offset,
            start,
            end,
            position: start,
        })
    }
}

impl AudioFileReader for WavFileReader {
    fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    fn channels(&self) -> u16 {
        self.format.channels
    }

    fn sample_size(&self) -> u16 {
        self.format.bits_per_sample
    }

    fn frame_position(&self) -> u32 {
        self.position - self.start
    }

    fn total_frames(&self) -> u32 {
        self.end - self.start
    }

    fn get_pcm_buffer(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let frame_size = self.format.frame_size() as usize;
        let frames = (buffer.len() / frame_size).min((self.end - self.position) as usize);
        if frames == 0 {
            return Ok(0);
        }

        read_full(&mut self.reader, &mut buffer[..frames * frame_size])?;
        self.position += frames as u32;
        trace!(frames, position = self.position, "read pcm");
        Ok(frames)
    }

    fn seek(&mut self, frame: u32) -> Result<()> {
        let target = self.start.saturating_add(frame).min(self.end);
        self.reader
            .seek(SeekFrom::Start(self.data_offset + target as u64 * self.format.frame_size() as u64))?;
        self.position = target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{AudioFileReader, AudioFormat, WavFile};

    fn sample_file(dir: &std::path::Path) -> WavFile {
        let mut wav = WavFile::create(dir.join("frames.wav"), AudioFormat::new(2, 8000, 16)).unwrap();
        // 10 stereo frames, every byte holding its frame index
        let audio = (0..10u8).flat_map(|x| [x; 4]).collect::<Vec<_>>();
        wav.append(&audio).unwrap();
        wav.add_cue(3, "orature-vm-1");
        wav.update().unwrap();
        wav
    }

    #[test]
    fn reads_whole_frames_sequentially() {
        let dir = tempfile::tempdir().unwrap();
        let wav = sample_file(dir.path());
        let mut reader = wav.reader().unwrap();

        assert_eq!(reader.total_frames(), 10);
        assert_eq!(reader.sample_size(), 16);
        assert_eq!(reader.channels(), 2);

        // 10 bytes only hold two frames
        let mut buffer = [0u8; 10];
        assert_eq!(reader.get_pcm_buffer(&mut buffer).unwrap(), 2);
        assert_eq!(&buffer[..8], &[0, 0, 0, 0, 1, 1, 1, 1]);
        assert_eq!(reader.frame_position(), 2);

        let mut buffer = [0u8; 64];
        assert_eq!(reader.get_pcm_buffer(&mut buffer).unwrap(), 8);
        assert_eq!(buffer[28], 9);
        assert!(!reader.has_remaining());
        assert_eq!(reader.get_pcm_buffer(&mut buffer).unwrap(), 0);
    }

    #[test]
    fn seek_is_clamped_to_range() {
        let dir = tempfile::tempdir().unwrap();
        let wav = sample_file(dir.path());
        let mut reader = wav.reader_range(Some(2), Some(5)).unwrap();

        assert_eq!(reader.total_frames(), 3);
        let mut buffer = [0u8; 4];
        reader.get_pcm_buffer(&mut buffer).unwrap();
        assert_eq!(buffer, [2; 4]);

        reader.seek(2).unwrap();
        reader.get_pcm_buffer(&mut buffer).unwrap();
        assert_eq!(buffer, [4; 4]);
        assert!(!reader.has_remaining());

        reader.seek(100).unwrap();
        assert_eq!(reader.frame_position(), 3);

        reader.seek(0).unwrap();
        assert!(reader.has_remaining());
    }
}
