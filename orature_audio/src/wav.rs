use std::{
    fs::{File, OpenOptions},
    io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use nom_derive::{NomLE, Parse};
use tracing::{debug, trace, warn};

use crate::{
    cue::{CueChunk, WavCue, ADTL_LIST_TYPE, CUE_CHUNK_ID, LIST_CHUNK_ID},
    reader::WavFileReader,
    riff::{chunk_bytes, padded_len, read_chunk_header, read_chunk_payload, read_full, skip_chunk_payload, write_chunk, ChunkId, RiffChunk, CHUNK_HEADER_SIZE},
    OratureError, Result,
};

pub const RIFF_ID: ChunkId = *b"RIFF";
pub const WAVE_ID: ChunkId = *b"WAVE";
pub const FMT_ID: ChunkId = *b"fmt ";
pub const DATA_ID: ChunkId = *b"data";

const WAVE_FORMAT_PCM: u16 = 1;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// "WAVE" form type, a 16-byte fmt chunk and the data chunk header.
pub const HEADER_OVERHEAD: u32 = 36;
const CANONICAL_DATA_OFFSET: u64 = 44;
const COPY_BLOCK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
        }
    }
}

impl AudioFormat {
    pub fn new(channels: u16, sample_rate: u32, bits_per_sample: u16) -> Self {
        Self {
            channels,
            sample_rate,
            bits_per_sample,
        }
    }

    /// Bytes per frame, i.e. one sample for every channel.
    pub fn frame_size(&self) -> u32 {
        self.channels as u32 * (self.bits_per_sample as u32 / 8)
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.frame_size()
    }

    fn validate(&self) -> Result<()> {
        if self.channels == 0 || self.sample_rate == 0 {
            return Err(OratureError::Format(format!("invalid audio format {:?}", self)));
        }
        if !matches!(self.bits_per_sample, 8 | 16 | 24 | 32) {
            return Err(OratureError::Format(format!("unsupported bits per sample {}", self.bits_per_sample)));
        }
        Ok(())
    }
}

/// Leading fields of a `fmt ` chunk payload.
#[derive(NomLE, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatChunk {
    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
}

impl From<AudioFormat> for FormatChunk {
    fn from(format: AudioFormat) -> Self {
        Self {
            audio_format: WAVE_FORMAT_PCM,
            channels: format.channels,
            sample_rate: format.sample_rate,
            byte_rate: format.byte_rate(),
            block_align: format.frame_size() as u16,
            bits_per_sample: format.bits_per_sample,
        }
    }
}

impl FormatChunk {
    fn to_bytes(self) -> Vec<u8> {
        let mut result = Vec::with_capacity(16);
        result.extend_from_slice(&self.audio_format.to_le_bytes());
        result.extend_from_slice(&self.channels.to_le_bytes());
        result.extend_from_slice(&self.sample_rate.to_le_bytes());
        result.extend_from_slice(&self.byte_rate.to_le_bytes());
        result.extend_from_slice(&self.block_align.to_le_bytes());
        result.extend_from_slice(&self.bits_per_sample.to_le_bytes());
        result
    }

    fn parse_payload(data: &[u8]) -> Result<AudioFormat> {
        let (extension, chunk) = FormatChunk::parse_le(data).map_err(|_| OratureError::TruncatedStream {
            expected: 16,
            available: data.len() as u64,
        })?;

        // extensible: cbSize, valid bits, channel mask, then the sub-format GUID led by the format tag
        let audio_format = match chunk.audio_format {
            WAVE_FORMAT_EXTENSIBLE => extension
                .get(8..10)
                .map(|x| u16::from_le_bytes([x[0], x[1]]))
                .ok_or(OratureError::TruncatedStream {
                    expected: 26,
                    available: extension.len() as u64,
                })?,
            x => x,
        };
        if audio_format != WAVE_FORMAT_PCM {
            return Err(OratureError::Format(format!("unsupported audio format {:#06x}, only PCM is supported", audio_format)));
        }

        let format = AudioFormat::new(chunk.channels, chunk.sample_rate, chunk.bits_per_sample);
        format.validate()?;
        Ok(format)
    }
}

/// A chunk this crate does not interpret, carried through rewrites verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignChunk {
    pub id: ChunkId,
    pub data: Vec<u8>,
}

impl ForeignChunk {
    fn encoded_len(&self) -> u64 {
        CHUNK_HEADER_SIZE + padded_len(self.data.len() as u32)
    }
}

/// Everything after the audio payload: the cue list and any foreign chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WavMetadata {
    cue_chunk: CueChunk,
    foreign_chunks: Vec<ForeignChunk>,
}

impl WavMetadata {
    pub fn cues(&self) -> &[WavCue] {
        self.cue_chunk.cues()
    }

    pub fn cue_chunk(&self) -> &CueChunk {
        &self.cue_chunk
    }

    pub fn foreign_chunks(&self) -> &[ForeignChunk] {
        &self.foreign_chunks
    }

    /// Encoded bytes of the cue list plus every preserved foreign chunk.
    pub fn total_size(&self) -> u32 {
        let foreign: u64 = self.foreign_chunks.iter().map(ForeignChunk::encoded_len).sum();
        (self.cue_chunk.total_size() as u64 + foreign) as u32
    }

    fn create(&self) -> Vec<u8> {
        let mut result = self.cue_chunk.create();
        for chunk in &self.foreign_chunks {
            result.extend(chunk_bytes(&chunk.id, &chunk.data));
        }
        result
    }
}

/// A PCM WAV file on disk.
///
/// Audio appended with [`WavFile::append`] is written straight to disk, but the
/// header sizes and the metadata after the audio are only rewritten by
/// [`WavFile::update`].
#[derive(Debug)]
pub struct WavFile {
    path: PathBuf,
    format: AudioFormat,
    total_audio_length: u32,
    data_offset: u64,
    metadata: WavMetadata,
    dirty: bool,
}

impl WavFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let stream_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let riff = read_chunk_header(&mut reader)?.ok_or_else(|| OratureError::Format("empty file".into()))?;
        if riff.id != RIFF_ID {
            return Err(OratureError::Format("missing RIFF header".into()));
        }
        let mut form = [0u8; 4];
        read_full(&mut reader, &mut form)?;
        if form != WAVE_ID {
            return Err(OratureError::Format("RIFF form type is not WAVE".into()));
        }

        // chunks end at the declared RIFF size, or at end of file when the header overstates it
        let riff_end = (riff.size as u64 + CHUNK_HEADER_SIZE).min(stream_len);
        if riff_end < stream_len {
            warn!(declared = riff.size, ignored = stream_len - riff_end, "ignoring bytes past the RIFF end");
        } else if riff.size as u64 + CHUNK_HEADER_SIZE > stream_len {
            debug!(declared = riff.size, stream_len, "RIFF size exceeds file length");
        }

        let mut format = None;
        let mut data = None;
        let mut cue_chunks = Vec::new();
        let mut foreign_chunks = Vec::new();

        loop {
            let available = riff_end.saturating_sub(reader.stream_position()?);
            let Some(header) = read_chunk_header(&mut reader.by_ref().take(available))? else {
                break;
            };
            let available = available - CHUNK_HEADER_SIZE;

            trace!(id = ?String::from_utf8_lossy(&header.id), size = header.size, "chunk");
            match &header.id {
                b"fmt " if format.is_none() => {
                    let payload = read_chunk_payload(&mut reader.by_ref().take(available), &header)?;
                    format = Some(FormatChunk::parse_payload(&payload)?);
                }
                b"data" if data.is_none() => {
                    let offset = reader.stream_position()?;
                    skip_chunk_payload(&mut reader, &header, riff_end)?;
                    data = Some((offset, header.size));
                }
                b"fmt " | b"data" => {
                    warn!(id = ?String::from_utf8_lossy(&header.id), "duplicate chunk ignored");
                    skip_chunk_payload(&mut reader, &header, riff_end)?;
                }
                _ => {
                    let chunk = ForeignChunk {
                        id: header.id,
                        data: read_chunk_payload(&mut reader.by_ref().take(available), &header)?,
                    };
                    if chunk.id == CUE_CHUNK_ID || (chunk.id == LIST_CHUNK_ID && chunk.data.starts_with(&ADTL_LIST_TYPE)) {
                        cue_chunks.push(chunk);
                    } else {
                        foreign_chunks.push(chunk);
                    }
                }
            }
        }

        let format = format.ok_or_else(|| OratureError::Format("missing fmt chunk".into()))?;
        let (data_offset, total_audio_length) = data.ok_or_else(|| OratureError::Format("missing data chunk".into()))?;

        let views = cue_chunks.iter().map(|x| RiffChunk::new(x.id, &x.data)).collect::<Vec<_>>();
        let cue_chunk = CueChunk::from_chunks(&views)?;

        debug!(
            path = %path.display(),
            channels = format.channels,
            sample_rate = format.sample_rate,
            bits_per_sample = format.bits_per_sample,
            total_audio_length,
            cues = cue_chunk.len(),
            foreign = foreign_chunks.len(),
            "opened wav file"
        );

        Ok(Self {
            path,
            format,
            total_audio_length,
            data_offset,
            metadata: WavMetadata { cue_chunk, foreign_chunks },
            dirty: false,
        })
    }

    /// Writes an empty WAV with no metadata, replacing any existing file.
    pub fn create(path: impl AsRef<Path>, format: AudioFormat) -> Result<Self> {
        format.validate()?;

        let result = Self {
            path: path.as_ref().to_path_buf(),
            format,
            total_audio_length: 0,
            data_offset: CANONICAL_DATA_OFFSET,
            metadata: WavMetadata::default(),
            dirty: false,
        };

        let mut writer = BufWriter::new(File::create(&result.path)?);
        result.write_header(&mut writer)?;
        writer.flush()?;

        debug!(path = %result.path.display(), ?format, "created wav file");
        Ok(result)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.format.channels
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.format.bits_per_sample
    }

    pub fn frame_size_in_bytes(&self) -> u32 {
        self.format.frame_size()
    }

    /// Audio payload length in bytes.
    pub fn total_audio_length(&self) -> u32 {
        self.total_audio_length
    }

    pub fn total_frames(&self) -> u32 {
        self.total_audio_length / self.format.frame_size()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.total_frames() as f64 / self.format.sample_rate as f64)
    }

    /// Value of the RIFF size field.
    pub fn total_data_length(&self) -> u32 {
        self.riff_size() as u32
    }

    fn riff_size(&self) -> u64 {
        HEADER_OVERHEAD as u64 + padded_len(self.total_audio_length) + self.metadata.total_size() as u64
    }

    /// True when anything follows the audio payload. Foreign chunks count, so a file without cues can still have metadata.
    pub fn has_metadata(&self) -> bool {
        self.metadata.total_size() > 0
    }

    pub fn metadata(&self) -> &WavMetadata {
        &self.metadata
    }

    /// True when appended audio or cue edits are not yet reflected on disk.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn add_cue(&mut self, location: u32, label: impl Into<String>) {
        self.metadata.cue_chunk.add_cue(location, label);
        self.dirty = true;
    }

    pub fn clear_cues(&mut self) {
        if !self.metadata.cue_chunk.is_empty() {
            self.metadata.cue_chunk.clear();
            self.dirty = true;
        }
    }

    /// Appends PCM bytes to the end of the audio payload.
    pub fn append(&mut self, audio: &[u8]) -> Result<()> {
        if audio.is_empty() {
            return Ok(());
        }

        let new_length = u32::try_from(self.total_audio_length as u64 + audio.len() as u64)
            .ok()
            .filter(|&x| HEADER_OVERHEAD as u64 + padded_len(x) + self.metadata.total_size() as u64 <= u32::MAX as u64)
            .ok_or_else(|| OratureError::Format("audio data exceeds the RIFF size limit".into()))?;

        let mut file = OpenOptions::new().write(true).open(&self.path)?;
        file.seek(SeekFrom::Start(self.data_offset + self.total_audio_length as u64))?;
        file.write_all(audio)?;

        trace!(bytes = audio.len(), total = new_length, "appended audio");
        self.total_audio_length = new_length;
        self.dirty = true;
        Ok(())
    }

    /// Rewrites the header sizes and the metadata after the audio. Does nothing when clean.
    pub fn update(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        let riff_size = self.riff_size();
        if riff_size > u32::MAX as u64 {
            return Err(OratureError::Format("wav file exceeds the RIFF size limit".into()));
        }

        let mut file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        if self.data_offset != CANONICAL_DATA_OFFSET {
            self.relocate_audio(&mut file)?;
        }

        {
            let mut writer = BufWriter::new(&mut file);
            writer.seek(SeekFrom::Start(0))?;
            self.write_header(&mut writer)?;

            writer.seek(SeekFrom::Start(CANONICAL_DATA_OFFSET + self.total_audio_length as u64))?;
            if self.total_audio_length % 2 == 1 {
                writer.write_all(&[0])?;
            }
            writer.write_all(&self.metadata.create())?;
            writer.flush()?;
        }
        file.set_len(CHUNK_HEADER_SIZE + riff_size)?;

        debug!(
            path = %self.path.display(),
            total_audio_length = self.total_audio_length,
            metadata = self.metadata.total_size(),
            "updated wav file"
        );
        self.dirty = false;
        Ok(())
    }

    /// Pull reader over the whole audio payload.
    ///
    /// The reader holds its own file handle and sees audio appended before it was opened.
    pub fn reader(&self) -> Result<WavFileReader> {
        self.reader_range(None, None)
    }

    /// Pull reader restricted to frames `[start, end)`, clamped to the audio length.
    pub fn reader_range(&self, start: Option<u32>, end: Option<u32>) -> Result<WavFileReader> {
        let total = self.total_frames();
        let end = end.unwrap_or(total).min(total);
        let start = start.unwrap_or(0).min(end);
        WavFileReader::open(&self.path, self.format, self.data_offset, start, end)
    }

    fn write_header<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&RIFF_ID)?;
        writer.write_all(&self.total_data_length().to_le_bytes())?;
        writer.write_all(&WAVE_ID)?;
        write_chunk(writer, &FMT_ID, &FormatChunk::from(self.format).to_bytes())?;
        writer.write_all(&DATA_ID)?;
        writer.write_all(&self.total_audio_length.to_le_bytes())?;
        Ok(())
    }

    /// Moves the audio payload to directly after a canonical header.
    fn relocate_audio(&mut self, file: &mut File) -> Result<()> {
        let length = self.total_audio_length as u64;
        let mut buffer = vec![0u8; COPY_BLOCK_SIZE];

        // a payload moving towards the end of the file is copied last block first so no unread bytes are overwritten
        let mut starts = (0..length).step_by(COPY_BLOCK_SIZE).collect::<Vec<_>>();
        if self.data_offset < CANONICAL_DATA_OFFSET {
            starts.reverse();
        }

        for start in starts {
            let block = (length - start).min(COPY_BLOCK_SIZE as u64) as usize;
            file.seek(SeekFrom::Start(self.data_offset + start))?;
            read_full(file, &mut buffer[..block])?;
            file.seek(SeekFrom::Start(CANONICAL_DATA_OFFSET + start))?;
            file.write_all(&buffer[..block])?;
        }

        debug!(from = self.data_offset, to = CANONICAL_DATA_OFFSET, bytes = length, "relocated audio payload");
        self.data_offset = CANONICAL_DATA_OFFSET;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn fmt_payload(audio_format: u16, channels: u16, sample_rate: u32, bits: u16) -> Vec<u8> {
        let mut chunk = FormatChunk::from(AudioFormat::new(channels, sample_rate, bits));
        chunk.audio_format = audio_format;
        chunk.to_bytes()
    }

    fn riff(chunks: &[Vec<u8>]) -> Vec<u8> {
        let body = chunks.concat();
        let mut result = RIFF_ID.to_vec();
        result.extend_from_slice(&(body.len() as u32 + 4).to_le_bytes());
        result.extend_from_slice(&WAVE_ID);
        result.extend(body);
        result
    }

    #[test]
    fn created_file_is_canonical_empty_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");

        let wav = WavFile::create(&path, AudioFormat::default()).unwrap();
        assert_eq!(wav.total_audio_length(), 0);
        assert_eq!(wav.total_data_length(), 36);
        assert!(!wav.has_metadata());

        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 44);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[4..8], &36u32.to_le_bytes());
        assert_eq!(&bytes[8..16], b"WAVEfmt ");
        assert_eq!(&bytes[16..20], &16u32.to_le_bytes());
        assert_eq!(&bytes[22..24], &1u16.to_le_bytes());
        assert_eq!(&bytes[24..28], &44100u32.to_le_bytes());
        assert_eq!(&bytes[28..32], &88200u32.to_le_bytes());
        assert_eq!(&bytes[32..34], &2u16.to_le_bytes());
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(&bytes[40..44], &0u32.to_le_bytes());
    }

    #[test]
    fn header_stays_consistent_over_appends_and_cues() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grow.wav");
        let mut wav = WavFile::create(&path, AudioFormat::default()).unwrap();

        for (i, block) in [vec![1u8; 4], vec![2u8; 100], vec![3u8; 2]].iter().enumerate() {
            wav.append(block).unwrap();
            if i == 1 {
                wav.add_cue(10, "orature-vm-1");
            }
            wav.update().unwrap();

            assert_eq!(wav.total_data_length(), 36 + wav.total_audio_length() + wav.metadata().total_size());
            assert_eq!(wav.has_metadata(), !wav.metadata().cues().is_empty());
            assert_eq!(fs::metadata(&path).unwrap().len(), 8 + wav.total_data_length() as u64);
        }

        let reopened = WavFile::open(&path).unwrap();
        assert_eq!(reopened.total_audio_length(), 106);
        assert_eq!(reopened.total_frames(), 53);
        assert_eq!(reopened.metadata().cues(), &[WavCue::new(10, "orature-vm-1")]);
    }

    #[test]
    fn update_is_a_no_op_when_clean() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clean.wav");
        let mut wav = WavFile::create(&path, AudioFormat::default()).unwrap();
        wav.append(&[0; 8]).unwrap();
        assert!(wav.is_dirty());
        wav.update().unwrap();
        assert!(!wav.is_dirty());

        let before = fs::read(&path).unwrap();
        wav.update().unwrap();
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn odd_audio_length_is_padded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odd.wav");
        let mut wav = WavFile::create(&path, AudioFormat::new(1, 8000, 8)).unwrap();
        wav.append(&[128; 3]).unwrap();
        wav.add_cue(1, "x");
        wav.update().unwrap();

        assert_eq!(wav.total_data_length(), 36 + 4 + wav.metadata().total_size());

        let reopened = WavFile::open(&path).unwrap();
        assert_eq!(reopened.total_audio_length(), 3);
        assert_eq!(reopened.metadata().cues(), &[WavCue::new(1, "x")]);
    }

    #[test]
    fn missing_fmt_or_data_is_format_error() {
        let dir = tempfile::tempdir().unwrap();

        let path = dir.path().join("no_fmt.wav");
        fs::write(&path, riff(&[chunk_bytes(&DATA_ID, &[0; 4])])).unwrap();
        let err = WavFile::open(&path).unwrap_err();
        assert!(matches!(err, OratureError::Format(_)));

        let path = dir.path().join("no_data.wav");
        fs::write(&path, riff(&[chunk_bytes(&FMT_ID, &fmt_payload(1, 1, 44100, 16))])).unwrap();
        let err = WavFile::open(&path).unwrap_err();
        assert!(matches!(err, OratureError::Format(_)));
    }

    #[test]
    fn non_wave_input_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not.wav");
        fs::write(&path, b"RIFF\x04\x00\x00\x00AVI ").unwrap();
        assert!(WavFile::open(&path).unwrap_err().is_format_error());

        fs::write(&path, b"OggS").unwrap();
        assert!(WavFile::open(&path).unwrap_err().is_format_error());
    }

    #[test]
    fn truncated_data_chunk_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.wav");
        let mut data = chunk_bytes(&DATA_ID, &[0; 100]);
        data.truncate(40);
        fs::write(&path, riff(&[chunk_bytes(&FMT_ID, &fmt_payload(1, 1, 44100, 16)), data])).unwrap();

        let err = WavFile::open(&path).unwrap_err();
        assert!(matches!(err, OratureError::TruncatedStream { .. }));
    }

    #[test]
    fn non_pcm_format_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.wav");
        fs::write(&path, riff(&[chunk_bytes(&FMT_ID, &fmt_payload(3, 1, 44100, 32)), chunk_bytes(&DATA_ID, &[0; 4])])).unwrap();

        assert!(matches!(WavFile::open(&path).unwrap_err(), OratureError::Format(_)));
    }

    #[test]
    fn extensible_pcm_is_accepted_and_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extensible.wav");

        let mut fmt = fmt_payload(WAVE_FORMAT_EXTENSIBLE, 2, 48000, 24);
        fmt.extend_from_slice(&22u16.to_le_bytes());
        fmt.extend_from_slice(&24u16.to_le_bytes());
        fmt.extend_from_slice(&3u32.to_le_bytes());
        fmt.extend_from_slice(&1u16.to_le_bytes());
        fmt.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xaa, 0x00, 0x38, 0x9b, 0x71]);
        let audio = (0..12u8).collect::<Vec<_>>();
        fs::write(&path, riff(&[chunk_bytes(&FMT_ID, &fmt), chunk_bytes(&DATA_ID, &audio)])).unwrap();

        let mut wav = WavFile::open(&path).unwrap();
        assert_eq!(wav.format(), AudioFormat::new(2, 48000, 24));
        assert_eq!(wav.total_frames(), 2);

        wav.add_cue(1, "orature-vm-1");
        wav.update().unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[16..20], &16u32.to_le_bytes());
        assert_eq!(&bytes[44..56], &audio[..]);
        assert_eq!(WavFile::open(&path).unwrap().metadata().cues().len(), 1);
    }

    #[test]
    fn foreign_chunks_survive_relocation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("info.wav");

        let info = chunk_bytes(&LIST_CHUNK_ID, b"INFOISFT\x05\x00\x00\x00tool\x00\x00");
        let audio = vec![7u8; 10];
        fs::write(
            &path,
            riff(&[chunk_bytes(&FMT_ID, &fmt_payload(1, 1, 44100, 16)), info, chunk_bytes(&DATA_ID, &audio)]),
        )
        .unwrap();

        let mut wav = WavFile::open(&path).unwrap();
        assert_eq!(wav.metadata().foreign_chunks().len(), 1);
        assert!(wav.has_metadata());

        wav.append(&[8u8; 2]).unwrap();
        wav.update().unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(&bytes[44..54], &audio[..]);
        assert_eq!(&bytes[54..56], &[8, 8]);

        let reopened = WavFile::open(&path).unwrap();
        assert_eq!(reopened.total_audio_length(), 12);
        assert_eq!(reopened.metadata().foreign_chunks(), wav.metadata().foreign_chunks());
        assert_eq!(reopened.total_data_length(), 36 + 12 + reopened.metadata().total_size());
    }

    #[test]
    fn data_before_fmt_is_relocated_intact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data_first.wav");

        let audio = (0..200_000u32).map(|x| (x % 251) as u8).collect::<Vec<_>>();
        fs::write(&path, riff(&[chunk_bytes(&DATA_ID, &audio), chunk_bytes(&FMT_ID, &fmt_payload(1, 1, 44100, 16))])).unwrap();

        let mut wav = WavFile::open(&path).unwrap();
        assert_eq!(wav.total_audio_length(), 200_000);
        wav.add_cue(0, "orature-vm-1");
        wav.update().unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[36..40], b"data");
        assert!(bytes[44..44 + audio.len()] == audio[..]);

        let reopened = WavFile::open(&path).unwrap();
        assert_eq!(reopened.total_audio_length(), 200_000);
        assert_eq!(reopened.metadata().cues(), &[WavCue::new(0, "orature-vm-1")]);
    }

    #[test]
    fn bytes_past_riff_end_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trailer.wav");
        let mut wav = WavFile::create(&path, AudioFormat::default()).unwrap();
        wav.append(&[5; 8]).unwrap();
        wav.add_cue(2, "orature-vm-1");
        wav.update().unwrap();
        let clean = fs::read(&path).unwrap();

        for trailer in [b"TAG".to_vec(), chunk_bytes(b"junk", &[1; 10])] {
            let mut bytes = clean.clone();
            bytes.extend(trailer);
            fs::write(&path, bytes).unwrap();

            let mut wav = WavFile::open(&path).unwrap();
            assert_eq!(wav.total_audio_length(), 8);
            assert_eq!(wav.metadata().cues(), &[WavCue::new(2, "orature-vm-1")]);
            assert!(wav.metadata().foreign_chunks().is_empty());

            wav.add_cue(3, "orature-vm-2");
            wav.update().unwrap();
            assert_eq!(fs::metadata(&path).unwrap().len(), 8 + wav.total_data_length() as u64);
            assert_eq!(WavFile::open(&path).unwrap().metadata().cues().len(), 2);
        }
    }

    #[test]
    fn short_form_type_reports_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.wav");
        fs::write(&path, b"RIFF\x04\x00\x00\x00WA").unwrap();

        let err = WavFile::open(&path).unwrap_err();
        assert!(matches!(err, OratureError::TruncatedStream { expected: 4, available: 2 }));
    }

    #[test]
    fn clearing_cues_removes_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clear.wav");
        let mut wav = WavFile::create(&path, AudioFormat::default()).unwrap();
        wav.append(&[0; 4]).unwrap();
        wav.add_cue(0, "a");
        wav.update().unwrap();
        assert!(wav.has_metadata());

        wav.clear_cues();
        wav.update().unwrap();
        assert!(!wav.has_metadata());
        assert_eq!(fs::metadata(&path).unwrap().len(), 48);
    }

    #[test]
    fn invalid_format_cannot_be_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.wav");
        assert!(WavFile::create(&path, AudioFormat::new(0, 44100, 16)).is_err());
        assert!(WavFile::create(&path, AudioFormat::new(1, 44100, 12)).is_err());
    }
}
