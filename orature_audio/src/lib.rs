mod burrito;
mod classify;
mod cue;
mod markers;
mod orature_file;
mod reader;
mod reference;
mod riff;
mod wav;

use core::result;
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum OratureError {
    #[error("format error: {0}")]
    Format(String),
    #[error("truncated stream: expected {expected} bytes, {available} available")]
    TruncatedStream { expected: u64, available: u64 },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl OratureError {
    /// True for malformed or short input, false for plain I/O failures.
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::Format(_) | Self::TruncatedStream { .. })
    }
}

impl From<serde_json::Error> for OratureError {
    fn from(e: serde_json::Error) -> Self {
        Self::Format(format!("{}", e))
    }
}

pub type Result<T> = result::Result<T, OratureError>;

pub use self::{
    burrito::{AlignmentTimings, BurritoAlignmentMetadata, MarkerRecord},
    classify::classify_cues,
    cue::{decode, encode, CueChunk, CuePoint, WavCue},
    markers::{AudioMarker, MarkerKind},
    orature_file::OratureAudioFile,
    reader::{AudioFileReader, WavFileReader},
    reference::{parse_reference, reference_to_marker, to_biblical_reference},
    riff::{chunk_bytes, padded_len, parse_chunks, read_chunk, read_chunk_header, read_chunk_payload, read_full, skip_chunk_payload, write_chunk, ChunkHeader, ChunkId, RiffChunk},
    wav::{AudioFormat, ForeignChunk, FormatChunk, WavFile, WavMetadata},
};
