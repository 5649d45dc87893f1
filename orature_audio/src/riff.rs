use std::io::{self, Read, Seek, SeekFrom, Write};

use nom::{
    bytes::complete::take,
    combinator::map,
    number::complete::le_u32,
    sequence::tuple,
    IResult,
};
use nom_derive::Parse;
use tracing::trace;

use crate::{OratureError, Result};

pub type ChunkId = [u8; 4];

pub const CHUNK_HEADER_SIZE: u64 = 8;

/// Payload length plus the pad byte an odd payload needs on disk.
pub fn padded_len(size: u32) -> u64 {
    size as u64 + (size as u64 & 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub id: ChunkId,
    pub size: u32,
}

/// A chunk borrowed out of an in-memory buffer. `size` never counts the pad byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiffChunk<'a> {
    pub id: ChunkId,
    pub size: u32,
    pub data: &'a [u8],
}

impl<'a> RiffChunk<'a> {
    pub fn new(id: ChunkId, data: &'a [u8]) -> Self {
        Self {
            id,
            size: data.len() as u32,
            data,
        }
    }

    /// Bytes the chunk occupies in its parent, header and pad included.
    pub fn encoded_len(&self) -> u64 {
        CHUNK_HEADER_SIZE + padded_len(self.size)
    }

    /// `LIST` chunk whose form type matches `list_type`, e.g. `adtl`.
    pub fn is_list(&self, list_type: &ChunkId) -> bool {
        &self.id == b"LIST" && self.data.starts_with(list_type)
    }
}

fn chunk_id(data: &[u8]) -> IResult<&[u8], ChunkId> {
    map(take(4usize), |x: &[u8]| [x[0], x[1], x[2], x[3]])(data)
}

fn chunk_header(data: &[u8]) -> IResult<&[u8], ChunkHeader> {
    map(tuple((chunk_id, le_u32)), |(id, size)| ChunkHeader { id, size })(data)
}

impl<'a> Parse<&'a [u8]> for RiffChunk<'a> {
    fn parse(data: &'a [u8]) -> IResult<&'a [u8], Self> {
        let (remaining, header) = chunk_header(data)?;
        let (remaining, payload) = take(header.size)(remaining)?;

        // pad value is not checked, and a writer that dropped the final pad is tolerated
        let remaining = if header.size % 2 == 1 && !remaining.is_empty() {
            &remaining[1..]
        } else {
            remaining
        };

        Ok((
            remaining,
            Self {
                id: header.id,
                size: header.size,
                data: payload,
            },
        ))
    }
}

/// Reads one chunk from the front of `data`, returning the unread tail.
pub fn read_chunk(data: &[u8]) -> Result<(&[u8], RiffChunk<'_>)> {
    let (payload, header) = chunk_header(data).map_err(|_| OratureError::TruncatedStream {
        expected: CHUNK_HEADER_SIZE,
        available: data.len() as u64,
    })?;

    if (payload.len() as u64) < header.size as u64 {
        return Err(OratureError::TruncatedStream {
            expected: header.size as u64,
            available: payload.len() as u64,
        });
    }

    RiffChunk::parse(data).map_err(|e| OratureError::Format(format!("{}", e)))
}

/// Splits a buffer holding back-to-back chunks.
pub fn parse_chunks(data: &[u8]) -> Result<Vec<RiffChunk<'_>>> {
    let mut chunks = Vec::new();
    let mut cursor = data;
    while !cursor.is_empty() {
        let (remaining, chunk) = read_chunk(cursor)?;
        trace!(id = ?String::from_utf8_lossy(&chunk.id), size = chunk.size, "chunk");
        chunks.push(chunk);
        cursor = remaining;
    }
    Ok(chunks)
}

fn read_up_to<R: Read>(reader: &mut R, buffer: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Fills `buffer` completely, reporting how much was available when the stream ends early.
pub fn read_full<R: Read>(reader: &mut R, buffer: &mut [u8]) -> Result<()> {
    let filled = read_up_to(reader, buffer)?;
    if filled < buffer.len() {
        return Err(OratureError::TruncatedStream {
            expected: buffer.len() as u64,
            available: filled as u64,
        });
    }
    Ok(())
}

/// Reads a chunk header from a stream. `None` at a clean end of stream.
pub fn read_chunk_header<R: Read>(reader: &mut R) -> Result<Option<ChunkHeader>> {
    let mut header = [0u8; CHUNK_HEADER_SIZE as usize];
    let filled = read_up_to(reader, &mut header)?;

    // trailing zero padding after the last chunk is common in the wild
    if filled == 0 || (filled < header.len() && header[..filled].iter().all(|&x| x == 0)) {
        return Ok(None);
    }
    if filled < header.len() {
        return Err(OratureError::TruncatedStream {
            expected: CHUNK_HEADER_SIZE,
            available: filled as u64,
        });
    }

    let (_, header) = chunk_header(&header).map_err(|e| OratureError::Format(format!("{}", e)))?;
    Ok(Some(header))
}

/// Reads the payload following `header`, consuming the pad byte if any.
pub fn read_chunk_payload<R: Read>(reader: &mut R, header: &ChunkHeader) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    let read = reader.by_ref().take(header.size as u64).read_to_end(&mut data)?;
    if (read as u64) < header.size as u64 {
        return Err(OratureError::TruncatedStream {
            expected: header.size as u64,
            available: read as u64,
        });
    }

    if header.size % 2 == 1 {
        let mut pad = [0u8; 1];
        if reader.read(&mut pad)? == 0 {
            trace!("final pad byte missing");
        }
    }

    Ok(data)
}

/// Seeks past the payload following `header` without reading it.
pub fn skip_chunk_payload<R: Seek>(reader: &mut R, header: &ChunkHeader, stream_len: u64) -> Result<()> {
    let start = reader.stream_position()?;
    let available = stream_len.saturating_sub(start);
    if available < header.size as u64 {
        return Err(OratureError::TruncatedStream {
            expected: header.size as u64,
            available,
        });
    }

    let skip = padded_len(header.size).min(available);
    reader.seek(SeekFrom::Current(skip as i64))?;
    Ok(())
}

pub fn write_chunk<W: Write>(writer: &mut W, id: &ChunkId, payload: &[u8]) -> Result<()> {
    let size = u32::try_from(payload.len())
        .map_err(|_| OratureError::Format(format!("chunk payload of {} bytes exceeds the RIFF size limit", payload.len())))?;

    writer.write_all(id)?;
    writer.write_all(&size.to_le_bytes())?;
    writer.write_all(payload)?;
    if size % 2 == 1 {
        writer.write_all(&[0])?;
    }
    Ok(())
}

/// In-memory form of [`write_chunk`] for payloads known to fit in 32 bits.
pub fn chunk_bytes(id: &ChunkId, payload: &[u8]) -> Vec<u8> {
    let size = payload.len() as u32;
    let mut result = Vec::with_capacity((CHUNK_HEADER_SIZE + padded_len(size)) as usize);
    result.extend_from_slice(id);
    result.extend_from_slice(&size.to_le_bytes());
    result.extend_from_slice(payload);
    if size % 2 == 1 {
        result.push(0);
    }
    result
}
