use std::collections::HashMap;

use nom::{
    bytes::complete::tag,
    combinator::rest,
    multi::count,
    number::complete::le_u32,
    sequence::tuple,
    IResult,
};
use nom_derive::{NomLE, Parse};
use tracing::{trace, warn};

use crate::{
    riff::{chunk_bytes, padded_len, parse_chunks, RiffChunk, CHUNK_HEADER_SIZE},
    OratureError, Result,
};

pub const CUE_CHUNK_ID: [u8; 4] = *b"cue ";
pub const LIST_CHUNK_ID: [u8; 4] = *b"LIST";
pub const ADTL_LIST_TYPE: [u8; 4] = *b"adtl";
pub const LABEL_CHUNK_ID: [u8; 4] = *b"labl";

const CUE_POINT_SIZE: u32 = 24;
const DATA_CHUNK_ID: u32 = u32::from_le_bytes(*b"data");

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WavCue {
    pub location: u32,
    pub label: String,
}

impl WavCue {
    pub fn new(location: u32, label: impl Into<String>) -> Self {
        Self {
            location,
            label: label.into(),
        }
    }
}

/// One fixed-width record of the `cue ` table.
#[derive(NomLE, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CuePoint {
    pub id: u32,
    pub position: u32,
    pub data_chunk_id: u32,
    pub chunk_start: u32,
    pub block_start: u32,
    pub sample_offset: u32,
}

impl CuePoint {
    fn new(id: u32, location: u32) -> Self {
        Self {
            id,
            position: location,
            data_chunk_id: DATA_CHUNK_ID,
            chunk_start: 0,
            block_start: 0,
            sample_offset: location,
        }
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        for field in [self.id, self.position, self.data_chunk_id, self.chunk_start, self.block_start, self.sample_offset] {
            out.extend_from_slice(&field.to_le_bytes());
        }
    }
}

fn parse_cue_table(data: &[u8]) -> Result<Vec<CuePoint>> {
    let (records, cue_count) = le_u32::<_, nom::error::Error<&[u8]>>(data).map_err(|_| OratureError::TruncatedStream {
        expected: 4,
        available: data.len() as u64,
    })?;

    let expected = cue_count as u64 * CUE_POINT_SIZE as u64;
    if (records.len() as u64) < expected {
        return Err(OratureError::TruncatedStream {
            expected,
            available: records.len() as u64,
        });
    }

    let (_, points) = count(CuePoint::parse_le, cue_count as usize)(records).map_err(|e: nom::Err<nom::error::Error<&[u8]>>| OratureError::Format(format!("{}", e)))?;
    Ok(points)
}

fn parse_label(data: &[u8]) -> IResult<&[u8], (u32, &[u8])> {
    tuple((le_u32, rest))(data)
}

/// Label text up to its NUL terminator. Anything that is not UTF-8 is decoded lossily.
fn decode_label_text(raw: &[u8]) -> String {
    let end = raw.iter().rposition(|&x| x != 0).map_or(0, |x| x + 1);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

fn parse_adtl(list: &RiffChunk, labels: &mut HashMap<u32, String>) -> Result<()> {
    let (sub_chunks, _) =
        tag::<_, _, nom::error::Error<&[u8]>>(&ADTL_LIST_TYPE[..])(list.data).map_err(|e| OratureError::Format(format!("{}", e)))?;

    for chunk in parse_chunks(sub_chunks)? {
        match &chunk.id {
            b"labl" => {
                let (_, (id, text)) = parse_label(chunk.data).map_err(|_| OratureError::TruncatedStream {
                    expected: 4,
                    available: chunk.data.len() as u64,
                })?;
                labels.entry(id).or_insert_with(|| decode_label_text(text));
            }
            other => trace!(id = ?String::from_utf8_lossy(other), "skipping adtl sub-chunk"),
        }
    }

    Ok(())
}

/// Ordered cue list of a WAV file, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CueChunk {
    cues: Vec<WavCue>,
}

impl CueChunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_cue(&mut self, location: u32, label: impl Into<String>) {
        self.cues.push(WavCue::new(location, label));
    }

    pub fn cues(&self) -> &[WavCue] {
        &self.cues
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn clear(&mut self) {
        self.cues.clear();
    }

    /// Bytes `create` emits: the `cue ` chunk and the `LIST`/`adtl` chunk, headers included.
    pub fn total_size(&self) -> u32 {
        if self.cues.is_empty() {
            return 0;
        }

        let cue_chunk = CHUNK_HEADER_SIZE + 4 + CUE_POINT_SIZE as u64 * self.cues.len() as u64;
        let labels: u64 = self
            .cues
            .iter()
            .map(|x| CHUNK_HEADER_SIZE + padded_len(4 + x.label.len() as u32 + 1))
            .sum();
        let list_chunk = CHUNK_HEADER_SIZE + 4 + labels;

        (cue_chunk + list_chunk) as u32
    }

    fn cue_table(&self) -> Vec<u8> {
        let mut table = Vec::with_capacity(4 + CUE_POINT_SIZE as usize * self.cues.len());
        table.extend_from_slice(&(self.cues.len() as u32).to_le_bytes());
        for (id, cue) in (1..).zip(&self.cues) {
            CuePoint::new(id, cue.location).write_to(&mut table);
        }
        table
    }

    fn label_list(&self) -> Vec<u8> {
        let mut list = ADTL_LIST_TYPE.to_vec();
        for (id, cue) in (1u32..).zip(&self.cues) {
            let mut label = id.to_le_bytes().to_vec();
            label.extend_from_slice(cue.label.as_bytes());
            label.push(0);
            list.extend(chunk_bytes(&LABEL_CHUNK_ID, &label));
        }
        list
    }

    /// Serializes to a `cue ` chunk followed by a `LIST`/`adtl` chunk. Empty when there are no cues.
    pub fn create(&self) -> Vec<u8> {
        if self.cues.is_empty() {
            return Vec::new();
        }

        let mut result = chunk_bytes(&CUE_CHUNK_ID, &self.cue_table());
        result.extend(chunk_bytes(&LIST_CHUNK_ID, &self.label_list()));
        result
    }

    /// Parses a run of chunks holding a `cue ` table and its `adtl` labels, in either order.
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::from_chunks(&parse_chunks(data)?)
    }

    /// Builds the cue list from already split chunks. Chunks other than `cue ` and `LIST`/`adtl` are ignored.
    pub fn from_chunks(chunks: &[RiffChunk]) -> Result<Self> {
        let mut labels = HashMap::new();
        for list in chunks.iter().filter(|x| x.is_list(&ADTL_LIST_TYPE)) {
            parse_adtl(list, &mut labels)?;
        }

        let mut cue_chunks = chunks.iter().filter(|x| x.id == CUE_CHUNK_ID);
        let Some(cue_chunk) = cue_chunks.next() else {
            if !labels.is_empty() {
                warn!(labels = labels.len(), "adtl labels without a cue chunk");
            }
            return Ok(Self::new());
        };
        if cue_chunks.next().is_some() {
            warn!("more than one cue chunk, using the first");
        }

        let cues = parse_cue_table(cue_chunk.data)?
            .into_iter()
            .map(|point| WavCue::new(point.sample_offset, labels.get(&point.id).cloned().unwrap_or_default()))
            .collect();

        Ok(Self { cues })
    }
}

impl From<Vec<WavCue>> for CueChunk {
    fn from(cues: Vec<WavCue>) -> Self {
        Self { cues }
    }
}

pub fn encode(cues: &[WavCue]) -> Vec<u8> {
    CueChunk::from(cues.to_vec()).create()
}

pub fn decode(data: &[u8]) -> Result<Vec<WavCue>> {
    Ok(CueChunk::parse(data)?.cues)
}
