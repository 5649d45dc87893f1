use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{markers::AudioMarker, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerRecord {
    pub label: String,
    pub location: u32,
}

/// Contents of an alignment sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignmentTimings {
    pub markers: Vec<MarkerRecord>,
    pub book_slug: String,
    pub chapter_number: u32,
    pub audio_length: u32,
}

impl AlignmentTimings {
    /// Markers rebuilt from their serialized labels, in file order.
    pub fn to_markers(&self) -> Vec<AudioMarker> {
        self.markers.iter().map(|x| AudioMarker::from_label(&x.label, x.location)).collect()
    }
}

/// Scripture Burrito style JSON timing sidecar for a recording.
#[derive(Debug, Clone)]
pub struct BurritoAlignmentMetadata {
    path: PathBuf,
}

impl BurritoAlignmentMetadata {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Sidecar next to `audio_path`, with the extension replaced by `json`.
    pub fn for_audio_file(audio_path: impl AsRef<Path>) -> Self {
        Self::new(audio_path.as_ref().with_extension("json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Overwrites the sidecar with `markers` and the chapter context.
    pub fn write(&self, markers: &[AudioMarker], book_slug: &str, chapter_number: u32, audio_length: u32) -> Result<()> {
        let timings = AlignmentTimings {
            markers: markers
                .iter()
                .map(|x| MarkerRecord {
                    label: x.format_marker_text(),
                    location: x.location(),
                })
                .collect(),
            book_slug: book_slug.to_owned(),
            chapter_number,
            audio_length,
        };

        if let Some(parent) = self.path.parent().filter(|x| !x.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(&mut writer, &timings)?;
        writer.flush()?;

        debug!(path = %self.path.display(), markers = markers.len(), "wrote alignment metadata");
        Ok(())
    }

    pub fn read(&self) -> Result<AlignmentTimings> {
        let reader = BufReader::new(File::open(&self.path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Markers stored in the sidecar. Order is not guaranteed; sort by location when it matters.
    pub fn parse_timings(&self) -> Result<Vec<AudioMarker>> {
        Ok(self.read()?.to_markers())
    }
}
