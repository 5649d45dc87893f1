use std::{fmt, sync::LazyLock};

use regex::Regex;

static VERSE_LABEL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^orature-vm-(\d+)(?:-(\d+))?$").unwrap());
static CHAPTER_LABEL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^orature-chapter-(\d+)$").unwrap());
static BOOK_LABEL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^orature-book-([\w-]+)$").unwrap());
static CHUNK_LABEL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^orature-chunk-(\d+)$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    Book,
    Chapter,
    Verse,
    Chunk,
    Unknown,
}

/// A cue point interpreted as a navigational marker. `location` is a frame offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AudioMarker {
    Book { slug: String, location: u32 },
    Chapter { number: u32, location: u32 },
    Verse { start: u32, end: u32, location: u32 },
    Chunk { number: u32, location: u32 },
    Unknown { label: String, location: u32 },
}

impl AudioMarker {
    pub fn book(slug: impl Into<String>, location: u32) -> Self {
        Self::Book { slug: slug.into(), location }
    }

    pub fn chapter(number: u32, location: u32) -> Self {
        Self::Chapter { number, location }
    }

    pub fn verse(start: u32, end: u32, location: u32) -> Self {
        Self::Verse { start, end, location }
    }

    pub fn chunk(number: u32, location: u32) -> Self {
        Self::Chunk { number, location }
    }

    pub fn unknown(label: impl Into<String>, location: u32) -> Self {
        Self::Unknown {
            label: label.into(),
            location,
        }
    }

    /// Parses a canonical `orature-*` label. Anything else becomes [`AudioMarker::Unknown`] with the label kept as is.
    pub fn from_label(label: &str, location: u32) -> Self {
        Self::parse_canonical(label.trim(), location).unwrap_or_else(|| Self::unknown(label, location))
    }

    fn parse_canonical(label: &str, location: u32) -> Option<Self> {
        if let Some(x) = VERSE_LABEL.captures(label) {
            let start: u32 = x[1].parse().ok()?;
            let end = match x.get(2) {
                Some(end) => end.as_str().parse().ok()?,
                None => start,
            };
            return (start <= end).then(|| Self::verse(start, end, location));
        }
        if let Some(x) = CHAPTER_LABEL.captures(label) {
            return Some(Self::chapter(x[1].parse().ok()?, location));
        }
        if let Some(x) = BOOK_LABEL.captures(label) {
            return Some(Self::book(&x[1], location));
        }
        if let Some(x) = CHUNK_LABEL.captures(label) {
            return Some(Self::chunk(x[1].parse().ok()?, location));
        }
        None
    }

    pub fn kind(&self) -> MarkerKind {
        match self {
            Self::Book { .. } => MarkerKind::Book,
            Self::Chapter { .. } => MarkerKind::Chapter,
            Self::Verse { .. } => MarkerKind::Verse,
            Self::Chunk { .. } => MarkerKind::Chunk,
            Self::Unknown { .. } => MarkerKind::Unknown,
        }
    }

    pub fn location(&self) -> u32 {
        match self {
            Self::Book { location, .. }
            | Self::Chapter { location, .. }
            | Self::Verse { location, .. }
            | Self::Chunk { location, .. }
            | Self::Unknown { location, .. } => *location,
        }
    }

    pub fn set_location(&mut self, frame: u32) {
        match self {
            Self::Book { location, .. }
            | Self::Chapter { location, .. }
            | Self::Verse { location, .. }
            | Self::Chunk { location, .. }
            | Self::Unknown { location, .. } => *location = frame,
        }
    }

    /// Human readable label, e.g. `2-4` for a verse range.
    pub fn label(&self) -> String {
        match self {
            Self::Book { slug, .. } => slug.clone(),
            Self::Chapter { number, .. } | Self::Chunk { number, .. } => number.to_string(),
            Self::Verse { start, end, .. } if start == end => start.to_string(),
            Self::Verse { start, end, .. } => format!("{}-{}", start, end),
            Self::Unknown { label, .. } => label.clone(),
        }
    }

    /// Label written into the WAV cue list and the alignment sidecar.
    pub fn format_marker_text(&self) -> String {
        match self {
            Self::Book { slug, .. } => format!("orature-book-{}", slug),
            Self::Chapter { number, .. } => format!("orature-chapter-{}", number),
            Self::Verse { .. } => format!("orature-vm-{}", self.label()),
            Self::Chunk { number, .. } => format!("orature-chunk-{}", number),
            Self::Unknown { label, .. } => label.clone(),
        }
    }

    pub fn sort_by_location(markers: &mut [AudioMarker]) {
        markers.sort_by_key(AudioMarker::location);
    }
}

impl fmt::Display for AudioMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.format_marker_text(), self.location())
    }
}
