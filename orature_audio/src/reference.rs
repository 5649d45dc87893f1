use std::sync::LazyLock;

use regex::Regex;

use crate::markers::AudioMarker;

static BOOK_REFERENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([[:alnum:]]+)\s+0+$").unwrap());
static CHAPTER_REFERENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([[:alnum:]]+)\s+(\d+)(?:\s*:\s*0+)?$").unwrap());
static VERSE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([[:alnum:]]+)\s+(\d+)\s*:\s*(\d+)(?:\s*-\s*(\d+))?$").unwrap());

/// Parses a biblical reference such as `GEN 1:2-4`, `GEN 1`, `GEN 1:0` or `GEN 0`.
///
/// The location is not part of the reference and is passed through. Returns `None` when
/// the text is not a reference.
pub fn parse_reference(text: &str, location: u32) -> Option<AudioMarker> {
    let text = text.trim();

    if let Some(x) = BOOK_REFERENCE.captures(text) {
        return Some(AudioMarker::book(x[1].to_lowercase(), location));
    }
    if let Some(x) = CHAPTER_REFERENCE.captures(text) {
        return Some(AudioMarker::chapter(x[2].parse().ok()?, location));
    }
    if let Some(x) = VERSE_REFERENCE.captures(text) {
        let start: u32 = x[3].parse().ok()?;
        let end = match x.get(4) {
            Some(end) => end.as_str().parse().ok()?,
            None => start,
        };
        return (start <= end).then(|| AudioMarker::verse(start, end, location));
    }

    None
}

/// Normalized reference for `marker` within `book_slug` chapter `chapter`.
///
/// Chunk and unknown markers have no reference form.
pub fn to_biblical_reference(marker: &AudioMarker, book_slug: &str, chapter: u32) -> Option<String> {
    let book = book_slug.to_uppercase();
    match marker {
        AudioMarker::Book { slug, .. } => Some(format!("{} 0", slug.to_uppercase())),
        AudioMarker::Chapter { number, .. } => Some(format!("{} {}:0", book, number)),
        AudioMarker::Verse { start, end, .. } if start == end => Some(format!("{} {}:{}", book, chapter, start)),
        AudioMarker::Verse { start, end, .. } => Some(format!("{} {}:{}-{}", book, chapter, start, end)),
        AudioMarker::Chunk { .. } | AudioMarker::Unknown { .. } => None,
    }
}

/// Like [`parse_reference`], but keeps unparseable text as an unknown marker.
pub fn reference_to_marker(text: &str, location: u32) -> AudioMarker {
    parse_reference(text, location).unwrap_or_else(|| AudioMarker::unknown(text, location))
}
