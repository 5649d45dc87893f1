use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::{cue::WavCue, markers::AudioMarker};

static ORATURE_VERSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^orature-vm-(\d+)$").unwrap());
static LONE_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)$").unwrap());
static ANY_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)").unwrap());

/// Verse number a bucket extracts from a label, if the label belongs to it.
type Matcher = fn(&str) -> Option<u32>;

fn orature_verse(label: &str) -> Option<u32> {
    ORATURE_VERSE.captures(label)?[1].parse().ok()
}

fn lone_digits(label: &str) -> Option<u32> {
    LONE_DIGITS.captures(label.trim())?[1].parse().ok()
}

fn any_digits(label: &str) -> Option<u32> {
    ANY_DIGITS.captures(label)?[1].parse().ok()
}

/// Splits raw cues into verse markers and untouched extra cues.
///
/// Buckets are tried in priority order: current `orature-vm-N` labels, then legacy
/// labels made of a lone number, then any label containing a number. The first bucket
/// that captures at least one cue is applied alone, and every cue it does not capture
/// is returned as an extra cue.
pub fn classify_cues(cues: &[WavCue]) -> (Vec<AudioMarker>, Vec<WavCue>) {
    let buckets: [(&str, Matcher); 3] = [("orature", orature_verse), ("lone digit", lone_digits), ("any digit", any_digits)];

    for (name, matcher) in buckets {
        let verses = cues.iter().map(|x| matcher(&x.label)).collect::<Vec<_>>();
        if verses.iter().all(Option::is_none) {
            continue;
        }

        let mut markers = Vec::new();
        let mut extra = Vec::new();
        for (cue, verse) in cues.iter().zip(verses) {
            match verse {
                Some(verse) => markers.push(AudioMarker::verse(verse, verse, cue.location)),
                None => extra.push(cue.clone()),
            }
        }

        debug!(bucket = name, markers = markers.len(), extra = extra.len(), "classified cues");
        return (markers, extra);
    }

    (Vec::new(), cues.to_vec())
}
