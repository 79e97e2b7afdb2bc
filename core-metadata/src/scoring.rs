//! Candidate scoring
//!
//! Compares local metadata with a fetched candidate and yields a confidence
//! in `0..=100`. Automated flows accept a candidate at or above the
//! configured threshold; interactive flows only display the number.
//!
//! Signals are tiered. Title, artist and duration decide whenever at least
//! one of them is present on both sides. Album, album artist, year, genre and
//! track position only speak when no primary signal exists, so a mismatch
//! there can never sink a title/artist match. Lyric text and cover bytes are
//! the last resort. A field missing on either side is no signal at all.

use crate::model::SongMetadata;

/// Default minimum score for unattended acceptance.
pub const ACCEPT_THRESHOLD: u8 = 80;

const TITLE_WEIGHT: f64 = 45.0;
const ARTIST_WEIGHT: f64 = 35.0;
const DURATION_WEIGHT: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchScorer {
    threshold: u8,
}

impl Default for MatchScorer {
    fn default() -> Self {
        Self::new(ACCEPT_THRESHOLD)
    }
}

impl MatchScorer {
    pub fn new(threshold: u8) -> Self {
        Self {
            threshold: threshold.clamp(1, 100),
        }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn accepts(&self, score: u8) -> bool {
        score >= self.threshold
    }

    /// Scores `candidate` against `local`.
    pub fn score(&self, local: &SongMetadata, candidate: &SongMetadata) -> u8 {
        let primary = [
            text_signal(&local.title, &candidate.title, TITLE_WEIGHT),
            text_signal(&local.artist, &candidate.artist, ARTIST_WEIGHT),
            local
                .duration
                .zip(candidate.duration)
                .map(|(l, c)| (DURATION_WEIGHT, duration_similarity(l, c))),
        ];
        if let Some(score) = weighted(&primary) {
            return score;
        }

        let track = |m: &SongMetadata| m.track_number.map(|t| t.index.to_string());
        let secondary = [
            text_signal(&local.album, &candidate.album, 1.0),
            text_signal(&local.album_artist, &candidate.album_artist, 1.0),
            text_signal(&local.year, &candidate.year, 1.0),
            text_signal(&local.genre, &candidate.genre, 1.0),
            text_signal(&track(local), &track(candidate), 1.0),
        ];
        if let Some(score) = weighted(&secondary) {
            return score;
        }

        let tertiary = [
            text_signal(&local.lyric, &candidate.lyric, 1.0),
            local
                .cover_art
                .as_ref()
                .zip(candidate.cover_art.as_ref())
                .map(|(l, c)| (1.0, if l == c { 1.0 } else { 0.0 })),
        ];
        weighted(&tertiary).unwrap_or(0)
    }
}

fn weighted(signals: &[Option<(f64, f64)>]) -> Option<u8> {
    let (total_weight, total) = signals
        .iter()
        .flatten()
        .fold((0.0, 0.0), |(w, s), (weight, sim)| (w + weight, s + weight * sim));

    if total_weight <= 0.0 {
        return None;
    }
    Some((100.0 * total / total_weight).round().clamp(0.0, 100.0) as u8)
}

/// `Some((weight, similarity))` when the local side has something to
/// compare and the candidate carries the field at all.
fn text_signal(local: &Option<String>, candidate: &Option<String>, weight: f64) -> Option<(f64, f64)> {
    let local = local.as_deref()?;
    let candidate = candidate.as_deref()?;

    let key = normalize(local);
    if !key.is_empty() {
        return Some((weight, text_similarity(&key, &normalize(candidate))));
    }

    // Symbol-only text ("!!!", "♡") has no alphanumerics to compare, so the
    // lowercased raw text stands in for it.
    let raw = local.trim().to_lowercase();
    if raw.is_empty() {
        return None;
    }
    Some((weight, text_similarity(&raw, &candidate.trim().to_lowercase())))
}

/// Lowercase, alphanumerics only.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// `1 - distance / len(local)`, floored at zero.
///
/// Only the local length appears in the denominator, so the result never
/// rises as the candidate drifts further away.
pub fn text_similarity(local: &str, candidate: &str) -> f64 {
    let len = local.chars().count();
    if len == 0 {
        return 0.0;
    }
    let distance = strsim::levenshtein(local, candidate);
    (1.0 - distance as f64 / len as f64).max(0.0)
}

/// Tiered closeness of two durations in whole seconds.
pub fn duration_similarity(local: u32, candidate: u32) -> f64 {
    match local.abs_diff(candidate) {
        0..=2 => 1.0,
        3..=5 => 0.8,
        6..=10 => 0.5,
        11..=15 => 0.25,
        16..=30 => 0.1,
        _ => 0.0,
    }
}
