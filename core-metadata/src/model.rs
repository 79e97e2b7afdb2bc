//! Canonical, provider- and format-agnostic value types.
//!
//! Everything here is a plain value: the orchestrator hands these to the codec
//! and to providers, and nothing keeps a reference across calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Canonical song metadata.
///
/// Every field is independently optional. An absent field means "unknown",
/// never "empty"; readers and providers must not produce `Some("")`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SongMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub genre: Option<String>,
    /// Four-digit year when one could be extracted, otherwise whatever the
    /// source supplied.
    pub year: Option<String>,
    pub track_number: Option<TrackNumber>,
    /// Whole seconds.
    pub duration: Option<u32>,
    /// Raw image bytes. The MIME type is sniffed from content, see
    /// [`sniff_image_mime`].
    pub cover_art: Option<Vec<u8>>,
    /// Plain or LRC-timed lyric text.
    pub lyric: Option<String>,
}

impl SongMetadata {
    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.artist.is_none()
            && self.album.is_none()
            && self.album_artist.is_none()
            && self.genre.is_none()
            && self.year.is_none()
            && self.track_number.is_none()
            && self.duration.is_none()
            && self.cover_art.is_none()
            && self.lyric.is_none()
    }

    pub fn cover_mime(&self) -> Option<&'static str> {
        self.cover_art.as_deref().and_then(sniff_image_mime)
    }
}

impl fmt::Debug for SongMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SongMetadata")
            .field("title", &self.title)
            .field("artist", &self.artist)
            .field("album", &self.album)
            .field("album_artist", &self.album_artist)
            .field("genre", &self.genre)
            .field("year", &self.year)
            .field("track_number", &self.track_number)
            .field("duration", &self.duration)
            .field("cover_art", &self.cover_art.as_ref().map(|c| c.len()))
            .field("lyric", &self.lyric.as_ref().map(|l| l.len()))
            .finish()
    }
}

/// `(index, total)` position on a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackNumber {
    pub index: u32,
    pub total: Option<u32>,
}

impl TrackNumber {
    pub fn new(index: u32, total: Option<u32>) -> Self {
        Self { index, total }
    }
}

impl fmt::Display for TrackNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.total {
            Some(total) => write!(f, "{}/{}", self.index, total),
            None => write!(f, "{}", self.index),
        }
    }
}

/// Real container of an audio file, independent of its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    Mp3,
    Flac,
    Mp4,
    Unknown,
}

impl ContainerFormat {
    /// Order in which writers are tried after a mismatch.
    pub const FALLBACK_ORDER: [ContainerFormat; 3] =
        [ContainerFormat::Mp4, ContainerFormat::Mp3, ContainerFormat::Flac];

    /// Maps a declared file extension to the container it claims to be.
    pub fn from_extension(ext: &str) -> ContainerFormat {
        match ext.to_ascii_lowercase().as_str() {
            "mp3" => ContainerFormat::Mp3,
            "flac" => ContainerFormat::Flac,
            "mp4" | "m4a" | "m4b" => ContainerFormat::Mp4,
            _ => ContainerFormat::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerFormat::Mp3 => "mp3",
            ContainerFormat::Flac => "flac",
            ContainerFormat::Mp4 => "mp4",
            ContainerFormat::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local file facts. Computed fresh on every read, never touched by remote data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub detected_container: ContainerFormat,
    /// Lowercase hex SHA-256 of the file bytes
    pub content_hash: String,
    pub file_size: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

/// One row of a search result list.
///
/// `provider_key` is opaque and only meaningful to the provider that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCandidate {
    pub provider_key: String,
    pub display_title: String,
    pub display_artist: String,
    pub duration: Option<u32>,
}

impl SearchCandidate {
    pub fn display_duration(&self) -> String {
        self.duration.map(format_duration).unwrap_or_default()
    }
}

/// Where the cover for a write comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CoverSource {
    /// Read the image from this file. Wins over `SongMetadata::cover_art`;
    /// an empty file falls back to it.
    ImagePath(PathBuf),
    /// Use `SongMetadata::cover_art` if present.
    #[default]
    Embedded,
    /// Leave the existing cover alone.
    None,
}

/// Tag fields a write can touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagField {
    Title,
    Artist,
    Album,
    AlbumArtist,
    Genre,
    Year,
    TrackNumber,
    Lyric,
    Cover,
}

/// Picture metadata reported for every written cover. FLAC PICTURE blocks
/// carry it as their width, height and depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverDescriptor {
    pub width: u32,
    pub height: u32,
    pub color_depth: u32,
    pub front_cover: bool,
}

impl Default for CoverDescriptor {
    fn default() -> Self {
        Self {
            width: 500,
            height: 500,
            color_depth: 16,
            front_cover: true,
        }
    }
}

/// The file's real container differs from its extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatCorrection {
    pub detected: ContainerFormat,
    pub original_extension: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WriteReport {
    pub fields_written: Vec<TagField>,
    pub cover: Option<CoverDescriptor>,
    pub format_correction: Option<FormatCorrection>,
}

impl WriteReport {
    pub fn wrote(&self, field: TagField) -> bool {
        self.fields_written.contains(&field)
    }
}

/// Renders whole seconds as `m:ss` for display. Never use the result as a
/// comparison key.
pub fn format_duration(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Normalizes a provider date into a year.
///
/// Returns the first standalone run of exactly four digits when there is one,
/// otherwise the trimmed input unchanged. Blank input yields `None`.
pub fn extract_year(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let bytes = trimmed.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i - start == 4 {
                return Some(trimmed[start..i].to_string());
            }
        } else {
            i += 1;
        }
    }

    Some(trimmed.to_string())
}

/// Identifies common image formats from their magic bytes.
pub fn sniff_image_mime(data: &[u8]) -> Option<&'static str> {
    if data.len() < 4 {
        return None;
    }

    match &data[0..4] {
        [0xFF, 0xD8, 0xFF, _] => Some("image/jpeg"),
        [0x89, 0x50, 0x4E, 0x47] => Some("image/png"),
        [0x47, 0x49, 0x46, 0x38] => Some("image/gif"),
        [0x52, 0x49, 0x46, 0x46] if data.len() >= 12 && &data[8..12] == b"WEBP" => {
            Some("image/webp")
        }
        [0x42, 0x4D, _, _] => Some("image/bmp"),
        _ => None,
    }
}

/// Trims a tag or provider string and maps blank to absent. The inside of
/// the string is kept as it is.
pub(crate) fn non_empty(value: impl AsRef<str>) -> Option<String> {
    let trimmed = value.as_ref().trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
