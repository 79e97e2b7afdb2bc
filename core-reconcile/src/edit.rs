//! Manual batch edits.

use std::path::PathBuf;

use core_metadata::{CoverSource, SongMetadata};
use serde::{Deserialize, Serialize};

/// Fields a user sets by hand across a selection of files.
///
/// `None` leaves the field untouched on every file. Title, track number and
/// lyric are per-song and deliberately absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEdit {
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub year: Option<String>,
    pub genre: Option<String>,
    /// Image file applied as the cover of every file
    pub cover_image: Option<PathBuf>,
}

impl BatchEdit {
    pub fn is_empty(&self) -> bool {
        self.to_metadata().is_empty() && self.cover_image.is_none()
    }

    /// Metadata to write. Blank strings count as unset.
    pub fn to_metadata(&self) -> SongMetadata {
        SongMetadata {
            artist: non_blank(&self.artist),
            album: non_blank(&self.album),
            album_artist: non_blank(&self.album_artist),
            year: non_blank(&self.year),
            genre: non_blank(&self.genre),
            ..Default::default()
        }
    }

    pub fn cover_source(&self) -> CoverSource {
        match &self.cover_image {
            Some(path) => CoverSource::ImagePath(path.clone()),
            None => CoverSource::None,
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_fields_are_unset() {
        let edit = BatchEdit {
            artist: Some("  ".into()),
            album: Some(" Album ".into()),
            ..Default::default()
        };
        let metadata = edit.to_metadata();
        assert_eq!(metadata.artist, None);
        assert_eq!(metadata.album.as_deref(), Some("Album"));
        assert!(!edit.is_empty());
    }

    #[test]
    fn test_cover_source() {
        assert_eq!(BatchEdit::default().cover_source(), CoverSource::None);
        assert!(BatchEdit::default().is_empty());

        let edit = BatchEdit {
            cover_image: Some(PathBuf::from("/covers/front.png")),
            ..Default::default()
        };
        assert_eq!(
            edit.cover_source(),
            CoverSource::ImagePath(PathBuf::from("/covers/front.png"))
        );
        assert!(!edit.is_empty());
    }
}
