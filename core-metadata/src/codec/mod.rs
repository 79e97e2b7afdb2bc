//! Tag Codec
//!
//! Reads and writes [`SongMetadata`] in the file's native tag format (ID3v2
//! for MP3, Vorbis comments for FLAC, ilst atoms for MP4) through `lofty`.
//!
//! ## Overview
//!
//! - `read` never returns empty strings; a missing tag field is `None`.
//! - When neither artist nor title is tagged, `"Artist - Title.ext"` file
//!   names fill them in.
//! - `write` is a partial update: only fields present in the input are
//!   touched.
//! - A file whose content disagrees with its extension is written with the
//!   matching writer and the correction is reported back.
//!
//! ## Usage
//!
//! ```ignore
//! use core_metadata::codec::TagCodec;
//! use core_metadata::model::{CoverSource, SongMetadata};
//!
//! let codec = TagCodec::new();
//! let (mut metadata, record) = codec.read(path).await?;
//! metadata.genre = Some("J-Pop".to_string());
//! let report = codec.write(path, &metadata, &CoverSource::None).await?;
//! ```

pub mod cover;
mod reader;
mod writer;

use lofty::config::ParseOptions;
use lofty::error::{ErrorKind, LoftyError};
use lofty::file::FileType;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs;
use tracing::{debug, instrument};

use crate::error::{MetadataError, Result};
use crate::model::{ContainerFormat, CoverSource, FileRecord, SongMetadata, WriteReport};

pub use reader::split_artist_title;

/// Reads and writes canonical metadata on disk.
#[derive(Debug, Clone)]
pub struct TagCodec {
    parse_options: ParseOptions,
}

impl Default for TagCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl TagCodec {
    pub fn new() -> Self {
        Self {
            parse_options: ParseOptions::new(),
        }
    }

    pub fn with_options(parse_options: ParseOptions) -> Self {
        Self { parse_options }
    }

    /// Reads tags and local file facts.
    ///
    /// # Errors
    ///
    /// - `NotFound` when the path does not exist
    /// - `UnsupportedFormat` for anything other than MP3, FLAC or MP4 content
    /// - `Corrupt` when the container is recognized but its tags cannot be parsed
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn read(&self, path: &Path) -> Result<(SongMetadata, FileRecord)> {
        let data = fs::read(path).await.map_err(|e| not_found_or_io(path, e))?;
        let fs_meta = fs::metadata(path)
            .await
            .map_err(|e| not_found_or_io(path, e))?;

        let (metadata, container) = reader::parse(path, &data, self.parse_options)?;

        let record = FileRecord {
            path: path.to_path_buf(),
            detected_container: container,
            content_hash: content_hash(&data),
            file_size: data.len() as u64,
            created_at: fs_meta.created().ok().map(Into::into),
            modified_at: fs_meta.modified().ok().map(Into::into),
        };

        debug!(container = %container, hash = %record.content_hash, "Read tags");
        Ok((metadata, record))
    }

    /// Writes every present field of `metadata` into the file.
    ///
    /// # Errors
    ///
    /// - `NotFound` when the path does not exist
    /// - `UnsupportedFormat` when the extension is not `.mp3`, `.flac`, `.mp4` or `.m4a`
    /// - `InvalidFormat` when no container writer accepts the content
    /// - `Cover` when the cover bytes are not a decodable image
    /// - `Io` for filesystem failures
    #[instrument(skip(self, metadata, cover), fields(path = %path.display()))]
    pub async fn write(
        &self,
        path: &Path,
        metadata: &SongMetadata,
        cover: &CoverSource,
    ) -> Result<WriteReport> {
        if !fs::try_exists(path).await? {
            return Err(MetadataError::NotFound(path.display().to_string()));
        }

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_string();
        let declared = ContainerFormat::from_extension(&extension);
        if declared == ContainerFormat::Unknown {
            return Err(MetadataError::UnsupportedFormat(format!(
                "'.{}' is not a supported audio extension",
                extension
            )));
        }

        let cover_bytes = match resolve_cover(metadata, cover).await? {
            Some(raw) => Some(cover::normalize_to_jpeg(&raw)?),
            None => None,
        };

        writer::write_with_fallback(path, declared, &extension, metadata, cover_bytes.as_deref())
    }
}

async fn resolve_cover(metadata: &SongMetadata, cover: &CoverSource) -> Result<Option<Vec<u8>>> {
    let embedded = || metadata.cover_art.clone().filter(|c| !c.is_empty());

    match cover {
        CoverSource::None => Ok(None),
        CoverSource::Embedded => Ok(embedded()),
        CoverSource::ImagePath(image_path) => {
            let bytes = fs::read(image_path)
                .await
                .map_err(|e| not_found_or_io(image_path, e))?;
            if bytes.is_empty() {
                Ok(embedded())
            } else {
                Ok(Some(bytes))
            }
        }
    }
}

pub(crate) fn container_of(file_type: &FileType) -> ContainerFormat {
    match file_type {
        FileType::Mpeg => ContainerFormat::Mp3,
        FileType::Flac => ContainerFormat::Flac,
        FileType::Mp4 => ContainerFormat::Mp4,
        _ => ContainerFormat::Unknown,
    }
}

pub(crate) fn map_lofty_error(path: &Path, err: LoftyError) -> MetadataError {
    match err.kind() {
        ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
            MetadataError::NotFound(path.display().to_string())
        }
        ErrorKind::Io(_) => MetadataError::Io(std::io::Error::other(err.to_string())),
        ErrorKind::UnknownFormat => MetadataError::UnsupportedFormat(format!(
            "{}: unrecognized container",
            path.display()
        )),
        _ => MetadataError::Corrupt(format!("{}: {}", path.display(), err)),
    }
}

fn not_found_or_io(path: &Path, err: std::io::Error) -> MetadataError {
    if err.kind() == std::io::ErrorKind::NotFound {
        MetadataError::NotFound(path.display().to_string())
    } else {
        MetadataError::Io(err)
    }
}

fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
