//! Best-effort steps after a successful write: renaming the file after its
//! tags and saving a lyric sidecar. Callers log failures and move on; nothing
//! here can undo or fail a tag write.

use std::path::{Path, PathBuf};

use core_metadata::{LyricDocument, SongMetadata};
use tokio::fs;
use tracing::{debug, info};

use crate::error::Result;

/// Characters most filesystems refuse in a file name.
pub const ILLEGAL_FILE_NAME_CHARS: [char; 9] = ['?', '\\', '/', '*', '<', '>', '|', ':', '"'];

pub const SIDECAR_EXTENSION: &str = "txt";

/// Drops [`ILLEGAL_FILE_NAME_CHARS`] and trims.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| !ILLEGAL_FILE_NAME_CHARS.contains(c) && !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// `"artist - title"`, or `None` when either part is missing or sanitizes
/// to nothing.
pub fn display_stem(metadata: &SongMetadata) -> Option<String> {
    let artist = sanitize_file_name(metadata.artist.as_deref()?);
    let title = sanitize_file_name(metadata.title.as_deref()?);
    if artist.is_empty() || title.is_empty() {
        return None;
    }
    Some(format!("{} - {}", artist, title))
}

/// Target name for a rename, keeping the current extension.
pub fn rename_target(path: &Path, metadata: &SongMetadata) -> Option<PathBuf> {
    let stem = display_stem(metadata)?;
    let file_name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{}.{}", stem, ext),
        _ => stem,
    };
    Some(path.with_file_name(file_name))
}

/// Renames `path` to `"artist - title.ext"` next to itself.
///
/// Returns the new path, or `None` when the name is already right, when
/// artist or title is missing, or when another file holds the name.
pub async fn rename_to_metadata(path: &Path, metadata: &SongMetadata) -> Result<Option<PathBuf>> {
    let Some(target) = rename_target(path, metadata) else {
        debug!(path = %path.display(), "Rename skipped: artist or title missing");
        return Ok(None);
    };

    if target == path {
        return Ok(None);
    }

    if fs::try_exists(&target).await? && !same_file(path, &target).await {
        info!(
            from = %path.display(),
            to = %target.display(),
            "Rename skipped: target exists"
        );
        return Ok(None);
    }

    fs::rename(path, &target).await?;
    info!(from = %path.display(), to = %target.display(), "Renamed file");
    Ok(Some(target))
}

async fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a).await, fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Where the sidecar for `audio_path` goes.
///
/// Named after artist and title when both are known, after the audio file
/// otherwise; placed in `lyric_dir` or next to the audio file.
pub fn sidecar_path(audio_path: &Path, metadata: &SongMetadata, lyric_dir: Option<&Path>) -> PathBuf {
    let stem = display_stem(metadata).unwrap_or_else(|| {
        audio_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "lyric".to_string())
    });

    let dir = lyric_dir
        .map(Path::to_path_buf)
        .or_else(|| audio_path.parent().map(Path::to_path_buf))
        .unwrap_or_default();

    dir.join(format!("{}.{}", stem, SIDECAR_EXTENSION))
}

/// Writes `lyric` as a UTF-8 sidecar, one line per lyric line.
pub async fn save_lyric_sidecar(
    audio_path: &Path,
    metadata: &SongMetadata,
    lyric: &LyricDocument,
    lyric_dir: Option<&Path>,
) -> Result<Option<PathBuf>> {
    if lyric.is_empty() {
        return Ok(None);
    }

    let target = sidecar_path(audio_path, metadata, lyric_dir);
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    fs::write(&target, lyric.to_sidecar()).await?;
    info!(sidecar = %target.display(), "Saved lyric sidecar");
    Ok(Some(target))
}
