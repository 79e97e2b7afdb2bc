//! Search keyword derivation.

use std::path::Path;

use core_metadata::SongMetadata;

/// `"artist-title"` when both are known, otherwise the file stem.
///
/// Characters catalogs choke on are left in place here; every
/// [`CatalogClient`](core_metadata::CatalogClient) strips them before the
/// query leaves the process.
pub fn derive_keyword(metadata: &SongMetadata, path: &Path) -> String {
    match (metadata.artist.as_deref(), metadata.title.as_deref()) {
        (Some(artist), Some(title)) if !artist.trim().is_empty() && !title.trim().is_empty() => {
            format!("{}-{}", artist.trim(), title.trim())
        }
        _ => path
            .file_stem()
            .map(|stem| stem.to_string_lossy().trim().to_string())
            .unwrap_or_default(),
    }
}
