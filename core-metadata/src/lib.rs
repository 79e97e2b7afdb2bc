//! # Metadata Module
//!
//! Canonical song metadata and everything that produces or consumes it.
//!
//! ## Overview
//!
//! - [`codec`]: tag read/write for MP3, FLAC and MP4 with container-mismatch
//!   recovery
//! - [`providers`]: remote catalog clients behind one [`CatalogClient`] trait
//! - [`lyrics`]: LRC and KRC lyric documents
//! - [`scoring`]: confidence that a candidate is the local song

pub mod codec;
pub mod error;
pub mod lyrics;
pub mod model;
pub mod providers;
pub mod scoring;

pub use codec::TagCodec;
pub use error::{MetadataError, Result};
pub use lyrics::{LyricDocument, LyricLine};
pub use model::{
    ContainerFormat, CoverDescriptor, CoverSource, FileRecord, FormatCorrection,
    SearchCandidate, SongMetadata, TagField, TrackNumber, WriteReport,
};
pub use providers::{build_catalog_client, sanitize_keyword, CatalogClient};
pub use scoring::MatchScorer;
