use bridge_traits::error::BridgeError;
use thiserror::Error;

use crate::model::ContainerFormat;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// No known container writer accepted the file.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Corrupted tag data: {0}")]
    Corrupt(String),

    #[error("Temporary provider failure: {0}")]
    Transient(String),

    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    #[error("No results: {0}")]
    NoResults(String),

    #[error("Not supported by this provider: {0}")]
    Unsupported(String),

    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),

    #[error("Cover image error: {0}")]
    Cover(String),

    /// The content does not match the writer that was asked to handle it.
    #[error("Container mismatch: expected {expected}, found {actual}")]
    ContainerMismatch {
        expected: ContainerFormat,
        actual: ContainerFormat,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MetadataError {
    /// Failures worth retrying later with the same input.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MetadataError::Transient(_) | MetadataError::RateLimited(_)
        )
    }

    pub fn is_no_results(&self) -> bool {
        matches!(self, MetadataError::NoResults(_))
    }
}

impl From<BridgeError> for MetadataError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Timeout(after) => {
                MetadataError::Transient(format!("request timed out after {:?}", after))
            }
            BridgeError::Connection(msg) => {
                MetadataError::Transient(format!("connection failed: {}", msg))
            }
            BridgeError::Io(e) => MetadataError::Io(e),
            other => MetadataError::Transient(other.to_string()),
        }
    }
}

impl From<image::ImageError> for MetadataError {
    fn from(err: image::ImageError) -> Self {
        MetadataError::Cover(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MetadataError>;
