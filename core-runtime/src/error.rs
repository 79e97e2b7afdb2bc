use thiserror::Error;

/// Failures while assembling the tagger runtime.
#[derive(Error, Debug)]
pub enum Error {
    /// A `TaggerConfig` or logging setting was rejected
    #[error("Configuration error: {0}")]
    Config(String),

    /// A host capability, such as the HTTP client, was neither injected nor
    /// provided by an enabled shim feature
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
