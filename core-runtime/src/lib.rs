//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the tagging crates:
//! - Logging and tracing bootstrap
//! - Tagger configuration (provider selection, post-write options, timeouts)
//! - Event bus for progress and per-file results

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{ProviderKind, TaggerConfig, TaggerConfigBuilder};
pub use error::{Error, Result};
pub use events::{BatchEvent, CoreEvent, EventBus, EventStream, FileEvent};
