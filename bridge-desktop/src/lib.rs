//! # Desktop Bridge Implementations
//!
//! Desktop implementations of the bridge traits (macOS, Windows, Linux).
//!
//! - `HttpClient` using `reqwest` with rustls, one attempt per request
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestHttpClient;
//! use std::time::Duration;
//!
//! let http_client = ReqwestHttpClient::with_timeout(Duration::from_secs(4))?;
//! ```

mod http;

pub use http::{ReqwestHttpClient, DEFAULT_TIMEOUT};
