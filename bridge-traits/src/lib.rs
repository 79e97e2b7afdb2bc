//! # Host Bridge Traits
//!
//! Capability traits the tagging core depends on but does not implement.
//!
//! ## Overview
//!
//! The core never talks to the network or the host logger directly. It asks
//! for an implementation of the traits below and the host (or a test) injects
//! one. `bridge-desktop` ships the reqwest-backed HTTP client used on desktop.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Single-attempt async HTTP requests
//! - [`Clock`](time::Clock) - Time source, swappable for deterministic tests
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging;
//!   [`BufferedLogger`](time::BufferedLogger) keeps the latest entries for a log pane
//!
//! ## Error Handling
//!
//! All bridge traits return [`BridgeError`](error::BridgeError). Transport
//! implementations must report timeouts and connection failures through the
//! dedicated `Timeout` and `Connection` variants so callers can classify them
//! as transient without string matching.
//!
//! ## Examples
//!
//! ```ignore
//! use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! pub struct MyHttpClient {
//!     client: reqwest::Client,
//! }
//!
//! #[async_trait]
//! impl HttpClient for MyHttpClient {
//!     async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
//!         todo!()
//!     }
//! }
//! ```

pub mod error;
pub mod http;
pub mod time;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use time::{BufferedLogger, Clock, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
