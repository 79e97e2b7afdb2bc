//! # Tagger Configuration
//!
//! The configuration surface the reconciliation core consumes. Persisting it
//! (a settings file, a preferences pane) is the host's business; the core only
//! sees an already-built [`TaggerConfig`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{ProviderKind, TaggerConfig};
//!
//! let config = TaggerConfig::builder()
//!     .provider(ProviderKind::Kugou)
//!     .auto_rename(true)
//!     .auto_lyric(true)
//!     .build()?;
//! ```
//!
//! The track provider needs a bearer token:
//!
//! ```ignore
//! let config = TaggerConfig::builder()
//!     .provider(ProviderKind::Spotify)
//!     .spotify_access_token(token)
//!     .http_client(Arc::new(MyHttpClient))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! `build()` validates every setting and fails fast with an actionable
//! message. When no `HttpClient` is injected and the `desktop-shims` feature
//! is disabled, the build fails with `Error::CapabilityMissing`.

use crate::error::{Error, Result};
use bridge_traits::HttpClient;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Default accept/reject boundary for automatic flows.
pub const DEFAULT_ACCEPT_THRESHOLD: u8 = 80;

/// Default per-request timeout for catalog calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(4);

/// Default spacing between consecutive requests to one provider.
pub const DEFAULT_REQUEST_INTERVAL: Duration = Duration::from_millis(100);

/// Default capacity of the event bus.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_REQUEST_INTERVAL: Duration = Duration::from_secs(10);

/// Which remote catalog answers searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Numeric-id catalog with JSON lyrics.
    #[default]
    Cloud,
    /// Content-hash keyed catalog with packed KRC lyrics.
    Kugou,
    /// Track-id catalog behind a bearer token. No lyrics.
    Spotify,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Cloud => "cloud",
            ProviderKind::Kugou => "kugou",
            ProviderKind::Spotify => "spotify",
        }
    }

    /// Whether this catalog serves lyrics at all.
    pub fn supports_lyrics(&self) -> bool {
        !matches!(self, ProviderKind::Spotify)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cloud" | "netease" => Ok(ProviderKind::Cloud),
            "kugou" | "hash" => Ok(ProviderKind::Kugou),
            "spotify" | "track" => Ok(ProviderKind::Spotify),
            other => Err(Error::Config(format!("Unknown provider '{}'", other))),
        }
    }
}

/// Runtime configuration for the tagger core.
///
/// Construct with [`TaggerConfig::builder`].
#[derive(Clone)]
pub struct TaggerConfig {
    /// Catalog used for search and fetch
    pub provider: ProviderKind,

    /// Rename files to `"artist - title.ext"` after a successful write
    pub auto_rename: bool,

    /// Download lyrics to a sidecar file after a successful write
    pub auto_lyric: bool,

    /// Sidecar directory; `None` writes next to the audio file
    pub lyric_dir: Option<PathBuf>,

    /// Minimum match score for unattended acceptance (1..=100)
    pub accept_threshold: u8,

    /// Per-request timeout for every catalog call
    pub request_timeout: Duration,

    /// Minimum spacing between consecutive requests
    pub request_interval: Duration,

    /// Bearer token for the track catalog
    pub spotify_access_token: Option<String>,

    /// HTTP transport
    pub http_client: Arc<dyn HttpClient>,

    /// Capacity of the broadcast event bus
    pub event_buffer_size: usize,
}

impl fmt::Debug for TaggerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaggerConfig")
            .field("provider", &self.provider)
            .field("auto_rename", &self.auto_rename)
            .field("auto_lyric", &self.auto_lyric)
            .field("lyric_dir", &self.lyric_dir)
            .field("accept_threshold", &self.accept_threshold)
            .field("request_timeout", &self.request_timeout)
            .field("request_interval", &self.request_interval)
            .field(
                "spotify_access_token",
                &self.spotify_access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("http_client", &"HttpClient { ... }")
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl TaggerConfig {
    pub fn builder() -> TaggerConfigBuilder {
        TaggerConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.accept_threshold == 0 || self.accept_threshold > 100 {
            return Err(Error::Config(format!(
                "Accept threshold must be between 1 and 100, got {}",
                self.accept_threshold
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than zero".to_string(),
            ));
        }

        if self.request_timeout > MAX_REQUEST_TIMEOUT {
            return Err(Error::Config(format!(
                "Request timeout exceeds maximum of {} seconds",
                MAX_REQUEST_TIMEOUT.as_secs()
            )));
        }

        if self.request_interval > MAX_REQUEST_INTERVAL {
            return Err(Error::Config(format!(
                "Request interval exceeds maximum of {} seconds",
                MAX_REQUEST_INTERVAL.as_secs()
            )));
        }

        if self.provider == ProviderKind::Spotify {
            match self.spotify_access_token.as_deref() {
                Some(token) if !token.trim().is_empty() => {}
                _ => {
                    return Err(Error::Config(
                        "Spotify provider requires an access token. \
                         Use .spotify_access_token() to set it."
                            .to_string(),
                    ))
                }
            }
        }

        if let Some(dir) = &self.lyric_dir {
            if dir.as_os_str().is_empty() {
                return Err(Error::Config("Lyric directory cannot be empty".to_string()));
            }
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(timeout).map_err(|e| Error::Internal(format!(
        "Failed to initialize default HttpClient: {}",
        e
    )))?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "No HTTP client implementation provided. \
                  Desktop: enable the 'desktop-shims' feature to use the reqwest client. \
                  Otherwise inject one with .http_client()."
            .to_string(),
    })
}

/// Builder for [`TaggerConfig`].
#[derive(Default)]
pub struct TaggerConfigBuilder {
    provider: Option<ProviderKind>,
    auto_rename: bool,
    auto_lyric: bool,
    lyric_dir: Option<PathBuf>,
    accept_threshold: Option<u8>,
    request_timeout: Option<Duration>,
    request_interval: Option<Duration>,
    spotify_access_token: Option<String>,
    http_client: Option<Arc<dyn HttpClient>>,
    event_buffer_size: Option<usize>,
}

impl TaggerConfigBuilder {
    /// Selects the remote catalog. Default: [`ProviderKind::Cloud`].
    pub fn provider(mut self, provider: ProviderKind) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn auto_rename(mut self, enabled: bool) -> Self {
        self.auto_rename = enabled;
        self
    }

    pub fn auto_lyric(mut self, enabled: bool) -> Self {
        self.auto_lyric = enabled;
        self
    }

    /// Directory that receives lyric sidecar files.
    ///
    /// When unset, sidecars are written next to the audio file.
    pub fn lyric_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.lyric_dir = Some(dir.into());
        self
    }

    /// Default: 80
    pub fn accept_threshold(mut self, threshold: u8) -> Self {
        self.accept_threshold = Some(threshold);
        self
    }

    /// Default: 4 seconds
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Default: 100 ms
    pub fn request_interval(mut self, interval: Duration) -> Self {
        self.request_interval = Some(interval);
        self
    }

    pub fn spotify_access_token(mut self, token: impl Into<String>) -> Self {
        self.spotify_access_token = Some(token.into());
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the reqwest client is used when the `desktop-shims`
    /// feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<TaggerConfig> {
        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(request_timeout)?,
        };

        let config = TaggerConfig {
            provider: self.provider.unwrap_or_default(),
            auto_rename: self.auto_rename,
            auto_lyric: self.auto_lyric,
            lyric_dir: self.lyric_dir,
            accept_threshold: self.accept_threshold.unwrap_or(DEFAULT_ACCEPT_THRESHOLD),
            request_timeout,
            request_interval: self.request_interval.unwrap_or(DEFAULT_REQUEST_INTERVAL),
            spotify_access_token: self.spotify_access_token,
            http_client,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{HttpRequest, HttpResponse};

    struct StubHttpClient;

    #[async_trait]
    impl HttpClient for StubHttpClient {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            Ok(HttpResponse::new(200, "{}"))
        }
    }

    fn builder() -> TaggerConfigBuilder {
        TaggerConfig::builder().http_client(Arc::new(StubHttpClient))
    }

    #[test]
    fn test_defaults() {
        let config = builder().build().unwrap();

        assert_eq!(config.provider, ProviderKind::Cloud);
        assert!(!config.auto_rename);
        assert!(!config.auto_lyric);
        assert!(config.lyric_dir.is_none());
        assert_eq!(config.accept_threshold, 80);
        assert_eq!(config.request_timeout, Duration::from_secs(4));
        assert_eq!(config.request_interval, Duration::from_millis(100));
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
    }

    #[test]
    fn test_builder_sets_all_fields() {
        let config = builder()
            .provider(ProviderKind::Kugou)
            .auto_rename(true)
            .auto_lyric(true)
            .lyric_dir("/music/lyrics")
            .accept_threshold(90)
            .request_timeout(Duration::from_secs(2))
            .request_interval(Duration::ZERO)
            .event_buffer_size(16)
            .build()
            .unwrap();

        assert_eq!(config.provider, ProviderKind::Kugou);
        assert!(config.auto_rename);
        assert!(config.auto_lyric);
        assert_eq!(config.lyric_dir, Some(PathBuf::from("/music/lyrics")));
        assert_eq!(config.accept_threshold, 90);
        assert_eq!(config.request_timeout, Duration::from_secs(2));
        assert_eq!(config.request_interval, Duration::ZERO);
        assert_eq!(config.event_buffer_size, 16);
    }

    #[test]
    fn test_builder_requires_spotify_token() {
        let result = builder().provider(ProviderKind::Spotify).build();
        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("spotify_access_token")),
            other => panic!("expected config error, got {:?}", other.map(|_| ())),
        }

        let result = builder()
            .provider(ProviderKind::Spotify)
            .spotify_access_token("   ")
            .build();
        assert!(result.is_err());

        let config = builder()
            .provider(ProviderKind::Spotify)
            .spotify_access_token("token")
            .build()
            .unwrap();
        assert_eq!(config.spotify_access_token.as_deref(), Some("token"));
    }

    #[test]
    fn test_threshold_bounds() {
        assert!(builder().accept_threshold(0).build().is_err());
        assert!(builder().accept_threshold(101).build().is_err());
        assert!(builder().accept_threshold(100).build().is_ok());
        assert!(builder().accept_threshold(1).build().is_ok());
    }

    #[test]
    fn test_timeout_bounds() {
        assert!(builder().request_timeout(Duration::ZERO).build().is_err());
        assert!(builder()
            .request_timeout(Duration::from_secs(31))
            .build()
            .is_err());
        assert!(builder()
            .request_interval(Duration::from_secs(11))
            .build()
            .is_err());
    }

    #[test]
    fn test_empty_lyric_dir_rejected() {
        assert!(builder().lyric_dir("").build().is_err());
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = builder()
            .provider(ProviderKind::Spotify)
            .spotify_access_token("super-secret")
            .build()
            .unwrap();

        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!("cloud".parse::<ProviderKind>().unwrap(), ProviderKind::Cloud);
        assert_eq!("Kugou".parse::<ProviderKind>().unwrap(), ProviderKind::Kugou);
        assert_eq!("track".parse::<ProviderKind>().unwrap(), ProviderKind::Spotify);
        assert!("deezer".parse::<ProviderKind>().is_err());

        assert_eq!(ProviderKind::Kugou.to_string(), "kugou");
        assert!(!ProviderKind::Spotify.supports_lyrics());
        assert!(ProviderKind::Cloud.supports_lyrics());
    }

    #[test]
    fn test_provider_kind_serde() {
        let json = serde_json::to_string(&ProviderKind::Kugou).unwrap();
        assert_eq!(json, "\"kugou\"");
        let parsed: ProviderKind = serde_json::from_str("\"spotify\"").unwrap();
        assert_eq!(parsed, ProviderKind::Spotify);
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_missing_http_client_is_capability_error() {
        let result = TaggerConfig::builder().build();
        assert!(matches!(result, Err(Error::CapabilityMissing { .. })));
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_desktop_default_http_client() {
        let config = TaggerConfig::builder().build();
        assert!(config.is_ok());
    }
}
