//! Remote catalog clients
//!
//! Three catalogs answer the same contract through [`CatalogClient`]:
//! - [`CloudClient`] keys songs by numeric id and serves LRC lyrics in JSON
//! - [`KugouClient`] keys songs by content hash and serves packed KRC lyrics
//! - [`SpotifyClient`] keys songs by track id behind a bearer token and has
//!   no lyrics
//!
//! Every request goes through [`ProviderHttp`], which spaces requests with a
//! [`RequestPacer`], applies the configured timeout and maps HTTP status
//! codes into [`MetadataError`]. There is no retry at this layer.

pub mod cloud;
pub mod kugou;
pub mod spotify;

pub use cloud::CloudClient;
pub use kugou::KugouClient;
pub use spotify::SpotifyClient;

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::time::{Clock, SystemClock};
use core_runtime::config::{ProviderKind, TaggerConfig};
use core_runtime::logging::redact_if_sensitive;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::codec::cover::{thumbnail_jpeg, COVER_JPEG_QUALITY, COVER_MAX_EDGE};
use crate::error::{MetadataError, Result};
use crate::lyrics::LyricDocument;
use crate::model::{SearchCandidate, SongMetadata};

/// Characters catalogs reject or mis-rank on.
pub const KEYWORD_STRIP_CHARS: [char; 9] = ['!', '@', '#', '$', '%', '^', '&', '*', '/'];

/// Results requested per search page.
pub const PAGE_SIZE: u32 = 20;

/// A remote music catalog.
///
/// Implementations own their wire format. Callers only ever see
/// [`SearchCandidate`], [`SongMetadata`] and [`LyricDocument`].
#[async_trait]
pub trait CatalogClient: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Searches by keyword. The keyword is sanitized with
    /// [`sanitize_keyword`] before it reaches the wire.
    ///
    /// # Errors
    ///
    /// `NoResults` when the catalog has nothing, `Transient`/`RateLimited`
    /// when it asks to come back later.
    async fn search(&self, keyword: &str, page: u32) -> Result<Vec<SearchCandidate>>;

    /// Fetches complete metadata, with the cover already downloaded.
    async fn fetch_full(&self, provider_key: &str) -> Result<SongMetadata>;

    async fn fetch_lyric(&self, provider_key: &str) -> Result<LyricDocument>;
}

/// Strips [`KEYWORD_STRIP_CHARS`] and surrounding whitespace.
pub fn sanitize_keyword(keyword: &str) -> String {
    keyword
        .chars()
        .filter(|c| !KEYWORD_STRIP_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Builds the client selected in `config`.
pub fn build_catalog_client(config: &TaggerConfig) -> Result<Arc<dyn CatalogClient>> {
    let http = |name: &'static str| {
        ProviderHttp::new(
            name,
            Arc::clone(&config.http_client),
            config.request_timeout,
            RequestPacer::new(Arc::new(SystemClock), config.request_interval),
        )
    };

    let client: Arc<dyn CatalogClient> = match config.provider {
        ProviderKind::Cloud => Arc::new(CloudClient::new(http("cloud"))),
        ProviderKind::Kugou => Arc::new(KugouClient::new(http("kugou"))),
        ProviderKind::Spotify => {
            let token = config
                .spotify_access_token
                .clone()
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| {
                    MetadataError::Unsupported("spotify requires an access token".to_string())
                })?;
            Arc::new(SpotifyClient::new(http("spotify"), token))
        }
    };

    Ok(client)
}

/// Keeps consecutive requests at least `interval` apart.
pub struct RequestPacer {
    clock: Arc<dyn Clock>,
    interval: Duration,
    last_request_ms: Mutex<Option<i64>>,
}

impl RequestPacer {
    pub fn new(clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            clock,
            interval,
            last_request_ms: Mutex::new(None),
        }
    }

    /// Sleeps until the interval since the previous request has passed.
    pub async fn wait(&self) {
        let mut last = self.last_request_ms.lock().await;
        if let Some(previous) = *last {
            let elapsed = (self.clock.unix_timestamp_millis() - previous).max(0) as u64;
            let interval = self.interval.as_millis() as u64;
            if elapsed < interval {
                let pause = Duration::from_millis(interval - elapsed);
                debug!("Request pacing: waiting {:?}", pause);
                tokio::time::sleep(pause).await;
            }
        }
        *last = Some(self.clock.unix_timestamp_millis());
    }
}

/// Shared request plumbing for the catalog clients.
pub struct ProviderHttp {
    name: &'static str,
    client: Arc<dyn HttpClient>,
    timeout: Duration,
    pacer: RequestPacer,
    default_headers: Vec<(String, String)>,
}

impl ProviderHttp {
    pub fn new(
        name: &'static str,
        client: Arc<dyn HttpClient>,
        timeout: Duration,
        pacer: RequestPacer,
    ) -> Self {
        Self {
            name,
            client,
            timeout,
            pacer,
            default_headers: Vec::new(),
        }
    }

    /// Adds a header sent with every request.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((key.into(), value.into()));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Paces, sends and status-checks one request.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.pacer.wait().await;

        let mut request = request.timeout(self.timeout);
        for (key, value) in &self.default_headers {
            request = request.header(key.clone(), value.clone());
        }

        let headers: Vec<String> = self
            .default_headers
            .iter()
            .map(|(key, value)| format!("{}={}", key, redact_if_sensitive(key, value)))
            .collect();
        debug!(provider = self.name, url = %request.url, headers = ?headers, "Catalog request");
        let response = self.client.execute(request).await?;

        if let Some(err) = status_error(self.name, response.status) {
            debug!(provider = self.name, status = response.status, "Catalog request rejected");
            return Err(err);
        }
        Ok(response)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T> {
        let response = self.send(HttpRequest::get(url)).await?;
        parse_json(self.name, &response)
    }

    pub async fn post_json<T: DeserializeOwned>(&self, url: String) -> Result<T> {
        let request = HttpRequest::post(url)
            .header("Content-Type", "application/x-www-form-urlencoded");
        let response = self.send(request).await?;
        parse_json(self.name, &response)
    }

    /// Downloads a cover and shrinks it to fit the cover box.
    ///
    /// Transport failures propagate. A missing or undecodable image yields
    /// `None` so the rest of the metadata still arrives.
    pub async fn download_cover(&self, url: &str) -> Result<Option<Vec<u8>>> {
        if url.trim().is_empty() {
            return Ok(None);
        }

        let response = match self.send(HttpRequest::get(url)).await {
            Ok(response) => response,
            Err(MetadataError::NoResults(_)) => {
                warn!(provider = self.name, url, "Cover image not found");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if response.body.is_empty() {
            return Ok(None);
        }

        match thumbnail_jpeg(&response.body, COVER_MAX_EDGE, COVER_JPEG_QUALITY) {
            Ok(jpeg) => Ok(Some(jpeg)),
            Err(e) => {
                warn!(provider = self.name, url, error = %e, "Dropping undecodable cover");
                Ok(None)
            }
        }
    }
}

/// Maps a non-success HTTP status to the error taxonomy.
pub fn status_error(provider: &str, status: u16) -> Option<MetadataError> {
    match status {
        200..=299 => None,
        429 => Some(MetadataError::RateLimited(format!(
            "{provider} answered 429 Too Many Requests"
        ))),
        404 => Some(MetadataError::NoResults(format!("{provider} answered 404"))),
        500..=599 => Some(MetadataError::Transient(format!(
            "{provider} answered {status}"
        ))),
        _ => Some(MetadataError::InvalidResponse(format!(
            "{provider} answered {status}"
        ))),
    }
}

pub(crate) fn parse_json<T: DeserializeOwned>(provider: &str, response: &HttpResponse) -> Result<T> {
    serde_json::from_slice(&response.body).map_err(|e| {
        MetadataError::InvalidResponse(format!("{provider} returned unexpected JSON: {e}"))
    })
}

/// Reads an id that some endpoints send as a number and others as a string.
pub(crate) fn value_to_key(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
