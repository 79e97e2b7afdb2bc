//! Track-id catalog client (Spotify Web API).
//!
//! Requests carry a bearer token supplied through configuration; token
//! acquisition is the host's concern. The catalog has no lyrics, so
//! [`CatalogClient::fetch_lyric`] fails with `Unsupported` without touching
//! the network.

use async_trait::async_trait;
use core_runtime::config::ProviderKind;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use super::{sanitize_keyword, CatalogClient, ProviderHttp, PAGE_SIZE};
use crate::error::{MetadataError, Result};
use crate::lyrics::LyricDocument;
use crate::model::{extract_year, non_empty, SearchCandidate, SongMetadata, TrackNumber};

const API_BASE: &str = "https://api.spotify.com/v1";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    #[serde(default)]
    items: Vec<Track>,
}

#[derive(Debug, Deserialize)]
struct Track {
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    artists: Vec<ArtistRef>,
    #[serde(default)]
    duration_ms: u64,
    track_number: Option<u32>,
    album: Option<AlbumRef>,
}

#[derive(Debug, Deserialize)]
struct ArtistRef {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct AlbumRef {
    #[serde(default)]
    name: String,
    release_date: Option<String>,
    total_tracks: Option<u32>,
    #[serde(default)]
    images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
struct Image {
    url: String,
}

impl Track {
    fn joined_artists(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.trim())
            .filter(|n| !n.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Client for the track-id catalog.
pub struct SpotifyClient {
    http: ProviderHttp,
}

impl SpotifyClient {
    pub fn new(http: ProviderHttp, access_token: String) -> Self {
        Self {
            http: http.with_header("Authorization", format!("Bearer {}", access_token)),
        }
    }
}

#[async_trait]
impl CatalogClient for SpotifyClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Spotify
    }

    #[instrument(skip(self))]
    async fn search(&self, keyword: &str, page: u32) -> Result<Vec<SearchCandidate>> {
        let keyword = sanitize_keyword(keyword);
        if keyword.is_empty() {
            return Err(MetadataError::NoResults("empty search keyword".to_string()));
        }

        let url = format!(
            "{}/search?q={}&type=track&limit={}&offset={}",
            API_BASE,
            urlencoding::encode(&keyword),
            PAGE_SIZE,
            page * PAGE_SIZE
        );
        let response: SearchResponse = self.http.get_json(url).await?;

        let candidates: Vec<SearchCandidate> = response
            .tracks
            .map(|paging| paging.items)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|track| {
                let id = track.id.clone()?;
                Some(SearchCandidate {
                    provider_key: id,
                    display_title: track.name.trim().to_string(),
                    display_artist: track.joined_artists(),
                    duration: Some((track.duration_ms / 1000) as u32),
                })
            })
            .collect();

        if candidates.is_empty() {
            return Err(MetadataError::NoResults(format!(
                "spotify has no tracks for '{}'",
                keyword
            )));
        }

        debug!(count = candidates.len(), "Spotify search finished");
        Ok(candidates)
    }

    #[instrument(skip(self))]
    async fn fetch_full(&self, provider_key: &str) -> Result<SongMetadata> {
        let url = format!("{}/tracks/{}", API_BASE, urlencoding::encode(provider_key));
        let track: Track = self.http.get_json(url).await?;

        let artist = non_empty(track.joined_artists());
        let album = track.album.as_ref();

        let cover_art = match album.and_then(|a| a.images.first()) {
            Some(image) => self.http.download_cover(&image.url).await?,
            None => None,
        };

        let metadata = SongMetadata {
            title: non_empty(&track.name),
            album_artist: artist.clone(),
            artist,
            album: album.and_then(|a| non_empty(&a.name)),
            genre: None,
            year: album
                .and_then(|a| a.release_date.as_deref())
                .and_then(extract_year),
            track_number: track
                .track_number
                .filter(|n| *n > 0)
                .map(|n| TrackNumber::new(n, album.and_then(|a| a.total_tracks))),
            duration: Some((track.duration_ms / 1000) as u32),
            cover_art,
            lyric: None,
        };

        info!(
            title = ?metadata.title,
            has_cover = metadata.cover_art.is_some(),
            "Fetched spotify track"
        );
        Ok(metadata)
    }

    async fn fetch_lyric(&self, _provider_key: &str) -> Result<LyricDocument> {
        Err(MetadataError::Unsupported(
            "spotify does not serve lyrics".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use bridge_traits::http::HttpResponse;

    fn client(mock: MockHttp) -> SpotifyClient {
        SpotifyClient::new(provider_http("spotify", mock), "token-123".to_string())
    }

    #[tokio::test]
    async fn test_search_sends_bearer_token() {
        let mut mock = MockHttp::new();
        mock.expect_execute()
            .withf(|req| {
                req.url.contains("/search?q=Mili&type=track&limit=20&offset=40")
                    && req.headers.get("Authorization").map(String::as_str)
                        == Some("Bearer token-123")
            })
            .times(1)
            .returning(|_| {
                Ok(HttpResponse::new(
                    200,
                    r#"{"tracks":{"items":[{"id":"4uLU6hMCjMI75M1A2tKUQC","name":"Rubber Human",
                        "artists":[{"name":"Mili"},{"name":"Guest"}],"duration_ms":254000}]}}"#,
                ))
            });

        let results = client(mock).search("Mili", 2).await.unwrap();
        assert_eq!(results[0].provider_key, "4uLU6hMCjMI75M1A2tKUQC");
        assert_eq!(results[0].display_artist, "Mili, Guest");
        assert_eq!(results[0].duration, Some(254));
    }

    #[tokio::test]
    async fn test_search_without_items_is_no_results() {
        let mut mock = MockHttp::new();
        mock.expect_execute()
            .returning(|_| Ok(HttpResponse::new(200, r#"{"tracks":{"items":[]}}"#)));

        assert!(client(mock).search("nothing", 0).await.unwrap_err().is_no_results());
    }

    #[tokio::test]
    async fn test_rate_limit_status() {
        let mut mock = MockHttp::new();
        mock.expect_execute()
            .returning(|_| Ok(HttpResponse::new(429, "")));

        let err = client(mock).search("Mili", 0).await.unwrap_err();
        assert!(matches!(err, MetadataError::RateLimited(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_fetch_full_maps_track() {
        let png = png_bytes();
        let mut mock = MockHttp::new();
        mock.expect_execute()
            .withf(|req| req.url.ends_with("/tracks/abc"))
            .times(1)
            .returning(|_| {
                Ok(HttpResponse::new(
                    200,
                    r#"{"id":"abc","name":"Rubber Human","artists":[{"name":"Mili"}],"duration_ms":254000,
                        "track_number":4,"album":{"name":"Key Ingredient","release_date":"2019-09-23",
                        "total_tracks":13,"images":[{"url":"http://img.test/640.jpg","height":640,"width":640}]}}"#,
                ))
            });
        mock.expect_execute()
            .withf(|req| req.url == "http://img.test/640.jpg")
            .times(1)
            .returning(move |_| Ok(HttpResponse::new(200, png.clone())));

        let song = client(mock).fetch_full("abc").await.unwrap();
        assert_eq!(song.title.as_deref(), Some("Rubber Human"));
        assert_eq!(song.album.as_deref(), Some("Key Ingredient"));
        assert_eq!(song.year.as_deref(), Some("2019"));
        assert_eq!(song.track_number, Some(TrackNumber::new(4, Some(13))));
        assert_eq!(song.duration, Some(254));
        assert!(song.cover_art.is_some());
    }

    #[tokio::test]
    async fn test_fetch_lyric_is_unsupported_without_io() {
        let mut mock = MockHttp::new();
        mock.expect_execute().times(0);

        let err = client(mock).fetch_lyric("abc").await.unwrap_err();
        assert!(matches!(err, MetadataError::Unsupported(_)));
    }
}
