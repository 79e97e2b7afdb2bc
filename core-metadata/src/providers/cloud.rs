//! Numeric-id catalog client.
//!
//! ## Endpoints
//!
//! - **Search**: `POST https://music.163.com/api/search/get/web?s={keyword}&type=1&offset={page*20}&total=true&limit=20`
//! - **Detail**: `POST http://music.163.com/api/song/detail/?id={id}&ids=[{id}]`
//! - **Lyric**: `GET http://music.163.com/api/song/lyric?id={id}&lv=-1&kv=-1&tv=-1&rv=-1`
//!
//! The catalog reports throttling in the JSON body (`code` 400 or 406) with
//! an HTTP 200, so every body is checked before it is trusted.

use async_trait::async_trait;
use chrono::{DateTime, Datelike};
use core_runtime::config::ProviderKind;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use super::{sanitize_keyword, CatalogClient, ProviderHttp, PAGE_SIZE};
use crate::error::{MetadataError, Result};
use crate::lyrics::LyricDocument;
use crate::model::{non_empty, SearchCandidate, SongMetadata, TrackNumber};

const SEARCH_URL: &str = "https://music.163.com/api/search/get/web";
const DETAIL_URL: &str = "http://music.163.com/api/song/detail/";
const LYRIC_URL: &str = "http://music.163.com/api/song/lyric";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    code: i64,
    result: Option<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    songs: Vec<Song>,
    #[serde(rename = "songCount", default)]
    song_count: u64,
}

#[derive(Debug, Deserialize)]
struct DetailResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    songs: Vec<Song>,
}

#[derive(Debug, Deserialize)]
struct Song {
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    artists: Vec<Artist>,
    album: Option<Album>,
    /// Milliseconds.
    #[serde(default)]
    duration: u64,
    #[serde(default)]
    no: u32,
}

#[derive(Debug, Deserialize)]
struct Artist {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct Album {
    #[serde(default)]
    name: String,
    #[serde(rename = "picUrl")]
    pic_url: Option<String>,
    #[serde(default)]
    size: u32,
    /// Milliseconds since the epoch; zero or negative when unknown.
    #[serde(rename = "publishTime", default)]
    publish_time: i64,
}

#[derive(Debug, Deserialize)]
struct LyricResponse {
    #[serde(default)]
    code: i64,
    lrc: Option<LyricBody>,
    tlyric: Option<LyricBody>,
    romalrc: Option<LyricBody>,
}

#[derive(Debug, Deserialize)]
struct LyricBody {
    lyric: Option<String>,
}

impl Song {
    fn joined_artists(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.trim())
            .filter(|n| !n.is_empty())
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn check_code(code: i64) -> Result<()> {
    match code {
        400 | 406 => Err(MetadataError::Transient(
            "cloud catalog reports requests too frequent".to_string(),
        )),
        _ => Ok(()),
    }
}

fn year_from_publish_time(ms: i64) -> Option<String> {
    if ms <= 0 {
        return None;
    }
    DateTime::from_timestamp_millis(ms).map(|dt| dt.year().to_string())
}

fn lyric_text(body: &Option<LyricBody>) -> Option<&str> {
    body.as_ref()
        .and_then(|b| b.lyric.as_deref())
        .filter(|text| !text.trim().is_empty())
}

/// Client for the numeric-id catalog.
pub struct CloudClient {
    http: ProviderHttp,
}

impl CloudClient {
    pub fn new(http: ProviderHttp) -> Self {
        Self { http }
    }
}

#[async_trait]
impl CatalogClient for CloudClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Cloud
    }

    #[instrument(skip(self))]
    async fn search(&self, keyword: &str, page: u32) -> Result<Vec<SearchCandidate>> {
        let keyword = sanitize_keyword(keyword);
        if keyword.is_empty() {
            return Err(MetadataError::NoResults("empty search keyword".to_string()));
        }

        let url = format!(
            "{}?s={}&type=1&offset={}&total=true&limit={}",
            SEARCH_URL,
            urlencoding::encode(&keyword),
            page * PAGE_SIZE,
            PAGE_SIZE
        );
        let response: SearchResponse = self.http.post_json(url).await?;
        check_code(response.code)?;

        let result = match response.result {
            Some(result) if result.song_count > 0 && !result.songs.is_empty() => result,
            _ => {
                return Err(MetadataError::NoResults(format!(
                    "cloud catalog has no songs for '{}'",
                    keyword
                )))
            }
        };

        let candidates: Vec<SearchCandidate> = result
            .songs
            .iter()
            .map(|song| SearchCandidate {
                provider_key: song.id.to_string(),
                display_title: song.name.trim().to_string(),
                display_artist: song.joined_artists(),
                duration: Some((song.duration / 1000) as u32),
            })
            .collect();

        debug!(count = candidates.len(), "Cloud search finished");
        Ok(candidates)
    }

    #[instrument(skip(self))]
    async fn fetch_full(&self, provider_key: &str) -> Result<SongMetadata> {
        let id = urlencoding::encode(provider_key);
        let url = format!("{}?id={}&ids=[{}]", DETAIL_URL, id, id);
        let response: DetailResponse = self.http.post_json(url).await?;
        check_code(response.code)?;

        let song = response.songs.into_iter().next().ok_or_else(|| {
            MetadataError::NoResults(format!("cloud catalog has no song {}", provider_key))
        })?;

        let artist = non_empty(song.joined_artists());
        let album = song.album.as_ref();
        let cover_art = match album.and_then(|a| a.pic_url.as_deref()) {
            Some(url) => self.http.download_cover(url).await?,
            None => None,
        };

        let lyric = match self.fetch_lyric(provider_key).await {
            Ok(doc) => {
                let lrc = doc.original_lrc();
                (!lrc.trim().is_empty()).then_some(lrc)
            }
            Err(MetadataError::NoResults(_)) => None,
            Err(e) => return Err(e),
        };

        let metadata = SongMetadata {
            title: non_empty(&song.name),
            album_artist: artist.clone(),
            artist,
            album: album.and_then(|a| non_empty(&a.name)),
            genre: None,
            year: album.and_then(|a| year_from_publish_time(a.publish_time)),
            track_number: (song.no > 0).then(|| {
                TrackNumber::new(song.no, album.map(|a| a.size).filter(|size| *size > 0))
            }),
            duration: Some((song.duration / 1000) as u32),
            cover_art,
            lyric,
        };

        info!(
            title = ?metadata.title,
            has_cover = metadata.cover_art.is_some(),
            "Fetched cloud song"
        );
        Ok(metadata)
    }

    #[instrument(skip(self))]
    async fn fetch_lyric(&self, provider_key: &str) -> Result<LyricDocument> {
        let url = format!(
            "{}?id={}&lv=-1&kv=-1&tv=-1&rv=-1",
            LYRIC_URL,
            urlencoding::encode(provider_key)
        );
        let response: LyricResponse = self.http.get_json(url).await?;
        check_code(response.code)?;

        let original = lyric_text(&response.lrc).ok_or_else(|| {
            MetadataError::NoResults(format!("cloud catalog has no lyric for {}", provider_key))
        })?;

        Ok(LyricDocument::from_lrc(
            original,
            lyric_text(&response.tlyric),
            lyric_text(&response.romalrc),
        ))
    }
}
