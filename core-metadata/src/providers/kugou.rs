//! Content-hash catalog client.
//!
//! Songs are keyed by the hash the search endpoint returns. Full info is
//! split over a song endpoint and an album endpoint; the album call is
//! skipped when the song has no album (`albumid == 0`). Lyrics take two hops:
//! a candidate lookup by hash, then a download of the packed KRC payload.

use async_trait::async_trait;
use core_runtime::config::ProviderKind;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use super::{sanitize_keyword, value_to_key, CatalogClient, ProviderHttp, PAGE_SIZE};
use crate::error::{MetadataError, Result};
use crate::lyrics::{krc, LyricDocument};
use crate::model::{extract_year, non_empty, SearchCandidate, SongMetadata};

const SEARCH_URL: &str = "http://mobilecdn.kugou.com/api/v3/search/song";
const SONG_INFO_URL: &str = "http://m.kugou.com/app/i/getSongInfo.php";
const ALBUM_INFO_URL: &str = "http://mobilecdn.kugou.com/api/v3/album/info";
const LYRIC_SEARCH_URL: &str = "http://krcs.kugou.com/search";
const LYRIC_DOWNLOAD_URL: &str = "http://lyrics.kugou.com/download";

/// Sent with every request; the endpoints reject bare clients.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 6.1; WOW64; rv:7.0a1) Gecko/20110623 Firefox/7.0a1 Fennec/7.0a1";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: Option<SearchData>,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    #[serde(default)]
    info: Vec<SearchEntry>,
}

#[derive(Debug, Deserialize)]
struct SearchEntry {
    #[serde(default)]
    hash: String,
    #[serde(default)]
    songname: String,
    #[serde(default)]
    singername: String,
    /// Seconds.
    #[serde(default)]
    duration: u32,
}

#[derive(Debug, Deserialize)]
struct SongInfo {
    #[serde(rename = "songName")]
    song_name: Option<String>,
    author_name: Option<String>,
    #[serde(rename = "timeLength", default)]
    time_length: u32,
    album_img: Option<String>,
    #[serde(default)]
    albumid: Value,
}

#[derive(Debug, Deserialize)]
struct AlbumResponse {
    data: Option<AlbumData>,
}

#[derive(Debug, Deserialize)]
struct AlbumData {
    albumname: Option<String>,
    /// `"2021-08-11 00:00:00"`
    publishtime: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LyricSearchResponse {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    candidates: Vec<LyricCandidate>,
}

#[derive(Debug, Deserialize)]
struct LyricCandidate {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    accesskey: String,
}

#[derive(Debug, Deserialize)]
struct LyricDownloadResponse {
    content: Option<String>,
}

/// Drops the `{size}` placeholder the catalog leaves in image URLs.
fn cover_url(template: &str) -> String {
    template.replace("/{size}/", "/").replace("{size}", "")
}

fn album_id(value: &Value) -> Option<String> {
    value_to_key(value).filter(|id| id != "0")
}

/// Client for the content-hash catalog.
pub struct KugouClient {
    http: ProviderHttp,
}

impl KugouClient {
    pub fn new(http: ProviderHttp) -> Self {
        Self {
            http: http.with_header("User-Agent", USER_AGENT),
        }
    }

    async fn fetch_album(&self, album_id: &str) -> Result<(Option<String>, Option<String>)> {
        let url = format!(
            "{}?albumid={}&plat=0&pagesize=100&area_code=1",
            ALBUM_INFO_URL,
            urlencoding::encode(album_id)
        );
        let response: AlbumResponse = self.http.get_json(url).await?;
        Ok(match response.data {
            Some(data) => (
                data.albumname.and_then(non_empty),
                data.publishtime.as_deref().and_then(extract_year),
            ),
            None => (None, None),
        })
    }
}

#[async_trait]
impl CatalogClient for KugouClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Kugou
    }

    #[instrument(skip(self))]
    async fn search(&self, keyword: &str, page: u32) -> Result<Vec<SearchCandidate>> {
        let keyword = sanitize_keyword(keyword);
        if keyword.is_empty() {
            return Err(MetadataError::NoResults("empty search keyword".to_string()));
        }

        // The wire numbers pages from 1.
        let url = format!(
            "{}?format=json&keyword={}&page={}&pagesize={}&showtype=1",
            SEARCH_URL,
            urlencoding::encode(&keyword),
            page + 1,
            PAGE_SIZE
        );
        let response: SearchResponse = self.http.get_json(url).await?;

        let candidates: Vec<SearchCandidate> = response
            .data
            .map(|data| data.info)
            .unwrap_or_default()
            .into_iter()
            .filter(|entry| !entry.hash.trim().is_empty())
            .map(|entry| SearchCandidate {
                provider_key: entry.hash.trim().to_string(),
                display_title: entry.songname.trim().to_string(),
                display_artist: entry.singername.trim().to_string(),
                duration: Some(entry.duration),
            })
            .collect();

        if candidates.is_empty() {
            return Err(MetadataError::NoResults(format!(
                "kugou has no songs for '{}'",
                keyword
            )));
        }

        debug!(count = candidates.len(), "Kugou search finished");
        Ok(candidates)
    }

    #[instrument(skip(self))]
    async fn fetch_full(&self, provider_key: &str) -> Result<SongMetadata> {
        let url = format!(
            "{}?cmd=playInfo&hash={}",
            SONG_INFO_URL,
            urlencoding::encode(provider_key)
        );
        let song: SongInfo = self.http.get_json(url).await?;

        let title = song.song_name.and_then(non_empty).ok_or_else(|| {
            MetadataError::NoResults(format!("kugou has no song for hash {}", provider_key))
        })?;
        let artist = song.author_name.and_then(non_empty);

        let (album, year) = match album_id(&song.albumid) {
            Some(id) => self.fetch_album(&id).await?,
            None => (None, None),
        };

        let cover_art = match song.album_img.as_deref().map(cover_url) {
            Some(url) if !url.trim().is_empty() => self.http.download_cover(&url).await?,
            _ => None,
        };

        let metadata = SongMetadata {
            title: Some(title),
            album_artist: artist.clone(),
            artist,
            album,
            genre: None,
            year,
            track_number: None,
            duration: (song.time_length > 0).then_some(song.time_length),
            cover_art,
            lyric: None,
        };

        info!(
            title = ?metadata.title,
            has_cover = metadata.cover_art.is_some(),
            "Fetched kugou song"
        );
        Ok(metadata)
    }

    #[instrument(skip(self))]
    async fn fetch_lyric(&self, provider_key: &str) -> Result<LyricDocument> {
        let url = format!(
            "{}?ver=1&man=yes&client=mobi&keyword=&duration=&hash={}",
            LYRIC_SEARCH_URL,
            urlencoding::encode(provider_key)
        );
        let found: LyricSearchResponse = self.http.get_json(url).await?;
        if found.errcode != 200 {
            return Err(MetadataError::InvalidResponse(format!(
                "kugou lyric search failed with errcode {}",
                found.errcode
            )));
        }

        let (id, accesskey) = found
            .candidates
            .iter()
            .find_map(|c| value_to_key(&c.id).map(|id| (id, c.accesskey.clone())))
            .ok_or_else(|| {
                MetadataError::NoResults(format!("kugou has no lyric for hash {}", provider_key))
            })?;

        let url = format!(
            "{}?ver=1&client=pc&id={}&accesskey={}&fmt=krc&charset=utf8",
            LYRIC_DOWNLOAD_URL,
            urlencoding::encode(&id),
            urlencoding::encode(&accesskey)
        );
        let download: LyricDownloadResponse = self.http.get_json(url).await?;
        let content = download
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| MetadataError::NoResults(format!("kugou lyric {} is empty", id)))?;

        krc::decode(&content)
    }
}
