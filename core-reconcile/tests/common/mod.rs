//! Shared fixtures: a minimal FLAC file and an in-memory catalog.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use core_metadata::{
    sanitize_keyword, CatalogClient, CoverSource, LyricDocument, MetadataError, SearchCandidate,
    SongMetadata, TagCodec,
};
use core_runtime::config::ProviderKind;
use tokio::sync::Notify;

/// `fLaC` + STREAMINFO (44.1 kHz, stereo, 16 bit, 3 s) + PADDING.
pub fn flac_bytes() -> Vec<u8> {
    let mut out = b"fLaC".to_vec();

    out.push(0x00);
    out.extend_from_slice(&34u32.to_be_bytes()[1..]);
    out.extend_from_slice(&4096u16.to_be_bytes());
    out.extend_from_slice(&4096u16.to_be_bytes());
    out.extend_from_slice(&[0, 0, 0]);
    out.extend_from_slice(&[0, 0, 0]);
    let packed: u64 = (44_100u64 << 44) | (1u64 << 41) | (15u64 << 36) | 132_300u64;
    out.extend_from_slice(&packed.to_be_bytes());
    out.extend_from_slice(&[0u8; 16]);

    out.push(0x80 | 0x01);
    out.extend_from_slice(&64u32.to_be_bytes()[1..]);
    out.extend_from_slice(&[0u8; 64]);

    out.extend_from_slice(&[0u8; 16]);
    out
}

pub fn song(artist: &str, title: &str) -> SongMetadata {
    SongMetadata {
        artist: Some(artist.to_string()),
        title: Some(title.to_string()),
        ..Default::default()
    }
}

/// A FLAC file tagged with `artist` and `title`.
pub async fn tagged_flac(dir: &Path, name: &str, artist: &str, title: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, flac_bytes()).expect("write fixture");
    TagCodec::new()
        .write(&path, &song(artist, title), &CoverSource::None)
        .await
        .expect("tag fixture");
    path
}

/// Blocks the first search until released.
#[derive(Clone, Default)]
pub struct SearchGate {
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
}

/// In-memory catalog keyed by sanitized keyword.
#[derive(Default)]
pub struct FakeCatalog {
    results: HashMap<String, Vec<String>>,
    songs: HashMap<String, SongMetadata>,
    lyrics: HashMap<String, LyricDocument>,
    transient: Vec<String>,
    unfetchable: Vec<String>,
    panicking: Vec<String>,
    gate: Option<SearchGate>,
    gate_used: AtomicBool,
    searches: Mutex<Vec<String>>,
    fetches: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a candidate to the result list of `keyword`, in order.
    pub fn with_song(mut self, keyword: &str, key: &str, metadata: SongMetadata) -> Self {
        self.results
            .entry(sanitize_keyword(keyword))
            .or_default()
            .push(key.to_string());
        self.songs.insert(key.to_string(), metadata);
        self
    }

    pub fn with_lyric(mut self, key: &str, lyric: LyricDocument) -> Self {
        self.lyrics.insert(key.to_string(), lyric);
        self
    }

    /// Searches for `keyword` fail with `Transient`.
    pub fn with_transient(mut self, keyword: &str) -> Self {
        self.transient.push(sanitize_keyword(keyword));
        self
    }

    /// Adds a candidate that shows up in search but cannot be fetched.
    pub fn with_unfetchable(self, keyword: &str, key: &str, listed_as: SongMetadata) -> Self {
        let mut catalog = self.with_song(keyword, key, listed_as);
        catalog.unfetchable.push(key.to_string());
        catalog
    }

    /// Searches for `keyword` panic.
    pub fn with_panic(mut self, keyword: &str) -> Self {
        self.panicking.push(sanitize_keyword(keyword));
        self
    }

    pub fn with_gate(mut self, gate: SearchGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn searches(&self) -> Vec<String> {
        self.searches.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Cloud
    }

    async fn search(
        &self,
        keyword: &str,
        _page: u32,
    ) -> core_metadata::Result<Vec<SearchCandidate>> {
        let keyword = sanitize_keyword(keyword);
        self.searches.lock().unwrap().push(keyword.clone());

        if let Some(gate) = &self.gate {
            if !self.gate_used.swap(true, Ordering::SeqCst) {
                gate.started.notify_one();
                gate.release.notified().await;
            }
        }

        if self.panicking.contains(&keyword) {
            panic!("catalog adapter bug for '{}'", keyword);
        }

        if self.transient.contains(&keyword) {
            return Err(MetadataError::Transient(
                "request too frequent".to_string(),
            ));
        }

        let keys = self
            .results
            .get(&keyword)
            .ok_or_else(|| MetadataError::NoResults(keyword.clone()))?;

        Ok(keys
            .iter()
            .map(|key| {
                let song = &self.songs[key];
                SearchCandidate {
                    provider_key: key.clone(),
                    display_title: song.title.clone().unwrap_or_default(),
                    display_artist: song.artist.clone().unwrap_or_default(),
                    duration: song.duration,
                }
            })
            .collect())
    }

    async fn fetch_full(&self, provider_key: &str) -> core_metadata::Result<SongMetadata> {
        self.fetches.lock().unwrap().push(provider_key.to_string());
        if self.unfetchable.iter().any(|key| key == provider_key) {
            return Err(MetadataError::NoResults(provider_key.to_string()));
        }
        self.songs
            .get(provider_key)
            .cloned()
            .ok_or_else(|| MetadataError::NoResults(provider_key.to_string()))
    }

    async fn fetch_lyric(&self, provider_key: &str) -> core_metadata::Result<LyricDocument> {
        self.lyrics
            .get(provider_key)
            .cloned()
            .ok_or_else(|| MetadataError::NoResults(provider_key.to_string()))
    }
}
