//! Decoder for packed KRC lyric payloads.
//!
//! Layout: 4-byte `krc1` header, then a zlib stream XOR-ed with a fixed
//! 16-byte key. The inflated text carries word-timed lines
//! (`[start,duration]<offset,len,0>word...`) and an optional
//! `[language:...]` tag holding base64 JSON with translation and
//! romanization rows aligned to the timed lines.

use std::io::Read;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use flate2::read::ZlibDecoder;
use serde::Deserialize;

use super::{LyricDocument, LyricLine};
use crate::error::{MetadataError, Result};

const KRC_HEADER: &[u8; 4] = b"krc1";
const KRC_KEY: [u8; 16] = [
    64, 71, 97, 119, 94, 50, 116, 71, 81, 54, 49, 45, 206, 210, 110, 105,
];

const LANGUAGE_ROMANIZED: u8 = 0;
const LANGUAGE_TRANSLATED: u8 = 1;

#[derive(Debug, Deserialize)]
struct LanguageBlock {
    #[serde(default)]
    content: Vec<LanguageEntry>,
}

#[derive(Debug, Deserialize)]
struct LanguageEntry {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(rename = "lyricContent", default)]
    rows: Vec<Vec<String>>,
}

/// Decodes a base64 KRC payload as returned by the download endpoint.
pub fn decode(content: &str) -> Result<LyricDocument> {
    let packed = STANDARD
        .decode(content.trim())
        .map_err(|e| MetadataError::InvalidResponse(format!("KRC payload is not base64: {e}")))?;
    let text = unpack(&packed)?;
    Ok(parse(&text))
}

/// Strips the header, removes the XOR layer and inflates.
pub fn unpack(packed: &[u8]) -> Result<String> {
    let body = packed
        .strip_prefix(KRC_HEADER.as_slice())
        .ok_or_else(|| MetadataError::InvalidResponse("missing KRC header".to_string()))?;

    let deciphered: Vec<u8> = body
        .iter()
        .enumerate()
        .map(|(i, b)| b ^ KRC_KEY[i % KRC_KEY.len()])
        .collect();

    let mut text = String::new();
    ZlibDecoder::new(deciphered.as_slice())
        .read_to_string(&mut text)
        .map_err(|e| MetadataError::InvalidResponse(format!("KRC inflate failed: {e}")))?;

    Ok(text.trim_start_matches('\u{feff}').to_string())
}

/// Parses inflated KRC text into a document.
pub fn parse(text: &str) -> LyricDocument {
    let mut lines = Vec::new();
    let mut language: Option<LanguageBlock> = None;

    for raw in text.lines() {
        let raw = raw.trim();
        if let Some(encoded) = raw
            .strip_prefix("[language:")
            .and_then(|rest| rest.strip_suffix(']'))
        {
            language = decode_language(encoded);
            continue;
        }
        if let Some((start, words)) = parse_timed_line(raw) {
            lines.push(LyricLine {
                time_ms: Some(start),
                original: Some(words),
                ..Default::default()
            });
        }
    }

    if let Some(block) = language {
        for entry in block.content {
            for (line, row) in lines.iter_mut().zip(entry.rows.iter()) {
                let joined = row.concat();
                let joined = joined.trim();
                if joined.is_empty() {
                    continue;
                }
                match entry.kind {
                    LANGUAGE_TRANSLATED => line.translated = Some(joined.to_string()),
                    LANGUAGE_ROMANIZED => line.romanized = Some(joined.to_string()),
                    _ => {}
                }
            }
        }
    }

    LyricDocument::new(lines)
}

fn decode_language(encoded: &str) -> Option<LanguageBlock> {
    let bytes = STANDARD.decode(encoded.trim()).ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(block) => Some(block),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring unreadable KRC language block");
            None
        }
    }
}

/// `[12345,2300]<0,300,0>Hello<300,200,0> world` -> `(12345, "Hello world")`
fn parse_timed_line(raw: &str) -> Option<(u64, String)> {
    let inner = raw.strip_prefix('[')?;
    let end = inner.find(']')?;
    let (start, _duration) = inner[..end].split_once(',')?;
    let start: u64 = start.trim().parse().ok()?;

    let mut words = String::new();
    let mut in_marker = false;
    for c in inner[end + 1..].chars() {
        match c {
            '<' => in_marker = true,
            '>' if in_marker => in_marker = false,
            _ if !in_marker => words.push(c),
            _ => {}
        }
    }

    Some((start, words.trim().to_string()))
}
