//! Lyric documents.
//!
//! Providers return lyrics in different shapes (LRC strings in JSON, packed
//! KRC blobs). Both decode into a [`LyricDocument`]: an ordered list of
//! lines, each with optional original, translated and romanized text and an
//! optional timestamp.

pub mod krc;

use std::collections::HashMap;
use std::fmt::Write as _;

/// One lyric line with its optional companions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LyricLine {
    pub time_ms: Option<u64>,
    pub original: Option<String>,
    pub translated: Option<String>,
    pub romanized: Option<String>,
}

/// Ordered lyric lines.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LyricDocument {
    pub lines: Vec<LyricLine>,
}

impl LyricDocument {
    pub fn new(lines: Vec<LyricLine>) -> Self {
        Self { lines }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|line| {
            line.original.is_none() && line.translated.is_none() && line.romanized.is_none()
        })
    }

    pub fn is_timed(&self) -> bool {
        !self.lines.is_empty() && self.lines.iter().all(|l| l.time_ms.is_some())
    }

    /// Merges up to three LRC streams by timestamp.
    ///
    /// Translated and romanized lines attach to the original line carrying the
    /// same timestamp; untimed ones attach by position.
    pub fn from_lrc(original: &str, translated: Option<&str>, romanized: Option<&str>) -> Self {
        let mut lines: Vec<LyricLine> = parse_lrc(original)
            .into_iter()
            .map(|(time_ms, text)| LyricLine {
                time_ms,
                original: text,
                ..Default::default()
            })
            .collect();

        if let Some(translated) = translated {
            attach(&mut lines, parse_lrc(translated), |line, text| {
                line.translated = text
            });
        }
        if let Some(romanized) = romanized {
            attach(&mut lines, parse_lrc(romanized), |line, text| {
                line.romanized = text
            });
        }

        let mut doc = Self { lines };
        doc.sort_if_timed();
        doc
    }

    /// LRC text of the original stream only. Used when embedding into tags.
    pub fn original_lrc(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            if let Some(text) = &line.original {
                push_line(&mut out, line.time_ms, text);
            }
        }
        out
    }

    /// Sidecar file body: one line per lyric line, companions right after
    /// their original under the same timestamp.
    pub fn to_sidecar(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            for text in [&line.original, &line.translated, &line.romanized]
                .into_iter()
                .flatten()
            {
                push_line(&mut out, line.time_ms, text);
            }
        }
        out
    }

    fn sort_if_timed(&mut self) {
        if self.is_timed() {
            self.lines.sort_by_key(|line| line.time_ms);
        }
    }
}

fn attach<F>(lines: &mut Vec<LyricLine>, extra: Vec<(Option<u64>, Option<String>)>, set: F)
where
    F: Fn(&mut LyricLine, Option<String>),
{
    let mut by_time: HashMap<u64, Vec<usize>> = HashMap::new();
    let mut untimed = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        match line.time_ms {
            Some(ms) => by_time.entry(ms).or_default().push(idx),
            None => untimed.push(idx),
        }
    }
    let mut untimed = untimed.into_iter();

    for (time_ms, text) in extra {
        if text.is_none() {
            continue;
        }
        let slot = match time_ms {
            Some(ms) => by_time.get_mut(&ms).and_then(|slots| {
                if slots.is_empty() {
                    None
                } else {
                    Some(slots.remove(0))
                }
            }),
            None => untimed.next(),
        };

        match slot {
            Some(idx) => set(&mut lines[idx], text),
            None => {
                let mut line = LyricLine {
                    time_ms,
                    ..Default::default()
                };
                set(&mut line, text);
                lines.push(line);
            }
        }
    }
}

fn push_line(out: &mut String, time_ms: Option<u64>, text: &str) {
    if let Some(ms) = time_ms {
        out.push_str(&format_timestamp(ms));
    }
    out.push_str(text);
    out.push('\n');
}

/// `[mm:ss.xx]`, minutes unbounded.
pub fn format_timestamp(ms: u64) -> String {
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) / 1_000;
    let centis = (ms % 1_000) / 10;
    let mut out = String::with_capacity(10);
    let _ = write!(out, "[{:02}:{:02}.{:02}]", minutes, seconds, centis);
    out
}

/// Splits LRC text into `(timestamp, text)` pairs.
///
/// A line with several leading timestamps yields one pair per timestamp.
/// ID tags such as `[ar:...]` are dropped. Blank text maps to `None`.
pub fn parse_lrc(text: &str) -> Vec<(Option<u64>, Option<String>)> {
    let mut out = Vec::new();

    for raw in text.lines() {
        let raw = raw.trim_end_matches('\r');
        let mut rest = raw.trim_start();
        let mut stamps = Vec::new();
        let mut is_id_tag = false;

        while let Some(stripped) = rest.strip_prefix('[') {
            let Some(end) = stripped.find(']') else { break };
            let inner = &stripped[..end];
            match parse_timestamp(inner) {
                Some(ms) => stamps.push(ms),
                None => {
                    if stamps.is_empty() && inner.contains(':') {
                        is_id_tag = true;
                    }
                    break;
                }
            }
            rest = &stripped[end + 1..];
        }

        if is_id_tag {
            continue;
        }

        let body = rest.trim();
        let body = if body.is_empty() {
            None
        } else {
            Some(body.to_string())
        };

        if stamps.is_empty() {
            if body.is_some() {
                out.push((None, body));
            }
        } else {
            for ms in stamps {
                out.push((Some(ms), body.clone()));
            }
        }
    }

    out
}

/// Parses `mm:ss`, `mm:ss.x{1,3}` or `mm:ss:xx` into milliseconds.
fn parse_timestamp(inner: &str) -> Option<u64> {
    let (minutes, rest) = inner.split_once(':')?;
    let minutes: u64 = minutes.trim().parse().ok()?;

    let (seconds, fraction) = match rest.find(['.', ':']) {
        Some(pos) => (&rest[..pos], Some(&rest[pos + 1..])),
        None => (rest, None),
    };
    let seconds: u64 = seconds.trim().parse().ok()?;
    if seconds >= 60 {
        return None;
    }

    let fraction_ms = match fraction {
        None => 0,
        Some(f) if f.is_empty() || f.len() > 3 || !f.chars().all(|c| c.is_ascii_digit()) => {
            return None
        }
        Some(f) => {
            let value: u64 = f.parse().ok()?;
            match f.len() {
                1 => value * 100,
                2 => value * 10,
                _ => value,
            }
        }
    };

    Some(minutes * 60_000 + seconds * 1_000 + fraction_ms)
}
