//! Video reference resolution.
//!
//! Turns whatever the user pasted (watch URL, short link, embed/shorts URL or a bare id) into the
//! canonical 11-character video id. Structured URL parsing runs first; an ordered list of regular
//! expressions is the fallback for anything the parser rejects.

use std::{fmt, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, TldwError};

pub const VIDEO_ID_LEN: usize = 11;

const VIDEO_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtube-nocookie.com",
    "www.youtube-nocookie.com",
];

const SHORT_HOSTS: &[&str] = &["youtu.be", "www.youtu.be"];

/// Tried in declared order; the first capture wins.
static FALLBACK_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"[?&]v=([0-9A-Za-z_-]{11})(?:[&#/]|$)",
        r"youtu\.be/([0-9A-Za-z_-]{11})(?:[?&#/]|$)",
        r"/embed/([0-9A-Za-z_-]{11})(?:[?&#/]|$)",
        r"/shorts/([0-9A-Za-z_-]{11})(?:[?&#/]|$)",
        r"/v/([0-9A-Za-z_-]{11})(?:[?&#/]|$)",
        r"^([0-9A-Za-z_-]{11})$",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("static regex"))
    .collect()
});

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VideoId(String);

impl VideoId {
    /// Validate an already extracted id.
    pub fn parse(id: &str) -> Result<Self> {
        let id = id.trim();
        if is_valid_id(id) {
            Ok(Self(id.to_string()))
        } else {
            Err(TldwError::ReferenceInvalid {
                input: id.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for VideoId {
    type Error = TldwError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<VideoId> for String {
    fn from(id: VideoId) -> Self {
        id.0
    }
}

/// Resolve a raw video locator into its canonical id.
pub fn resolve(raw: &str) -> Result<VideoId> {
    let raw = raw.trim();

    if let Some(id) = resolve_structured(raw) {
        return Ok(VideoId(id));
    }

    resolve_with_patterns(raw)
        .map(VideoId)
        .ok_or_else(|| TldwError::ReferenceInvalid {
            input: raw.to_string(),
        })
}

fn resolve_structured(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();

    let candidate = if SHORT_HOSTS.contains(&host.as_str()) {
        url.path_segments()?.next().map(str::to_string)
    } else if VIDEO_HOSTS.contains(&host.as_str()) {
        let mut segments = url.path_segments()?;
        match segments.next() {
            Some("watch") => url
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned()),
            Some("embed" | "shorts" | "v" | "live") => segments.next().map(str::to_string),
            _ => None,
        }
    } else {
        None
    };

    candidate
        .map(|id| id.trim().to_string())
        .filter(|id| is_valid_id(id))
}

fn resolve_with_patterns(raw: &str) -> Option<String> {
    FALLBACK_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures(raw)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    })
}

fn is_valid_id(id: &str) -> bool {
    id.len() == VIDEO_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "dQw4w9WgXcQ";

    #[test]
    fn resolves_supported_url_shapes() {
        let inputs = [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?v=dQw4w9WgXcQ",
            "https://m.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ",
            "dQw4w9WgXcQ",
            "  dQw4w9WgXcQ \n",
        ];

        for input in inputs {
            assert_eq!(resolve(input).unwrap().as_str(), ID, "input: {input}");
        }
    }

    #[test]
    fn extra_query_parameters_do_not_change_the_id() {
        let inputs = [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=16s",
            "https://www.youtube.com/watch?t=16s&v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PLrAXtmRdnEQy4qtr&index=3",
            "https://youtu.be/dQw4w9WgXcQ?t=42",
            "https://youtu.be/dQw4w9WgXcQ?si=abcdef&t=42",
            "https://www.youtube.com/embed/dQw4w9WgXcQ?start=30",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ?feature=share",
        ];

        for input in inputs {
            assert_eq!(resolve(input).unwrap().as_str(), ID, "input: {input}");
        }
    }

    #[test]
    fn unknown_hosts_fall_back_to_patterns() {
        let id = resolve("https://example-video-host/watch?v=abcDEF12345&t=16s").unwrap();
        assert_eq!(id.as_str(), "abcDEF12345");

        let id = resolve("not a url but /shorts/abcDEF12345?x=1").unwrap();
        assert_eq!(id.as_str(), "abcDEF12345");
    }

    #[test]
    fn rejects_short_or_malformed_input() {
        for input in ["", "abc", "dQw4w9WgXc", "https://vimeo.com/12345", "abc!def$123"] {
            assert!(
                matches!(resolve(input), Err(TldwError::ReferenceInvalid { .. })),
                "input: {input}"
            );
        }
    }

    #[test]
    fn rejects_ids_with_disallowed_characters() {
        assert!(resolve("https://www.youtube.com/watch?v=dQw4w9WgX.Q").is_err());
        assert!(VideoId::parse("dQw4w9WgX Q").is_err());
    }

    #[test]
    fn parse_validates_length() {
        assert!(VideoId::parse(ID).is_ok());
        assert!(VideoId::parse("dQw4w9WgXcQQ").is_err());
    }
}
