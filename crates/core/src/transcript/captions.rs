use std::{path::PathBuf, sync::LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tracing::debug;

use super::CaptionFetcher;
use crate::{
    error::{Result, TldwError},
    reference::VideoId,
    types::Segment,
};

static CUE_TIMING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((?:\d+:)?\d{2}:\d{2}\.\d{3})\s+-->\s+((?:\d+:)?\d{2}:\d{2}\.\d{3})")
        .expect("static regex")
});

static INLINE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("static regex"));

/// Native captions through `yt-dlp`, written as WebVTT into a scratch directory.
#[derive(Debug, Clone)]
pub struct YtDlpCaptions {
    binary: String,
    languages: Vec<String>,
    work_dir: PathBuf,
}

impl YtDlpCaptions {
    pub fn new(languages: Vec<String>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            languages,
            work_dir: work_dir.into(),
        }
    }

    /// Rank of a `<id>.<lang>.vtt` file name in the configured language list.
    fn language_rank(&self, file_name: &str) -> usize {
        let lang = file_name
            .trim_end_matches(".vtt")
            .rsplit_once('.')
            .map_or("", |(_, lang)| lang);
        self.languages
            .iter()
            .position(|wanted| wanted.eq_ignore_ascii_case(lang))
            .unwrap_or(self.languages.len())
    }
}

#[async_trait]
impl CaptionFetcher for YtDlpCaptions {
    async fn fetch_captions(&self, id: &VideoId) -> Result<Vec<Segment>> {
        tokio::fs::create_dir_all(&self.work_dir).await?;
        let scratch = tempfile::Builder::new()
            .prefix("tldw-captions-")
            .tempdir_in(&self.work_dir)?;

        let output = Command::new(&self.binary)
            .arg("--skip-download")
            .arg("--write-sub")
            .arg("--write-auto-sub")
            .arg("--sub-format")
            .arg("vtt")
            .arg("--sub-langs")
            .arg(self.languages.join(","))
            .arg("-o")
            .arg(scratch.path().join("%(id)s"))
            .arg(id.watch_url())
            .output()
            .await?;

        if !output.status.success() {
            return Err(TldwError::transcript_unavailable(
                id.as_str(),
                format!(
                    "yt-dlp caption download failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        let mut vtt_files = Vec::new();
        let mut entries = tokio::fs::read_dir(scratch.path()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".vtt") {
                vtt_files.push((self.language_rank(&name), entry.path()));
            }
        }
        vtt_files.sort();

        let Some((_, best)) = vtt_files.into_iter().next() else {
            return Err(TldwError::transcript_unavailable(
                id.as_str(),
                "video has no captions in the requested languages",
            ));
        };

        debug!(video_id = %id, file = %best.display(), "parsing captions");
        let content = tokio::fs::read_to_string(&best).await?;
        Ok(parse_vtt(&content))
    }
}

/// Parse WebVTT cues. Rolling auto-captions repeat the previous line at the top of each cue;
/// a line equal to the last emitted line is dropped.
pub fn parse_vtt(content: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last_line = String::new();
    let mut current: Option<(f64, f64, Vec<String>)> = None;

    let flush = |current: &mut Option<(f64, f64, Vec<String>)>, segments: &mut Vec<Segment>| {
        match current.take() {
            Some((start, end, lines)) if !lines.is_empty() => segments.push(Segment {
                start,
                end,
                text: lines.join(" "),
            }),
            _ => {}
        }
    };

    for raw_line in content.lines() {
        let line = raw_line.trim();

        if line.is_empty() {
            flush(&mut current, &mut segments);
            continue;
        }

        if let Some(caps) = CUE_TIMING.captures(line) {
            flush(&mut current, &mut segments);
            current = Some((
                parse_vtt_time(&caps[1]),
                parse_vtt_time(&caps[2]),
                Vec::new(),
            ));
            continue;
        }

        // Header, metadata, NOTE/STYLE blocks and cue ids all sit outside a cue body.
        let Some((_, _, lines)) = current.as_mut() else {
            continue;
        };

        let text = INLINE_TAG.replace_all(line, "");
        let text = decode_entities(text.trim());
        if text.is_empty() || text == last_line {
            continue;
        }
        last_line = text.clone();
        lines.push(text);
    }
    flush(&mut current, &mut segments);

    segments
}

fn parse_vtt_time(stamp: &str) -> f64 {
    let (clock, millis) = stamp.split_once('.').unwrap_or((stamp, "0"));
    let seconds = clock
        .split(':')
        .filter_map(|part| part.parse::<f64>().ok())
        .fold(0.0, |acc, part| acc * 60.0 + part);
    seconds + millis.parse::<f64>().unwrap_or(0.0) / 1000.0
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}
