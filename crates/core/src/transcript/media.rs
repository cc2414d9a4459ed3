use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use super::{AudioConverter, MediaFetcher};
use crate::{
    error::{Result, TldwError},
    reference::VideoId,
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AudioFormat {
    pub format_id: String,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub abr: Option<f64>,
    #[serde(default)]
    pub ext: String,
}

impl AudioFormat {
    pub fn audio(format_id: &str, acodec: &str, abr: f64, ext: &str) -> Self {
        Self {
            format_id: format_id.to_string(),
            acodec: Some(acodec.to_string()),
            vcodec: Some("none".to_string()),
            abr: Some(abr),
            ext: ext.to_string(),
        }
    }

    pub fn is_audio_only(&self) -> bool {
        let has_audio = self.acodec.as_deref().is_some_and(|c| c != "none");
        let has_video = self.vcodec.as_deref().is_some_and(|c| c != "none");
        has_audio && !has_video
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VideoMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "uploader")]
    pub author: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub formats: Vec<AudioFormat>,
}

/// Metadata and audio through the `yt-dlp` binary.
#[derive(Debug, Clone)]
pub struct YtDlpMedia {
    binary: String,
}

impl Default for YtDlpMedia {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
        }
    }
}

impl YtDlpMedia {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MediaFetcher for YtDlpMedia {
    async fn metadata(&self, id: &VideoId) -> Result<VideoMetadata> {
        let output = Command::new(&self.binary)
            .arg("--dump-single-json")
            .arg("--skip-download")
            .arg("--no-warnings")
            .arg(id.watch_url())
            .output()
            .await
            .map_err(|e| {
                TldwError::transcript_unavailable(
                    id.as_str(),
                    format!("could not run {}: {e}", self.binary),
                )
            })?;

        if !output.status.success() {
            return Err(TldwError::transcript_unavailable(
                id.as_str(),
                format!(
                    "yt-dlp could not read video metadata: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        let metadata: VideoMetadata = serde_json::from_slice(&output.stdout).map_err(|e| {
            TldwError::transcript_unavailable(
                id.as_str(),
                format!("unreadable video metadata: {e}"),
            )
        })?;
        debug!(
            video_id = %id,
            title = %metadata.title,
            duration = ?metadata.duration,
            formats = metadata.formats.len(),
            "fetched video metadata"
        );
        Ok(metadata)
    }

    async fn download_audio(
        &self,
        id: &VideoId,
        format: &AudioFormat,
        dest_dir: &Path,
    ) -> Result<PathBuf> {
        let output_template = dest_dir.join("source.%(ext)s");
        let output = Command::new(&self.binary)
            .arg(id.watch_url())
            .arg("--print")
            .arg("after_move:filepath")
            .arg("-f")
            .arg(&format.format_id)
            .arg("-o")
            .arg(&output_template)
            .output()
            .await
            .map_err(|e| {
                TldwError::transcript_unavailable(
                    id.as_str(),
                    format!("could not run {}: {e}", self.binary),
                )
            })?;

        if !output.status.success() {
            return Err(TldwError::transcript_unavailable(
                id.as_str(),
                format!(
                    "audio download failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let path = stdout
            .lines()
            .map(str::trim)
            .rfind(|line| !line.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| {
                TldwError::transcript_unavailable(id.as_str(), "yt-dlp did not report a file")
            })?;
        Ok(path)
    }
}

/// 16 kHz mono PCM conversion through `ffmpeg`.
#[derive(Debug, Clone)]
pub struct FfmpegConverter {
    binary: String,
}

impl Default for FfmpegConverter {
    fn default() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
        }
    }
}

impl FfmpegConverter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AudioConverter for FfmpegConverter {
    async fn to_wav(&self, input: &Path, output: &Path) -> Result<()> {
        let result = Command::new(&self.binary)
            .arg("-y")
            .arg("-i")
            .arg(input)
            .arg("-vn")
            .arg("-acodec")
            .arg("pcm_s16le")
            .arg("-ar")
            .arg("16000")
            .arg("-ac")
            .arg("1")
            .arg(output)
            .output()
            .await
            .map_err(|e| {
                TldwError::transcript_unavailable(
                    input.display().to_string(),
                    format!("could not run {}: {e}", self.binary),
                )
            })?;

        if !result.status.success() {
            return Err(TldwError::transcript_unavailable(
                input.display().to_string(),
                format!(
                    "audio conversion failed: {}",
                    String::from_utf8_lossy(&result.stderr).trim()
                ),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_yt_dlp_json() {
        let json = r#"{
            "id": "abcDEF12345",
            "title": "Borrow checker deep dive",
            "uploader": "Ferris",
            "duration": 1234.0,
            "formats": [
                {"format_id": "sb0", "acodec": "none", "vcodec": "none", "ext": "mhtml"},
                {"format_id": "251", "acodec": "opus", "vcodec": "none", "abr": 133.4, "ext": "webm"},
                {"format_id": "18", "acodec": "mp4a.40.2", "vcodec": "avc1.42001E", "ext": "mp4"}
            ]
        }"#;

        let metadata: VideoMetadata = serde_json::from_str(json).unwrap();

        assert_eq!(metadata.title, "Borrow checker deep dive");
        assert_eq!(metadata.author.as_deref(), Some("Ferris"));
        let audio_only: Vec<_> = metadata
            .formats
            .iter()
            .filter(|f| f.is_audio_only())
            .map(|f| f.format_id.as_str())
            .collect();
        assert_eq!(audio_only, vec!["251"]);
    }

    const MISSING_BINARY: &str = "tldw-test-missing-binary";

    #[tokio::test]
    async fn missing_yt_dlp_is_transcript_unavailable() {
        let media = YtDlpMedia {
            binary: MISSING_BINARY.to_string(),
        };
        let id = VideoId::parse("abcDEF12345").unwrap();

        let err = media.metadata(&id).await.unwrap_err();
        assert!(matches!(err, TldwError::TranscriptUnavailable { .. }), "{err:?}");
        assert_eq!(err.title(), "Could not get a transcript for this video");

        let dir = tempfile::tempdir().unwrap();
        let format = AudioFormat::audio("251", "opus", 120.0, "webm");
        let err = media
            .download_audio(&id, &format, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, TldwError::TranscriptUnavailable { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn missing_ffmpeg_is_transcript_unavailable() {
        let converter = FfmpegConverter {
            binary: MISSING_BINARY.to_string(),
        };
        let dir = tempfile::tempdir().unwrap();

        let err = converter
            .to_wav(&dir.path().join("in.webm"), &dir.path().join("out.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, TldwError::TranscriptUnavailable { .. }), "{err:?}");
    }
}
