use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TldwError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Which acquisition strategy produced a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    NativeCaptions,
    FileSubtitles,
    SpeechTranscription,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub provenance: Provenance,
    pub title: String,
}

/// Where the delivered summary came from, as reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarySource {
    Youtube,
    Srt,
    Whisper,
    Cache,
}

impl SummarySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummarySource::Youtube => "youtube",
            SummarySource::Srt => "srt",
            SummarySource::Whisper => "whisper",
            SummarySource::Cache => "cache",
        }
    }
}

impl From<Provenance> for SummarySource {
    fn from(provenance: Provenance) -> Self {
        match provenance {
            Provenance::NativeCaptions => SummarySource::Youtube,
            Provenance::FileSubtitles => SummarySource::Srt,
            Provenance::SpeechTranscription => SummarySource::Whisper,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryMode {
    #[default]
    Video,
    Podcast,
}

impl SummaryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryMode::Video => "video",
            SummaryMode::Podcast => "podcast",
        }
    }
}

impl fmt::Display for SummaryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryMode {
    type Err = TldwError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(SummaryMode::Video),
            "podcast" => Ok(SummaryMode::Podcast),
            other => Err(TldwError::configuration(format!(
                "Unknown summary mode \"{other}\", expected \"video\" or \"podcast\""
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord {
    pub id: Uuid,
    pub video_key: String,
    pub title: String,
    pub content: String,
    pub language: String,
    pub mode: SummaryMode,
    pub provenance: SummarySource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a record that does not exist yet.
#[derive(Debug, Clone)]
pub struct NewSummary {
    pub video_key: String,
    pub title: String,
    pub content: String,
    pub language: String,
    pub mode: SummaryMode,
    pub provenance: SummarySource,
}

/// Fields replaced when a record for the same video and language already exists.
#[derive(Debug, Clone)]
pub struct SummaryUpdate {
    pub title: String,
    pub content: String,
    pub mode: SummaryMode,
    pub provenance: SummarySource,
}

impl SummaryRecord {
    pub fn create(new: NewSummary) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            video_key: new.video_key,
            title: new.title,
            content: new.content,
            language: new.language,
            mode: new.mode,
            provenance: new.provenance,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, update: SummaryUpdate) {
        self.title = update.title;
        self.content = update.content;
        self.mode = update.mode;
        self.provenance = update.provenance;
        self.updated_at = Utc::now();
    }
}
