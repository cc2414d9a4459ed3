//! Progress channel between one pipeline run and its consumer.
//!
//! The producer side is a [`ProgressSender`] owned by the orchestrator; the consumer gets a plain
//! bounded `mpsc::Receiver` and turns each event into one line of newline-delimited JSON.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::{error::TldwError, types::SummarySource};

pub const DEFAULT_PROGRESS_BUFFER: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Analyzing,
    Processing,
    Finalizing,
    Saving,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionStatus {
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ProgressEvent {
    Progress {
        current_chunk: usize,
        total_chunks: usize,
        stage: Stage,
        message: String,
    },
    Complete {
        summary: String,
        source: SummarySource,
        status: CompletionStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        warning: Option<String>,
    },
    Error {
        error: String,
        details: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_backend_error: Option<bool>,
    },
}

impl ProgressEvent {
    pub fn progress(
        current_chunk: usize,
        total_chunks: usize,
        stage: Stage,
        message: impl Into<String>,
    ) -> Self {
        Self::Progress {
            current_chunk,
            total_chunks,
            stage,
            message: message.into(),
        }
    }

    pub fn complete(summary: String, source: SummarySource, warning: Option<String>) -> Self {
        Self::Complete {
            summary,
            source,
            status: CompletionStatus::Completed,
            warning,
        }
    }

    pub fn from_error(err: &TldwError) -> Self {
        Self::Error {
            error: err.title().to_string(),
            details: err.details(),
            is_backend_error: err.is_backend_error().then_some(true),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProgressEvent::Progress { .. })
    }

    /// One NDJSON line, newline included.
    pub fn to_ndjson(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Writer half of the progress channel.
#[derive(Debug)]
pub struct ProgressSender {
    tx: mpsc::Sender<ProgressEvent>,
}

pub fn channel(capacity: usize) -> (ProgressSender, mpsc::Receiver<ProgressEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ProgressSender { tx }, rx)
}

impl ProgressSender {
    /// Best effort: a gone consumer is logged and reported as `false`, never as an error.
    pub async fn emit(&self, event: ProgressEvent) -> bool {
        match self.tx.send(event).await {
            Ok(()) => true,
            Err(err) => {
                debug!(event = ?err.0, "progress consumer is gone, dropping event");
                false
            }
        }
    }

    /// Liveness of the consumer, checked by the pipeline at stage and chunk boundaries.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn progress_event_wire_format() {
        let event = ProgressEvent::progress(2, 5, Stage::Processing, "Summarizing part 2 of 5");
        let value: serde_json::Value = serde_json::from_str(&event.to_ndjson().unwrap()).unwrap();

        assert_eq!(
            value,
            json!({
                "type": "progress",
                "currentChunk": 2,
                "totalChunks": 5,
                "stage": "processing",
                "message": "Summarizing part 2 of 5",
            })
        );
    }

    #[test]
    fn complete_event_omits_missing_warning() {
        let event = ProgressEvent::complete("done".into(), SummarySource::Cache, None);
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(
            value,
            json!({"type": "complete", "summary": "done", "source": "cache", "status": "completed"})
        );
    }

    #[test]
    fn error_event_marks_backend_errors() {
        let err = TldwError::BackendUnavailable {
            provider: "OpenAI".into(),
            env_var: "OPENAI_API_KEY".into(),
        };
        let value = serde_json::to_value(ProgressEvent::from_error(&err)).unwrap();

        assert_eq!(value["type"], "error");
        assert_eq!(value["isBackendError"], true);

        let value = serde_json::to_value(ProgressEvent::from_error(&TldwError::DuplicateRequest)).unwrap();
        assert!(value.get("isBackendError").is_none());
    }

    #[test]
    fn ndjson_lines_end_with_newline() {
        let line = ProgressEvent::complete("x".into(), SummarySource::Srt, Some("w".into()))
            .to_ndjson()
            .unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[tokio::test]
    async fn emit_reports_closed_consumer() {
        let (sender, rx) = channel(4);
        assert!(sender.is_open());
        assert!(sender.emit(ProgressEvent::progress(0, 0, Stage::Analyzing, "a")).await);

        drop(rx);
        assert!(!sender.is_open());
        assert!(!sender.emit(ProgressEvent::progress(0, 0, Stage::Analyzing, "b")).await);
    }
}
