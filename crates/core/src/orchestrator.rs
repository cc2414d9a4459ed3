//! The summarization pipeline.
//!
//! One [`Summarizer::run`] call drives a single request from input resolution to the terminal
//! event: resolve → cache check → acquire transcript → split → summarize each chunk → final
//! summary → persist. Identical requests are gated by the in-flight table; the entry is released
//! by a guard whichever way the run ends.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::{
    backend::{BackendRegistry, GenerativeBackend},
    chunk::{self, ChunkSettings},
    config::PipelineConfig,
    error::{Result, TldwError},
    inflight::{InFlightTable, RequestKey},
    progress::{ProgressEvent, ProgressSender, Stage},
    prompt::{SECTION_SEPARATOR, chunk_prompt, final_prompt},
    reference::{self, VideoId},
    store::{JsonFileSummaryStore, SummaryStore},
    transcript::{
        FfmpegConverter, TranscriptSources, YtDlpCaptions, YtDlpMedia, parse_subtitle_file,
    },
    types::{NewSummary, SummaryMode, SummarySource, SummaryUpdate, Transcript},
    upload::{FsUploadStore, SrtId, UploadStore},
};

pub const DEFAULT_LANGUAGE: &str = "en";
pub const HISTORY_WARNING: &str = "Summary generated but saving to history failed";

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_ai_model() -> String {
    crate::provider::Provider::default().key().to_string()
}

/// Inbound request. Exactly one of `url` / `srt_id` is expected; `srt_id` wins if both are set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub srt_id: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub mode: SummaryMode,
    #[serde(default = "default_ai_model")]
    pub ai_model: String,
}

impl SummarizeRequest {
    pub fn for_url(
        url: impl Into<String>,
        language: &str,
        mode: SummaryMode,
        ai_model: &str,
    ) -> Self {
        Self {
            url: Some(url.into()),
            srt_id: None,
            language: language.to_string(),
            mode,
            ai_model: ai_model.to_string(),
        }
    }

    pub fn for_subtitles(
        srt_id: &SrtId,
        language: &str,
        mode: SummaryMode,
        ai_model: &str,
    ) -> Self {
        Self {
            url: None,
            srt_id: Some(srt_id.to_string()),
            language: language.to_string(),
            mode,
            ai_model: ai_model.to_string(),
        }
    }

    fn srt_id(&self) -> Option<&str> {
        self.srt_id.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    fn url(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    fn language(&self) -> String {
        match self.language.trim() {
            "" => default_language(),
            lang => lang.to_string(),
        }
    }

    /// Identity used by the in-flight table. URLs are canonicalized when possible so that
    /// links differing only in extra parameters collide.
    fn dedup_key(&self) -> Option<RequestKey> {
        let input = match (self.srt_id(), self.url()) {
            (Some(srt), _) => srt.to_string(),
            (None, Some(url)) => reference::resolve(url)
                .map(|id| id.to_string())
                .unwrap_or_else(|_| url.to_string()),
            (None, None) => return None,
        };
        Some(RequestKey::new(input, self.language(), self.mode, &self.ai_model))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    ResolvingInput,
    CheckingCache,
    AcquiringTranscript,
    Splitting,
    SummarizingChunks { current: usize, total: usize },
    Finalizing,
    Persisting,
    Completed,
    Errored,
    DuplicateRejected,
    Cancelled,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Completed
                | PipelineState::Errored
                | PipelineState::DuplicateRejected
                | PipelineState::Cancelled
        )
    }
}

struct StateTracker {
    request: String,
    state: PipelineState,
}

impl StateTracker {
    fn new(request: String) -> Self {
        Self {
            request,
            state: PipelineState::Idle,
        }
    }

    fn enter(&mut self, next: PipelineState) -> PipelineState {
        if next.is_terminal() {
            info!(request = %self.request, from = ?self.state, to = ?next, "pipeline finished");
        } else {
            debug!(request = %self.request, from = ?self.state, to = ?next, "pipeline state");
        }
        self.state = next;
        next
    }
}

enum Input {
    Video(VideoId),
    Subtitles(SrtId),
}

impl Input {
    fn from_request(request: &SummarizeRequest) -> Result<Self> {
        match (request.srt_id(), request.url()) {
            (Some(srt), _) => Ok(Input::Subtitles(SrtId::parse(srt)?)),
            (None, Some(url)) => Ok(Input::Video(reference::resolve(url)?)),
            (None, None) => Err(missing_input()),
        }
    }

    /// Key summaries are cached and stored under.
    fn video_key(&self) -> String {
        match self {
            Input::Video(id) => id.to_string(),
            Input::Subtitles(srt) => srt
                .video_id
                .as_ref()
                .map_or_else(|| srt.storage_key(), VideoId::to_string),
        }
    }
}

fn missing_input() -> TldwError {
    TldwError::configuration("Provide either a video URL or an uploaded subtitle file")
}

/// What the caller receives on success.
struct Delivery {
    summary: String,
    source: SummarySource,
    warning: Option<String>,
}

#[derive(Clone)]
pub struct Summarizer {
    sources: TranscriptSources,
    uploads: Arc<dyn UploadStore>,
    store: Arc<dyn SummaryStore>,
    backends: BackendRegistry,
    in_flight: InFlightTable,
    chunking: ChunkSettings,
}

impl Summarizer {
    pub fn new(
        sources: TranscriptSources,
        uploads: Arc<dyn UploadStore>,
        store: Arc<dyn SummaryStore>,
        backends: BackendRegistry,
    ) -> Self {
        Self {
            sources,
            uploads,
            store,
            backends,
            in_flight: InFlightTable::new(),
            chunking: ChunkSettings::default(),
        }
    }

    /// Production wiring: yt-dlp, ffmpeg, on-disk uploads and history, providers from env.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let work_dir = config.work_dir();
        let sources = TranscriptSources::new(
            Arc::new(YtDlpCaptions::new(
                config.caption_languages.clone(),
                work_dir.clone(),
            )),
            Arc::new(YtDlpMedia::new()),
            Arc::new(FfmpegConverter::new()),
            config.speech_backend(),
            work_dir,
        );

        Self::new(
            sources,
            Arc::new(FsUploadStore::new(config.uploads_dir())),
            Arc::new(JsonFileSummaryStore::new(config.history_path())),
            BackendRegistry::from_env(),
        )
        .with_chunking(config.chunking)
    }

    pub fn with_chunking(mut self, chunking: ChunkSettings) -> Self {
        self.chunking = chunking;
        self
    }

    pub fn backends(&self) -> &BackendRegistry {
        &self.backends
    }

    pub fn uploads(&self) -> &Arc<dyn UploadStore> {
        &self.uploads
    }

    pub fn store(&self) -> &Arc<dyn SummaryStore> {
        &self.store
    }

    pub fn in_flight(&self) -> &InFlightTable {
        &self.in_flight
    }

    /// Run one request to completion, streaming events into `progress`.
    ///
    /// Emits at most one terminal event. Returns the terminal state; `Cancelled` means the
    /// consumer went away and nothing more was sent.
    pub async fn run(&self, request: SummarizeRequest, progress: ProgressSender) -> PipelineState {
        let Some(key) = request.dedup_key() else {
            let mut tracker = StateTracker::new("<empty>".into());
            progress
                .emit(ProgressEvent::from_error(&missing_input()))
                .await;
            return tracker.enter(PipelineState::Errored);
        };
        let mut tracker = StateTracker::new(key.to_string());

        let Some(_guard) = self.in_flight.try_acquire(key) else {
            warn!(request = %tracker.request, "duplicate request rejected");
            progress
                .emit(ProgressEvent::progress(
                    0,
                    0,
                    Stage::Analyzing,
                    "An identical request is already in progress",
                ))
                .await;
            progress
                .emit(ProgressEvent::from_error(&TldwError::DuplicateRequest))
                .await;
            return tracker.enter(PipelineState::DuplicateRejected);
        };

        match self.process(&request, &progress, &mut tracker).await {
            Ok(delivery) => {
                progress
                    .emit(ProgressEvent::complete(
                        delivery.summary,
                        delivery.source,
                        delivery.warning,
                    ))
                    .await;
                tracker.enter(PipelineState::Completed)
            }
            Err(TldwError::Cancelled) => tracker.enter(PipelineState::Cancelled),
            Err(e) => {
                error!(
                    request = %tracker.request,
                    state = ?tracker.state,
                    error = %e,
                    "summarization failed"
                );
                progress.emit(ProgressEvent::from_error(&e)).await;
                tracker.enter(PipelineState::Errored)
            }
        }
    }

    async fn process(
        &self,
        request: &SummarizeRequest,
        progress: &ProgressSender,
        tracker: &mut StateTracker,
    ) -> Result<Delivery> {
        tracker.enter(PipelineState::ResolvingInput);
        let backend = self.backends.resolve(&request.ai_model)?;
        let input = Input::from_request(request)?;
        let language = request.language();
        let mut video_key = input.video_key();

        tracker.enter(PipelineState::CheckingCache);
        match self
            .store
            .find_by_video_and_language(&video_key, &language)
            .await
        {
            Ok(Some(record)) => {
                info!(video_key = %video_key, language = %language, "serving cached summary");
                return Ok(Delivery {
                    summary: record.content,
                    source: SummarySource::Cache,
                    warning: None,
                });
            }
            Ok(None) => {}
            Err(e) => {
                warn!(video_key = %video_key, error = %e, "history lookup failed, continuing")
            }
        }

        tracker.enter(PipelineState::AcquiringTranscript);
        emit(
            progress,
            ProgressEvent::progress(0, 0, Stage::Analyzing, "Fetching transcript"),
        )
        .await?;
        let transcript = match &input {
            Input::Video(id) => self.sources.acquire(id).await?,
            Input::Subtitles(srt) => {
                let upload = self.uploads.open(srt).await?;
                if let Some(linked) = &upload.video_id {
                    video_key = linked.to_string();
                }
                parse_subtitle_file(&upload.bytes, &upload.file_name)?
            }
        };

        tracker.enter(PipelineState::Splitting);
        let chunks = chunk::split(
            &transcript.text,
            self.chunking.budget,
            self.chunking.overlap,
        );
        if chunks.is_empty() {
            return Err(TldwError::transcript_unavailable(
                video_key,
                "transcript is empty",
            ));
        }

        let total = chunks.len();
        let mut partials = Vec::with_capacity(total);
        for (i, chunk) in chunks.iter().enumerate() {
            tracker.enter(PipelineState::SummarizingChunks {
                current: i + 1,
                total,
            });
            emit(
                progress,
                ProgressEvent::progress(
                    i + 1,
                    total,
                    Stage::Processing,
                    format!("Summarizing part {} of {}", i + 1, total),
                ),
            )
            .await?;

            let partial = backend
                .generate_content(&chunk_prompt(&chunk.text, i, total, &language))
                .await?;
            partials.push(partial);
        }

        tracker.enter(PipelineState::Finalizing);
        emit(
            progress,
            ProgressEvent::progress(total, total, Stage::Finalizing, "Writing the final summary"),
        )
        .await?;
        let summary = generate_final(
            backend.as_ref(),
            &partials,
            &language,
            request.mode,
            &transcript,
        )
        .await?;

        tracker.enter(PipelineState::Persisting);
        emit(
            progress,
            ProgressEvent::progress(total, total, Stage::Saving, "Saving to history"),
        )
        .await?;
        let warning = match self
            .persist(&video_key, &language, request.mode, &transcript, &summary)
            .await
        {
            Ok(()) => None,
            Err(e) => {
                warn!(video_key = %video_key, error = %e, "failed to save summary history");
                Some(HISTORY_WARNING.to_string())
            }
        };

        Ok(Delivery {
            summary,
            source: transcript.provenance.into(),
            warning,
        })
    }

    /// Create-or-update keyed by video and language.
    async fn persist(
        &self,
        video_key: &str,
        language: &str,
        mode: SummaryMode,
        transcript: &Transcript,
        summary: &str,
    ) -> Result<()> {
        let provenance = SummarySource::from(transcript.provenance);
        match self
            .store
            .find_by_video_and_language(video_key, language)
            .await?
        {
            Some(existing) => {
                self.store
                    .update(
                        existing.id,
                        SummaryUpdate {
                            title: transcript.title.clone(),
                            content: summary.to_string(),
                            mode,
                            provenance,
                        },
                    )
                    .await?;
            }
            None => {
                self.store
                    .create(NewSummary {
                        video_key: video_key.to_string(),
                        title: transcript.title.clone(),
                        content: summary.to_string(),
                        language: language.to_string(),
                        mode,
                        provenance,
                    })
                    .await?;
            }
        }
        Ok(())
    }
}

async fn generate_final(
    backend: &dyn GenerativeBackend,
    partials: &[String],
    language: &str,
    mode: SummaryMode,
    transcript: &Transcript,
) -> Result<String> {
    let joined = partials
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(SECTION_SEPARATOR);

    let summary = backend
        .generate_content(&final_prompt(&joined, language, mode, &transcript.title))
        .await?;
    if summary.trim().is_empty() {
        return Err(TldwError::EmptyGenerationResult);
    }
    Ok(summary)
}

/// Progress emission at a stage or chunk boundary; a gone consumer cancels the run.
async fn emit(progress: &ProgressSender, event: ProgressEvent) -> Result<()> {
    if !progress.is_open() || !progress.emit(event).await {
        info!("progress consumer disconnected, cancelling");
        return Err(TldwError::Cancelled);
    }
    Ok(())
}
