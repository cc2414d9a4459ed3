//! Request handlers.

use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Query, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tldw_core::{SrtId, SummarizeRequest, SummaryRecord, VideoId, progress, reference};
use tokio_stream::{StreamExt, wrappers::ReceiverStream};
use tracing::info;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Liveness probe.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[derive(Serialize)]
pub struct BackendsResponse {
    pub backends: Vec<String>,
}

/// Backends that have a credential and can be requested by name.
pub async fn list_backends(State(state): State<AppState>) -> Json<BackendsResponse> {
    Json(BackendsResponse {
        backends: state.summarizer.backends().available(),
    })
}

/// Runs one summarization in its own task and streams its events, one JSON object per line.
///
/// Dropping the response body closes the channel, which the pipeline treats as cancellation.
pub async fn summarize(
    State(state): State<AppState>,
    payload: Result<Json<SummarizeRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;
    info!(
        url = ?request.url,
        srt_id = ?request.srt_id,
        language = %request.language,
        mode = %request.mode,
        ai_model = %request.ai_model,
        "summarize request"
    );

    let (sender, receiver) = progress::channel(state.progress_buffer);
    let summarizer = state.summarizer.clone();
    tokio::spawn(async move {
        summarizer.run(request, sender).await;
    });

    let lines = ReceiverStream::new(receiver).map(|event| event.to_ndjson());
    Ok((
        [(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)],
        Body::from_stream(lines),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadParams {
    pub file_name: String,
    #[serde(default)]
    pub video_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub srt_id: String,
}

/// Stores a raw SRT body and returns the id to summarize it with.
pub async fn upload_subtitles(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> ApiResult<Json<UploadResponse>> {
    let video_id = match params.video_id.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            VideoId::parse(raw)
                .or_else(|_| reference::resolve(raw))
                .map_err(|_| ApiError::bad_request(format!("\"{raw}\" is not a video id or URL")))?,
        ),
    };

    let srt_id = state
        .summarizer
        .uploads()
        .save(&body, params.file_name.trim(), video_id)
        .await?;

    Ok(Json(UploadResponse {
        srt_id: srt_id.to_string(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleParams {
    pub srt_id: String,
}

/// Deletes a stored upload. Unknown ids succeed.
pub async fn delete_subtitles(
    State(state): State<AppState>,
    Query(params): Query<SubtitleParams>,
) -> ApiResult<StatusCode> {
    let srt_id = SrtId::parse(&params.srt_id)?;
    state.summarizer.uploads().remove(&srt_id).await?;
    info!(file_id = %srt_id.file_id, "removed subtitle upload");
    Ok(StatusCode::NO_CONTENT)
}

/// Saved summaries, most recently updated first.
pub async fn list_history(State(state): State<AppState>) -> ApiResult<Json<Vec<SummaryRecord>>> {
    Ok(Json(state.summarizer.store().list().await?))
}
