use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::{
    Client,
    multipart::{Form, Part},
};
use serde::Deserialize;
use tracing::{info, warn};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use super::SpeechToText;
use crate::{
    backend::errors,
    error::{Result, TldwError},
    provider::Provider,
    types::Segment,
};

/// Whisper model on local disk, run through whisper.cpp.
#[derive(Debug, Clone)]
pub struct WhisperLocal {
    model_path: PathBuf,
}

impl WhisperLocal {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
        }
    }
}

extern "C" fn discard_whisper_log(
    _level: u32,
    _message: *const std::ffi::c_char,
    _user_data: *mut std::ffi::c_void,
) {
}

/// Stop whisper.cpp from writing its model-loading chatter to stderr.
pub fn silence_whisper_logs() {
    // SAFETY: the callback ignores every argument and the user-data pointer is null.
    unsafe {
        whisper_rs::set_log_callback(Some(discard_whisper_log), std::ptr::null_mut());
    }
}

fn whisper_failed(wav: &Path, reason: impl std::fmt::Display) -> TldwError {
    TldwError::transcript_unavailable(wav.display().to_string(), format!("whisper: {reason}"))
}

/// Blocking: loads the model and runs the full decode over 16 kHz mono samples.
fn transcribe_with_model(model_path: &Path, wav: &Path) -> Result<Vec<Segment>> {
    let mut reader = hound::WavReader::open(wav).map_err(|e| whisper_failed(wav, e))?;
    let samples: Vec<f32> = reader
        .samples::<i16>()
        .map(|s| s.map(|s| s as f32 / i16::MAX as f32))
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| whisper_failed(wav, e))?;

    let model = model_path
        .to_str()
        .ok_or_else(|| whisper_failed(wav, "model path is not valid UTF-8"))?;
    let ctx_params = WhisperContextParameters {
        use_gpu: true,
        flash_attn: true,
        ..Default::default()
    };
    let ctx = WhisperContext::new_with_params(model, ctx_params)
        .map_err(|e| whisper_failed(wav, e))?;

    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 5 });
    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);

    let mut state = ctx.create_state().map_err(|e| whisper_failed(wav, e))?;
    state
        .full(params, &samples)
        .map_err(|e| whisper_failed(wav, e))?;

    let segments = state
        .as_iter()
        .filter_map(|segment| {
            let text = segment.to_str().ok()?;
            Some(Segment {
                start: segment.start_timestamp() as f64 / 100.0,
                end: segment.end_timestamp() as f64 / 100.0,
                text: text.to_string(),
            })
        })
        .collect();

    Ok(segments)
}

#[async_trait]
impl SpeechToText for WhisperLocal {
    fn name(&self) -> &str {
        "whisper-local"
    }

    async fn transcribe(&self, wav: &Path) -> Result<Vec<Segment>> {
        info!(model = %self.model_path.display(), "running local whisper model");
        let model_path = self.model_path.clone();
        let wav = wav.to_path_buf();

        tokio::task::spawn_blocking(move || transcribe_with_model(&model_path, &wav))
            .await
            .map_err(|e| {
                TldwError::transcript_unavailable("audio", format!("whisper task failed: {e}"))
            })?
    }
}

pub const OPENAI_TRANSCRIPTION_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
pub const OPENAI_TRANSCRIPTION_MODEL: &str = "whisper-1";
/// Upload limit of the hosted transcription endpoint.
pub const MAX_UPLOAD_BYTES: u64 = 25 * 1024 * 1024;

/// Hosted OpenAI transcription endpoint.
pub struct OpenAiWhisper {
    api_key: String,
    endpoint: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Vec<Segment>,
}

impl OpenAiWhisper {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: OPENAI_TRANSCRIPTION_URL.to_string(),
            client: Client::new(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl SpeechToText for OpenAiWhisper {
    fn name(&self) -> &str {
        "openai-whisper"
    }

    async fn transcribe(&self, wav: &Path) -> Result<Vec<Segment>> {
        let bytes = tokio::fs::read(wav).await?;
        if bytes.len() as u64 > MAX_UPLOAD_BYTES {
            warn!(bytes = bytes.len(), "audio exceeds hosted transcription limit");
            return Err(TldwError::transcript_unavailable(
                "audio",
                "audio is too long for the hosted transcription endpoint; configure TLDW_WHISPER_MODEL",
            ));
        }

        let form = Form::new()
            .text("model", OPENAI_TRANSCRIPTION_MODEL)
            .text("response_format", "verbose_json")
            .part(
                "file",
                Part::bytes(bytes)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")?,
            );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| errors::transport_failed(Provider::Openai, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(errors::request_failed(Provider::Openai, status.as_u16(), &body));
        }

        let body: VerboseTranscription = response.json().await?;
        if body.segments.is_empty() && !body.text.trim().is_empty() {
            return Ok(vec![Segment {
                start: 0.0,
                end: 0.0,
                text: body.text,
            }]);
        }
        Ok(body.segments)
    }
}
