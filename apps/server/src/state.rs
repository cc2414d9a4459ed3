use tldw_core::{PipelineConfig, Summarizer, progress::DEFAULT_PROGRESS_BUFFER};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub summarizer: Summarizer,
    pub progress_buffer: usize,
}

impl AppState {
    pub fn new(summarizer: Summarizer) -> Self {
        Self {
            summarizer,
            progress_buffer: DEFAULT_PROGRESS_BUFFER,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            summarizer: Summarizer::from_config(config),
            progress_buffer: config.progress_buffer,
        }
    }
}
