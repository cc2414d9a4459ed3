pub mod backend;
pub mod chunk;
pub mod clean;
pub mod config;
pub mod error;
pub mod format;
pub mod inflight;
pub mod orchestrator;
pub mod paths;
pub mod progress;
pub mod prompt;
pub mod provider;
pub mod reference;
pub mod store;
pub mod transcript;
pub mod types;
pub mod upload;

pub use backend::{BackendRegistry, GenerativeBackend};
pub use config::PipelineConfig;
pub use error::{BackendErrorKind, Result, TldwError};
pub use orchestrator::{PipelineState, SummarizeRequest, Summarizer};
pub use progress::{ProgressEvent, ProgressSender, Stage};
pub use provider::{Provider, ProviderConfig};
pub use reference::VideoId;
pub use store::{JsonFileSummaryStore, MemorySummaryStore, SummaryStore};
pub use types::{Segment, SummaryMode, SummaryRecord, SummarySource, Transcript};
pub use upload::{FsUploadStore, SrtId, UploadStore};
