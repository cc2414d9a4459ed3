use std::{path::PathBuf, sync::Arc};

use tracing::info;

use crate::{
    chunk::{ChunkSettings, DEFAULT_CHUNK_BUDGET, DEFAULT_CHUNK_OVERLAP},
    error::{Result, TldwError},
    paths,
    progress::DEFAULT_PROGRESS_BUFFER,
    provider::Provider,
    transcript::{OpenAiWhisper, SpeechToText, WhisperLocal},
};

pub const DEFAULT_CAPTION_LANGS: &[&str] = &["en", "en-US", "en-GB"];

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub chunking: ChunkSettings,
    pub caption_languages: Vec<String>,
    /// Local whisper model; the hosted endpoint is used when unset.
    pub whisper_model: Option<PathBuf>,
    pub progress_buffer: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: paths::get_root_data_dir(),
            chunking: ChunkSettings::default(),
            caption_languages: DEFAULT_CAPTION_LANGS.iter().map(|s| s.to_string()).collect(),
            whisper_model: None,
            progress_buffer: DEFAULT_PROGRESS_BUFFER,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let data_dir = get("TLDW_DATA_DIR").map_or(defaults.data_dir, PathBuf::from);

        let budget = parse_number(
            get("TLDW_CHUNK_CHARS"),
            "TLDW_CHUNK_CHARS",
            DEFAULT_CHUNK_BUDGET,
        )?;
        let overlap = parse_number(
            get("TLDW_CHUNK_OVERLAP"),
            "TLDW_CHUNK_OVERLAP",
            DEFAULT_CHUNK_OVERLAP,
        )?;
        if budget == 0 || overlap > budget / 2 {
            return Err(TldwError::configuration(format!(
                "TLDW_CHUNK_OVERLAP ({overlap}) must be at most half of TLDW_CHUNK_CHARS ({budget})"
            )));
        }

        let caption_languages = get("TLDW_CAPTION_LANGS")
            .map(|langs| {
                langs
                    .split(',')
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|langs| !langs.is_empty())
            .unwrap_or(defaults.caption_languages);

        // A bare file name is looked up in the models directory.
        let whisper_model = get("TLDW_WHISPER_MODEL").map(|model| {
            let path = PathBuf::from(&model);
            if path.components().count() == 1 {
                paths::get_model_dir(&data_dir).join(model)
            } else {
                path
            }
        });

        let progress_buffer = parse_number(
            get("TLDW_PROGRESS_BUFFER"),
            "TLDW_PROGRESS_BUFFER",
            DEFAULT_PROGRESS_BUFFER,
        )?;

        Ok(Self {
            data_dir,
            chunking: ChunkSettings { budget, overlap },
            caption_languages,
            whisper_model,
            progress_buffer,
        })
    }

    pub fn uploads_dir(&self) -> PathBuf {
        paths::get_uploads_dir(&self.data_dir)
    }

    pub fn history_path(&self) -> PathBuf {
        paths::get_history_path(&self.data_dir)
    }

    pub fn work_dir(&self) -> PathBuf {
        paths::get_work_dir(&self.data_dir)
    }

    /// Local model first, then the hosted endpoint when an OpenAI key is present.
    pub fn speech_backend(&self) -> Option<Arc<dyn SpeechToText>> {
        if let Some(model) = &self.whisper_model {
            info!(model = %model.display(), "speech transcription: local whisper model");
            return Some(Arc::new(WhisperLocal::new(model.clone())));
        }

        match Provider::Openai.validate_api_key() {
            Ok(api_key) => {
                info!("speech transcription: hosted whisper");
                Some(Arc::new(OpenAiWhisper::new(api_key)))
            }
            Err(_) => {
                info!("speech transcription disabled: no local model and no OpenAI key");
                None
            }
        }
    }
}

fn parse_number(value: Option<String>, key: &str, default: usize) -> Result<usize> {
    match value {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| {
            TldwError::configuration(format!("{key} must be a positive integer, got \"{raw}\""))
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<PipelineConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PipelineConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.chunking, ChunkSettings::default());
        assert_eq!(config.caption_languages, vec!["en", "en-US", "en-GB"]);
        assert!(config.whisper_model.is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("TLDW_DATA_DIR", "/srv/tldw"),
            ("TLDW_CHUNK_CHARS", "4000"),
            ("TLDW_CHUNK_OVERLAP", "200"),
            ("TLDW_CAPTION_LANGS", "ja, en ,"),
            ("TLDW_WHISPER_MODEL", "ggml-base.bin"),
        ])
        .unwrap();

        assert_eq!(config.chunking, ChunkSettings { budget: 4000, overlap: 200 });
        assert_eq!(config.caption_languages, vec!["ja", "en"]);
        assert_eq!(
            config.whisper_model,
            Some(PathBuf::from("/srv/tldw/models/ggml-base.bin"))
        );
        assert_eq!(config.history_path(), PathBuf::from("/srv/tldw/history.json"));
        assert_eq!(config.uploads_dir(), PathBuf::from("/srv/tldw/uploads"));
    }

    #[test]
    fn explicit_model_paths_are_kept() {
        let config = config_from(&[("TLDW_WHISPER_MODEL", "/models/ggml-medium.bin")]).unwrap();
        assert_eq!(config.whisper_model, Some(PathBuf::from("/models/ggml-medium.bin")));
    }

    #[test]
    fn rejects_invalid_numbers() {
        assert!(matches!(
            config_from(&[("TLDW_CHUNK_CHARS", "lots")]),
            Err(TldwError::Configuration(_))
        ));
        assert!(config_from(&[("TLDW_CHUNK_CHARS", "100"), ("TLDW_CHUNK_OVERLAP", "100")]).is_err());
    }

    #[test]
    fn overlap_is_bounded_by_half_the_budget() {
        let config =
            config_from(&[("TLDW_CHUNK_CHARS", "8000"), ("TLDW_CHUNK_OVERLAP", "4000")]).unwrap();
        assert_eq!(config.chunking, ChunkSettings { budget: 8000, overlap: 4000 });

        assert!(matches!(
            config_from(&[("TLDW_CHUNK_CHARS", "8000"), ("TLDW_CHUNK_OVERLAP", "7900")]),
            Err(TldwError::Configuration(_))
        ));
    }
}
