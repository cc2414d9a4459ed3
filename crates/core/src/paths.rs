use std::path::{Path, PathBuf};

pub fn get_root_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("tldw")
}

/// Uploaded subtitle files
pub fn get_uploads_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("uploads")
}

/// Summary history file
pub fn get_history_path(data_dir: &Path) -> PathBuf {
    data_dir.join("history.json")
}

/// Parent of the per-request scratch directories (captions, audio)
pub fn get_work_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("work")
}

pub fn get_model_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("models")
}
