//! Uploaded subtitle files and the identifiers that point at them.
//!
//! Canonical id: `srt:<fileId>:<videoId>:<fileName>` with `videoId` possibly empty. Ids issued by
//! older clients are base64 of a colon-delimited string and are decoded best-effort:
//!
//! - 4 parts starting with `srt` → canonical layout
//! - 3 parts starting with `srt` → `srt:fileId:fileName` (no video id)
//! - 3 parts otherwise → `fileId:videoId:fileName`
//! - 2 parts → `fileId:fileName`

use std::{fmt, io, path::PathBuf};

use async_trait::async_trait;
use base64::{
    Engine,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    error::{Result, TldwError},
    reference::VideoId,
};

const SRT_PREFIX: &str = "srt";
pub const MAX_SUBTITLE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrtId {
    pub file_id: String,
    pub video_id: Option<VideoId>,
    pub file_name: String,
}

impl SrtId {
    pub fn new(file_id: &str, video_id: Option<VideoId>, file_name: &str) -> Result<Self> {
        validate_file_id(file_id)?;
        validate_file_name(file_name)?;
        Ok(Self {
            file_id: file_id.to_string(),
            video_id,
            file_name: file_name.to_string(),
        })
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.starts_with("srt:") {
            return Self::from_parts(&raw.splitn(4, ':').collect::<Vec<_>>());
        }

        let decoded = decode_legacy(raw).ok_or_else(|| {
            TldwError::upload_invalid(format!("unrecognized subtitle id \"{raw}\""))
        })?;
        debug!(decoded = %decoded, "decoded legacy subtitle id");

        let parts: Vec<&str> = decoded.splitn(4, ':').collect();
        match parts.as_slice() {
            [SRT_PREFIX, _, _, _] => Self::from_parts(&parts),
            [SRT_PREFIX, file_id, rest] => Self::from_fields(file_id, "", rest),
            [file_id, video_id, rest] => Self::from_fields(file_id, video_id, rest),
            [file_id, file_name] => Self::from_fields(file_id, "", file_name),
            // A file name containing ':' splits into a fourth part.
            [file_id, video_id, head, tail] => {
                Self::from_fields(file_id, video_id, &format!("{head}:{tail}"))
            }
            _ => Err(TldwError::upload_invalid("subtitle id has too few fields")),
        }
    }

    fn from_parts(parts: &[&str]) -> Result<Self> {
        match parts {
            [SRT_PREFIX, file_id, video_id, file_name] => {
                Self::from_fields(file_id, video_id, file_name)
            }
            _ => Err(TldwError::upload_invalid(
                "subtitle id must look like srt:fileId:videoId:fileName",
            )),
        }
    }

    fn from_fields(file_id: &str, video_id: &str, file_name: &str) -> Result<Self> {
        let video_id = match video_id.trim() {
            "" => None,
            id => Some(VideoId::parse(id).map_err(|_| {
                TldwError::upload_invalid(format!("\"{id}\" is not a valid video id"))
            })?),
        };
        Self::new(file_id.trim(), video_id, file_name.trim())
    }

    /// Key used for caching and de-duplication when no video id is linked.
    pub fn storage_key(&self) -> String {
        format!("{SRT_PREFIX}:{}", self.file_id)
    }
}

impl fmt::Display for SrtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{SRT_PREFIX}:{}:{}:{}",
            self.file_id,
            self.video_id.as_ref().map_or("", VideoId::as_str),
            self.file_name
        )
    }
}

fn decode_legacy(raw: &str) -> Option<String> {
    let bytes = STANDARD
        .decode(raw)
        .or_else(|_| URL_SAFE_NO_PAD.decode(raw.trim_end_matches('=')))
        .ok()?;
    String::from_utf8(bytes).ok().filter(|s| s.contains(':'))
}

fn validate_file_id(file_id: &str) -> Result<()> {
    let valid = !file_id.is_empty()
        && file_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(TldwError::upload_invalid(format!("invalid file id \"{file_id}\"")))
    }
}

pub fn validate_file_name(file_name: &str) -> Result<()> {
    if file_name.contains(['/', '\\']) || file_name.starts_with('.') {
        return Err(TldwError::upload_invalid(format!(
            "invalid file name \"{file_name}\""
        )));
    }
    if !file_name.to_ascii_lowercase().ends_with(".srt") {
        return Err(TldwError::upload_invalid("only .srt files are accepted"));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct SubtitleUpload {
    pub bytes: Vec<u8>,
    pub video_id: Option<VideoId>,
    pub file_name: String,
}

#[async_trait]
pub trait UploadStore: Send + Sync {
    async fn save(&self, bytes: &[u8], file_name: &str, video_id: Option<VideoId>) -> Result<SrtId>;

    async fn open(&self, id: &SrtId) -> Result<SubtitleUpload>;

    async fn remove(&self, id: &SrtId) -> Result<()>;
}

/// Uploads stored as `<dir>/<fileId>.srt`.
#[derive(Debug, Clone)]
pub struct FsUploadStore {
    dir: PathBuf,
}

impl FsUploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, file_id: &str) -> PathBuf {
        self.dir.join(format!("{file_id}.srt"))
    }
}

#[async_trait]
impl UploadStore for FsUploadStore {
    async fn save(
        &self,
        bytes: &[u8],
        file_name: &str,
        video_id: Option<VideoId>,
    ) -> Result<SrtId> {
        validate_file_name(file_name)?;
        if bytes.is_empty() {
            return Err(TldwError::upload_invalid("subtitle file is empty"));
        }
        if bytes.len() > MAX_SUBTITLE_BYTES {
            return Err(TldwError::upload_invalid("subtitle file is too large"));
        }

        let id = SrtId::new(&Uuid::new_v4().simple().to_string(), video_id, file_name)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.path_for(&id.file_id), bytes).await?;

        info!(file_id = %id.file_id, file_name, bytes = bytes.len(), "stored subtitle upload");
        Ok(id)
    }

    async fn open(&self, id: &SrtId) -> Result<SubtitleUpload> {
        let bytes = match tokio::fs::read(self.path_for(&id.file_id)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(TldwError::upload_invalid(format!(
                    "subtitle file {} not found",
                    id.file_id
                )));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(SubtitleUpload {
            bytes,
            video_id: id.video_id.clone(),
            file_name: id.file_name.clone(),
        })
    }

    async fn remove(&self, id: &SrtId) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(&id.file_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vid() -> VideoId {
        VideoId::parse("dQw4w9WgXcQ").unwrap()
    }

    #[test]
    fn canonical_form_round_trips() {
        let id = SrtId::parse("srt:f1le_ID-9:dQw4w9WgXcQ:my talk.srt").unwrap();
        assert_eq!(id.file_id, "f1le_ID-9");
        assert_eq!(id.video_id, Some(vid()));
        assert_eq!(id.file_name, "my talk.srt");
        assert_eq!(SrtId::parse(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn canonical_form_allows_empty_video_id_and_colons_in_name() {
        let id = SrtId::parse("srt:abc::part 1: intro.srt").unwrap();
        assert_eq!(id.video_id, None);
        assert_eq!(id.file_name, "part 1: intro.srt");
        assert_eq!(id.storage_key(), "srt:abc");
    }

    #[test]
    fn rejects_bad_fields() {
        for raw in [
            "srt:bad/id:dQw4w9WgXcQ:a.srt",
            "srt:abc:short:a.srt",
            "srt:abc:dQw4w9WgXcQ:a.txt",
            "srt:abc:dQw4w9WgXcQ",
            "not base64 at all!",
        ] {
            assert!(
                matches!(SrtId::parse(raw), Err(TldwError::UploadInvalid(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn legacy_base64_forms_decode_best_effort() {
        let four = STANDARD.encode("srt:abc:dQw4w9WgXcQ:talk.srt");
        assert_eq!(SrtId::parse(&four).unwrap().video_id, Some(vid()));

        let three = STANDARD.encode("abc:dQw4w9WgXcQ:talk.srt");
        let id = SrtId::parse(&three).unwrap();
        assert_eq!((id.file_id.as_str(), id.video_id), ("abc", Some(vid())));

        let prefixed_three = STANDARD.encode("srt:abc:talk.srt");
        let id = SrtId::parse(&prefixed_three).unwrap();
        assert_eq!((id.file_id.as_str(), id.video_id.clone()), ("abc", None));

        let two = URL_SAFE_NO_PAD.encode("abc:talk.srt");
        assert_eq!(SrtId::parse(&two).unwrap().file_name, "talk.srt");
    }

    #[tokio::test]
    async fn fs_store_save_open_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsUploadStore::new(dir.path().join("uploads"));

        let id = store
            .save(b"1\n00:00:01,000 --> 00:00:02,000\nhi\n", "talk.srt", Some(vid()))
            .await
            .unwrap();
        let upload = store.open(&id).await.unwrap();
        assert_eq!(upload.video_id, Some(vid()));
        assert!(upload.bytes.starts_with(b"1\n"));

        store.remove(&id).await.unwrap();
        store.remove(&id).await.unwrap();
        assert!(matches!(store.open(&id).await, Err(TldwError::UploadInvalid(_))));
    }

    #[tokio::test]
    async fn fs_store_rejects_non_srt_and_empty_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsUploadStore::new(dir.path());

        assert!(store.save(b"x", "notes.txt", None).await.is_err());
        assert!(store.save(b"", "empty.srt", None).await.is_err());
    }
}
