//! Summary history: the record store the pipeline reads for cache hits and upserts into.

use std::{io, path::PathBuf};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::{Result, TldwError},
    types::{NewSummary, SummaryRecord, SummaryUpdate},
};

#[async_trait]
pub trait SummaryStore: Send + Sync {
    async fn find_by_video_and_language(
        &self,
        video_key: &str,
        language: &str,
    ) -> Result<Option<SummaryRecord>>;

    async fn create(&self, new: NewSummary) -> Result<SummaryRecord>;

    async fn update(&self, id: Uuid, update: SummaryUpdate) -> Result<SummaryRecord>;

    /// Most recent first.
    async fn list(&self) -> Result<Vec<SummaryRecord>>;
}

fn same_video_and_language(record: &SummaryRecord, video_key: &str, language: &str) -> bool {
    record.video_key == video_key && record.language.eq_ignore_ascii_case(language)
}

fn not_found(id: Uuid) -> TldwError {
    TldwError::PersistenceFailure(format!("summary {id} does not exist"))
}

fn newest_first(mut records: Vec<SummaryRecord>) -> Vec<SummaryRecord> {
    records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    records
}

#[derive(Debug, Default)]
pub struct MemorySummaryStore {
    records: RwLock<Vec<SummaryRecord>>,
}

impl MemorySummaryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SummaryStore for MemorySummaryStore {
    async fn find_by_video_and_language(
        &self,
        video_key: &str,
        language: &str,
    ) -> Result<Option<SummaryRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .find(|r| same_video_and_language(r, video_key, language))
            .cloned())
    }

    async fn create(&self, new: NewSummary) -> Result<SummaryRecord> {
        let record = SummaryRecord::create(new);
        self.records.write().await.push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: Uuid, update: SummaryUpdate) -> Result<SummaryRecord> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| not_found(id))?;
        record.apply(update);
        Ok(record.clone())
    }

    async fn list(&self) -> Result<Vec<SummaryRecord>> {
        Ok(newest_first(self.records.read().await.clone()))
    }
}

/// History kept in one pretty-printed JSON file, rewritten on every change.
#[derive(Debug)]
pub struct JsonFileSummaryStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileSummaryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<SummaryRecord>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(json) if json.trim().is_empty() => Ok(Vec::new()),
            Ok(json) => serde_json::from_str(&json).map_err(|e| {
                TldwError::PersistenceFailure(format!("{}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(TldwError::PersistenceFailure(format!(
                "{}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn save(&self, records: &[SummaryRecord]) -> Result<()> {
        let write = async {
            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let json = serde_json::to_string_pretty(records)?;
            let tmp = self.path.with_extension("json.tmp");
            tokio::fs::write(&tmp, json).await?;
            tokio::fs::rename(&tmp, &self.path).await?;
            Ok::<_, TldwError>(())
        };

        write.await.map_err(|e| {
            TldwError::PersistenceFailure(format!("{}: {e}", self.path.display()))
        })?;
        debug!(path = %self.path.display(), records = records.len(), "history saved");
        Ok(())
    }
}

#[async_trait]
impl SummaryStore for JsonFileSummaryStore {
    async fn find_by_video_and_language(
        &self,
        video_key: &str,
        language: &str,
    ) -> Result<Option<SummaryRecord>> {
        let _guard = self.lock.lock().await;
        Ok(self
            .load()
            .await?
            .into_iter()
            .find(|r| same_video_and_language(r, video_key, language)))
    }

    async fn create(&self, new: NewSummary) -> Result<SummaryRecord> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let record = SummaryRecord::create(new);
        records.push(record.clone());
        self.save(&records).await?;
        Ok(record)
    }

    async fn update(&self, id: Uuid, update: SummaryUpdate) -> Result<SummaryRecord> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| not_found(id))?;
        record.apply(update);
        let updated = record.clone();
        self.save(&records).await?;
        Ok(updated)
    }

    async fn list(&self) -> Result<Vec<SummaryRecord>> {
        let _guard = self.lock.lock().await;
        Ok(newest_first(self.load().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SummaryMode, SummarySource};

    fn new_summary(language: &str) -> NewSummary {
        NewSummary {
            video_key: "dQw4w9WgXcQ".into(),
            title: "Never gonna give you up".into(),
            content: "🎯 Overview\nA song.".into(),
            language: language.into(),
            mode: SummaryMode::Video,
            provenance: SummarySource::Youtube,
        }
    }

    fn update() -> SummaryUpdate {
        SummaryUpdate {
            title: "Updated".into(),
            content: "new".into(),
            mode: SummaryMode::Podcast,
            provenance: SummarySource::Whisper,
        }
    }

    async fn exercise(store: &dyn SummaryStore) {
        assert!(store
            .find_by_video_and_language("dQw4w9WgXcQ", "en")
            .await
            .unwrap()
            .is_none());

        let created = store.create(new_summary("en")).await.unwrap();
        store.create(new_summary("ja")).await.unwrap();

        let found = store
            .find_by_video_and_language("dQw4w9WgXcQ", "EN")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);

        let updated = store.update(created.id, update()).await.unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.provenance, SummarySource::Whisper);
        assert!(updated.updated_at >= created.updated_at);

        assert_eq!(store.list().await.unwrap().len(), 2);
        assert!(matches!(
            store.update(Uuid::new_v4(), update()).await,
            Err(TldwError::PersistenceFailure(_))
        ));
    }

    #[tokio::test]
    async fn memory_store_contract() {
        exercise(&MemorySummaryStore::new()).await;
    }

    #[tokio::test]
    async fn json_file_store_contract_and_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("history.json");

        exercise(&JsonFileSummaryStore::new(&path)).await;

        let reopened = JsonFileSummaryStore::new(&path);
        let record = reopened
            .find_by_video_and_language("dQw4w9WgXcQ", "en")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.title, "Updated");
    }

    #[tokio::test]
    async fn corrupt_history_is_a_persistence_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let err = JsonFileSummaryStore::new(&path)
            .find_by_video_and_language("x", "en")
            .await
            .unwrap_err();
        assert!(matches!(err, TldwError::PersistenceFailure(_)));
    }
}
