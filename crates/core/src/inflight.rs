use std::{fmt, sync::Arc, time::Instant};

use dashmap::{DashMap, mapref::entry::Entry};

use crate::types::SummaryMode;

/// Identity of one logical summarization request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub input: String,
    pub language: String,
    pub mode: SummaryMode,
    pub backend: String,
}

impl RequestKey {
    pub fn new(
        input: impl Into<String>,
        language: impl Into<String>,
        mode: SummaryMode,
        backend: impl Into<String>,
    ) -> Self {
        Self {
            input: input.into(),
            language: language.into().to_ascii_lowercase(),
            mode,
            backend: backend.into().to_ascii_lowercase(),
        }
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}",
            self.input, self.language, self.mode, self.backend
        )
    }
}

/// Requests currently being processed. Owned by the orchestrator, shared by its clones.
#[derive(Debug, Clone, Default)]
pub struct InFlightTable {
    entries: Arc<DashMap<RequestKey, Instant>>,
}

impl InFlightTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert-if-absent. `None` means an identical request is already running.
    pub fn try_acquire(&self, key: RequestKey) -> Option<InFlightGuard> {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
                Some(InFlightGuard {
                    entries: Arc::clone(&self.entries),
                    key,
                })
            }
        }
    }

    pub fn contains(&self, key: &RequestKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Removes its entry when dropped, whichever way the owning request ends.
#[derive(Debug)]
pub struct InFlightGuard {
    entries: Arc<DashMap<RequestKey, Instant>>,
    key: RequestKey,
}

impl InFlightGuard {
    pub fn key(&self) -> &RequestKey {
        &self.key
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.entries.remove(&self.key);
    }
}
