//! Warm-start cache: per-(symbol, date) session data, built once per run.
//!
//! Entries are write-once: the first `get_or_build` for a key runs the
//! builder and stores its result (including a skip), every later call reads
//! it back. The map is owned by an engine instance and passed in explicitly.

use super::session::{SessionData, SkipReason};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub symbol: String,
    pub date: NaiveDate,
}

impl SessionKey {
    pub fn new(symbol: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            date,
        }
    }
}

type Entry = Result<Arc<SessionData>, SkipReason>;

/// Mutex-guarded write-once map of aligned sessions.
#[derive(Debug, Default)]
pub struct WarmStartCache {
    entries: Mutex<HashMap<SessionKey, Entry>>,
}

impl WarmStartCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached entry for `key`, building it on first access.
    ///
    /// The builder runs without the lock held. If two callers race on the
    /// same key, the first insert wins and both observe it.
    pub fn get_or_build<F>(&self, key: &SessionKey, build: F) -> Entry
    where
        F: FnOnce() -> Result<SessionData, SkipReason>,
    {
        if let Some(entry) = self.lock().get(key) {
            return entry.clone();
        }
        let built = build().map(Arc::new);
        self.lock().entry(key.clone()).or_insert(built).clone()
    }

    /// Cached entry without building.
    pub fn get(&self, key: &SessionKey) -> Option<Entry> {
        self.lock().get(key).cloned()
    }

    /// Number of keys populated so far (skips included).
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionKey, Entry>> {
        // Entries are never left half-written, so a poisoned map is still valid.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
