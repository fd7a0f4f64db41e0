//! In-memory ledger backend.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::LedgerError;
use crate::store::traits::{LedgerDocument, LedgerStore, parse_document};

/// Holds the serialized document in memory.
///
/// Stores raw JSON rather than a map so a corrupt document can be seeded.
#[derive(Default)]
pub struct MemoryStore {
    raw: Mutex<Option<String>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an arbitrary (possibly invalid) serialized document.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Mutex::new(Some(raw.into())),
            ..Self::default()
        }
    }

    /// Make every subsequent `save` fail.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Current serialized document.
    pub fn raw(&self) -> Option<String> {
        self.raw.lock().ok().and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn load(&self) -> Result<LedgerDocument, LedgerError> {
        let raw = self
            .raw
            .lock()
            .map_err(|_| LedgerError::Unavailable("memory store lock poisoned".into()))?
            .clone();
        match raw {
            Some(raw) if !raw.trim().is_empty() => parse_document(&raw),
            _ => Ok(LedgerDocument::new()),
        }
    }

    async fn save(&self, document: &LedgerDocument) -> Result<(), LedgerError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("saves disabled".into()));
        }
        let json = serde_json::to_string(document)?;
        *self
            .raw
            .lock()
            .map_err(|_| LedgerError::Unavailable("memory store lock poisoned".into()))? =
            Some(json);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
