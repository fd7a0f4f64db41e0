//! Recipient ledger: the cross-thread "already contacted" set.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::LedgerError;
use crate::pipeline::types::RoleTag;
use crate::store::traits::{LedgerDocument, LedgerStore, RecipientRecord};

/// Persistent set of addresses that already received a reply.
///
/// A contact is remembered in memory even when persisting it fails, so the
/// same recipient is not contacted twice while the process is up. `clear`
/// only empties memory after the store accepted the empty document.
pub struct RecipientLedger {
    store: Arc<dyn LedgerStore>,
    records: Mutex<LedgerDocument>,
}

impl RecipientLedger {
    /// Open the ledger. An unreadable or corrupt document starts empty.
    pub async fn open(store: Arc<dyn LedgerStore>) -> Self {
        let records = load_or_empty(store.as_ref()).await;
        info!(
            store = %store.describe(),
            records = records.len(),
            "Recipient ledger opened"
        );
        Self {
            store,
            records: Mutex::new(records),
        }
    }

    /// Re-read the backing document, picking up out-of-band edits.
    pub async fn reload(&self) {
        let fresh = load_or_empty(self.store.as_ref()).await;
        *self.records.lock().await = fresh;
    }

    /// Whether `address` was already contacted.
    pub async fn has(&self, address: &str) -> bool {
        self.records
            .lock()
            .await
            .contains_key(&normalize_address(address))
    }

    pub async fn get(&self, address: &str) -> Option<RecipientRecord> {
        self.records
            .lock()
            .await
            .get(&normalize_address(address))
            .cloned()
    }

    /// Record a successful contact and persist it.
    ///
    /// An existing entry for the same address is replaced. On a save error
    /// the entry is still kept in memory and the error is returned.
    pub async fn record_contact(
        &self,
        address: &str,
        job_title: &str,
        role: Option<RoleTag>,
    ) -> Result<(), LedgerError> {
        let key = normalize_address(address);
        let mut records = self.records.lock().await;

        records.insert(
            key.clone(),
            RecipientRecord {
                timestamp: Utc::now(),
                job_title: job_title.to_string(),
                role_type: role,
            },
        );
        if let Err(e) = self.store.save(&records).await {
            warn!(recipient = %key, error = %e, "Recipient kept in memory only");
            return Err(e);
        }

        debug!(recipient = %key, total = records.len(), "Recipient recorded");
        Ok(())
    }

    /// Forget every recipient. Returns how many were removed.
    pub async fn clear(&self) -> Result<usize, LedgerError> {
        let mut records = self.records.lock().await;
        let removed = records.len();
        self.store.save(&LedgerDocument::new()).await?;
        records.clear();
        info!(removed, "Recipient ledger cleared");
        Ok(removed)
    }

    /// Copy of every record, ordered by address.
    pub async fn snapshot(&self) -> LedgerDocument {
        self.records.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

/// Ledger key for an address: trimmed and lower-cased.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

async fn load_or_empty(store: &dyn LedgerStore) -> LedgerDocument {
    match store.load().await {
        Ok(records) => records,
        Err(e) => {
            warn!(
                store = %store.describe(),
                error = %e,
                "Recipient ledger unreadable, starting empty"
            );
            LedgerDocument::new()
        }
    }
}
