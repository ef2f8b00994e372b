//! Private receipt store port
//!
//! Local key-value storage of `(meeting, session) -> vote id`. Writes
//! overwrite by key and are idempotent, so no coordination is needed.

use plenum_domain::{ReceiptKey, VoteId};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReceiptError {
    #[error("Receipt store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Receipt store is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Receipt store lock poisoned")]
    Poisoned,
}

/// Device-local receipt storage.
pub trait ReceiptStore: Send + Sync {
    /// Receipt for `key`. `None` means "not voted from this device".
    fn get(&self, key: &ReceiptKey) -> Result<Option<VoteId>, ReceiptError>;

    /// Store or overwrite the receipt for `key`.
    fn put(&self, key: &ReceiptKey, vote_id: &VoteId) -> Result<(), ReceiptError>;
}

/// Receipts kept in memory for the life of the process.
#[derive(Debug, Default)]
pub struct InMemoryReceiptStore {
    entries: Mutex<HashMap<ReceiptKey, VoteId>>,
}

impl InMemoryReceiptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReceiptStore for InMemoryReceiptStore {
    fn get(&self, key: &ReceiptKey) -> Result<Option<VoteId>, ReceiptError> {
        let entries = self.entries.lock().map_err(|_| ReceiptError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &ReceiptKey, vote_id: &VoteId) -> Result<(), ReceiptError> {
        let mut entries = self.entries.lock().map_err(|_| ReceiptError::Poisoned)?;
        entries.insert(key.clone(), vote_id.clone());
        Ok(())
    }
}
