//! Receipt store persisted as one JSON object on disk.
//!
//! The file maps `"<meeting>/<session>"` to a vote id. It is read once on
//! open and rewritten in full on every `put`, via a sibling temp file and a
//! rename so a crash never leaves a half-written store behind.

use plenum_application::ports::receipt_store::{ReceiptError, ReceiptStore};
use plenum_domain::{ReceiptKey, VoteId};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

pub struct JsonFileReceiptStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, VoteId>>,
}

impl JsonFileReceiptStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReceiptError> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(
            "Opened receipt store {} with {} receipts",
            path.display(),
            entries.len()
        );

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, VoteId>) -> Result<(), ReceiptError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl ReceiptStore for JsonFileReceiptStore {
    fn get(&self, key: &ReceiptKey) -> Result<Option<VoteId>, ReceiptError> {
        let entries = self.entries.lock().map_err(|_| ReceiptError::Poisoned)?;
        Ok(entries.get(&key.storage_key()).cloned())
    }

    fn put(&self, key: &ReceiptKey, vote_id: &VoteId) -> Result<(), ReceiptError> {
        let mut entries = self.entries.lock().map_err(|_| ReceiptError::Poisoned)?;
        if entries.get(&key.storage_key()) == Some(vote_id) {
            return Ok(());
        }
        entries.insert(key.storage_key(), vote_id.clone());
        self.persist(&entries)
    }
}
