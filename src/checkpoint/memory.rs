use std::collections::HashMap;

use parking_lot::RwLock;

use super::{Checkpoint, CheckpointHandle, CheckpointStore};
use crate::error::{Error, Result};

/// In-memory checkpoint store.
///
/// Checkpoints are kept in their serialized form, so a round trip through
/// this store goes through the same codec as the file store.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryCheckpointStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of stored checkpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Store raw text under `key`, bypassing encoding.
    pub fn insert_raw(&self, key: impl Into<String>, json: impl Into<String>) {
        self.entries.write().insert(key.into(), json.into());
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn save(&self, handle: &CheckpointHandle, checkpoint: &Checkpoint) -> Result<()> {
        let json = checkpoint.to_json(&handle.key)?;
        self.entries.write().insert(handle.key.clone(), json);
        Ok(())
    }

    fn load(&self, handle: &CheckpointHandle) -> Result<Checkpoint> {
        let entries = self.entries.read();
        let json = entries
            .get(&handle.key)
            .ok_or_else(|| Error::CheckpointNotFound {
                key: handle.key.clone(),
            })?;
        Checkpoint::from_json(&handle.key, json)
    }

    fn exists(&self, handle: &CheckpointHandle) -> bool {
        self.entries.read().contains_key(&handle.key)
    }
}
