// Per-user persisted state - queues and play history
// Each store is one JSON file mapping user id -> ordered entries, rewritten in full on every mutation

pub mod history; // bounded, timestamped play log
pub mod queue;   // FIFO of pending tracks

pub use history::{HistoryEntry, HistoryStore, HISTORY_CAPACITY};
pub use queue::QueueStore;

use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::StoreError;

type Collection<T> = BTreeMap<String, Vec<T>>;

/// A keyed collection of per-user lists backed by a single JSON file.
///
/// Mutations run read-modify-write under one lock and land on disk through a
/// rename, so a reader sees either the old file or the new one. An absent file
/// is an empty collection; an unparseable one is logged and treated as empty,
/// and the next mutation overwrites it.
pub struct JsonStore<T> {
    path: PathBuf,
    write_lock: Mutex<()>,
    _entries: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> JsonStore<T> {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
            _entries: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of one user's entries
    pub fn read(&self, user_id: &str) -> Vec<T> {
        self.load().remove(user_id).unwrap_or_default()
    }

    /// Run `mutate` on one user's entries and persist the result.
    ///
    /// Concurrent calls are serialized, so no update is lost and no two callers
    /// observe the same state.
    pub fn update<R>(&self, user_id: &str, mutate: impl FnOnce(&mut Vec<T>) -> R) -> Result<R, StoreError> {
        let _guard = self.write_lock.lock();

        let mut collection = self.load();
        let mut entries = collection.remove(user_id).unwrap_or_default();
        let was_empty = entries.is_empty();
        let result = mutate(&mut entries);

        // Empty before and after: nothing to write
        if was_empty && entries.is_empty() {
            return Ok(result);
        }
        if !entries.is_empty() {
            collection.insert(user_id.to_string(), entries);
        }

        self.persist(&collection)?;
        Ok(result)
    }

    fn load(&self) -> Collection<T> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Collection::new(),
            Err(e) => {
                warn!("Failed to read {}, treating it as empty: {}", self.path.display(), e);
                return Collection::new();
            }
        };

        match serde_json::from_slice(&content) {
            Ok(collection) => collection,
            Err(e) => {
                warn!("{} is corrupted, resetting it: {}", self.path.display(), e);
                Collection::new()
            }
        }
    }

    fn persist(&self, collection: &Collection<T>) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(collection)?;

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
        tmp.write_all(&json).map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.as_file().sync_all().map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| StoreError::io(&self.path, e.error))?;

        debug!("Saved {} users to {}", collection.len(), self.path.display());
        Ok(())
    }
}
