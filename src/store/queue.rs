use std::path::PathBuf;
use tracing::info;

use super::JsonStore;
use crate::error::StoreError;
use crate::media::Track;

/// Per-user FIFO of tracks waiting to be played
pub struct QueueStore {
    store: JsonStore<Track>,
}

impl QueueStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Ok(Self {
            store: JsonStore::open(path)?,
        })
    }

    pub fn enqueue(&self, user_id: &str, track: Track) -> Result<(), StoreError> {
        let title = track.display_title().to_string();
        let len = self.store.update(user_id, |queue| {
            queue.push(track);
            queue.len()
        })?;
        info!("Queued '{}' for user {} ({} pending)", title, user_id, len);
        Ok(())
    }

    /// Append several tracks in one write, keeping their order
    pub fn enqueue_all(&self, user_id: &str, tracks: Vec<Track>) -> Result<usize, StoreError> {
        let count = tracks.len();
        if count == 0 {
            return Ok(0);
        }
        self.store.update(user_id, |queue| queue.extend(tracks))?;
        info!("Queued {} tracks for user {}", count, user_id);
        Ok(count)
    }

    /// Remove and return the front entry, `None` when the queue is empty
    pub fn dequeue(&self, user_id: &str) -> Result<Option<Track>, StoreError> {
        self.store.update(user_id, |queue| {
            if queue.is_empty() {
                None
            } else {
                Some(queue.remove(0))
            }
        })
    }

    pub fn peek(&self, user_id: &str) -> Option<Track> {
        self.store.read(user_id).into_iter().next()
    }

    pub fn clear(&self, user_id: &str) -> Result<(), StoreError> {
        let removed = self.store.update(user_id, |queue| {
            let removed = queue.len();
            queue.clear();
            removed
        })?;
        info!("Cleared {} queued tracks for user {}", removed, user_id);
        Ok(())
    }

    pub fn list(&self, user_id: &str) -> Vec<Track> {
        self.store.read(user_id)
    }

    pub fn len(&self, user_id: &str) -> usize {
        self.store.read(user_id).len()
    }

    pub fn is_empty(&self, user_id: &str) -> bool {
        self.len(user_id) == 0
    }
}
