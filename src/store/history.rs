use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use super::JsonStore;
use crate::error::StoreError;
use crate::media::Track;

/// Most entries kept per user; older plays are dropped first
pub const HISTORY_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub track: Track,
    pub timestamp: DateTime<Utc>, // UTC, whole seconds
}

impl HistoryEntry {
    /// `YYYY-MM-DDTHH:MM`, the form shown in history listings
    pub fn short_timestamp(&self) -> String {
        self.timestamp.format("%Y-%m-%dT%H:%M").to_string()
    }
}

/// Per-user log of completed plays, oldest first
pub struct HistoryStore {
    store: JsonStore<HistoryEntry>,
}

impl HistoryStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Ok(Self {
            store: JsonStore::open(path)?,
        })
    }

    pub fn record_play(&self, user_id: &str, track: &Track) -> Result<HistoryEntry, StoreError> {
        self.record_play_at(user_id, track, Utc::now())
    }

    pub fn record_play_at(
        &self,
        user_id: &str,
        track: &Track,
        played_at: DateTime<Utc>,
    ) -> Result<HistoryEntry, StoreError> {
        let entry = HistoryEntry {
            track: track.clone(),
            timestamp: played_at.trunc_subsecs(0),
        };

        let recorded = entry.clone();
        self.store.update(user_id, move |history| {
            history.push(recorded);
            if history.len() > HISTORY_CAPACITY {
                let excess = history.len() - HISTORY_CAPACITY;
                history.drain(..excess);
            }
        })?;

        info!("Recorded play of '{}' for user {}", track.display_title(), user_id);
        Ok(entry)
    }

    /// The most recent `limit` plays, oldest first within that window
    pub fn get_history(&self, user_id: &str, limit: usize) -> Vec<HistoryEntry> {
        let mut history = self.store.read(user_id);
        let start = history.len().saturating_sub(limit);
        history.split_off(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;

    fn track(n: usize) -> Track {
        Track::new(format!("id{}", n), format!("https://youtu.be/track{:06}", n)).with_title(format!("Track {}", n))
    }

    fn open(dir: &tempfile::TempDir) -> HistoryStore {
        HistoryStore::open(dir.path().join("history.json")).unwrap()
    }

    #[test]
    fn test_window_is_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        let history = open(&dir);

        for n in 0..5 {
            history.record_play("42", &track(n)).unwrap();
        }

        let recent: Vec<String> = history.get_history("42", 3).into_iter().map(|e| e.track.id).collect();
        assert_eq!(recent, ["id2", "id3", "id4"]);
        assert_eq!(history.get_history("42", 50).len(), 5);
        assert!(history.get_history("42", 0).is_empty());
        assert!(history.get_history("someone-else", 10).is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let history = open(&dir);

        for n in 0..130 {
            history.record_play("42", &track(n)).unwrap();
        }

        let all = history.get_history("42", HISTORY_CAPACITY);
        assert_eq!(all.len(), HISTORY_CAPACITY);
        assert_eq!(all.first().unwrap().track.id, "id30");
        assert_eq!(all.last().unwrap().track.id, "id129");
        assert_eq!(history.get_history("42", 1000).len(), HISTORY_CAPACITY);
    }

    #[test]
    fn test_timestamps_are_whole_seconds() {
        let dir = tempfile::tempdir().unwrap();
        let history = open(&dir);

        let played_at = Utc.with_ymd_and_hms(2024, 3, 9, 17, 45, 12).unwrap()
            + chrono::Duration::milliseconds(789);
        let entry = history.record_play_at("42", &track(1), played_at).unwrap();

        assert_eq!(entry.timestamp, Utc.with_ymd_and_hms(2024, 3, 9, 17, 45, 12).unwrap());
        assert_eq!(entry.short_timestamp(), "2024-03-09T17:45");
        assert_eq!(history.get_history("42", 1), vec![entry]);
    }

    #[test]
    fn test_unparseable_file_behaves_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let history = open(&dir);
        history.record_play("42", &track(1)).unwrap();
        history.record_play("42", &track(2)).unwrap();

        fs::write(dir.path().join("history.json"), "[[[ definitely not history").unwrap();

        history.record_play("42", &track(3)).unwrap();
        let entries = history.get_history("42", 10);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].track.id, "id3");
    }

    #[test]
    fn test_persisted_entries_flatten_the_track() {
        let dir = tempfile::tempdir().unwrap();
        let history = open(&dir);
        history.record_play("42", &track(1).with_duration(90)).unwrap();

        let on_disk: serde_json::Value =
            serde_json::from_slice(&fs::read(dir.path().join("history.json")).unwrap()).unwrap();
        let entry = &on_disk["42"][0];
        assert_eq!(entry["title"], "Track 1");
        assert_eq!(entry["url"], "https://youtu.be/track000001");
        assert_eq!(entry["duration"], 90);
        assert!(entry["timestamp"].is_string());
    }
}
