use serde::{Deserialize, Serialize};

use super::locator::canonical_url;

/// A resolved catalog item. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub duration: Option<u64>, // seconds, unknown for some catalog entries
    #[serde(rename = "url", default)]
    pub locator: String, // enough to re-fetch the track on its own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl Track {
    pub fn new(id: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            duration: None,
            locator: locator.into(),
            thumbnail: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_duration(mut self, seconds: u64) -> Self {
        self.duration = Some(seconds);
        self
    }

    /// Locator to fetch from. Entries persisted without a URL fall back to the watch URL of their id.
    pub fn fetch_locator(&self) -> String {
        let locator = self.locator.trim();
        if locator.is_empty() && !self.id.trim().is_empty() {
            canonical_url(self.id.trim())
        } else {
            locator.to_string()
        }
    }

    pub fn display_title(&self) -> &str {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => title,
            _ => "Unknown",
        }
    }

    /// Title cut to `max_chars` characters with a trailing ellipsis when it was longer
    pub fn short_title(&self, max_chars: usize) -> String {
        let title = self.display_title();
        if title.chars().count() > max_chars {
            let cut: String = title.chars().take(max_chars).collect();
            format!("{}...", cut)
        } else {
            title.to_string()
        }
    }

    /// `MM:SS`, unknown duration formats as zero
    pub fn duration_label(&self) -> String {
        let seconds = self.duration.unwrap_or(0);
        format!("{:02}:{:02}", seconds / 60, seconds % 60)
    }
}
