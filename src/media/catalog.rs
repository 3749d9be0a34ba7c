// Seams between the pipeline and the outside world
// yt-dlp/ffmpeg implement these in production, tests swap in in-process fakes

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::MediaError;

/// One item as the catalog reports it, before validation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub webpage_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub thumbnails: Vec<RawThumbnail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawThumbnail {
    #[serde(default)]
    pub url: Option<String>,
}

/// A flat listing (search results or playlist contents), in catalog order.
/// `None` entries are items the catalog could not describe.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Listing {
    #[serde(default)]
    pub entries: Vec<Option<RawEntry>>,
}

/// Metadata-only catalog access
pub trait Catalog: Send + Sync {
    /// Search for up to `max_results` items
    fn search(&self, query: &str, max_results: usize) -> Result<Listing, MediaError>;

    /// Flat listing of a playlist reference
    fn playlist(&self, url: &str) -> Result<Listing, MediaError>;

    /// Full metadata of a single item
    fn lookup(&self, url: &str) -> Result<RawEntry, MediaError>;
}

/// Downloads the best available source audio for a track
pub trait AudioSource: Send + Sync {
    /// Download into `dir`, naming the file `<stem>.<ext>`. Returns the file written.
    fn download(&self, url: &str, dir: &Path, stem: &str) -> Result<PathBuf, MediaError>;
}

/// Transcodes source audio into the deliverable format
pub trait Transcoder: Send + Sync {
    fn encode(&self, input: &Path, output: &Path, bitrate_kbps: u32) -> Result<(), MediaError>;

    /// Extension of the files `encode` produces
    fn extension(&self) -> &'static str {
        "mp3"
    }
}
