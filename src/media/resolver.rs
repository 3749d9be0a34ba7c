// Media resolution - turns queries and playlist references into tracks
// Metadata only, nothing is downloaded here

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::catalog::{Catalog, RawEntry};
use super::locator::{canonical_url, Locator};
use super::track::Track;
use crate::error::MediaError;

#[derive(Clone)]
pub struct MediaResolver {
    catalog: Arc<dyn Catalog>,
}

impl MediaResolver {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    /// Up to `max_results` matches in catalog order. No matches is an empty vec, not an error.
    pub fn search(&self, query: &str, max_results: usize) -> Result<Vec<Track>, MediaError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(MediaError::Resolution("Search query is empty".to_string()));
        }
        if max_results == 0 {
            return Ok(Vec::new());
        }

        let listing = self.catalog.search(query, max_results)?;
        let tracks: Vec<Track> = listing
            .entries
            .into_iter()
            .flatten()
            .filter_map(into_track)
            .take(max_results)
            .collect();

        debug!("Search '{}' returned {} tracks", query, tracks.len());
        Ok(tracks)
    }

    /// One track per playlist entry, in playlist order.
    ///
    /// Entries the catalog can't describe are skipped; if every entry is unusable the
    /// whole extraction fails.
    pub fn extract_playlist(&self, reference: &str) -> Result<Vec<Track>, MediaError> {
        let locator = Locator::parse(reference)?;
        if !locator.is_playlist() {
            return Err(MediaError::InvalidLocator(format!(
                "{} is not a playlist reference",
                reference.trim()
            )));
        }

        let listing = self.catalog.playlist(locator.url())?;
        let total = listing.entries.len();
        if total == 0 {
            info!("Playlist {} has no entries", locator.url());
            return Ok(Vec::new());
        }

        let tracks: Vec<Track> = listing
            .entries
            .into_iter()
            .flatten()
            .filter_map(into_track)
            .collect();

        if tracks.is_empty() {
            return Err(MediaError::Resolution(format!(
                "None of the {} playlist entries could be resolved",
                total
            )));
        }
        if tracks.len() < total {
            warn!(
                "Skipped {} unresolvable entries in playlist {}",
                total - tracks.len(),
                locator.url()
            );
        }

        info!("Extracted {} tracks from playlist {}", tracks.len(), locator.url());
        Ok(tracks)
    }

    /// Full metadata for a single track locator
    pub fn resolve_track(&self, reference: &str) -> Result<Track, MediaError> {
        let locator = Locator::parse(reference)?;
        let Locator::Track { id, url } = locator else {
            return Err(MediaError::InvalidLocator(format!(
                "{} is a playlist, not a single track",
                reference.trim()
            )));
        };

        let entry = self.catalog.lookup(&url)?;
        let track = into_track(entry).unwrap_or_else(|| Track::new(id, url));
        Ok(track)
    }
}

/// Validate a catalog entry. Entries without any way to re-fetch them are dropped.
fn into_track(entry: RawEntry) -> Option<Track> {
    let id = entry.id.filter(|id| !id.trim().is_empty());

    let locator = entry
        .webpage_url
        .filter(|url| !url.trim().is_empty())
        .or_else(|| entry.url.filter(|url| url.starts_with("http")))
        .or_else(|| id.as_deref().map(canonical_url))?;

    let thumbnail = entry
        .thumbnail
        .filter(|t| !t.is_empty())
        .or_else(|| entry.thumbnails.into_iter().rev().find_map(|t| t.url));

    Some(Track {
        id: id.unwrap_or_default(),
        title: entry.title.filter(|t| !t.trim().is_empty()),
        duration: entry
            .duration
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| d.round() as u64),
        locator,
        thumbnail,
    })
}
