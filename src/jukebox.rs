// Jukebox - the command flows a chat front end drives
// Every method blocks; the caller decides which worker thread runs it

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::media::{
    Artifact, AudioFetcher, Catalog, FetchOutcome, Ffmpeg, Locator, MediaResolver, Track, YtDlp,
};
use crate::store::{HistoryEntry, HistoryStore, QueueStore};

/// What to hand back to the user for one track
#[derive(Debug)]
pub enum Delivery {
    Audio { track: Track, artifact: Artifact },
    /// The track was too large to upload at any bitrate
    Link { track: Track, locator: String },
}

impl Delivery {
    pub fn track(&self) -> &Track {
        match self {
            Delivery::Audio { track, .. } | Delivery::Link { track, .. } => track,
        }
    }

    fn from_outcome(track: Track, outcome: FetchOutcome) -> Self {
        match outcome {
            FetchOutcome::Artifact(artifact) => Delivery::Audio { track, artifact },
            FetchOutcome::LinkFallback(locator) => Delivery::Link { track, locator },
        }
    }
}

#[derive(Debug)]
pub enum PlayOutcome {
    Ready(Delivery),
    Enqueued { count: usize },
}

pub struct Jukebox {
    resolver: MediaResolver,
    fetcher: AudioFetcher,
    queue: QueueStore,
    history: HistoryStore,
    search_results: usize,
}

impl Jukebox {
    pub fn new(
        resolver: MediaResolver,
        fetcher: AudioFetcher,
        queue: QueueStore,
        history: HistoryStore,
        search_results: usize,
    ) -> Self {
        Self {
            resolver,
            fetcher,
            queue,
            history,
            search_results,
        }
    }

    /// Wire up the yt-dlp/ffmpeg backends and the JSON stores from config
    pub fn from_config(config: &Config) -> std::result::Result<Self, StoreError> {
        let ytdlp = Arc::new(YtDlp::new(&config.catalog.ytdlp_path));
        let catalog: Arc<dyn Catalog> = ytdlp.clone();
        let ffmpeg = Arc::new(Ffmpeg::new(&config.catalog.ffmpeg_path, config.fetch.channels));

        let fetcher = AudioFetcher::new(ytdlp, ffmpeg, &config.downloads_dir, config.fetch.max_upload_bytes)
            .with_title_tagging(config.fetch.tag_title);

        Ok(Self::new(
            MediaResolver::new(catalog),
            fetcher,
            QueueStore::open(config.queue_file())?,
            HistoryStore::open(config.history_file())?,
            config.catalog.search_results,
        ))
    }

    /// Candidates for a selectable result list; each track's locator is what `play` takes back
    pub fn search(&self, query: &str) -> Result<Vec<Track>> {
        Ok(self.resolver.search(query, self.search_results)?)
    }

    /// Play a single track now, or enqueue every entry of a playlist
    pub fn play(&self, user_id: &str, raw: &str) -> Result<PlayOutcome> {
        let locator = Locator::parse(raw)?;

        if locator.is_playlist() {
            let tracks = self.resolver.extract_playlist(locator.url())?;
            let count = self.queue.enqueue_all(user_id, tracks)?;
            return Ok(PlayOutcome::Enqueued { count });
        }

        let track = self.resolver.resolve_track(locator.url())?;
        let outcome = self.fetcher.fetch(&track, user_id)?;
        Ok(PlayOutcome::Ready(Delivery::from_outcome(track, outcome)))
    }

    /// Fetch the next queued track, `None` when the queue is empty.
    ///
    /// The entry is consumed before fetching, so a failed fetch does not put it back.
    pub fn play_next(&self, user_id: &str) -> Result<Option<Delivery>> {
        let Some(mut track) = self.queue.dequeue(user_id)? else {
            return Ok(None);
        };
        track.locator = track.fetch_locator();

        info!("Playing next queued track '{}' for user {}", track.display_title(), user_id);
        let outcome = self.fetcher.fetch(&track, user_id)?;
        Ok(Some(Delivery::from_outcome(track, outcome)))
    }

    /// Record a delivered track and free its artifact
    pub fn finish(&self, user_id: &str, delivery: Delivery) -> Result<HistoryEntry> {
        match delivery {
            Delivery::Audio { track, artifact } => {
                let entry = self.record_play(user_id, &track)?;
                if let Err(e) = artifact.release() {
                    warn!("Failed to remove delivered artifact: {}", e);
                }
                Ok(entry)
            }
            Delivery::Link { track, .. } => self.record_play(user_id, &track),
        }
    }

    pub fn record_play(&self, user_id: &str, track: &Track) -> Result<HistoryEntry> {
        Ok(self.history.record_play(user_id, track)?)
    }

    pub fn enqueue(&self, user_id: &str, track: Track) -> Result<()> {
        Ok(self.queue.enqueue(user_id, track)?)
    }

    pub fn queue(&self, user_id: &str) -> Vec<Track> {
        self.queue.list(user_id)
    }

    pub fn peek(&self, user_id: &str) -> Option<Track> {
        self.queue.peek(user_id)
    }

    pub fn clear_queue(&self, user_id: &str) -> Result<()> {
        Ok(self.queue.clear(user_id)?)
    }

    pub fn history(&self, user_id: &str, limit: usize) -> Vec<HistoryEntry> {
        self.history.get_history(user_id, limit)
    }
}
