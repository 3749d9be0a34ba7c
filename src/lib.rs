// TubeTunes Library - the core behind the music chat bot
// Chat front ends call into Jukebox; everything below it is swappable

pub mod config;  // settings and paths
pub mod error;   // what can go wrong, and who hears about it
pub mod jukebox; // command flows: search, play, next, history
pub mod media;   // resolving, downloading, transcoding
pub mod store;   // per-user queues and history

// Export the stuff front ends actually use
pub use config::Config;
pub use error::{Error, MediaError, Result, StoreError};
pub use jukebox::{Delivery, Jukebox, PlayOutcome};
pub use media::{Artifact, AudioFetcher, FetchOutcome, Locator, MediaResolver, Track};
pub use store::{HistoryEntry, HistoryStore, QueueStore};
