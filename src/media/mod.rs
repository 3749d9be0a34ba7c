// Media pipeline - everything between a user's query and an audio file on disk
// Resolution is metadata only, fetching downloads and transcodes

pub mod catalog;  // seams to the catalog, downloader and encoder
pub mod ffmpeg;   // transcoder backend
pub mod fetcher;  // bitrate ladder + link fallback
pub mod locator;  // classifies raw user input
pub mod resolver; // search, playlists, single lookups
pub mod track;
pub mod ytdlp;    // catalog + download backend

pub use catalog::{AudioSource, Catalog, Transcoder};
pub use ffmpeg::Ffmpeg;
pub use fetcher::{Artifact, AudioFetcher, FetchOutcome, BITRATE_LADDER};
pub use locator::Locator;
pub use resolver::MediaResolver;
pub use track::Track;
pub use ytdlp::YtDlp;
