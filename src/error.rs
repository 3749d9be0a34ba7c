// Error taxonomy for the bot core
// Resolver/fetcher failures go back to the dispatcher, store read problems never leave the store

/// Result alias used by the dispatcher-facing [`crate::Jukebox`].
pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the media pipeline (resolution and fetching).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// Input is neither a track locator nor a playlist reference.
    /// Raised before any network activity and never retried.
    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    /// Catalog lookup or extraction failed.
    #[error("Resolution failed: {0}")]
    Resolution(String),

    /// Source audio could not be downloaded.
    #[error("Audio download failed: {0}")]
    Download(String),

    /// Transcoding the downloaded audio failed.
    #[error("Audio encoding failed: {0}")]
    Encode(String),
}

/// Failures writing persisted state.
///
/// Reading never produces one of these: an absent file is an empty store and an
/// unparseable one is reset to empty.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Store I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize store: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Umbrella error for the command flows.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    /// True when the user typed something that is not a usable locator.
    pub fn is_invalid_locator(&self) -> bool {
        matches!(self, Error::Media(MediaError::InvalidLocator(_)))
    }
}
