// Audio fetching - download once, then walk the bitrate ladder until the artifact fits
// Falls back to handing out the link when even the lowest rung is too large

use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::catalog::{AudioSource, Transcoder};
use super::locator::Locator;
use super::track::Track;
use crate::error::MediaError;

/// Encoding bitrates in kbps, tried in this order
pub const BITRATE_LADDER: [u32; 3] = [192, 128, 96];

/// A fully written audio file owned by the caller
#[derive(Debug)]
pub struct Artifact {
    path: PathBuf,
    bitrate_kbps: u32,
    size_bytes: u64,
}

impl Artifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bitrate_kbps(&self) -> u32 {
        self.bitrate_kbps
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Delete the file once it has been delivered
    pub fn release(self) -> std::io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Keep the file and take over its path
    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

#[derive(Debug)]
pub enum FetchOutcome {
    Artifact(Artifact),
    /// No encoding fit the size limit; carries the link to the track
    LinkFallback(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FetchState {
    Requested,
    Downloading,
    Encoding { rung: usize, source: PathBuf },
    SizeExceeded { rung: usize, size: u64, source: PathBuf },
}

pub struct AudioFetcher {
    source: Arc<dyn AudioSource>,
    transcoder: Arc<dyn Transcoder>,
    downloads_dir: PathBuf,
    max_bytes: u64,
    tag_title: bool,
}

/// Removes a scratch file when dropped, unless it was handed over
struct ScratchFile {
    path: PathBuf,
    armed: bool,
}

impl ScratchFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn keep(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if self.armed {
            let _ = fs::remove_file(&self.path);
        }
    }
}

impl AudioFetcher {
    pub fn new(
        source: Arc<dyn AudioSource>,
        transcoder: Arc<dyn Transcoder>,
        downloads_dir: impl Into<PathBuf>,
        max_bytes: u64,
    ) -> Self {
        Self {
            source,
            transcoder,
            downloads_dir: downloads_dir.into(),
            max_bytes,
            tag_title: true,
        }
    }

    pub fn with_title_tagging(mut self, enabled: bool) -> Self {
        self.tag_title = enabled;
        self
    }

    /// Per-user artifact directory. Ids are escaped so distinct users never share one.
    pub fn user_dir(&self, user_id: &str) -> PathBuf {
        self.downloads_dir.join(format!("user-{}", escape_user_id(user_id)))
    }

    /// Produce a local artifact for `track`, or the link fallback when nothing fits.
    ///
    /// Blocking: downloads and transcodes in subprocesses.
    pub fn fetch(&self, track: &Track, user_id: &str) -> Result<FetchOutcome, MediaError> {
        let locator = Locator::parse(&track.fetch_locator())?;
        let Locator::Track { id: video_id, url } = locator else {
            return Err(MediaError::InvalidLocator(format!(
                "{} is a playlist, fetch its entries instead",
                track.locator
            )));
        };

        let user_dir = self.user_dir(user_id);
        fs::create_dir_all(&user_dir).map_err(|e| {
            MediaError::Download(format!("Failed to prepare {}: {}", user_dir.display(), e))
        })?;

        let token = Uuid::new_v4().simple().to_string();
        let final_path = user_dir.join(format!(
            "{}_{}_{}.{}",
            sanitize_filename(track.display_title()),
            sanitize_filename(&video_id),
            token,
            self.transcoder.extension()
        ));

        // Holds the downloaded source until the fetch ends, whichever way it ends
        let mut _source_guard: Option<ScratchFile> = None;
        let mut state = FetchState::Requested;

        loop {
            state = match state {
                FetchState::Requested => {
                    debug!("Fetching '{}' for user {}", track.display_title(), user_id);
                    FetchState::Downloading
                }
                FetchState::Downloading => {
                    let source = self.source.download(&url, &user_dir, &format!("{}.source", token))?;
                    _source_guard = Some(ScratchFile::new(source.clone()));
                    FetchState::Encoding { rung: 0, source }
                }
                FetchState::Encoding { rung, source } => {
                    let bitrate = BITRATE_LADDER[rung];
                    let encoded = ScratchFile::new(user_dir.join(format!("{}.{}k.part", token, bitrate)));

                    self.transcoder.encode(&source, encoded.path(), bitrate)?;
                    if self.tag_title {
                        tag_title(encoded.path(), track.display_title());
                    }

                    let size = fs::metadata(encoded.path())
                        .map_err(|e| MediaError::Encode(format!("Encoded file missing: {}", e)))?
                        .len();

                    if size > self.max_bytes {
                        FetchState::SizeExceeded { rung, size, source }
                    } else {
                        let path = encoded.keep();
                        fs::rename(&path, &final_path).map_err(|e| {
                            let _ = fs::remove_file(&path);
                            MediaError::Encode(format!("Failed to finalize {}: {}", final_path.display(), e))
                        })?;

                        info!(
                            "Fetched '{}' for user {} at {}k ({} bytes)",
                            track.display_title(),
                            user_id,
                            bitrate,
                            size
                        );
                        return Ok(FetchOutcome::Artifact(Artifact {
                            path: final_path,
                            bitrate_kbps: bitrate,
                            size_bytes: size,
                        }));
                    }
                }
                FetchState::SizeExceeded { rung, size, source } => {
                    debug!(
                        "Encoding at {}k is {} bytes, over the {} byte limit",
                        BITRATE_LADDER[rung], size, self.max_bytes
                    );
                    if rung + 1 < BITRATE_LADDER.len() {
                        FetchState::Encoding { rung: rung + 1, source }
                    } else {
                        warn!(
                            "'{}' exceeds the upload limit even at {}k, falling back to link",
                            track.display_title(),
                            BITRATE_LADDER[rung]
                        );
                        return Ok(FetchOutcome::LinkFallback(url));
                    }
                }
            };
        }
    }
}

#[cfg(feature = "tagging")]
fn tag_title(path: &Path, title: &str) {
    use id3::TagLike;

    let mut tag = id3::Tag::new();
    tag.set_title(title);
    if let Err(e) = tag.write_to_path(path, id3::Version::Id3v24) {
        warn!("Failed to tag {}: {}", path.display(), e);
    }
}

#[cfg(not(feature = "tagging"))]
fn tag_title(_path: &Path, _title: &str) {}

fn unsafe_filename_chars() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"[^\w\-. ]").expect("filename pattern is valid"))
}

/// Replace anything outside `[\w\-. ]` so titles are safe in file names
pub fn sanitize_filename(name: &str) -> String {
    let cleaned = unsafe_filename_chars().replace_all(name, "_");
    let cleaned: String = cleaned.trim().chars().take(80).collect();
    if cleaned.trim_matches('.').is_empty() {
        "track".to_string()
    } else {
        cleaned
    }
}

fn escape_user_id(user_id: &str) -> String {
    let mut escaped = String::with_capacity(user_id.len());
    for byte in user_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            escaped.push(byte as char);
        } else {
            escaped.push_str(&format!("%{:02X}", byte));
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::fakes::{FakeSource, FakeTranscoder};

    const TRACK_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    fn track() -> Track {
        Track::new("dQw4w9WgXcQ", TRACK_URL).with_title("Never Gonna Give You Up")
    }

    fn fetcher(
        dir: &Path,
        source: Arc<FakeSource>,
        transcoder: Arc<FakeTranscoder>,
        max_bytes: u64,
    ) -> AudioFetcher {
        AudioFetcher::new(source, transcoder, dir, max_bytes).with_title_tagging(false)
    }

    fn files_in(dir: &Path) -> Vec<PathBuf> {
        match fs::read_dir(dir) {
            Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    #[test]
    fn test_first_rung_that_fits_wins() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(FakeSource::default());
        let transcoder = Arc::new(FakeTranscoder::with_sizes(&[(192, 5_000), (128, 3_000), (96, 900)]));
        let fetcher = fetcher(dir.path(), source.clone(), transcoder.clone(), 1_000);

        let artifact = match fetcher.fetch(&track(), "42").unwrap() {
            FetchOutcome::Artifact(artifact) => artifact,
            other => panic!("expected artifact, got {:?}", other),
        };

        assert_eq!(transcoder.attempts(), vec![192, 128, 96]);
        assert_eq!(source.downloads(), 1);
        assert_eq!(artifact.bitrate_kbps(), 96);
        assert_eq!(artifact.size_bytes(), 900);
        assert_eq!(fs::metadata(artifact.path()).unwrap().len(), 900);

        // Only the artifact is left behind
        assert_eq!(files_in(&fetcher.user_dir("42")), vec![artifact.path().to_path_buf()]);
    }

    #[test]
    fn test_top_rung_that_fits_stops_the_ladder() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = Arc::new(FakeTranscoder::with_sizes(&[(192, 500), (128, 300), (96, 100)]));
        let fetcher = fetcher(dir.path(), Arc::new(FakeSource::default()), transcoder.clone(), 1_000);

        let outcome = fetcher.fetch(&track(), "42").unwrap();
        assert!(matches!(outcome, FetchOutcome::Artifact(ref a) if a.bitrate_kbps() == 192));
        assert_eq!(transcoder.attempts(), vec![192]);
    }

    #[test]
    fn test_oversized_at_every_rung_falls_back_to_link() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = Arc::new(FakeTranscoder::with_sizes(&[(192, 5_000), (128, 4_000), (96, 2_000)]));
        let fetcher = fetcher(dir.path(), Arc::new(FakeSource::default()), transcoder.clone(), 1_000);

        match fetcher.fetch(&track(), "42").unwrap() {
            FetchOutcome::LinkFallback(link) => assert_eq!(link, TRACK_URL),
            other => panic!("expected link fallback, got {:?}", other),
        }
        assert_eq!(transcoder.attempts(), vec![192, 128, 96]);
        assert!(files_in(&fetcher.user_dir("42")).is_empty());
    }

    #[test]
    fn test_invalid_locator_fails_before_download() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(FakeSource::default());
        let transcoder = Arc::new(FakeTranscoder::with_sizes(&[]));
        let fetcher = fetcher(dir.path(), source.clone(), transcoder.clone(), 1_000);

        for locator in ["", "not a locator", "https://www.youtube.com/playlist?list=PLx"] {
            let bad = Track::new("x", locator);
            assert!(matches!(fetcher.fetch(&bad, "42"), Err(MediaError::InvalidLocator(_))));
        }
        assert_eq!(source.downloads(), 0);
        assert!(transcoder.attempts().is_empty());
    }

    #[test]
    fn test_download_error_skips_the_ladder() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(FakeSource::failing("HTTP Error 403"));
        let transcoder = Arc::new(FakeTranscoder::with_sizes(&[(192, 10)]));
        let fetcher = fetcher(dir.path(), source, transcoder.clone(), 1_000);

        assert_eq!(
            fetcher.fetch(&track(), "42").unwrap_err(),
            MediaError::Download("HTTP Error 403".to_string())
        );
        assert!(transcoder.attempts().is_empty());
    }

    #[test]
    fn test_encode_error_is_terminal_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = Arc::new(FakeTranscoder::failing_at(128, &[(192, 5_000)]));
        let fetcher = fetcher(dir.path(), Arc::new(FakeSource::default()), transcoder.clone(), 1_000);

        assert!(matches!(fetcher.fetch(&track(), "42"), Err(MediaError::Encode(_))));
        assert_eq!(transcoder.attempts(), vec![192, 128]);
        assert!(files_in(&fetcher.user_dir("42")).is_empty());
    }

    #[test]
    fn test_artifacts_are_never_shared() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = Arc::new(FakeTranscoder::with_sizes(&[(192, 100)]));
        let fetcher = fetcher(dir.path(), Arc::new(FakeSource::default()), transcoder, 1_000);

        let fetch_path = |user: &str| match fetcher.fetch(&track(), user).unwrap() {
            FetchOutcome::Artifact(artifact) => artifact.into_path(),
            other => panic!("expected artifact, got {:?}", other),
        };

        let first = fetch_path("42");
        let again = fetch_path("42");
        let other_user = fetch_path("43");

        assert_ne!(first, again);
        assert_eq!(first.parent(), again.parent());
        assert_ne!(first.parent(), other_user.parent());
        assert!(first.exists() && again.exists() && other_user.exists());
    }

    #[test]
    fn test_release_deletes_the_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = Arc::new(FakeTranscoder::with_sizes(&[(192, 100)]));
        let fetcher = fetcher(dir.path(), Arc::new(FakeSource::default()), transcoder, 1_000);

        let FetchOutcome::Artifact(artifact) = fetcher.fetch(&track(), "42").unwrap() else {
            panic!("expected artifact");
        };
        let path = artifact.path().to_path_buf();
        artifact.release().unwrap();
        assert!(!path.exists());
    }

    #[cfg(feature = "tagging")]
    #[test]
    fn test_artifact_carries_title_tag() {
        use id3::TagLike;

        let dir = tempfile::tempdir().unwrap();
        let transcoder = Arc::new(FakeTranscoder::with_sizes(&[(192, 2_000)]));
        let fetcher = AudioFetcher::new(Arc::new(FakeSource::default()), transcoder, dir.path(), 1_000_000);

        let FetchOutcome::Artifact(artifact) = fetcher.fetch(&track(), "42").unwrap() else {
            panic!("expected artifact");
        };
        let tag = id3::Tag::read_from_path(artifact.path()).unwrap();
        assert_eq!(tag.title(), Some("Never Gonna Give You Up"));
    }

    #[test]
    fn test_user_ids_are_escaped_injectively() {
        assert_eq!(escape_user_id("123456"), "123456");
        assert_eq!(escape_user_id("a/b"), "a%2Fb");
        assert_ne!(escape_user_id("a/b"), escape_user_id("a_b"));
        assert_eq!(escape_user_id(".."), "%2E%2E");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("AC/DC: Back in Black"), "AC_DC_ Back in Black");
        assert_eq!(sanitize_filename("..."), "track");
        assert_eq!(sanitize_filename(&"x".repeat(200)).len(), 80);
    }
}
