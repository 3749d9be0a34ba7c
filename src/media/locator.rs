// Locator classification - decides what a raw user argument points at
// Runs before any network activity so garbage input never reaches the catalog

use regex::Regex;
use std::sync::OnceLock;

use crate::error::MediaError;

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// What a raw text argument refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Track { id: String, url: String },
    Playlist { list_id: String, url: String },
}

struct Rules {
    playlist: Regex,
    bare_id: Regex,
    track_urls: [Regex; 3],
}

fn rules() -> &'static Rules {
    static RULES: OnceLock<Rules> = OnceLock::new();
    RULES.get_or_init(|| {
        let compile = |pattern: &str| Regex::new(pattern).expect("locator pattern is valid");

        Rules {
            // `playlist?list=` pages and watch URLs carrying `&list=`
            playlist: compile(r"(?:playlist\?|[?&])list=([A-Za-z0-9_-]+)"),
            bare_id: compile(r"^[A-Za-z0-9_-]{11}$"),
            track_urls: [
                compile(r"^https?://(?:www\.|m\.|music\.)?youtube\.com/watch\?(?:.*&)?v=([A-Za-z0-9_-]{11})"),
                compile(r"^https?://(?:www\.|m\.)?youtube\.com/(?:shorts|embed|live)/([A-Za-z0-9_-]{11})"),
                compile(r"^https?://youtu\.be/([A-Za-z0-9_-]{11})"),
            ],
        }
    })
}

impl Locator {
    pub fn parse(raw: &str) -> Result<Self, MediaError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(MediaError::InvalidLocator("empty locator".to_string()));
        }

        let rules = rules();

        if let Some(caps) = rules.playlist.captures(raw) {
            if raw.starts_with("http://") || raw.starts_with("https://") {
                return Ok(Locator::Playlist {
                    list_id: caps[1].to_string(),
                    url: raw.to_string(),
                });
            }
        }

        if rules.bare_id.is_match(raw) {
            return Ok(Locator::Track {
                id: raw.to_string(),
                url: canonical_url(raw),
            });
        }

        for pattern in &rules.track_urls {
            if let Some(caps) = pattern.captures(raw) {
                return Ok(Locator::Track {
                    id: caps[1].to_string(),
                    url: raw.to_string(),
                });
            }
        }

        Err(MediaError::InvalidLocator(raw.to_string()))
    }

    pub fn is_playlist(&self) -> bool {
        matches!(self, Locator::Playlist { .. })
    }

    pub fn url(&self) -> &str {
        match self {
            Locator::Track { url, .. } | Locator::Playlist { url, .. } => url,
        }
    }
}

/// Watch URL for a bare video id
pub fn canonical_url(id: &str) -> String {
    format!("{}{}", WATCH_URL, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_locators() {
        let cases = [
            ("https://www.youtube.com/watch?v=dQw4w9WgXcQ", "dQw4w9WgXcQ"),
            ("https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ", "dQw4w9WgXcQ"),
            ("https://music.youtube.com/watch?v=dQw4w9WgXcQ", "dQw4w9WgXcQ"),
            ("https://youtu.be/dQw4w9WgXcQ?t=42", "dQw4w9WgXcQ"),
            ("https://www.youtube.com/shorts/dQw4w9WgXcQ", "dQw4w9WgXcQ"),
        ];

        for (raw, expected) in cases {
            match Locator::parse(raw) {
                Ok(Locator::Track { id, url }) => {
                    assert_eq!(id, expected);
                    assert_eq!(url, raw);
                }
                other => panic!("{} parsed as {:?}", raw, other),
            }
        }
    }

    #[test]
    fn test_bare_id_is_expanded() {
        let locator = Locator::parse("  dQw4w9WgXcQ ").unwrap();
        assert_eq!(locator.url(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert!(!locator.is_playlist());
    }

    #[test]
    fn test_playlist_marker_wins() {
        let page = Locator::parse("https://www.youtube.com/playlist?list=PL1234abcd").unwrap();
        assert_eq!(
            page,
            Locator::Playlist {
                list_id: "PL1234abcd".to_string(),
                url: "https://www.youtube.com/playlist?list=PL1234abcd".to_string(),
            }
        );

        let watch_in_list =
            Locator::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PLxyz").unwrap();
        assert!(watch_in_list.is_playlist());
    }

    #[test]
    fn test_garbage_is_rejected() {
        for raw in ["", "   ", "hello world", "https://example.com/song.mp3", "short", "list=PL1"] {
            assert!(
                matches!(Locator::parse(raw), Err(MediaError::InvalidLocator(_))),
                "{:?} should be rejected",
                raw
            );
        }
    }
}
