use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use super::catalog::Transcoder;
use super::ytdlp::stderr_summary;
use crate::error::MediaError;

/// MP3 encoder backed by the ffmpeg binary
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    binary: PathBuf,
    channels: u8,
}

impl Ffmpeg {
    pub fn new(binary: impl Into<PathBuf>, channels: u8) -> Self {
        Self {
            binary: binary.into(),
            channels: channels.clamp(1, 2), // mono or stereo only
        }
    }
}

impl Transcoder for Ffmpeg {
    fn encode(&self, input: &Path, output: &Path, bitrate_kbps: u32) -> Result<(), MediaError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["-hide_banner", "-loglevel", "error", "-nostdin", "-y", "-i"])
            .arg(input)
            .args(["-vn", "-codec:a", "libmp3lame"])
            .arg("-ac")
            .arg(self.channels.to_string())
            .arg("-b:a")
            .arg(format!("{}k", bitrate_kbps))
            .args(["-f", "mp3"])
            .arg(output);

        debug!("Encoding {} at {}k", input.display(), bitrate_kbps);
        let result = cmd.output().map_err(|e| {
            MediaError::Encode(format!(
                "Failed to run {}: {}. Is ffmpeg installed?",
                self.binary.display(),
                e
            ))
        })?;

        if !result.status.success() {
            return Err(MediaError::Encode(stderr_summary(&result)));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_an_encode_error() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = Ffmpeg::new("/nonexistent/ffmpeg-binary", 2);
        let result = ffmpeg.encode(&dir.path().join("in.webm"), &dir.path().join("out.mp3"), 128);
        assert!(matches!(result, Err(MediaError::Encode(_))));
    }

    #[test]
    fn test_channels_are_clamped() {
        assert_eq!(Ffmpeg::new("ffmpeg", 6).channels, 2);
        assert_eq!(Ffmpeg::new("ffmpeg", 0).channels, 1);
    }
}
