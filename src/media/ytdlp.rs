// yt-dlp backend - metadata lookups and source audio downloads
// Every call is a blocking subprocess, callers run it on a worker thread

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::debug;

use super::catalog::{AudioSource, Catalog, Listing, RawEntry};
use crate::error::MediaError;

#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: PathBuf,
}

impl YtDlp {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn run(&self, args: &[&str]) -> std::io::Result<Output> {
        debug!("Running {} {}", self.binary.display(), args.join(" "));
        Command::new(&self.binary).args(args).output()
    }

    /// Run a metadata-only extraction and parse the single JSON document it prints
    fn extract_json<T: serde::de::DeserializeOwned>(&self, args: &[&str]) -> Result<T, MediaError> {
        let output = self.run(args).map_err(|e| {
            MediaError::Resolution(format!(
                "Failed to run {}: {}. Is yt-dlp installed?",
                self.binary.display(),
                e
            ))
        })?;

        if !output.status.success() {
            return Err(MediaError::Resolution(stderr_summary(&output)));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| MediaError::Resolution(format!("Unexpected catalog response: {}", e)))
    }
}

impl Catalog for YtDlp {
    fn search(&self, query: &str, max_results: usize) -> Result<Listing, MediaError> {
        let target = format!("ytsearch{}:{}", max_results, query);
        self.extract_json(&[
            "--flat-playlist",
            "--dump-single-json",
            "--skip-download",
            "--quiet",
            "--no-warnings",
            &target,
        ])
    }

    fn playlist(&self, url: &str) -> Result<Listing, MediaError> {
        self.extract_json(&[
            "--flat-playlist",
            "--dump-single-json",
            "--skip-download",
            "--quiet",
            "--no-warnings",
            "--yes-playlist",
            url,
        ])
    }

    fn lookup(&self, url: &str) -> Result<RawEntry, MediaError> {
        self.extract_json(&[
            "--dump-single-json",
            "--skip-download",
            "--no-playlist",
            "--quiet",
            "--no-warnings",
            url,
        ])
    }
}

impl AudioSource for YtDlp {
    fn download(&self, url: &str, dir: &Path, stem: &str) -> Result<PathBuf, MediaError> {
        let template = dir.join(format!("{}.%(ext)s", stem));
        let template = template.to_string_lossy();

        let output = self
            .run(&[
                "-f",
                "bestaudio/best",
                "--no-playlist",
                "--no-part",
                "--no-mtime",
                "--quiet",
                "--no-warnings",
                "-o",
                &template,
                url,
            ])
            .map_err(|e| {
                MediaError::Download(format!(
                    "Failed to run {}: {}. Is yt-dlp installed?",
                    self.binary.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            // Partial output survives a failed run with --no-part
            for partial in files_with_stem(dir, stem) {
                debug!("Removing partial download {}", partial.display());
                let _ = fs::remove_file(partial);
            }
            return Err(MediaError::Download(stderr_summary(&output)));
        }

        // yt-dlp fills in %(ext)s itself, so look for whatever it wrote under our stem
        let downloaded = files_with_stem(dir, stem).into_iter().next().ok_or_else(|| {
            MediaError::Download(format!("yt-dlp completed but no file named {}.* was written", stem))
        })?;

        let size = fs::metadata(&downloaded).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            let _ = fs::remove_file(&downloaded);
            return Err(MediaError::Download("Downloaded file is empty".to_string()));
        }

        Ok(downloaded)
    }
}

/// Files in `dir` named `<stem>.<anything>`
fn files_with_stem(dir: &Path, stem: &str) -> Vec<PathBuf> {
    let prefix = format!("{}.", stem);
    match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&prefix))
            })
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Last non-empty stderr line, which is where yt-dlp and ffmpeg put the actual reason
pub(crate) fn stderr_summary(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("exited with {}", output.status))
}
