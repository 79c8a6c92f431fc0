// src/download.rs

//! Streaming downloads with incremental content hashing
//!
//! The body is written chunk by chunk to `<name>.part` in the working
//! directory while each chunk is fed to SHA-256, then the part file is
//! renamed onto its final name. Memory use does not depend on file size.
//! Progress is drawn on stderr when it is a terminal.

use crate::error::{Error, Result};
use crate::http::Transport;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Url;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Read buffer size for streaming downloads
const CHUNK_SIZE: usize = 8192;

const BAR_TEMPLATE: &str = "{msg:30!} [{bar:40.green/blue}] {bytes}/{total_bytes} {bytes_per_sec}";
const SPINNER_TEMPLATE: &str = "{spinner} {msg:30!} {bytes} {bytes_per_sec}";

/// A file downloaded to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub size: u64,
    /// Lowercase hex SHA-256 of the content
    pub sha256: String,
}

/// Local file name for a download URL: its last non-empty path segment
pub fn filename_from_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url)
        .map_err(|e| Error::DownloadError(format!("Invalid download URL {}: {}", url, e)))?;

    parsed
        .path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .map(|s| s.to_string())
        .ok_or_else(|| Error::DownloadError(format!("No file name in download URL {}", url)))
}

/// Download a URL into a directory, hashing the content as it streams
pub fn download_to_dir(transport: &dyn Transport, url: &str, dest_dir: &Path) -> Result<DownloadedFile> {
    let filename = filename_from_url(url)?;
    let dest_path = dest_dir.join(&filename);
    let part_path = dest_dir.join(format!("{}.part", filename));

    info!("Downloading {} to {}", url, dest_path.display());

    let body = transport.get_stream(url)?;
    let total = body.content_length;

    let mut file = File::create(&part_path).map_err(|e| {
        Error::IoError(format!("Failed to create file {}: {}", part_path.display(), e))
    })?;

    let streamed = stream_to_file(body.reader, &mut file, total, &filename);
    drop(file);

    let (size, sha256) = match streamed {
        Ok(result) => result,
        Err(e) => {
            let _ = fs::remove_file(&part_path);
            return Err(e);
        }
    };

    fs::rename(&part_path, &dest_path).map_err(|e| {
        Error::IoError(format!(
            "Failed to move {} to {}: {}",
            part_path.display(),
            dest_path.display(),
            e
        ))
    })?;

    info!("Downloaded {} ({} bytes, sha256 {})", filename, size, sha256);

    Ok(DownloadedFile {
        path: dest_path,
        size,
        sha256,
    })
}

/// Progress display for one download; a spinner when the size is unknown
fn progress_bar(total: Option<u64>, label: &str) -> ProgressBar {
    let (bar, template) = match total {
        Some(total) => (ProgressBar::new(total), BAR_TEMPLATE),
        None => (ProgressBar::new_spinner(), SPINNER_TEMPLATE),
    };
    if let Ok(style) = ProgressStyle::with_template(template) {
        bar.set_style(style.progress_chars("=> "));
    }
    bar.set_message(label.to_string());
    bar
}

fn stream_to_file(mut reader: Box<dyn Read>, file: &mut File, total: Option<u64>, label: &str) -> Result<(u64, String)> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; CHUNK_SIZE];
    let mut written: u64 = 0;
    let progress = progress_bar(total, label);

    loop {
        let read = match reader.read(&mut buffer) {
            Ok(read) => read,
            Err(e) => {
                progress.abandon();
                return Err(Error::DownloadError(format!("Failed to read response body: {}", e)));
            }
        };
        if read == 0 {
            break;
        }

        if let Err(e) = file.write_all(&buffer[..read]) {
            progress.abandon();
            return Err(Error::IoError(format!("Failed to write downloaded data: {}", e)));
        }
        hasher.update(&buffer[..read]);
        written += read as u64;
        progress.inc(read as u64);
    }

    progress.finish_and_clear();
    debug!("{}: {} bytes streamed", label, written);

    file.flush()?;
    Ok((written, format!("{:x}", hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::MockTransport;

    #[test]
    fn test_progress_bar_tracks_known_length() {
        assert_eq!(progress_bar(Some(4096), "image.iso").length(), Some(4096));
        assert_eq!(progress_bar(None, "image.iso").length(), None);
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(
            filename_from_url("https://x/releases/file-1.2.3.zip").unwrap(),
            "file-1.2.3.zip"
        );
        assert_eq!(
            filename_from_url("https://x/dir/image.iso/?mirror=eu").unwrap(),
            "image.iso"
        );
        assert!(filename_from_url("https://x/").is_err());
        assert!(filename_from_url("not a url").is_err());
    }

    #[test]
    fn test_download_writes_file_and_hash() {
        let dir = tempfile::tempdir().unwrap();
        let transport = MockTransport::new().with_file("https://x/hello.txt", b"hello world");

        let downloaded = download_to_dir(&transport, "https://x/hello.txt", dir.path()).unwrap();

        assert_eq!(downloaded.path, dir.path().join("hello.txt"));
        assert_eq!(downloaded.size, 11);
        assert_eq!(
            downloaded.sha256,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(fs::read(&downloaded.path).unwrap(), b"hello world");
        assert!(!dir.path().join("hello.txt.part").exists());
    }

    #[test]
    fn test_streamed_hash_matches_large_body() {
        let dir = tempfile::tempdir().unwrap();
        let body: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        let transport = MockTransport::new().with_file("https://x/blob.bin", &body);

        let downloaded = download_to_dir(&transport, "https://x/blob.bin", dir.path()).unwrap();

        assert_eq!(downloaded.size, body.len() as u64);
        assert_eq!(downloaded.sha256, format!("{:x}", Sha256::digest(&body)));
    }

    #[test]
    fn test_http_error_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let transport = MockTransport::new();

        let result = download_to_dir(&transport, "https://x/missing.zip", dir.path());

        assert!(matches!(result, Err(Error::DownloadError(_))));
        assert!(!dir.path().join("missing.zip").exists());
        assert!(!dir.path().join("missing.zip.part").exists());
    }
}
