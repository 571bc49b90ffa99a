//! HTTP-based archive downloader with resume support.
//!
//! This module provides:
//! - Resumable downloads via HTTP Range requests
//! - No-clobber when the local file already matches the remote size

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;

use super::{DownloadError, DownloadResult};
use crate::config::DEFAULT_TIMEOUT_SECS;
use crate::manifest::archive_basename;
use crate::traits::Downloader;

/// Buffer size for reading/writing during downloads (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// HTTP-based archive downloader.
///
/// Implements the `Downloader` trait with support for:
/// - Range requests for resuming downloads
/// - Skipping files that are already complete
#[derive(Debug)]
pub struct HttpDownloader {
    client: Client,
    timeout: Duration,
}

impl HttpDownloader {
    /// Create a new HTTP downloader with the default timeout.
    pub fn new() -> DownloadResult<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a new HTTP downloader with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> DownloadResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DownloadError::Client(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Download `url` to `dest`, resuming a partial file when possible.
    ///
    /// Returns the size of the complete file.
    fn download_with_resume(&self, url: &str, dest: &Path) -> DownloadResult<u64> {
        let existing_size = dest.metadata().map(|m| m.len()).unwrap_or(0);

        let (total_size, supports_range) = self.query_file_info(url)?;

        // No-clobber: a complete file is left untouched
        if total_size > 0 && existing_size == total_size {
            tracing::debug!(url, size = total_size, "Archive already complete, skipping");
            return Ok(total_size);
        }

        let (start_byte, file) =
            self.prepare_destination(dest, existing_size, total_size, supports_range)?;

        self.stream_download(url, file, dest, start_byte)
    }

    /// Query file info via HEAD request.
    fn query_file_info(&self, url: &str) -> DownloadResult<(u64, bool)> {
        let head_response = self
            .client
            .head(url)
            .send()
            .map_err(|e| self.request_error(url, e))?;

        if !head_response.status().is_success() {
            return Err(DownloadError::Transfer {
                url: url.to_string(),
                reason: format!("HEAD request failed with status {}", head_response.status()),
            });
        }

        let total_size = head_response
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        let supports_range = head_response
            .headers()
            .get("accept-ranges")
            .map(|v| v.to_str().unwrap_or("") == "bytes")
            .unwrap_or(false);

        Ok((total_size, supports_range))
    }

    /// Prepare the destination file for writing.
    fn prepare_destination(
        &self,
        dest: &Path,
        existing_size: u64,
        total_size: u64,
        supports_range: bool,
    ) -> DownloadResult<(u64, File)> {
        if existing_size > 0 && supports_range && existing_size < total_size {
            // Resume from existing position
            let file = OpenOptions::new()
                .append(true)
                .open(dest)
                .map_err(|e| DownloadError::WriteFailed {
                    path: dest.to_path_buf(),
                    source: e,
                })?;
            Ok((existing_size, file))
        } else {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|e| DownloadError::WriteFailed {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
            let file = File::create(dest).map_err(|e| DownloadError::WriteFailed {
                path: dest.to_path_buf(),
                source: e,
            })?;
            Ok((0, file))
        }
    }

    /// Stream the download to the destination file.
    fn stream_download(
        &self,
        url: &str,
        file: File,
        dest: &Path,
        start_byte: u64,
    ) -> DownloadResult<u64> {
        let mut request = self.client.get(url);
        if start_byte > 0 {
            request = request.header("Range", format!("bytes={}-", start_byte));
        }

        let mut response = request.send().map_err(|e| self.request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Transfer {
                url: url.to_string(),
                reason: format!("GET request failed with status {}", status),
            });
        }

        // Anything but 206 carries the whole body, so the partial prefix goes
        let mut start_byte = start_byte;
        if start_byte > 0 && status != StatusCode::PARTIAL_CONTENT {
            tracing::debug!(url, %status, "Server ignored range request, restarting");
            file.set_len(0).map_err(|e| DownloadError::WriteFailed {
                path: dest.to_path_buf(),
                source: e,
            })?;
            start_byte = 0;
        }

        let mut writer = BufWriter::new(file);
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut downloaded = start_byte;

        loop {
            let bytes_read = response
                .read(&mut buffer)
                .map_err(|e| DownloadError::Transfer {
                    url: url.to_string(),
                    reason: format!("read error: {}", e),
                })?;

            if bytes_read == 0 {
                break;
            }

            writer
                .write_all(&buffer[..bytes_read])
                .map_err(|e| DownloadError::WriteFailed {
                    path: dest.to_path_buf(),
                    source: e,
                })?;

            downloaded += bytes_read as u64;
        }

        writer.flush().map_err(|e| DownloadError::WriteFailed {
            path: dest.to_path_buf(),
            source: e,
        })?;

        Ok(downloaded)
    }

    fn request_error(&self, url: &str, e: reqwest::Error) -> DownloadError {
        if e.is_timeout() {
            DownloadError::Timeout {
                url: url.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            DownloadError::Transfer {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

impl Downloader for HttpDownloader {
    fn fetch(&self, url: &str, dest_dir: &Path) -> DownloadResult<()> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(DownloadError::UnsupportedScheme {
                url: url.to_string(),
            });
        }

        let dest = dest_dir.join(archive_basename(url));
        let bytes = self.download_with_resume(url, &dest)?;
        tracing::debug!(url, bytes, dest = %dest.display(), "Download finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::io::{BufRead, BufReader};
    use std::net::{TcpListener, TcpStream};
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    /// Local HTTP/1.1 server for one archive. Records `METHOD range` per request.
    struct ArchiveServer {
        url: String,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl ArchiveServer {
        fn start(body: Vec<u8>, honor_range: bool) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let url = format!("http://{}/PMC1.tar.gz", listener.local_addr().unwrap());
            let requests = Arc::new(Mutex::new(Vec::new()));

            let log = Arc::clone(&requests);
            thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(stream) = stream else { break };
                    respond(stream, &body, honor_range, &log);
                }
            });

            Self { url, requests }
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().clone()
        }
    }

    fn respond(mut stream: TcpStream, body: &[u8], honor_range: bool, log: &Mutex<Vec<String>>) {
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();
        let method = request_line.split_whitespace().next().unwrap_or("").to_string();

        let mut range_start: Option<usize> = None;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).unwrap() == 0 || line.trim().is_empty() {
                break;
            }
            let lower = line.to_ascii_lowercase();
            if let Some(value) = lower.strip_prefix("range: bytes=") {
                range_start = value.trim().trim_end_matches('-').parse().ok();
            }
        }
        log.lock().push(match range_start {
            Some(start) => format!("{} bytes={}-", method, start),
            None => method.clone(),
        });

        let len = body.len();
        let (head, payload) = match range_start {
            _ if method == "HEAD" => (
                format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nAccept-Ranges: bytes\r\n",
                    len
                ),
                &body[..0],
            ),
            Some(start) if honor_range && start < len => (
                format!(
                    "HTTP/1.1 206 Partial Content\r\nContent-Length: {}\r\n\
                     Content-Range: bytes {}-{}/{}\r\n",
                    len - start,
                    start,
                    len - 1,
                    len
                ),
                &body[start..],
            ),
            _ => (format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n", len), body),
        };

        stream.write_all(head.as_bytes()).unwrap();
        stream.write_all(b"Connection: close\r\n\r\n").unwrap();
        stream.write_all(payload).unwrap();
        stream.flush().unwrap();
    }

    fn archive_body() -> Vec<u8> {
        (0..1000u32).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_fresh_download() {
        let body = archive_body();
        let server = ArchiveServer::start(body.clone(), true);
        let temp = TempDir::new().unwrap();

        HttpDownloader::new()
            .unwrap()
            .fetch(&server.url, temp.path())
            .unwrap();

        assert_eq!(fs::read(temp.path().join("PMC1.tar.gz")).unwrap(), body);
        assert_eq!(server.requests(), vec!["HEAD", "GET"]);
    }

    #[test]
    fn test_resume_with_partial_content() {
        let body = archive_body();
        let server = ArchiveServer::start(body.clone(), true);
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("PMC1.tar.gz");
        fs::write(&dest, &body[..100]).unwrap();

        HttpDownloader::new()
            .unwrap()
            .fetch(&server.url, temp.path())
            .unwrap();

        assert_eq!(fs::read(&dest).unwrap(), body);
        assert_eq!(server.requests(), vec!["HEAD", "GET bytes=100-"]);
    }

    #[test]
    fn test_resume_restarts_when_range_is_ignored() {
        let body = archive_body();
        let server = ArchiveServer::start(body.clone(), false);
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("PMC1.tar.gz");
        fs::write(&dest, &body[..100]).unwrap();

        HttpDownloader::new()
            .unwrap()
            .fetch(&server.url, temp.path())
            .unwrap();

        let local = fs::read(&dest).unwrap();
        assert_eq!(local.len(), body.len());
        assert_eq!(local, body);
        assert_eq!(server.requests(), vec!["HEAD", "GET bytes=100-"]);
    }

    #[test]
    fn test_complete_file_is_not_fetched_again() {
        let body = archive_body();
        let server = ArchiveServer::start(body.clone(), true);
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("PMC1.tar.gz");
        fs::write(&dest, &body).unwrap();

        HttpDownloader::new()
            .unwrap()
            .fetch(&server.url, temp.path())
            .unwrap();

        assert_eq!(fs::read(&dest).unwrap(), body);
        assert_eq!(server.requests(), vec!["HEAD"]);
    }

    #[test]
    fn test_http_downloader_default_timeout() {
        let downloader = HttpDownloader::new().unwrap();
        assert_eq!(downloader.timeout().as_secs(), DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_http_downloader_with_timeout() {
        let downloader = HttpDownloader::with_timeout(Duration::from_secs(60)).unwrap();
        assert_eq!(downloader.timeout().as_secs(), 60);
    }

    #[test]
    fn test_rejects_ftp_locations() {
        let temp = tempfile::TempDir::new().unwrap();
        let downloader = HttpDownloader::new().unwrap();

        let err = downloader
            .fetch("ftp://ftp.example.org/pub/PMC1.tar.gz", temp.path())
            .unwrap_err();

        assert!(matches!(err, DownloadError::UnsupportedScheme { .. }));
        assert!(!temp.path().join("PMC1.tar.gz").exists());
    }
}
