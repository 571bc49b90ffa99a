//! Archive transfer backends.
//!
//! - External `wget` process with continue/no-clobber semantics (`wget`)
//! - Built-in HTTP client with Range-based resume (`http`)
//!
//! Both implement [`Downloader`](crate::traits::Downloader) and write the
//! archive under its remote basename into the destination directory.

mod http;
mod wget;

pub use http::HttpDownloader;
pub use wget::WgetDownloader;

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::config::DownloaderKind;
use crate::traits::Downloader;

/// Result type for transfer operations.
pub type DownloadResult<T> = Result<T, DownloadError>;

/// Errors raised by transfer backends.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The transfer failed.
    #[error("failed to download {url}: {reason}")]
    Transfer { url: String, reason: String },

    /// The external transfer tool exited with a failure status.
    #[error("{tool} exited with {} for {url}", describe_exit(.code))]
    ExitStatus {
        tool: String,
        url: String,
        code: Option<i32>,
    },

    /// The request timed out.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// Writing the local file failed.
    #[error("failed to write {}: {source}", .path.display())]
    WriteFailed { path: PathBuf, source: io::Error },

    /// The backend cannot handle this kind of location.
    #[error("unsupported location for this downloader: {url}")]
    UnsupportedScheme { url: String },

    /// The external transfer tool is not installed.
    #[error("'{tool}' is not available: {reason}")]
    ToolMissing { tool: String, reason: String },

    /// The HTTP client could not be built.
    #[error("failed to create HTTP client: {0}")]
    Client(String),
}

impl DownloadError {
    /// Whether the transfer tool itself is missing.
    pub fn is_tool_missing(&self) -> bool {
        matches!(self, Self::ToolMissing { .. })
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

/// Build the configured transfer backend.
///
/// For [`DownloaderKind::Wget`] this checks that the tool is installed, so
/// a missing tool is reported before any work starts.
pub fn build_downloader(
    kind: DownloaderKind,
    timeout: Duration,
) -> DownloadResult<Box<dyn Downloader>> {
    match kind {
        DownloaderKind::Wget => {
            let wget = WgetDownloader::new();
            wget.check_available()?;
            Ok(Box::new(wget))
        }
        DownloaderKind::Http => Ok(Box::new(HttpDownloader::with_timeout(timeout)?)),
    }
}
