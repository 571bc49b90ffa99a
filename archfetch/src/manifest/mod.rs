//! Manifest parsing and grouping.
//!
//! A manifest is a `dlinks.txt` file listing, one per line, an archive
//! location and the file wanted from it. Entries are grouped by archive so
//! each archive is downloaded at most once.
//!
//! ```text
//! dlinks.txt ──► ManifestReader ──► Vec<ManifestEntry> ──► group_entries ──► ArchiveGroup
//! ```

mod entry;
mod group;
mod reader;

pub use entry::{archive_basename, archive_id_from_location, parse_line, LineError, ManifestEntry};
pub use group::{group_entries, ArchiveGroup};
pub use reader::{parse_manifest, ManifestReader, DEFAULT_FOLDERS, MANIFEST_FILENAME};

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// Errors raised while reading manifests.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file does not exist.
    #[error("manifest not found: {}", .path.display())]
    MissingManifest { path: PathBuf },

    /// The manifest file could not be read.
    #[error("failed to read manifest {}: {source}", .path.display())]
    ReadFailed { path: PathBuf, source: io::Error },

    /// A line does not follow the manifest layout.
    #[error("malformed manifest line {line} in {}: {reason}", .path.display())]
    MalformedLine {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// The image directory next to a manifest could not be created.
    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDirFailed { path: PathBuf, source: io::Error },
}
