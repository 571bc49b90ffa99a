//! Shared staging directory for downloads and extraction.
//!
//! Layout:
//!
//! ```text
//! <root>/<archive basename>      downloaded archive
//! <root>/<archive id>/<member>   extracted member before placement
//! ```
//!
//! Workers share the root but each group writes only below its own
//! archive-id subdirectory, so no cross-group locking is needed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::manifest::archive_basename;

/// Result type for staging operations.
pub type StagingResult<T> = Result<T, StagingError>;

/// Errors raised while managing the staging directory.
#[derive(Debug, Error)]
pub enum StagingError {
    /// The staging directory holds data and deletion was not confirmed.
    #[error(
        "the staging directory {} is not empty; confirm deletion of its contents to continue",
        .path.display()
    )]
    NotEmpty { path: PathBuf },

    /// Creating the staging directory failed.
    #[error("failed to create staging directory {}: {source}", .path.display())]
    CreateFailed { path: PathBuf, source: io::Error },

    /// Listing the staging directory failed.
    #[error("failed to read staging directory {}: {source}", .path.display())]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Removing something inside the staging directory failed.
    #[error("failed to remove {}: {source}", .path.display())]
    RemoveFailed { path: PathBuf, source: io::Error },
}

impl StagingError {
    /// Whether this error is the unconfirmed-cleanup hazard.
    pub fn is_unconfirmed_cleanup(&self) -> bool {
        matches!(self, Self::NotEmpty { .. })
    }
}

/// The shared staging directory.
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    /// Create a handle for the staging directory at `root`.
    ///
    /// Nothing is touched on disk until [`ensure`](Self::ensure).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Staging root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Make sure the staging directory exists and holds no stale state.
    ///
    /// A missing directory is created with its parents. An existing
    /// non-empty directory is left alone when archives are kept (previous
    /// downloads may be reused); otherwise it is emptied, but only when
    /// `confirm_cleanup` is set. Without confirmation this fails with
    /// [`StagingError::NotEmpty`].
    pub fn ensure(&self, keep_archives: bool, confirm_cleanup: bool) -> StagingResult<()> {
        if !self.root.exists() {
            return fs::create_dir_all(&self.root).map_err(|e| StagingError::CreateFailed {
                path: self.root.clone(),
                source: e,
            });
        }

        if keep_archives || self.is_empty()? {
            return Ok(());
        }

        if !confirm_cleanup {
            return Err(StagingError::NotEmpty {
                path: self.root.clone(),
            });
        }

        tracing::info!(path = %self.root.display(), "Removing stale staging contents");
        self.clear_contents()
    }

    /// Subdirectory a group extracts into.
    pub fn group_subdir(&self, archive_id: &str) -> PathBuf {
        self.root.join(archive_id)
    }

    /// Where an archive fetched from `location` is stored.
    pub fn archive_path(&self, location: &str) -> PathBuf {
        self.root.join(archive_basename(location))
    }

    /// Remove a group's extraction subdirectory. Missing is not an error.
    pub fn remove_group_subdir(&self, archive_id: &str) -> StagingResult<()> {
        remove_dir_if_present(&self.group_subdir(archive_id))
    }

    /// Remove a downloaded archive file. Missing is not an error.
    pub fn remove_archive(&self, path: &Path) -> StagingResult<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StagingError::RemoveFailed {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Recursively remove the whole staging directory. Missing is not an error.
    pub fn teardown(&self) -> StagingResult<()> {
        remove_dir_if_present(&self.root)
    }

    fn is_empty(&self) -> StagingResult<bool> {
        let mut entries = fs::read_dir(&self.root).map_err(|e| StagingError::ReadFailed {
            path: self.root.clone(),
            source: e,
        })?;
        Ok(entries.next().is_none())
    }

    fn clear_contents(&self) -> StagingResult<()> {
        let entries = fs::read_dir(&self.root).map_err(|e| StagingError::ReadFailed {
            path: self.root.clone(),
            source: e,
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| StagingError::ReadFailed {
                path: self.root.clone(),
                source: e,
            })?;
            let path = entry.path();
            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            result.map_err(|e| StagingError::RemoveFailed { path, source: e })?;
        }

        Ok(())
    }
}

fn remove_dir_if_present(path: &Path) -> StagingResult<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StagingError::RemoveFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
