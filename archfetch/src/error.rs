//! Top-level error type for a fetch run.
//!
//! Only errors that abort the whole run live here. Per-group failures are
//! recovered inside the pipeline and reported through
//! [`GroupFailure`](crate::pipeline::GroupFailure) instead.

use thiserror::Error;

use crate::config::ConfigError;
use crate::fetch::DownloadError;
use crate::manifest::ManifestError;
use crate::resolver::ResolveError;
use crate::staging::StagingError;

/// Result type for run-level operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Fatal errors that stop a run before (or instead of) processing groups.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Configuration file or option problem.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Manifest missing or malformed.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Staging directory could not be prepared.
    #[error(transparent)]
    Staging(#[from] StagingError),

    /// Transfer backend could not be set up.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Relocation lookup client could not be set up.
    #[error(transparent)]
    Resolver(#[from] ResolveError),

    /// Worker pool could not be created.
    #[error("failed to start worker pool: {0}")]
    ThreadPool(String),
}

impl FetchError {
    /// Whether this error belongs to the configuration class.
    ///
    /// Configuration errors are reported with a distinct exit code by the CLI.
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Config(_) | Self::Manifest(_) => true,
            Self::Staging(e) => e.is_unconfirmed_cleanup(),
            Self::Download(e) => e.is_tool_missing(),
            Self::Resolver(_) | Self::ThreadPool(_) => false,
        }
    }
}
