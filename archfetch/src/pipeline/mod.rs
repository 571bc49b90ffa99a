//! The download-extract-reconciliation engine.
//!
//! [`Fetcher`] is the entry point: it reads the manifests, groups entries by
//! archive, checks the transfer tool, prepares the staging directory, and
//! hands the groups to a [`WorkCoordinator`].
//!
//! # Example
//!
//! ```ignore
//! use archfetch::{FetchConfig, Fetcher};
//!
//! let config = FetchConfig::new("/data/roco").with_workers(8);
//! let summary = Fetcher::new(config).run(None)?;
//! for failed in summary.failed() {
//!     eprintln!("{}: {}", failed.archive_id, failed.status);
//! }
//! ```

mod acquire;
mod coordinator;
mod extract;
mod job;
mod outcome;
mod retry;

pub use acquire::Acquisition;
pub use coordinator::{
    ProgressCallback, ProgressEvent, WorkCoordinator, WorkerContext, WorkerSettings,
};
pub use extract::copy_into_place;
pub use job::{GroupJob, GroupPhase};
pub use outcome::{GroupFailure, GroupOutcome, GroupStatus, MemberSkip, RunSummary};
pub use retry::{
    Backoff, RetryState, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BASE_DELAY_MS,
    DEFAULT_RETRY_MAX_DELAY_SECS,
};

use crate::archive::TarGzReader;
use crate::config::FetchConfig;
use crate::error::FetchResult;
use crate::fetch::build_downloader;
use crate::manifest::{group_entries, ArchiveGroup, ManifestReader};
use crate::resolver::OaResolver;
use crate::staging::StagingArea;
use crate::traits::{ArchiveReader, Downloader, ResolverService};

/// Runs a fetch for one configuration.
#[derive(Debug, Clone)]
pub struct Fetcher {
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Manifest reader for the configured repository.
    pub fn manifest_reader(&self) -> ManifestReader {
        ManifestReader::new(&self.config.repository_dir, &self.config.subdir)
    }

    /// Staging directory handle for the configured path.
    pub fn staging(&self) -> StagingArea {
        StagingArea::new(&self.config.staging_dir)
    }

    /// Read every configured manifest and group its entries by archive.
    pub fn collect_groups(&self) -> FetchResult<Vec<ArchiveGroup>> {
        let entries = self.manifest_reader().read_all(&self.config.folders)?;
        let entry_count = entries.len();
        let groups: Vec<ArchiveGroup> = group_entries(entries).into_values().collect();
        tracing::info!(
            entries = entry_count,
            groups = groups.len(),
            "Grouped manifest entries by archive"
        );
        Ok(groups)
    }

    /// Run with the production collaborators.
    pub fn run(&self, on_progress: Option<&ProgressCallback>) -> FetchResult<RunSummary> {
        let groups = self.collect_groups()?;
        let downloader = build_downloader(self.config.downloader, self.config.timeout)?;
        let resolver = OaResolver::new(&self.config.resolver_url, self.config.timeout)?;
        self.run_with(
            groups,
            downloader,
            TarGzReader::new(),
            Box::new(resolver),
            on_progress,
        )
    }

    /// Run `groups` with the given collaborators.
    ///
    /// Fails before any group is processed when the staging directory
    /// cannot be prepared.
    pub fn run_with<A: ArchiveReader>(
        &self,
        groups: Vec<ArchiveGroup>,
        downloader: Box<dyn Downloader>,
        reader: A,
        resolver: Box<dyn ResolverService>,
        on_progress: Option<&ProgressCallback>,
    ) -> FetchResult<RunSummary> {
        let staging = self.staging();
        staging.ensure(self.config.keep_archives, self.config.confirm_cleanup)?;

        let context = WorkerContext {
            downloader,
            reader,
            resolver,
            staging,
            settings: WorkerSettings {
                max_retries: self.config.max_retries,
                keep_archives: self.config.keep_archives,
                backoff: Backoff::new(self.config.retry_base_delay, self.config.retry_max_delay),
            },
        };

        WorkCoordinator::new(context, self.config.workers).run(groups, on_progress)
    }
}
