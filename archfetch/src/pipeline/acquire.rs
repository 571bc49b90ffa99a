//! Archive acquisition: transfer with bounded retries and resolver fallback.

use std::path::PathBuf;

use crate::manifest::ArchiveGroup;
use crate::staging::StagingArea;
use crate::traits::{Downloader, Resolution, ResolverService};

use super::outcome::GroupFailure;
use super::retry::{Backoff, RetryState};

/// Makes sure a group's archive is present in the staging directory.
pub struct Acquisition<'a> {
    downloader: &'a dyn Downloader,
    resolver: &'a dyn ResolverService,
    staging: &'a StagingArea,
    backoff: Backoff,
}

impl<'a> Acquisition<'a> {
    pub fn new(
        downloader: &'a dyn Downloader,
        resolver: &'a dyn ResolverService,
        staging: &'a StagingArea,
        backoff: Backoff,
    ) -> Self {
        Self {
            downloader,
            resolver,
            staging,
            backoff,
        }
    }

    /// Fetch the group's archive, returning its local path.
    ///
    /// Any previous copy at the target path is removed first. Each transfer
    /// consumes one unit of `retry`. The resolver is asked only after the
    /// group's first failed transfer; a new location rewrites the group's
    /// location for all later attempts.
    pub fn acquire(
        &self,
        group: &mut ArchiveGroup,
        retry: &mut RetryState,
    ) -> Result<PathBuf, GroupFailure> {
        let stale = self.staging.archive_path(group.archive_location());
        self.staging
            .remove_archive(&stale)
            .map_err(|e| GroupFailure::Io {
                reason: e.to_string(),
            })?;

        loop {
            if !retry.try_begin_attempt() {
                return Err(exhausted(group, retry));
            }

            let url = group.archive_location().to_string();
            let dest = self.staging.archive_path(&url);
            tracing::debug!(
                archive_id = group.archive_id(),
                url = %url,
                attempt = retry.attempts(),
                "Fetching archive"
            );

            match self.downloader.fetch(&url, self.staging.root()) {
                Ok(()) if dest.is_file() => return Ok(dest),
                Ok(()) => tracing::warn!(
                    archive_id = group.archive_id(),
                    url = %url,
                    attempt = retry.attempts(),
                    "Transfer reported success but no archive was written"
                ),
                Err(e) => tracing::warn!(
                    archive_id = group.archive_id(),
                    url = %url,
                    attempt = retry.attempts(),
                    error = %e,
                    "Download failed, retrying"
                ),
            }

            let failures = retry.record_failure();
            let mut relocated = false;
            if failures == 1 {
                relocated = self.consult_resolver(group, &url)?;
            }

            if retry.is_exhausted() {
                return Err(exhausted(group, retry));
            }
            if !relocated {
                self.backoff.wait(failures);
            }
        }
    }

    /// Ask the resolver where the archive lives now.
    ///
    /// Returns whether the group was relocated. Lookup errors count as an
    /// unchanged location.
    fn consult_resolver(&self, group: &mut ArchiveGroup, url: &str) -> Result<bool, GroupFailure> {
        match self.resolver.resolve(group.archive_id(), url) {
            Ok(Resolution::Unchanged) => Ok(false),
            Ok(Resolution::NewLocation(location)) => {
                tracing::warn!(
                    archive_id = group.archive_id(),
                    from = %url,
                    to = %location,
                    "Archive relocated"
                );
                group.relocate(location);
                Ok(true)
            }
            Ok(Resolution::PermanentlyUnavailable(reason)) => {
                Err(GroupFailure::PermanentlyUnavailable { reason })
            }
            Err(e) => {
                tracing::warn!(
                    archive_id = group.archive_id(),
                    error = %e,
                    "Relocation lookup failed, retrying original location"
                );
                Ok(false)
            }
        }
    }
}

fn exhausted(group: &ArchiveGroup, retry: &RetryState) -> GroupFailure {
    GroupFailure::RetriesExhausted {
        attempts: retry.attempts(),
        url: group.archive_location().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{DownloadError, DownloadResult};
    use crate::manifest::ManifestEntry;
    use crate::resolver::{ResolveError, ResolveResult};
    use parking_lot::Mutex;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const ORIGINAL: &str = "ftp://host/old/PMC1.tar.gz";
    const MOVED: &str = "ftp://host/new/PMC1.tar.gz";

    /// Succeeds only for URLs in `working`, recording every call.
    struct ScriptedDownloader {
        working: Vec<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedDownloader {
        fn new(working: Vec<&'static str>) -> Self {
            Self {
                working,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    impl Downloader for ScriptedDownloader {
        fn fetch(&self, url: &str, dest_dir: &Path) -> DownloadResult<()> {
            self.calls.lock().push(url.to_string());
            if self.working.iter().any(|w| *w == url) {
                fs::write(dest_dir.join("PMC1.tar.gz"), b"archive").unwrap();
                Ok(())
            } else {
                Err(DownloadError::ExitStatus {
                    tool: "stub".to_string(),
                    url: url.to_string(),
                    code: Some(8),
                })
            }
        }
    }

    struct FixedResolver {
        answer: Option<Resolution>,
        calls: Mutex<u32>,
    }

    impl FixedResolver {
        fn new(answer: Option<Resolution>) -> Self {
            Self {
                answer,
                calls: Mutex::new(0),
            }
        }
    }

    impl ResolverService for FixedResolver {
        fn resolve(&self, _archive_id: &str, _current: &str) -> ResolveResult<Resolution> {
            *self.calls.lock() += 1;
            self.answer
                .clone()
                .ok_or_else(|| ResolveError::Parse("stub".to_string()))
        }
    }

    fn group() -> ArchiveGroup {
        ArchiveGroup::new(
            ManifestEntry::new("ROCO_1", ORIGINAL, "PMC1/a.jpg", "/out/PMC1_a.jpg").unwrap(),
        )
    }

    fn staging(temp: &TempDir) -> StagingArea {
        let staging = StagingArea::new(temp.path());
        staging.ensure(true, false).unwrap();
        staging
    }

    #[test]
    fn test_first_attempt_success() {
        let temp = TempDir::new().unwrap();
        let staging = staging(&temp);
        let downloader = ScriptedDownloader::new(vec![ORIGINAL]);
        let resolver = FixedResolver::new(Some(Resolution::Unchanged));
        let acquisition = Acquisition::new(&downloader, &resolver, &staging, Backoff::none());

        let mut group = group();
        let mut retry = RetryState::new(10);
        let path = acquisition.acquire(&mut group, &mut retry).unwrap();

        assert_eq!(path, temp.path().join("PMC1.tar.gz"));
        assert_eq!(retry.attempts(), 1);
        assert_eq!(*resolver.calls.lock(), 0);
    }

    #[test]
    fn test_removes_stale_copy_before_transfer() {
        let temp = TempDir::new().unwrap();
        let staging = staging(&temp);
        fs::write(temp.path().join("PMC1.tar.gz"), b"truncated").unwrap();
        let downloader = ScriptedDownloader::new(vec![]);
        let resolver = FixedResolver::new(Some(Resolution::Unchanged));
        let acquisition = Acquisition::new(&downloader, &resolver, &staging, Backoff::none());

        let mut retry = RetryState::new(1);
        let result = acquisition.acquire(&mut group(), &mut retry);

        assert!(result.is_err());
        assert!(!temp.path().join("PMC1.tar.gz").exists());
    }

    #[test]
    fn test_retry_bound() {
        let temp = TempDir::new().unwrap();
        let staging = staging(&temp);
        let downloader = ScriptedDownloader::new(vec![]);
        let resolver = FixedResolver::new(Some(Resolution::Unchanged));
        let acquisition = Acquisition::new(&downloader, &resolver, &staging, Backoff::none());

        let mut retry = RetryState::new(4);
        let err = acquisition.acquire(&mut group(), &mut retry).unwrap_err();

        assert_eq!(downloader.calls().len(), 4);
        assert_eq!(*resolver.calls.lock(), 1);
        assert_eq!(
            err,
            GroupFailure::RetriesExhausted {
                attempts: 4,
                url: ORIGINAL.to_string()
            }
        );
    }

    #[test]
    fn test_relocation() {
        let temp = TempDir::new().unwrap();
        let staging = staging(&temp);
        let downloader = ScriptedDownloader::new(vec![MOVED]);
        let resolver = FixedResolver::new(Some(Resolution::NewLocation(MOVED.to_string())));
        let acquisition = Acquisition::new(&downloader, &resolver, &staging, Backoff::none());

        let mut group = group();
        let mut retry = RetryState::new(10);
        acquisition.acquire(&mut group, &mut retry).unwrap();

        assert_eq!(downloader.calls(), vec![ORIGINAL, MOVED]);
        assert_eq!(group.archive_location(), MOVED);
        assert_eq!(group.archive_id(), "PMC1");
        assert!(group.is_relocated());
    }

    #[test]
    fn test_permanently_unavailable_stops_immediately() {
        let temp = TempDir::new().unwrap();
        let staging = staging(&temp);
        let downloader = ScriptedDownloader::new(vec![]);
        let resolver = FixedResolver::new(Some(Resolution::PermanentlyUnavailable(
            "no longer exists".to_string(),
        )));
        let acquisition = Acquisition::new(&downloader, &resolver, &staging, Backoff::none());

        let mut retry = RetryState::new(10);
        let err = acquisition.acquire(&mut group(), &mut retry).unwrap_err();

        assert_eq!(downloader.calls().len(), 1);
        assert!(matches!(err, GroupFailure::PermanentlyUnavailable { .. }));
    }

    #[test]
    fn test_resolver_error_treated_as_unchanged() {
        let temp = TempDir::new().unwrap();
        let staging = staging(&temp);
        let downloader = ScriptedDownloader::new(vec![]);
        let resolver = FixedResolver::new(None);
        let acquisition = Acquisition::new(&downloader, &resolver, &staging, Backoff::none());

        let mut retry = RetryState::new(3);
        let err = acquisition.acquire(&mut group(), &mut retry).unwrap_err();

        assert_eq!(downloader.calls().len(), 3);
        assert!(matches!(err, GroupFailure::RetriesExhausted { .. }));
    }

    #[test]
    fn test_spent_budget_makes_no_transfer() {
        let temp = TempDir::new().unwrap();
        let staging = staging(&temp);
        let downloader = ScriptedDownloader::new(vec![ORIGINAL]);
        let resolver = FixedResolver::new(Some(Resolution::Unchanged));
        let acquisition = Acquisition::new(&downloader, &resolver, &staging, Backoff::none());

        let mut retry = RetryState::new(1);
        retry.try_begin_attempt();
        let err = acquisition.acquire(&mut group(), &mut retry).unwrap_err();

        assert!(downloader.calls().is_empty());
        assert!(matches!(err, GroupFailure::RetriesExhausted { attempts: 1, .. }));
    }
}
