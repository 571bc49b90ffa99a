//! Bounded worker pool over archive groups.
//!
//! Each worker takes one whole group at a time and runs it to completion
//! with [`GroupJob`]. Groups share nothing but the staging root, where each
//! writes only below its own archive-id subdirectory.
//!
//! Progress events are queued in completion order and handed to the
//! callback on a separate notifier thread, so a slow callback never holds
//! up a worker.

use std::sync::mpsc;
use std::thread;

use parking_lot::Mutex;
use rayon::prelude::*;

use crate::error::{FetchError, FetchResult};
use crate::manifest::ArchiveGroup;
use crate::staging::StagingArea;
use crate::traits::{ArchiveReader, Downloader, ResolverService};

use super::job::GroupJob;
use super::outcome::{GroupOutcome, RunSummary};
use super::retry::Backoff;

/// Progress notification, emitted once per finished group.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// Groups finished so far, including this one.
    pub completed: usize,
    /// Groups in the run.
    pub total: usize,
    /// Outcome of the group that just finished.
    pub outcome: GroupOutcome,
}

impl ProgressEvent {
    /// Completion percentage, 0-100.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.completed as f64 / self.total as f64 * 100.0
        }
    }
}

/// Callback for progress updates.
pub type ProgressCallback = Box<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Per-worker settings derived from the run configuration.
#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub max_retries: u32,
    pub keep_archives: bool,
    pub backoff: Backoff,
}

/// Read-only collaborators and settings shared by every worker.
pub struct WorkerContext<A: ArchiveReader> {
    pub downloader: Box<dyn Downloader>,
    pub reader: A,
    pub resolver: Box<dyn ResolverService>,
    pub staging: StagingArea,
    pub settings: WorkerSettings,
}

/// Runs all groups on a fixed-size pool and aggregates their outcomes.
pub struct WorkCoordinator<A: ArchiveReader> {
    context: WorkerContext<A>,
    workers: usize,
}

impl<A: ArchiveReader> WorkCoordinator<A> {
    pub fn new(context: WorkerContext<A>, workers: usize) -> Self {
        Self {
            context,
            workers: workers.max(1),
        }
    }

    /// Process every group, then tear down the staging directory unless
    /// archives are kept.
    ///
    /// Individual group failures never abort the run; they are returned in
    /// the summary.
    pub fn run(
        &self,
        groups: Vec<ArchiveGroup>,
        on_progress: Option<&ProgressCallback>,
    ) -> FetchResult<RunSummary> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("archfetch-worker-{}", i))
            .build()
            .map_err(|e| FetchError::ThreadPool(e.to_string()))?;

        let total = groups.len();
        tracing::info!(groups = total, workers = self.workers, "Starting fetch");

        let finished: Mutex<Vec<GroupOutcome>> = Mutex::new(Vec::with_capacity(total));
        let (events, received) = mpsc::channel::<ProgressEvent>();

        thread::scope(|scope| {
            match on_progress {
                Some(callback) => {
                    scope.spawn(move || {
                        for event in received {
                            callback(&event);
                        }
                    });
                }
                None => drop(received),
            }

            pool.install(|| {
                groups.into_par_iter().for_each(|group| {
                    let outcome = GroupJob::new(group, &self.context).run();

                    // Queue under the lock so events follow the counter
                    let mut done = finished.lock();
                    done.push(outcome.clone());
                    let _ = events.send(ProgressEvent {
                        completed: done.len(),
                        total,
                        outcome,
                    });
                });
            });

            drop(events);
        });

        if !self.context.settings.keep_archives {
            if let Err(e) = self.context.staging.teardown() {
                tracing::warn!(error = %e, "Failed to remove staging directory");
            }
        }

        let summary = RunSummary::new(finished.into_inner());
        tracing::info!(
            groups = summary.total(),
            failed = summary.failed_count(),
            with_skips = summary.skipped_count(),
            placed = summary.placed_count(),
            "Fetch finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{ExtractError, ExtractResult};
    use crate::fetch::{DownloadError, DownloadResult};
    use crate::manifest::ManifestEntry;
    use crate::resolver::ResolveResult;
    use crate::traits::{ArchiveHandle, Resolution};
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    /// Writes an archive for every URL except those containing "broken".
    struct StubDownloader;

    impl Downloader for StubDownloader {
        fn fetch(&self, url: &str, dest_dir: &Path) -> DownloadResult<()> {
            if url.contains("broken") {
                return Err(DownloadError::Transfer {
                    url: url.to_string(),
                    reason: "refused".to_string(),
                });
            }
            let name = crate::manifest::archive_basename(url);
            fs::write(dest_dir.join(name), b"archive").unwrap();
            Ok(())
        }
    }

    struct StubResolver;

    impl ResolverService for StubResolver {
        fn resolve(&self, _: &str, _: &str) -> ResolveResult<Resolution> {
            Ok(Resolution::Unchanged)
        }
    }

    /// Every member exists and contains its own name.
    struct EchoReader;
    struct EchoHandle;

    impl ArchiveReader for EchoReader {
        type Handle = EchoHandle;

        fn open(&self, _path: &Path) -> ExtractResult<EchoHandle> {
            Ok(EchoHandle)
        }
    }

    impl ArchiveHandle for EchoHandle {
        fn extract(&mut self, member: &str, dest_dir: &Path) -> ExtractResult<PathBuf> {
            let dest = dest_dir.join(member);
            fs::create_dir_all(dest.parent().unwrap()).map_err(|e| ExtractError::Io {
                path: dest.clone(),
                source: e,
            })?;
            fs::write(&dest, member).unwrap();
            Ok(dest)
        }
    }

    fn coordinator(temp: &TempDir, keep_archives: bool) -> WorkCoordinator<EchoReader> {
        let staging = StagingArea::new(temp.path().join("staging"));
        staging.ensure(keep_archives, false).unwrap();
        WorkCoordinator::new(
            WorkerContext {
                downloader: Box::new(StubDownloader),
                reader: EchoReader,
                resolver: Box::new(StubResolver),
                staging,
                settings: WorkerSettings {
                    max_retries: 2,
                    keep_archives,
                    backoff: Backoff::none(),
                },
            },
            3,
        )
    }

    fn groups(out: &Path, hosts: &[&str]) -> Vec<ArchiveGroup> {
        hosts
            .iter()
            .enumerate()
            .map(|(i, host)| {
                let id = format!("PMC{}", i);
                ArchiveGroup::new(
                    ManifestEntry::new(
                        format!("ROCO_{}", i),
                        format!("ftp://{}/{}.tar.gz", host, id),
                        format!("{}/img.jpg", id),
                        out.join(format!("{}_img.jpg", id)),
                    )
                    .unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_failures_do_not_abort_run() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out");
        let coordinator = coordinator(&temp, false);

        let summary = coordinator
            .run(groups(&out, &["ok", "broken", "ok", "ok"]), None)
            .unwrap();

        assert_eq!(summary.total(), 4);
        assert_eq!(summary.failed_count(), 1);
        assert_eq!(summary.failed().next().unwrap().archive_id, "PMC1");
        assert_eq!(summary.placed_count(), 3);
        assert!(out.join("PMC3_img.jpg").is_file());
    }

    #[test]
    fn test_progress_counts_every_group() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out");
        let coordinator = coordinator(&temp, false);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));

        let seen_cb = Arc::clone(&seen);
        let calls_cb = Arc::clone(&calls);
        let callback: ProgressCallback = Box::new(move |event: &ProgressEvent| {
            calls_cb.fetch_add(1, Ordering::SeqCst);
            seen_cb.lock().push((event.completed, event.total));
        });

        coordinator
            .run(groups(&out, &["ok"; 6]), Some(&callback))
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 6);
        let seen = seen.lock();
        let counts: Vec<usize> = seen.iter().map(|(c, _)| *c).collect();
        assert_eq!(counts, vec![1, 2, 3, 4, 5, 6]);
        assert!(seen.iter().all(|(_, t)| *t == 6));
    }

    #[test]
    fn test_slow_callback_does_not_stall_workers() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out");
        let coordinator = coordinator(&temp, false);
        let targets: Vec<PathBuf> = (0..6)
            .map(|i| out.join(format!("PMC{}_img.jpg", i)))
            .collect();
        let placed_while_waiting = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&placed_while_waiting);
        let callback: ProgressCallback = Box::new(move |_event: &ProgressEvent| {
            if flag.load(Ordering::SeqCst) {
                return;
            }
            // Block the first event until every group has been placed
            let deadline = Instant::now() + Duration::from_secs(5);
            while Instant::now() < deadline {
                if targets.iter().all(|t| t.is_file()) {
                    flag.store(true, Ordering::SeqCst);
                    return;
                }
                thread::sleep(Duration::from_millis(10));
            }
        });

        let summary = coordinator
            .run(groups(&out, &["ok"; 6]), Some(&callback))
            .unwrap();

        assert_eq!(summary.total(), 6);
        assert!(placed_while_waiting.load(Ordering::SeqCst));
    }

    #[test]
    fn test_staging_removed_without_retention() {
        let temp = TempDir::new().unwrap();
        let coordinator = coordinator(&temp, false);

        coordinator
            .run(groups(&temp.path().join("out"), &["ok", "ok"]), None)
            .unwrap();

        assert!(!temp.path().join("staging").exists());
    }

    #[test]
    fn test_staging_kept_with_retention() {
        let temp = TempDir::new().unwrap();
        let coordinator = coordinator(&temp, true);

        coordinator
            .run(groups(&temp.path().join("out"), &["ok", "ok"]), None)
            .unwrap();

        let staging = temp.path().join("staging");
        assert!(staging.join("PMC0.tar.gz").is_file());
        assert!(staging.join("PMC1.tar.gz").is_file());
        assert!(!staging.join("PMC0").exists());
    }

    #[test]
    fn test_empty_run() {
        let temp = TempDir::new().unwrap();
        let summary = coordinator(&temp, false).run(Vec::new(), None).unwrap();
        assert_eq!(summary.total(), 0);
    }

    #[test]
    fn test_progress_percent() {
        let event = ProgressEvent {
            completed: 1,
            total: 4,
            outcome: GroupOutcome {
                archive_id: "PMC1".to_string(),
                status: crate::pipeline::GroupStatus::Completed,
                placed: 1,
                already_present: 0,
                skipped: Vec::new(),
                transfers: 1,
                final_location: String::new(),
            },
        };
        assert_eq!(event.percent(), 25.0);
    }
}
