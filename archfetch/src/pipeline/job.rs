//! Per-group state machine.
//!
//! ```text
//! Pending ──► Acquiring ──► Extracting{0} ──► Extracting{1} ──► … ──► Finished
//!    │            │  ▲            │
//!    │            │  └── CorruptRetry{n}
//!    ▼            ▼
//! Finished     Finished(Failed)
//! ```
//!
//! A job is driven by [`GroupJob::step`] until it reaches `Finished`;
//! [`GroupJob::run`] does that and then removes the group's staging state.

use std::path::PathBuf;

use crate::archive::ExtractError;
use crate::manifest::ArchiveGroup;
use crate::traits::{ArchiveHandle, ArchiveReader};

use super::acquire::Acquisition;
use super::coordinator::WorkerContext;
use super::extract::copy_into_place;
use super::outcome::{GroupFailure, GroupOutcome, GroupStatus, MemberSkip};
use super::retry::RetryState;

/// Where a group is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupPhase {
    /// Not started.
    Pending,
    /// Fetching the archive; extraction resumes at member `resume_at`.
    Acquiring { resume_at: usize },
    /// Working on member index `member`.
    Extracting { member: usize },
    /// The archive turned out unreadable while working on `member`.
    CorruptRetry { member: usize },
    /// Terminal.
    Finished(GroupStatus),
}

/// Processes one archive group from acquisition to cleanup.
pub struct GroupJob<'a, A: ArchiveReader> {
    group: ArchiveGroup,
    ctx: &'a WorkerContext<A>,
    retry: RetryState,
    phase: GroupPhase,
    archive: Option<PathBuf>,
    handle: Option<A::Handle>,
    placed: usize,
    already_present: usize,
    skipped: Vec<MemberSkip>,
}

impl<'a, A: ArchiveReader> GroupJob<'a, A> {
    pub fn new(group: ArchiveGroup, ctx: &'a WorkerContext<A>) -> Self {
        Self {
            group,
            ctx,
            retry: RetryState::new(ctx.settings.max_retries),
            phase: GroupPhase::Pending,
            archive: None,
            handle: None,
            placed: 0,
            already_present: 0,
            skipped: Vec::new(),
        }
    }

    pub fn phase(&self) -> &GroupPhase {
        &self.phase
    }

    pub fn group(&self) -> &ArchiveGroup {
        &self.group
    }

    /// Advance by one transition. Returns `false` once finished.
    pub fn step(&mut self) -> bool {
        let next = match self.phase {
            GroupPhase::Pending => self.start(),
            GroupPhase::Acquiring { resume_at } => self.acquire(resume_at),
            GroupPhase::Extracting { member } => self.extract(member),
            GroupPhase::CorruptRetry { member } => self.discard_archive(member),
            GroupPhase::Finished(_) => return false,
        };
        self.phase = next;
        !matches!(self.phase, GroupPhase::Finished(_))
    }

    /// Run to completion, clean up, and report.
    pub fn run(mut self) -> GroupOutcome {
        let status = loop {
            if let GroupPhase::Finished(status) = &self.phase {
                break status.clone();
            }
            self.step();
        };
        self.cleanup();

        match status {
            GroupStatus::Failed(ref reason) => tracing::error!(
                archive_id = self.group.archive_id(),
                reason = %reason,
                "Group failed"
            ),
            ref status => tracing::info!(
                archive_id = self.group.archive_id(),
                status = %status,
                placed = self.placed,
                skipped = self.skipped.len(),
                "Group finished"
            ),
        }

        GroupOutcome {
            archive_id: self.group.archive_id().to_string(),
            status,
            placed: self.placed,
            already_present: self.already_present,
            skipped: self.skipped,
            transfers: self.retry.attempts(),
            final_location: self.group.archive_location().to_string(),
        }
    }

    fn start(&mut self) -> GroupPhase {
        if self.group.is_satisfied() {
            self.already_present = self.group.len();
            tracing::debug!(
                archive_id = self.group.archive_id(),
                "All targets present, nothing to fetch"
            );
            return GroupPhase::Finished(GroupStatus::AlreadyPresent);
        }
        GroupPhase::Acquiring { resume_at: 0 }
    }

    fn acquire(&mut self, resume_at: usize) -> GroupPhase {
        let acquisition = Acquisition::new(
            self.ctx.downloader.as_ref(),
            self.ctx.resolver.as_ref(),
            &self.ctx.staging,
            self.ctx.settings.backoff,
        );

        match acquisition.acquire(&mut self.group, &mut self.retry) {
            Ok(path) => {
                self.archive = Some(path);
                GroupPhase::Extracting { member: resume_at }
            }
            Err(failure) => GroupPhase::Finished(GroupStatus::Failed(failure)),
        }
    }

    fn extract(&mut self, index: usize) -> GroupPhase {
        let Some(entry) = self.group.entries().get(index) else {
            let status = if self.skipped.is_empty() {
                GroupStatus::Completed
            } else {
                GroupStatus::CompletedWithSkips
            };
            return GroupPhase::Finished(status);
        };
        let next = GroupPhase::Extracting { member: index + 1 };

        if entry.is_placed() {
            self.already_present += 1;
            return next;
        }

        let member = entry.member_name().to_string();
        let target = entry.target_path().to_path_buf();
        let ctx = self.ctx;

        let handle = match self.open_handle() {
            Ok(handle) => handle,
            Err(e) => return self.classify(index, &member, e),
        };

        let extracted = match handle.extract(&member, ctx.staging.root()) {
            Ok(path) => path,
            Err(e) => return self.classify(index, &member, e),
        };

        if let Err(e) = copy_into_place(&extracted, &target) {
            return GroupPhase::Finished(GroupStatus::Failed(GroupFailure::Io {
                reason: format!("failed to place {}: {}", target.display(), e),
            }));
        }

        tracing::debug!(
            archive_id = self.group.archive_id(),
            member = %member,
            target = %target.display(),
            "Placed member"
        );
        self.placed += 1;
        next
    }

    /// The open archive, opening it on first use.
    fn open_handle(&mut self) -> Result<&mut A::Handle, ExtractError> {
        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => {
                let path = self
                    .archive
                    .clone()
                    .unwrap_or_else(|| self.group.local_archive_path(self.ctx.staging.root()));
                self.ctx.reader.open(&path)?
            }
        };
        Ok(self.handle.insert(handle))
    }

    fn classify(&mut self, index: usize, member: &str, error: ExtractError) -> GroupPhase {
        match error {
            ExtractError::MemberAbsent { .. } | ExtractError::UnsafeMember { .. } => {
                tracing::warn!(
                    archive_id = self.group.archive_id(),
                    member,
                    reason = %error,
                    "Skipping member"
                );
                self.skipped.push(MemberSkip {
                    member: member.to_string(),
                    reason: error.to_string(),
                });
                GroupPhase::Extracting { member: index + 1 }
            }
            ExtractError::Corrupt { .. } => {
                tracing::warn!(
                    archive_id = self.group.archive_id(),
                    member,
                    reason = %error,
                    "Archive unreadable, downloading again"
                );
                GroupPhase::CorruptRetry { member: index }
            }
            ExtractError::Io { .. } => GroupPhase::Finished(GroupStatus::Failed(GroupFailure::Io {
                reason: error.to_string(),
            })),
        }
    }

    fn discard_archive(&mut self, member: usize) -> GroupPhase {
        self.handle = None;
        if let Some(path) = self.archive.take() {
            if let Err(e) = self.ctx.staging.remove_archive(&path) {
                return GroupPhase::Finished(GroupStatus::Failed(GroupFailure::Io {
                    reason: e.to_string(),
                }));
            }
        }
        GroupPhase::Acquiring { resume_at: member }
    }

    fn cleanup(&mut self) {
        self.handle = None;
        let staging = &self.ctx.staging;

        if let Err(e) = staging.remove_group_subdir(self.group.archive_id()) {
            tracing::warn!(archive_id = self.group.archive_id(), error = %e, "Cleanup failed");
        }

        if !self.ctx.settings.keep_archives {
            let path = self
                .archive
                .take()
                .unwrap_or_else(|| self.group.local_archive_path(staging.root()));
            if let Err(e) = staging.remove_archive(&path) {
                tracing::warn!(archive_id = self.group.archive_id(), error = %e, "Cleanup failed");
            }
        }
    }
}
