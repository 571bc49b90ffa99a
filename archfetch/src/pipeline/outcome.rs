//! Per-group outcomes and the run summary.

use std::fmt;

use thiserror::Error;

/// Why a group ended in failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupFailure {
    /// Every transfer attempt failed.
    #[error("giving up on {url} after {attempts} attempts")]
    RetriesExhausted { attempts: u32, url: String },

    /// The resolver confirmed the archive is gone.
    #[error("archive permanently unavailable: {reason}")]
    PermanentlyUnavailable { reason: String },

    /// Local filesystem error while extracting or placing a member.
    #[error("I/O failure: {reason}")]
    Io { reason: String },
}

/// Final status of one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupStatus {
    /// Every missing member was placed.
    Completed,
    /// Some members could not be taken from the archive.
    CompletedWithSkips,
    /// All targets already existed; nothing was transferred.
    AlreadyPresent,
    /// The group was abandoned.
    Failed(GroupFailure),
}

impl GroupStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Short label for progress output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "done",
            Self::CompletedWithSkips => "done with skips",
            Self::AlreadyPresent => "not needed",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "failed: {}", reason),
            other => f.write_str(other.label()),
        }
    }
}

/// A member that was not placed, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSkip {
    pub member: String,
    pub reason: String,
}

/// Everything known about a finished group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupOutcome {
    pub archive_id: String,
    pub status: GroupStatus,
    /// Members copied to their target during this run.
    pub placed: usize,
    /// Members whose target already existed.
    pub already_present: usize,
    pub skipped: Vec<MemberSkip>,
    /// Transfer attempts made (successful or not).
    pub transfers: u32,
    /// Location the archive was last fetched from.
    pub final_location: String,
}

/// Outcomes of every group in a run, in completion order.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    outcomes: Vec<GroupOutcome>,
}

impl RunSummary {
    pub fn new(outcomes: Vec<GroupOutcome>) -> Self {
        Self { outcomes }
    }

    pub fn outcomes(&self) -> &[GroupOutcome] {
        &self.outcomes
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Groups that ended in failure.
    pub fn failed(&self) -> impl Iterator<Item = &GroupOutcome> {
        self.outcomes.iter().filter(|o| o.status.is_failed())
    }

    /// Groups that completed with skipped members.
    pub fn with_skips(&self) -> impl Iterator<Item = &GroupOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status == GroupStatus::CompletedWithSkips)
    }

    /// Groups that needed no work.
    pub fn already_present(&self) -> impl Iterator<Item = &GroupOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status == GroupStatus::AlreadyPresent)
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    pub fn skipped_count(&self) -> usize {
        self.with_skips().count()
    }

    /// Members placed across all groups.
    pub fn placed_count(&self) -> usize {
        self.outcomes.iter().map(|o| o.placed).sum()
    }

    /// Transfer attempts across all groups.
    pub fn transfer_count(&self) -> u32 {
        self.outcomes.iter().map(|o| o.transfers).sum()
    }

    /// Look up a group's outcome by archive id.
    pub fn get(&self, archive_id: &str) -> Option<&GroupOutcome> {
        self.outcomes.iter().find(|o| o.archive_id == archive_id)
    }
}
