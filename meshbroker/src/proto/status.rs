//! Job status reporting.

use crate::proto::job::JobId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The broker-visible states of a job.
///
/// `Queued → InProgress → (Finished | Failed | Expired)` is the only legal
/// chain; the broker never regresses a status. `Invalid` is an error reply
/// for unknown job ids, never a stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    Queued,
    InProgress,
    Finished,
    Failed,
    Expired,
    Invalid,
}

impl JobState {
    /// Terminal states cannot be left once entered.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Finished | JobState::Failed | JobState::Expired)
    }

    /// Rank along the status chain, used for the monotonicity check.
    fn rank(&self) -> u8 {
        match self {
            JobState::Invalid => 0,
            JobState::Queued => 1,
            JobState::InProgress => 2,
            JobState::Finished | JobState::Failed | JobState::Expired => 3,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Queued => "QUEUED",
            JobState::InProgress => "IN_PROGRESS",
            JobState::Finished => "FINISHED",
            JobState::Failed => "FAILED",
            JobState::Expired => "EXPIRED",
            JobState::Invalid => "INVALID",
        };
        f.write_str(name)
    }
}

/// Optional progress attached to an in-progress status.
///
/// `value` is clamped to `[-1, 100]`; `-1` means "working, percentage
/// unknown".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    value: i32,
    message: String,
}

impl JobProgress {
    pub fn new(value: i32) -> Self {
        Self {
            value: value.clamp(-1, 100),
            message: String::new(),
        }
    }

    pub fn with_message(value: i32, message: impl Into<String>) -> Self {
        Self {
            value: value.clamp(-1, 100),
            message: message.into(),
        }
    }

    pub fn value(&self) -> i32 {
        self.value
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Default for JobProgress {
    fn default() -> Self {
        Self::new(-1)
    }
}

/// A job's state plus optional progress, as reported to clients and
/// received from workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub id: JobId,
    pub state: JobState,
    pub progress: Option<JobProgress>,
}

impl JobStatus {
    pub fn new(id: JobId, state: JobState) -> Self {
        Self {
            id,
            state,
            progress: None,
        }
    }

    /// An in-progress status carrying a progress report.
    pub fn in_progress(id: JobId, progress: JobProgress) -> Self {
        Self {
            id,
            state: JobState::InProgress,
            progress: Some(progress),
        }
    }

    /// The reply sent for status queries about unknown jobs.
    pub fn invalid(id: JobId) -> Self {
        Self::new(id, JobState::Invalid)
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Merges `update` into `self` without ever regressing the state chain.
    ///
    /// Progress reports for the current state replace the stored progress;
    /// updates for an earlier state (or any update to a terminal state) are
    /// discarded.
    pub fn merge(&mut self, update: &JobStatus) {
        if self.state.is_terminal() {
            return;
        }
        if update.state.rank() < self.state.rank() {
            return;
        }
        self.state = update.state;
        if update.progress.is_some() {
            self.progress = update.progress.clone();
        }
    }
}
