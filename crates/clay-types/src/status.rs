use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// High-level lifecycle state of a tracked remote job.
///
/// Legal transitions: `Queued -> Processing -> Completed | Failed`, with the
/// direct `Queued -> Completed | Failed` shortcuts for jobs that finish
/// between two polls.  `Completed` and `Failed` are absorbing for the polling
/// path; only an explicit user retry moves a `Failed` task back to `Queued`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    /// Accepted by the remote service but not yet started.
    #[serde(alias = "pending")]
    Queued,
    /// Actively running on the remote service.
    #[serde(alias = "running", alias = "in_progress")]
    Processing,
    /// Finished successfully; a result is available.
    #[serde(alias = "succeeded", alias = "success")]
    Completed,
    /// Finished unsuccessfully.
    #[serde(alias = "error")]
    Failed,
}

impl TaskStatus {
    /// Returns `true` if the task has reached a terminal state.
    ///
    /// Callers that decide whether a task is still pollable should use this
    /// method rather than matching individual variants.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Returns `true` if the task still belongs in the active index.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}
