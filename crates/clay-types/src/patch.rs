use chrono::{DateTime, Utc};

use crate::status::TaskStatus;
use crate::task::{Task, TaskResult};

/// Typed partial update for a [`Task`].
///
/// Every scheduler- or user-mutable field appears as an `Option`; `None`
/// means "leave unchanged".  Illegal combinations (a `completed_at` without a
/// terminal status, an `error` on a non-failed task, a downgrade out of a
/// terminal state through the polling path) are rejected by [`Task::apply`]
/// rather than silently written.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub job_id: Option<String>,
    pub status: Option<TaskStatus>,
    pub progress: Option<u8>,
    pub result: Option<TaskResult>,
    pub error: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub processing_time: Option<f64>,
    pub input_image_url: Option<String>,
    pub model_preference: Option<String>,
}

impl TaskPatch {
    /// Patch that only moves the status.
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_result(mut self, result: TaskResult) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }

    pub fn with_processing_time(mut self, seconds: f64) -> Self {
        self.processing_time = Some(seconds);
        self
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn with_input_image_url(mut self, url: impl Into<String>) -> Self {
        self.input_image_url = Some(url.into());
        self
    }

    pub fn with_model_preference(mut self, model: impl Into<String>) -> Self {
        self.model_preference = Some(model.into());
        self
    }

    /// `true` when the patch carries no fields at all.
    pub fn is_empty(&self) -> bool {
        self.job_id.is_none()
            && self.status.is_none()
            && self.progress.is_none()
            && self.result.is_none()
            && self.error.is_none()
            && self.completed_at.is_none()
            && self.processing_time.is_none()
            && self.input_image_url.is_none()
            && self.model_preference.is_none()
    }
}

impl Task {
    /// Merge `patch` into the task.  Returns `true` if any field changed.
    ///
    /// This is the single state-transition point for both polling and manual
    /// actions.  `now` is passed in (rather than read from the clock) so the
    /// transition logic stays deterministic under test; it is used to stamp
    /// `completed_at` when a terminal transition arrives without a
    /// remote-reported timestamp.
    pub fn apply(&mut self, patch: TaskPatch, now: DateTime<Utc>) -> bool {
        let mut changed = false;

        // Resolve the status transition first; the field guards below depend
        // on the resulting status.
        let next_status = patch
            .status
            .filter(|next| *next != self.status && transition_allowed(self.status, *next));

        if let Some(next) = next_status {
            if self.status.is_terminal() {
                // Leaving a terminal state only happens on user retry; the
                // attempt-scoped fields must reset so the terminal invariants
                // hold for the new attempt.
                self.completed_at = None;
                self.processing_time = None;
                self.result = None;
                self.error = None;
                self.progress = 0;
            }
            self.status = next;
            changed = true;
            if next.is_terminal() {
                self.completed_at = Some(patch.completed_at.unwrap_or(now));
            }
        }

        if let Some(progress) = patch.progress {
            let progress = progress.min(100);
            if progress != self.progress {
                self.progress = progress;
                changed = true;
            }
        }

        if let Some(seconds) = patch.processing_time {
            if self.status.is_terminal() && self.processing_time.is_none() {
                self.processing_time = Some(seconds);
                changed = true;
            }
        }

        if let Some(result) = patch.result {
            if self.status == TaskStatus::Completed && self.result.as_ref() != Some(&result) {
                self.result = Some(result);
                changed = true;
            }
        }

        if let Some(error) = patch.error {
            if self.status == TaskStatus::Failed && self.error.as_deref() != Some(error.as_str()) {
                self.error = Some(error);
                changed = true;
            }
        }

        if let Some(job_id) = patch.job_id {
            if self.job_id.is_none() {
                self.job_id = Some(job_id);
                changed = true;
            }
        }

        if let Some(url) = patch.input_image_url {
            if self.input_image_url.is_none() {
                self.input_image_url = Some(url);
                changed = true;
            }
        }

        if let Some(model) = patch.model_preference {
            if self.model_preference.is_none() {
                self.model_preference = Some(model);
                changed = true;
            }
        }

        changed
    }
}

/// Forward-only status machine.
///
/// `Failed -> Queued` is the manual-retry path; polling never requests it
/// because terminal tasks leave the pollable set.
fn transition_allowed(from: TaskStatus, to: TaskStatus) -> bool {
    use TaskStatus::*;
    matches!(
        (from, to),
        (Queued, Processing | Completed | Failed) | (Processing, Completed | Failed) | (Failed, Queued)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::TaskKind;
    use crate::task::TaskDraft;
    use uuid::Uuid;

    fn queued_task() -> Task {
        TaskDraft::new(TaskKind::TextToMesh, "Text to Mesh #1")
            .with_job_id("job-1")
            .materialize(Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn queued_may_skip_processing_and_complete_directly() {
        let mut task = queued_task();
        let changed = task.apply(
            TaskPatch::status(TaskStatus::Completed).with_processing_time(4.2),
            Utc::now(),
        );
        assert!(changed);
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.completed_at.is_some());
        assert_eq!(task.processing_time, Some(4.2));
    }

    #[test]
    fn completed_at_is_stamped_once_and_never_overwritten() {
        let mut task = queued_task();
        let first = Utc::now();
        task.apply(TaskPatch::status(TaskStatus::Completed), first);
        let stamped = task.completed_at;
        assert_eq!(stamped, Some(first));

        // A later patch carrying a different timestamp must not move it.
        let changed = task.apply(
            TaskPatch::default().with_completed_at(first + chrono::Duration::hours(1)),
            Utc::now(),
        );
        assert!(!changed);
        assert_eq!(task.completed_at, stamped);
    }

    #[test]
    fn completed_at_requires_a_terminal_status() {
        let mut task = queued_task();
        let changed = task.apply(TaskPatch::default().with_completed_at(Utc::now()), Utc::now());
        assert!(!changed);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn terminal_status_is_absorbing_for_polling_shaped_patches() {
        let mut task = queued_task();
        task.apply(TaskPatch::status(TaskStatus::Completed), Utc::now());

        let changed = task.apply(TaskPatch::status(TaskStatus::Processing), Utc::now());
        assert!(!changed);
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[test]
    fn retry_resets_failed_task_to_queued_and_clears_attempt_fields() {
        let mut task = queued_task();
        task.apply(
            TaskPatch::status(TaskStatus::Failed)
                .with_error("generation failed")
                .with_progress(80),
            Utc::now(),
        );
        assert!(task.completed_at.is_some());

        let changed = task.apply(TaskPatch::status(TaskStatus::Queued), Utc::now());
        assert!(changed);
        assert_eq!(task.status, TaskStatus::Queued);
        assert!(task.completed_at.is_none());
        assert!(task.error.is_none());
        assert!(task.result.is_none());
        assert_eq!(task.progress, 0);
    }

    #[test]
    fn completed_tasks_cannot_be_retried() {
        let mut task = queued_task();
        task.apply(TaskPatch::status(TaskStatus::Completed), Utc::now());
        let changed = task.apply(TaskPatch::status(TaskStatus::Queued), Utc::now());
        assert!(!changed);
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[test]
    fn error_only_lands_on_failed_tasks() {
        let mut task = queued_task();
        let changed = task.apply(TaskPatch::default().with_error("nope"), Utc::now());
        assert!(!changed);
        assert!(task.error.is_none());

        task.apply(TaskPatch::status(TaskStatus::Failed).with_error("nope"), Utc::now());
        assert_eq!(task.error.as_deref(), Some("nope"));
    }

    #[test]
    fn result_only_lands_on_completed_tasks() {
        let mut task = queued_task();
        let result = TaskResult {
            mesh_path: Some("meshes/chair.glb".into()),
            ..TaskResult::default()
        };
        let changed = task.apply(TaskPatch::default().with_result(result.clone()), Utc::now());
        assert!(!changed);
        assert!(task.result.is_none());

        task.apply(
            TaskPatch::status(TaskStatus::Completed).with_result(result.clone()),
            Utc::now(),
        );
        assert_eq!(task.result, Some(result));
    }

    #[test]
    fn async_arriving_fields_are_set_once() {
        let mut task = queued_task();
        task.apply(
            TaskPatch::default()
                .with_input_image_url("https://cdn/input/1.png")
                .with_model_preference("clay-v2"),
            Utc::now(),
        );

        let changed = task.apply(
            TaskPatch::default()
                .with_input_image_url("https://cdn/input/other.png")
                .with_model_preference("clay-v3"),
            Utc::now(),
        );
        assert!(!changed);
        assert_eq!(task.input_image_url.as_deref(), Some("https://cdn/input/1.png"));
        assert_eq!(task.model_preference.as_deref(), Some("clay-v2"));
    }

    #[test]
    fn progress_clamps_to_one_hundred() {
        let mut task = queued_task();
        task.apply(TaskPatch::default().with_progress(250), Utc::now());
        assert_eq!(task.progress, 100);
    }

    #[test]
    fn empty_patch_changes_nothing() {
        let mut task = queued_task();
        let before = task.clone();
        assert!(TaskPatch::default().is_empty());
        assert!(!task.apply(TaskPatch::default(), Utc::now()));
        assert_eq!(task, before);
    }
}
