use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::kind::TaskKind;
use crate::status::TaskStatus;

/// Unique identifier for a locally-tracked task.
///
/// Assigned at creation and never reused.  Distinct from the remote job id,
/// which only exists once the remote service has accepted the submission.
pub type TaskId = Uuid;

/// Output references for a completed task.
///
/// `mesh_path` and `preview_image_url` come from the status response;
/// `download_url`, `file_size`, and `file_format` from the secondary
/// result-info fetch (or, if that fails, `download_url` is synthesized from
/// the job id and the known download route).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    #[serde(default)]
    pub mesh_path: Option<String>,
    #[serde(default)]
    pub preview_image_url: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub file_format: Option<String>,
    #[serde(default)]
    pub generation_info: Option<serde_json::Value>,
}

/// One tracked unit of remote work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Identifier assigned by the remote service once submission succeeds.
    /// Unique across the task set when present; the reconciler join key.
    /// A task without a job id is never polled.
    #[serde(default)]
    pub job_id: Option<String>,
    pub kind: TaskKind,
    pub name: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    /// Set exactly once, on the transition into a terminal status.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Remote-reported duration in seconds; terminal-only.
    #[serde(default)]
    pub processing_time: Option<f64>,
    /// 0..=100; non-decreasing in practice (not enforced).
    #[serde(default)]
    pub progress: u8,
    /// Opaque snapshot of what was submitted (files, prompts, parameters).
    /// Captured at creation and never mutated; the remote history does not
    /// retain this detail, which is why local records win on merge.
    #[serde(default)]
    pub input_data: serde_json::Value,
    #[serde(default)]
    pub result: Option<TaskResult>,
    #[serde(default)]
    pub error: Option<String>,
    /// May arrive asynchronously from a status response; once set, never
    /// overwritten.
    #[serde(default)]
    pub input_image_url: Option<String>,
    /// May arrive asynchronously from a status response; once set, never
    /// overwritten.
    #[serde(default)]
    pub model_preference: Option<String>,
}

/// Create-side shape of a [`Task`]: everything except the fields the store
/// assigns (`id`, `created_at`).
#[derive(Debug, Clone)]
pub struct TaskDraft {
    pub kind: TaskKind,
    pub name: String,
    pub status: TaskStatus,
    pub progress: u8,
    pub job_id: Option<String>,
    pub input_data: serde_json::Value,
    pub input_image_url: Option<String>,
    pub model_preference: Option<String>,
}

impl TaskDraft {
    /// New draft in the state a feature panel submits in: `Queued`, zero
    /// progress.
    pub fn new(kind: TaskKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            status: TaskStatus::Queued,
            progress: 0,
            job_id: None,
            input_data: serde_json::Value::Null,
            input_image_url: None,
            model_preference: None,
        }
    }

    /// Attach the remote job id returned by a successful submission.
    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    /// Snapshot the submitted request payload.
    pub fn with_input_data(mut self, input: serde_json::Value) -> Self {
        self.input_data = input;
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

    /// Turn the draft into a full task with store-assigned identity.
    pub fn materialize(self, id: TaskId, created_at: DateTime<Utc>) -> Task {
        Task {
            id,
            job_id: self.job_id,
            kind: self.kind,
            name: self.name,
            status: self.status,
            created_at,
            completed_at: None,
            processing_time: None,
            progress: self.progress,
            input_data: self.input_data,
            result: None,
            error: None,
            input_image_url: self.input_image_url,
            model_preference: self.model_preference,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn draft_materializes_with_assigned_identity() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let task = TaskDraft::new(TaskKind::ImageToMesh, "Image to Mesh #1")
            .with_job_id("job-42")
            .with_input_data(json!({"image": "chair.png", "faces": 20000}))
            .materialize(id, now);

        assert_eq!(task.id, id);
        assert_eq!(task.created_at, now);
        assert_eq!(task.job_id.as_deref(), Some("job-42"));
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.progress, 0);
        assert!(task.completed_at.is_none());
        assert!(task.result.is_none());
        assert!(task.error.is_none());
    }

    #[test]
    fn task_round_trips_through_json_with_rfc3339_timestamps() {
        let task = TaskDraft::new(TaskKind::Texture, "Texture #7")
            .with_job_id("job-7")
            .materialize(Uuid::new_v4(), Utc::now());

        let encoded = serde_json::to_string(&task).unwrap();
        let decoded: Task = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, task);

        // Timestamps must serialize as RFC 3339 strings, not numbers.
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert!(value["created_at"].is_string());
    }
}
