use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clay_types::TaskStatus;

/// Output locations reported by the remote service for a finished job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobOutput {
    #[serde(default)]
    pub mesh_location: Option<String>,
    #[serde(default)]
    pub thumbnail_location: Option<String>,
    #[serde(default)]
    pub generation_info: Option<serde_json::Value>,
}

/// Live status of a single job, as returned by the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub status: TaskStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Duration in seconds; reported only for finished jobs.
    #[serde(default)]
    pub processing_time: Option<f64>,
    #[serde(default)]
    pub progress: Option<u8>,
    #[serde(default)]
    pub model_preference: Option<String>,
    #[serde(default)]
    pub input_image_url: Option<String>,
    #[serde(default)]
    pub result: Option<JobOutput>,
}

/// Download metadata from the secondary result-info endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResultInfo {
    pub downloadable_url: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub file_extension: Option<String>,
}

/// One record of the authoritative remote job history.
///
/// History carries the status/timing fields of [`JobStatus`] plus the
/// producing feature tag, but not the full request detail of the original
/// submission; that detail only exists in locally-created task records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHistoryRecord {
    pub job_id: String,
    pub feature: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub processing_time: Option<f64>,
    #[serde(default)]
    pub model_preference: Option<String>,
    #[serde(default)]
    pub result: Option<JobOutput>,
}

/// Filters and pagination for a history fetch.
#[derive(Debug, Clone)]
pub struct HistoryQuery {
    /// `None` queries all statuses.
    pub status: Option<TaskStatus>,
    pub feature: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            status: None,
            feature: None,
            from: None,
            to: None,
            limit: 50,
            offset: 0,
        }
    }
}

impl HistoryQuery {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Flatten into URL query parameters; unset filters are omitted.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("limit", self.limit.to_string()),
            ("offset", self.offset.to_string()),
        ];
        if let Some(status) = self.status {
            params.push(("status", status.to_string()));
        }
        if let Some(feature) = &self.feature {
            params.push(("feature", feature.clone()));
        }
        if let Some(from) = self.from {
            params.push(("from", from.to_rfc3339()));
        }
        if let Some(to) = self.to {
            params.push(("to", to.to_rfc3339()));
        }
        params
    }
}
