use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::RemoteError;
use crate::types::{HistoryQuery, JobHistoryRecord, JobResultInfo, JobStatus};

/// The consumed remote contracts: live status, secondary result info, and
/// the authoritative job history.
///
/// Dyn-compatible so the tracker can run against a fake implementation in
/// tests and so the HTTP client stays swappable.
#[async_trait]
pub trait RemoteJobs: Send + Sync {
    /// Live status for one job.
    async fn job_status(&self, job_id: &str) -> Result<JobStatus, RemoteError>;

    /// Download metadata for a finished job.  Secondary and best-effort:
    /// callers fall back to [`RemoteJobs::download_route`] when this fails.
    async fn job_result_info(&self, job_id: &str) -> Result<JobResultInfo, RemoteError>;

    /// One page of the remote job history.
    async fn job_history(&self, query: &HistoryQuery) -> Result<Vec<JobHistoryRecord>, RemoteError>;

    /// The well-known download route for a job, used to synthesize a usable
    /// result reference when the result-info fetch is unavailable.
    fn download_route(&self, job_id: &str) -> String;
}

/// HTTP implementation of [`RemoteJobs`] over the job service's REST API.
pub struct HttpRemoteJobs {
    base_url: String,
    retry_count: usize,
    retry_delay: Duration,
    client: Client,
}

impl HttpRemoteJobs {
    /// Create a client for the service at `base_url`.
    ///
    /// Defaults: 30 s request timeout, 3 attempts per call, 1 s between
    /// attempts.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .user_agent(concat!("clay/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry_count: 3,
            retry_delay: Duration::from_secs(1),
            client,
        }
    }

    /// Set the number of attempts per call (default: `3`).
    pub fn set_retry_count(mut self, count: usize) -> Self {
        self.retry_count = count.max(1);
        self
    }

    /// Set the delay between attempts (default: 1 s).
    pub fn set_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&'static str, String)],
    ) -> Result<T, RemoteError> {
        let url = self.url(path);
        let mut last_err = RemoteError::InvalidResponse {
            message: "request was not attempted".to_string(),
        };
        for attempt in 0..self.retry_count {
            match self.get_json_once(&url, params).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    debug!(url = %url, attempt, error = %e, "remote request failed");
                    last_err = e;
                    if attempt + 1 < self.retry_count {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }
        Err(last_err)
    }

    async fn get_json_once<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&'static str, String)],
    ) -> Result<T, RemoteError> {
        let resp = self
            .client
            .get(url)
            .query(params)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json::<T>().await?)
    }
}

#[async_trait]
impl RemoteJobs for HttpRemoteJobs {
    async fn job_status(&self, job_id: &str) -> Result<JobStatus, RemoteError> {
        self.get_json(&format!("/api/jobs/{job_id}/status"), &[]).await
    }

    async fn job_result_info(&self, job_id: &str) -> Result<JobResultInfo, RemoteError> {
        self.get_json(&format!("/api/jobs/{job_id}/result"), &[]).await
    }

    async fn job_history(&self, query: &HistoryQuery) -> Result<Vec<JobHistoryRecord>, RemoteError> {
        self.get_json("/api/jobs/history", &query.to_params()).await
    }

    fn download_route(&self, job_id: &str) -> String {
        self.url(&format!("/api/jobs/{job_id}/download"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = HttpRemoteJobs::new("https://api.example.com/");
        assert_eq!(
            client.url("/api/jobs/history"),
            "https://api.example.com/api/jobs/history"
        );
    }

    #[test]
    fn download_route_follows_the_known_template() {
        let client = HttpRemoteJobs::new("https://api.example.com");
        assert_eq!(
            client.download_route("job-42"),
            "https://api.example.com/api/jobs/job-42/download"
        );
    }

    #[test]
    fn retry_count_has_a_floor_of_one_attempt() {
        let client = HttpRemoteJobs::new("https://api.example.com").set_retry_count(0);
        assert_eq!(client.retry_count, 1);
    }
}
