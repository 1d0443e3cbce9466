//! Periodic status polling for in-progress tasks.
//!
//! One cycle reads the active index, dispatches one concurrent status fetch
//! per pollable task, and feeds any observed change back into the store.
//! Cycles never stack: a tick that fires while the previous cycle is still
//! in flight is skipped outright.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use clay_remote::RemoteJobs;
use clay_types::{Task, TaskPatch, TaskResult, TaskStatus};

use crate::store::TaskStore;

/// Generic failure text: the status endpoint does not reliably supply a
/// detailed cause.
const GENERIC_FAILURE_MESSAGE: &str = "The remote service reported the job as failed";

/// Drives the per-task status checks on a fixed period.
///
/// Cheap to clone; clones share the re-entrancy guard, so at most one cycle
/// runs at a time across all of them.
#[derive(Clone)]
pub struct PollScheduler {
    store: TaskStore,
    remote: Arc<dyn RemoteJobs>,
    interval: Duration,
    in_flight: Arc<AtomicBool>,
}

impl PollScheduler {
    pub fn new(store: TaskStore, remote: Arc<dyn RemoteJobs>, interval: Duration) -> Self {
        Self {
            store,
            remote,
            interval,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawn the polling loop.
    ///
    /// The first check runs immediately rather than a full interval from
    /// now.  Scheduling stops when the returned handle is stopped or
    /// dropped; an in-flight cycle finishes its fetches first.
    pub fn start(&self) -> PollHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let scheduler = self.clone();
        let join = tokio::spawn(async move {
            scheduler.run_cycle().await;
            let mut ticker = tokio::time::interval(scheduler.interval);
            // The first interval tick completes immediately; swallow it so
            // the immediate poll above is not doubled.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => scheduler.run_cycle().await,
                }
            }
            debug!("poll scheduler stopped");
        });
        PollHandle { stop_tx, join }
    }

    /// Run one poll cycle.
    ///
    /// Skips outright (zero remote calls) when a previous cycle is still in
    /// flight.  The guard is cleared regardless of per-task outcomes.
    pub async fn run_cycle(&self) {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!("previous poll cycle still in flight; skipping tick");
            return;
        }

        let pollable: Vec<Task> = self
            .store
            .active_tasks()
            .await
            .into_iter()
            .filter(|t| t.job_id.is_some())
            .collect();

        if !pollable.is_empty() {
            // One independent fetch per task: a failure in one never blocks
            // or fails another's update.
            futures::future::join_all(pollable.into_iter().map(|task| self.poll_one(task))).await;
        }

        self.in_flight.store(false, Ordering::SeqCst);
    }

    async fn poll_one(&self, task: Task) {
        let Some(job_id) = task.job_id.clone() else {
            return;
        };

        let status = match self.remote.job_status(&job_id).await {
            Ok(status) => status,
            Err(e) => {
                debug!(%job_id, error = %e, "status poll failed; retrying next cycle");
                return;
            }
        };

        // Compare every field the remote is allowed to report before
        // touching the store: update always re-persists, so a no-change
        // response must not turn into a write.
        let mut patch = TaskPatch::default();
        if status.status != task.status {
            patch.status = Some(status.status);
        }
        if let Some(progress) = status.progress {
            if progress.min(100) != task.progress {
                patch.progress = Some(progress);
            }
        }
        if task.input_image_url.is_none() {
            patch.input_image_url = status.input_image_url.clone();
        }
        if task.model_preference.is_none() {
            patch.model_preference = status.model_preference.clone();
        }

        let entering_terminal = status.status.is_terminal() && status.status != task.status;
        if entering_terminal {
            patch.completed_at = status.completed_at;
            patch.processing_time = status.processing_time;
            match status.status {
                TaskStatus::Completed => {
                    patch.progress = Some(100);
                    patch.result = Some(self.build_result(&job_id, status.result).await);
                    info!(task_id = %task.id, %job_id, "task completed");
                }
                TaskStatus::Failed => {
                    patch.error = Some(GENERIC_FAILURE_MESSAGE.to_owned());
                    info!(task_id = %task.id, %job_id, "task failed");
                }
                _ => unreachable!("guarded by is_terminal"),
            }
        }

        if patch.is_empty() {
            return;
        }
        self.store.update(task.id, patch).await;
    }

    /// Assemble the result for a freshly-completed task.
    ///
    /// Output/preview locations come from the status response; the download
    /// URL, size, and format from the secondary result-info fetch.  When
    /// that fetch fails the download URL is synthesized from the job id and
    /// the known download route, so the task never completes without a
    /// usable result reference.
    async fn build_result(
        &self,
        job_id: &str,
        output: Option<clay_remote::JobOutput>,
    ) -> TaskResult {
        let mut result = TaskResult::default();
        if let Some(output) = output {
            result.mesh_path = output.mesh_location;
            result.preview_image_url = output.thumbnail_location;
            result.generation_info = output.generation_info;
        }

        match self.remote.job_result_info(job_id).await {
            Ok(info) => {
                result.download_url = Some(info.downloadable_url);
                result.file_size = info.file_size;
                result.file_format = info.file_extension;
            }
            Err(e) => {
                debug!(%job_id, error = %e, "result info fetch failed; synthesizing download reference");
                result.download_url = Some(self.remote.download_route(job_id));
            }
        }
        result
    }
}

/// Handle to a running polling loop.
pub struct PollHandle {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl PollHandle {
    /// Stop scheduling further cycles.  In-flight fetches are not cancelled;
    /// their late updates land as no-ops if the task is gone.
    pub fn stop(self) {
        let _ = self.stop_tx.send(true);
    }

    /// Stop and wait for the loop (including any in-flight cycle) to drain.
    pub async fn stopped(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.join.await;
    }
}
