//! Merges the locally-cached task set with the authoritative remote job
//! history.
//!
//! Local records win on every join-key collision: they carry the full
//! request detail (files, prompts, parameters) that the remote history does
//! not retain.  History exists to recover jobs this device never recorded,
//! e.g. ones submitted from another session.

use std::collections::HashSet;

use tracing::{debug, warn};
use uuid::Uuid;

use clay_remote::{HistoryQuery, JobHistoryRecord, RemoteJobs};
use clay_types::{Task, TaskKind, TaskResult, TaskStatus};

/// Convert one remote history record into a local task shape.
///
/// The display name is synthesized from the kind label and the trailing
/// segment of the remote job id; unknown feature tags fall back to the
/// default kind instead of erroring.  A `result` is built only for completed
/// records, and failed records get no `error` text because the history
/// endpoint does not supply a cause.
pub fn task_from_history(record: &JobHistoryRecord) -> Task {
    let kind = TaskKind::from_feature_tag(&record.feature);
    let short_id = record
        .job_id
        .rsplit('-')
        .next()
        .unwrap_or(record.job_id.as_str());
    let terminal = record.status.is_terminal();

    let result = (record.status == TaskStatus::Completed)
        .then(|| {
            record.result.as_ref().map(|output| TaskResult {
                mesh_path: output.mesh_location.clone(),
                preview_image_url: output.thumbnail_location.clone(),
                generation_info: output.generation_info.clone(),
                ..TaskResult::default()
            })
        })
        .flatten();

    Task {
        id: Uuid::new_v4(),
        job_id: Some(record.job_id.clone()),
        kind,
        name: format!("{} #{short_id}", kind.label()),
        status: record.status,
        created_at: record.created_at,
        // History records for finished jobs are expected to carry the
        // completion timestamp; fall back to created_at so the terminal
        // invariant (completed_at set iff terminal) holds either way.
        completed_at: terminal.then(|| record.completed_at.unwrap_or(record.created_at)),
        processing_time: if terminal { record.processing_time } else { None },
        progress: if record.status == TaskStatus::Completed { 100 } else { 0 },
        input_data: serde_json::Value::Null,
        result,
        error: None,
        input_image_url: None,
        model_preference: record.model_preference.clone(),
    }
}

/// Merge the local task list with a remote history snapshot into one
/// deduplicated list ordered by `created_at` descending.
///
/// Every local task is kept as-is; remote records whose `job_id` is already
/// tracked locally are dropped.  Reapplying the same snapshot to an
/// already-merged list reproduces the same list.
pub fn merge_history(local: Vec<Task>, remote: &[JobHistoryRecord]) -> Vec<Task> {
    let mut seen: HashSet<String> = local.iter().filter_map(|t| t.job_id.clone()).collect();
    let mut merged = local;
    for record in remote {
        if seen.contains(&record.job_id) {
            continue;
        }
        seen.insert(record.job_id.clone());
        merged.push(task_from_history(record));
    }
    merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    merged
}

/// Fetch one bounded, unfiltered history page and merge it with `local`.
///
/// Reconciliation is an enhancement, not a dependency: when the fetch fails
/// the local list is returned unchanged.
pub async fn reconcile(local: Vec<Task>, remote: &dyn RemoteJobs, page_size: usize) -> Vec<Task> {
    let query = HistoryQuery::default().with_limit(page_size);
    match remote.job_history(&query).await {
        Ok(records) => {
            debug!(
                local = local.len(),
                remote = records.len(),
                "merging remote job history"
            );
            merge_history(local, &records)
        }
        Err(e) => {
            warn!(error = %e, "history fetch failed; keeping local task list");
            local
        }
    }
}
