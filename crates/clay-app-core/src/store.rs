use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use clay_types::{Task, TaskDraft, TaskId, TaskPatch, TaskStatus};

use crate::cache::TaskCache;

/// The in-memory task set plus the three derived id-indices.
///
/// The indices are rebuilt or adjusted inside every mutation so that a
/// task's id appears in exactly the index matching its `status` by the time
/// any mutating call returns.
#[derive(Default)]
struct StoreInner {
    tasks: Vec<Task>,
    active: Vec<TaskId>,
    completed: Vec<TaskId>,
    failed: Vec<TaskId>,
}

impl StoreInner {
    fn index(&mut self, id: TaskId, status: TaskStatus) {
        match status {
            TaskStatus::Queued | TaskStatus::Processing => self.active.push(id),
            TaskStatus::Completed => self.completed.push(id),
            TaskStatus::Failed => self.failed.push(id),
        }
    }

    fn unindex(&mut self, id: TaskId) {
        self.active.retain(|other| *other != id);
        self.completed.retain(|other| *other != id);
        self.failed.retain(|other| *other != id);
    }

    fn rebuild_indices(&mut self) {
        self.active.clear();
        self.completed.clear();
        self.failed.clear();
        let mut pairs: Vec<(TaskId, TaskStatus)> =
            self.tasks.iter().map(|t| (t.id, t.status)).collect();
        for (id, status) in pairs.drain(..) {
            self.index(id, status);
        }
    }
}

/// Authoritative in-memory task collection for the running application.
///
/// Cheap to clone; all clones share the same state.  Every mutation is a
/// critical section behind the write lock, and every mutation that changes
/// state re-persists the full set through the injected [`TaskCache`].
/// Full-set writes are deliberate: task sets are small, and never missing a
/// persist matters more than write efficiency.
#[derive(Clone)]
pub struct TaskStore {
    inner: Arc<RwLock<StoreInner>>,
    cache: Arc<dyn TaskCache>,
}

impl TaskStore {
    /// Create an empty store persisting through `cache`.
    pub fn new(cache: Arc<dyn TaskCache>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner::default())),
            cache,
        }
    }

    /// Replace the whole task set (startup hydration after reconciliation)
    /// and persist the new set.
    pub async fn hydrate(&self, tasks: Vec<Task>) {
        let mut inner = self.inner.write().await;
        inner.tasks = tasks;
        inner.rebuild_indices();
        self.cache.save(&inner.tasks);
        debug!(count = inner.tasks.len(), "task store hydrated");
    }

    /// Assign identity to `draft`, append it to the set, index it, persist,
    /// and return the new id.
    pub async fn create(&self, draft: TaskDraft) -> TaskId {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let mut inner = self.inner.write().await;

        if let Some(job_id) = &draft.job_id {
            if inner
                .tasks
                .iter()
                .any(|t| t.job_id.as_deref() == Some(job_id.as_str()))
            {
                warn!(%job_id, "creating a task whose job id is already tracked");
            }
        }

        let task = draft.materialize(id, now);
        debug!(task_id = %id, kind = %task.kind, "task created");
        inner.index(id, task.status);
        inner.tasks.push(task);
        self.cache.save(&inner.tasks);
        id
    }

    /// Merge `patch` into the task with `id`.
    ///
    /// Unknown ids are a no-op: callers (late poll responses in particular)
    /// may race with deletion.  A patch that changes nothing skips the
    /// persist; one that moves `status` also moves the id between indices
    /// before the call returns.
    pub async fn update(&self, id: TaskId, patch: TaskPatch) {
        let mut inner = self.inner.write().await;
        let Some(pos) = inner.tasks.iter().position(|t| t.id == id) else {
            debug!(task_id = %id, "update for unknown task id; ignoring");
            return;
        };

        let (old_status, changed, new_status) = {
            let task = &mut inner.tasks[pos];
            let old_status = task.status;
            let changed = task.apply(patch, Utc::now());
            (old_status, changed, task.status)
        };

        if !changed {
            return;
        }
        if new_status != old_status {
            inner.unindex(id);
            inner.index(id, new_status);
        }
        self.cache.save(&inner.tasks);
    }

    /// Delete the task and drop its id from every index.  Unknown ids are a
    /// no-op.
    pub async fn remove(&self, id: TaskId) {
        let mut inner = self.inner.write().await;
        let Some(pos) = inner.tasks.iter().position(|t| t.id == id) else {
            debug!(task_id = %id, "remove for unknown task id; ignoring");
            return;
        };
        inner.tasks.remove(pos);
        inner.unindex(id);
        self.cache.save(&inner.tasks);
    }

    /// Bulk-remove every task currently indexed under the given terminal
    /// status.  Non-terminal statuses are rejected.
    pub async fn clear_terminal(&self, kind: TaskStatus) {
        if !kind.is_terminal() {
            warn!(%kind, "clear_terminal called with a non-terminal status; ignoring");
            return;
        }
        let mut inner = self.inner.write().await;
        let doomed = match kind {
            TaskStatus::Completed => std::mem::take(&mut inner.completed),
            TaskStatus::Failed => std::mem::take(&mut inner.failed),
            _ => unreachable!("guarded above"),
        };
        if doomed.is_empty() {
            return;
        }
        inner.tasks.retain(|t| t.status != kind);
        self.cache.save(&inner.tasks);
        debug!(count = doomed.len(), %kind, "cleared terminal tasks");
    }

    /// Manual retry: reset a failed task to `Queued` so polling picks it up
    /// again.  Anything not currently failed is a no-op (the transition
    /// guards in [`Task::apply`] reject it).
    pub async fn retry(&self, id: TaskId) {
        self.update(id, TaskPatch::status(TaskStatus::Queued)).await;
    }

    // ── Read accessors ───────────────────────────────────────────────────────

    pub async fn get(&self, id: TaskId) -> Option<Task> {
        self.inner.read().await.tasks.iter().find(|t| t.id == id).cloned()
    }

    /// Snapshot of the full set, in stored order.
    pub async fn tasks(&self) -> Vec<Task> {
        self.inner.read().await.tasks.clone()
    }

    /// Snapshot of the tasks in the active index.
    pub async fn active_tasks(&self) -> Vec<Task> {
        let inner = self.inner.read().await;
        inner
            .active
            .iter()
            .filter_map(|id| inner.tasks.iter().find(|t| t.id == *id))
            .cloned()
            .collect()
    }

    pub async fn active_ids(&self) -> Vec<TaskId> {
        self.inner.read().await.active.clone()
    }

    pub async fn completed_ids(&self) -> Vec<TaskId> {
        self.inner.read().await.completed.clone()
    }

    pub async fn failed_ids(&self) -> Vec<TaskId> {
        self.inner.read().await.failed.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.tasks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.tasks.is_empty()
    }
}
