//! Job-lifecycle tracking core for the clay client.
//!
//! Feature panels submit mesh-generation jobs to the remote service and
//! register them here; this crate keeps the local record set durable across
//! sessions, polls the service for progress, and reconciles the local set
//! against the authoritative remote history on startup and on demand.
//!
//! Startup order (see [`Tracker::init`]):
//! 1. Load the durable cache (version- and owner-checked).
//! 2. Fetch one page of remote job history and merge it in (local wins).
//! 3. Hydrate the task store with the merged set and re-persist it.
//!
//! Thereafter the polling scheduler advances active tasks until terminal,
//! and every store mutation re-persists the set.

mod cache;
mod config;
mod reconcile;
mod scheduler;
mod store;


pub use cache::{CACHE_SCHEMA_VERSION, CacheEnvelope, FileCache, StoredIdentity, TaskCache};
pub use config::TrackerConfig;
pub use reconcile::{merge_history, reconcile, task_from_history};
pub use scheduler::{PollHandle, PollScheduler};
pub use store::TaskStore;

pub use clay_remote::{HttpRemoteJobs, RemoteJobs};
pub use clay_types::{Task, TaskDraft, TaskId, TaskKind, TaskPatch, TaskResult, TaskStatus};

use std::sync::Arc;

/// Wires the store, cache, remote clients, and scheduler together for the
/// embedding UI.
///
/// Constructed explicitly and passed by handle to whichever components need
/// it; there is no process-wide instance.
pub struct Tracker {
    store: TaskStore,
    scheduler: PollScheduler,
    remote: Arc<dyn RemoteJobs>,
    cache: Arc<dyn TaskCache>,
    history_page_size: usize,
    handle: Option<PollHandle>,
}

impl Tracker {
    /// Tracker over the real HTTP client and filesystem cache.
    ///
    /// The cache owner is the configured one, falling back to the identity
    /// slot on disk when the auth flow has written one.
    pub fn new(config: TrackerConfig) -> Self {
        let remote: Arc<dyn RemoteJobs> = Arc::new(
            HttpRemoteJobs::with_timeout(config.api_base_url.as_str(), config.http_timeout)
                .set_retry_count(config.http_attempts)
                .set_retry_delay(config.http_retry_delay),
        );
        let dir = config
            .cache_dir
            .clone()
            .unwrap_or_else(FileCache::default_dir);
        let owner = config
            .owner
            .clone()
            .or_else(|| FileCache::stored_identity(&dir));
        let cache: Arc<dyn TaskCache> = Arc::new(FileCache::new(dir, owner));
        Self::with_parts(&config, remote, cache)
    }

    /// Tracker over injected collaborators (tests, alternative transports).
    pub fn with_parts(
        config: &TrackerConfig,
        remote: Arc<dyn RemoteJobs>,
        cache: Arc<dyn TaskCache>,
    ) -> Self {
        let store = TaskStore::new(Arc::clone(&cache));
        let scheduler = PollScheduler::new(store.clone(), Arc::clone(&remote), config.poll_interval);
        Self {
            store,
            scheduler,
            remote,
            cache,
            history_page_size: config.history_page_size,
            handle: None,
        }
    }

    /// Load the durable cache, reconcile it against remote history, and
    /// hydrate the store with the merged set (which re-persists it).
    pub async fn init(&self) {
        let local = self.cache.load();
        let merged = reconcile(local, self.remote.as_ref(), self.history_page_size).await;
        self.store.hydrate(merged).await;
    }

    /// Re-reconcile the live task set against remote history (manual
    /// refresh, user switch).
    pub async fn refresh(&self) {
        let local = self.store.tasks().await;
        let merged = reconcile(local, self.remote.as_ref(), self.history_page_size).await;
        self.store.hydrate(merged).await;
    }

    /// The authoritative task store; feature panels create, retry, and
    /// delete tasks through it.
    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Start the polling loop (idempotent).
    pub fn start_polling(&mut self) {
        if self.handle.is_none() {
            self.handle = Some(self.scheduler.start());
        }
    }

    /// Stop scheduling poll cycles.  In-flight fetches resolve harmlessly.
    pub fn stop_polling(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }

    /// Run one poll cycle outside the fixed schedule.
    pub async fn poll_now(&self) {
        self.scheduler.run_cycle().await;
    }
}
