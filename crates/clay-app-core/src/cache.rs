//! Durable cache gateway: the versioned JSON envelope that survives
//! restarts.
//!
//! Persistence here is strictly best-effort.  The remote job history can
//! repopulate anything the cache loses, so every failure path (unreadable
//! slot, corrupt payload, schema change, foreign owner) degrades to "discard
//! and start empty" instead of surfacing an error to the live session.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use clay_types::Task;

/// Schema version of the persisted envelope.  A stored envelope with any
/// other version is discarded wholesale; there is no partial-migration
/// logic.
pub const CACHE_SCHEMA_VERSION: &str = "1";

const TASKS_FILE: &str = "tasks.json";
const AUTH_FILE: &str = "auth.json";

/// Persisted container for the task set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEnvelope {
    pub version: String,
    pub tasks: Vec<Task>,
    pub last_sync: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

/// Token/identity pair written by the auth flow; consulted only to decide
/// the cache owner at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredIdentity {
    pub token: String,
    pub user_id: String,
}

/// Seam between the task store and the durable slot.
///
/// The store calls [`TaskCache::save`] after every mutation; tests inject a
/// counting or in-memory implementation to observe persistence without
/// touching the filesystem.
pub trait TaskCache: Send + Sync {
    /// Persist the full task set.  Must not fail loudly; losing the durable
    /// copy never crashes the live session.
    fn save(&self, tasks: &[Task]);

    /// Load the cached task set, or empty when the slot is absent or has
    /// been discarded.
    fn load(&self) -> Vec<Task>;

    /// Remove the slot unconditionally.
    fn clear(&self);
}

/// Filesystem-backed [`TaskCache`]: one well-known `tasks.json` slot under
/// the cache directory.
pub struct FileCache {
    dir: PathBuf,
    owner: Option<String>,
}

impl FileCache {
    /// Cache rooted at `dir`, scoped to `owner` when given.
    ///
    /// An owner-scoped cache refuses (and discards) a slot written for a
    /// different identity, so one account's tasks never leak into another's
    /// session on a shared device.  An anonymous cache skips the check.
    pub fn new(dir: impl Into<PathBuf>, owner: Option<String>) -> Self {
        Self {
            dir: dir.into(),
            owner,
        }
    }

    /// Platform-default cache directory.
    pub fn default_dir() -> PathBuf {
        dirs_next::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("clay")
    }

    /// Read the identity slot next to the task cache, if the auth flow has
    /// written one.  Best-effort: any read or parse failure is `None`.
    pub fn stored_identity(dir: &Path) -> Option<String> {
        let data = fs::read_to_string(dir.join(AUTH_FILE)).ok()?;
        let identity: StoredIdentity = serde_json::from_str(&data).ok()?;
        Some(identity.user_id)
    }

    fn slot(&self) -> PathBuf {
        self.dir.join(TASKS_FILE)
    }

    fn try_save(&self, tasks: &[Task]) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create cache dir {}", self.dir.display()))?;
        let envelope = CacheEnvelope {
            version: CACHE_SCHEMA_VERSION.to_owned(),
            tasks: tasks.to_vec(),
            last_sync: Utc::now(),
            owner: self.owner.clone(),
        };
        let data = serde_json::to_string(&envelope)?;
        fs::write(self.slot(), data)
            .with_context(|| format!("failed to write {}", self.slot().display()))?;
        Ok(())
    }
}

impl TaskCache for FileCache {
    fn save(&self, tasks: &[Task]) {
        if let Err(e) = self.try_save(tasks) {
            warn!(error = %e, "failed to persist task cache");
        } else {
            debug!(count = tasks.len(), "task cache persisted");
        }
    }

    fn load(&self) -> Vec<Task> {
        let slot = self.slot();
        let data = match fs::read_to_string(&slot) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "task cache is unreadable; discarding");
                self.clear();
                return Vec::new();
            }
        };

        let envelope: CacheEnvelope = match serde_json::from_str(&data) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "task cache is corrupt; discarding");
                self.clear();
                return Vec::new();
            }
        };

        if envelope.version != CACHE_SCHEMA_VERSION {
            info!(
                stored = %envelope.version,
                running = CACHE_SCHEMA_VERSION,
                "task cache schema changed; discarding"
            );
            self.clear();
            return Vec::new();
        }

        if let Some(owner) = &self.owner {
            if envelope.owner.as_deref() != Some(owner.as_str()) {
                info!("task cache belongs to a different identity; discarding");
                self.clear();
                return Vec::new();
            }
        }

        envelope.tasks
    }

    fn clear(&self) {
        let _ = fs::remove_file(self.slot());
    }
}
