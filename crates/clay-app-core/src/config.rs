//! Tracker configuration, loaded from environment variables at startup.

use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the job tracker.
///
/// Every field has a sensible default so the tracker works out-of-the-box
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Base URL of the remote job service (default: `"http://localhost:3000"`).
    pub api_base_url: String,

    /// Fixed period between poll cycles (default: 5 s).
    pub poll_interval: Duration,

    /// Per-request HTTP timeout (default: 30 s).
    pub http_timeout: Duration,

    /// Attempts per remote call, including the first (default: `3`).
    pub http_attempts: usize,

    /// Delay between attempts (default: 1 s).
    pub http_retry_delay: Duration,

    /// Page size for the reconciliation history fetch (default: `50`).
    pub history_page_size: usize,

    /// Override for the durable-cache directory.  `None` uses the platform
    /// data directory.
    pub cache_dir: Option<PathBuf>,

    /// Identity the cached task set is scoped to.  `None` means anonymous /
    /// single-user mode, and the identity slot on disk is consulted instead.
    pub owner: Option<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000".to_owned(),
            poll_interval: Duration::from_secs(5),
            http_timeout: Duration::from_secs(30),
            http_attempts: 3,
            http_retry_delay: Duration::from_secs(1),
            history_page_size: 50,
            cache_dir: None,
            owner: None,
        }
    }
}

impl TrackerConfig {
    /// Build [`TrackerConfig`] from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_base_url: env_or("CLAY_API_URL", &defaults.api_base_url),
            poll_interval: Duration::from_secs(parse_env("CLAY_POLL_INTERVAL_SECS", 5)),
            http_timeout: Duration::from_secs(parse_env("CLAY_HTTP_TIMEOUT_SECS", 30)),
            http_attempts: parse_env("CLAY_HTTP_ATTEMPTS", defaults.http_attempts),
            http_retry_delay: Duration::from_secs(parse_env("CLAY_HTTP_RETRY_DELAY_SECS", 1)),
            history_page_size: parse_env("CLAY_HISTORY_LIMIT", defaults.history_page_size),
            cache_dir: std::env::var("CLAY_CACHE_DIR").ok().map(PathBuf::from),
            owner: None,
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
