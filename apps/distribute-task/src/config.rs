//! Run tuning.
//!
//! Optional TOML file; every key has a default, so an absent file or an
//! empty one behaves the same:
//!
//! ```toml
//! retry_count = 5
//! retry_interval_secs = 2
//! poll_interval_secs = 2
//! max_polls = 120
//! chunk_concurrency = 1
//! timeout_secs = 120
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use appcenter_api::RetryPolicy;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Tuning {
    /// Attempts per control-plane request, including the first.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Base backoff interval in seconds.
    #[serde(default = "default_interval_secs")]
    pub retry_interval_secs: u64,

    /// Seconds between release status checks.
    #[serde(default = "default_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_max_polls")]
    pub max_polls: u32,

    /// Chunk uploads in flight at once.
    #[serde(default = "default_chunk_concurrency")]
    pub chunk_concurrency: usize,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_retry_count() -> u32 {
    5
}

fn default_interval_secs() -> u64 {
    2
}

fn default_max_polls() -> u32 {
    120
}

fn default_chunk_concurrency() -> usize {
    1
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            retry_count: default_retry_count(),
            retry_interval_secs: default_interval_secs(),
            poll_interval_secs: default_interval_secs(),
            max_polls: default_max_polls(),
            chunk_concurrency: default_chunk_concurrency(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Tuning {
    /// Loads `path`, or the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let tuning: Tuning = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!(path = %path.display(), ?tuning, "tuning loaded");
        Ok(tuning)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::compound(self.retry_count, Duration::from_secs(self.retry_interval_secs))
    }

    pub fn poll_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.max_polls, Duration::from_secs(self.poll_interval_secs))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
