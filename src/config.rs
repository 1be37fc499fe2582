//! Service configuration.
//!
//! A plain serde-derived struct with a [`Default`] impl and an
//! environment-variable loader. Construction is a boundary concern; once
//! built, wrap in `Arc` and share across components.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// TTL applied to expirable cache entries (spec §4.1 `DEFAULT_EXPIRE`).
    pub default_expire: Duration,
    /// Budget for the upstream index (IPNI) call in the source race
    /// (spec §4.6.1 step 2 `IPNI_TIMEOUT`).
    pub ipni_timeout: Duration,
    /// How often the remote-sync notifier polls for our own advertisement
    /// head (spec §4.6.3 `POLL_INTERVAL`).
    pub poll_interval: Duration,
    /// Maximum number of keys written per cache-population batch
    /// (spec §4.6.2 `MAX_BATCH_SIZE`).
    pub max_batch_size: usize,
    /// Bounded job queue buffer size (spec §4.2).
    pub queue_buffer: usize,
    /// Bounded job queue worker concurrency (spec §4.2).
    pub queue_concurrency: usize,
    /// Per-job timeout for the bounded job queue (spec §4.2).
    pub queue_job_timeout: Duration,
    /// Grace period the bounded job queue waits for in-flight jobs to drain
    /// during shutdown before cancelling their contexts (spec §4.2).
    pub queue_shutdown_timeout: Duration,
    /// Fan-out concurrency bound for the parallel job walker (spec §4.3).
    pub walker_concurrency: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_expire: Duration::from_secs(3600),
            ipni_timeout: Duration::from_millis(1500),
            poll_interval: Duration::from_secs(30),
            max_batch_size: 10_000,
            queue_buffer: 1024,
            queue_concurrency: 16,
            queue_job_timeout: Duration::from_secs(30),
            queue_shutdown_timeout: Duration::from_secs(10),
            walker_concurrency: 32,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables, falling back to
    /// [`Default`] for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_expire: env_duration_secs("DEFAULT_EXPIRE_SECS", defaults.default_expire),
            ipni_timeout: env_duration_millis("IPNI_TIMEOUT_MS", defaults.ipni_timeout),
            poll_interval: env_duration_secs("POLL_INTERVAL_SECS", defaults.poll_interval),
            max_batch_size: env_usize("MAX_BATCH_SIZE", defaults.max_batch_size),
            queue_buffer: env_usize("QUEUE_BUFFER", defaults.queue_buffer),
            queue_concurrency: env_usize("QUEUE_CONCURRENCY", defaults.queue_concurrency),
            queue_job_timeout: env_duration_secs("QUEUE_JOB_TIMEOUT_SECS", defaults.queue_job_timeout),
            queue_shutdown_timeout: env_duration_secs(
                "QUEUE_SHUTDOWN_TIMEOUT_SECS",
                defaults.queue_shutdown_timeout,
            ),
            walker_concurrency: env_usize("WALKER_CONCURRENCY", defaults.walker_concurrency),
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
