//! Runtime configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

/// Tuning for the saga runtime and its background tasks.
///
/// Reads from environment variables:
/// - `MAX_CONFLICT_RETRIES` (default: `5`)
/// - `STUCK_AFTER_SECS` (default: `21600`, six hours)
/// - `STUCK_SCAN_INTERVAL_SECS` (default: `300`)
/// - `OUTBOX_POLL_INTERVAL_MS` (default: `500`)
/// - `OUTBOX_BATCH_SIZE` (default: `100`)
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Reload-and-retry attempts after a concurrency conflict.
    pub max_conflict_retries: u32,

    /// How long a saga may sit in one status before it is reported stuck.
    pub stuck_after: chrono::Duration,

    pub stuck_scan_interval: Duration,
    pub outbox_poll_interval: Duration,
    pub outbox_batch_size: usize,
}

impl RuntimeConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_conflict_retries: env_or("MAX_CONFLICT_RETRIES", defaults.max_conflict_retries),
            stuck_after: env_parse::<u32>("STUCK_AFTER_SECS")
                .map(|secs| chrono::Duration::seconds(i64::from(secs)))
                .unwrap_or(defaults.stuck_after),
            stuck_scan_interval: env_parse("STUCK_SCAN_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.stuck_scan_interval),
            outbox_poll_interval: env_parse("OUTBOX_POLL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.outbox_poll_interval),
            outbox_batch_size: env_or("OUTBOX_BATCH_SIZE", defaults.outbox_batch_size),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 5,
            stuck_after: chrono::Duration::hours(6),
            stuck_scan_interval: Duration::from_secs(300),
            outbox_poll_interval: Duration::from_millis(500),
            outbox_batch_size: 100,
        }
    }
}

/// Parses an environment variable, ignoring it if unset or malformed.
pub fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

pub fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env_parse(key).unwrap_or(default)
}
