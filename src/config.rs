//! Registry configuration.
//!
//! Retry count and interval for the lookup protocol are operational constants,
//! not protocol-mandated values; deployments tune them to their worker startup
//! latency.

use std::time::Duration;

/// Total lookup attempts made by [`get`](crate::registry::Registry::get)
/// before the final attempt forces worker creation.
pub const DEFAULT_LOOKUP_ATTEMPTS: u32 = 5;

/// Pause between lookup attempts, giving a just-spawned worker time to
/// complete self-registration.
pub const DEFAULT_LOOKUP_INTERVAL: Duration = Duration::from_millis(100);

/// Base URL used when rendering pull-request links in crash reports.
pub const DEFAULT_PR_BASE_URL: &str = "https://github.com";

/// Configuration for the batcher registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Base URL for pull-request links in crash reports.
    /// Links are rendered as `<base>/<project name>/pull/<number>`.
    pub pr_base_url: String,

    /// Total attempts `get` makes before returning; the last attempt spawns a
    /// worker unconditionally instead of re-checking the directory.
    pub lookup_attempts: u32,

    /// Sleep between directory checks in `get`.
    pub lookup_interval: Duration,
}

impl RegistryConfig {
    /// Creates a configuration with the given PR-link base URL and default
    /// lookup tuning.
    pub fn new(pr_base_url: impl Into<String>) -> Self {
        RegistryConfig {
            pr_base_url: pr_base_url.into(),
            lookup_attempts: DEFAULT_LOOKUP_ATTEMPTS,
            lookup_interval: DEFAULT_LOOKUP_INTERVAL,
        }
    }

    /// Sets the total number of lookup attempts (minimum 1).
    pub fn with_lookup_attempts(mut self, attempts: u32) -> Self {
        self.lookup_attempts = attempts.max(1);
        self
    }

    /// Sets the pause between lookup attempts.
    pub fn with_lookup_interval(mut self, interval: Duration) -> Self {
        self.lookup_interval = interval;
        self
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig::new(DEFAULT_PR_BASE_URL)
    }
}
