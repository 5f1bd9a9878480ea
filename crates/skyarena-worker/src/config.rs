//! Worker pool configuration.

use std::time::Duration;

/// Settings for a [`WorkerPool`](crate::WorkerPool).
///
/// Arena deletion is bursty: an operator removes a few arenas and then
/// nothing happens for hours. The pool therefore starts empty, spawns a
/// thread per concurrent job up to `max_workers`, and shuts threads down
/// again once they have been idle for `idle_timeout`.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Upper bound on worker threads.
    pub max_workers: usize,

    /// How long a worker may sit idle before the reclamation sweep stops it.
    pub idle_timeout: Duration,

    /// Prefix for worker thread names (`<prefix>-<id>`).
    pub thread_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: 2,
            idle_timeout: Duration::from_secs(5 * 60),
            thread_name: "skyarena-worker".to_string(),
        }
    }
}

impl PoolConfig {
    /// Hard ceiling regardless of configuration.
    pub const MAX_WORKERS: usize = 64;

    /// Clamps `max_workers` into `1..=MAX_WORKERS`.
    pub fn validated(mut self) -> Self {
        if self.max_workers == 0 || self.max_workers > Self::MAX_WORKERS {
            tracing::warn!(
                requested = self.max_workers,
                max = Self::MAX_WORKERS,
                "max_workers out of range, clamping"
            );
            self.max_workers = self.max_workers.clamp(1, Self::MAX_WORKERS);
        }
        if self.thread_name.is_empty() {
            self.thread_name = Self::default().thread_name;
        }
        self
    }
}
