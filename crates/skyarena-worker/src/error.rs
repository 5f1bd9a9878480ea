//! Error types for the worker pool.

/// Why a job did not produce a value.
///
/// Every submitted job resolves its callback exactly once; these are the
/// failure outcomes it can observe. Jobs are never retried.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The job body reported a failure.
    #[error("job failed: {0}")]
    Failed(String),

    /// The job body hit an I/O error.
    #[error("job I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The job body panicked. The worker survives.
    #[error("job panicked: {0}")]
    Panicked(String),
}

/// Errors from pool management itself (not from job bodies).
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The pool was shut down and accepts no more jobs.
    #[error("worker pool is shut down")]
    ShutDown,

    /// No worker was available and a new thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}
