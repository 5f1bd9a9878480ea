//! The worker thread: receives jobs, runs them, reports back.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::JobError;
use crate::pool::JobId;

/// Type-erased job body as it travels to a worker.
pub(crate) type ErasedBody =
    Box<dyn FnOnce(&mut WorkerScratch) -> Result<Box<dyn Any + Send>, JobError> + Send>;

/// Messages a worker thread understands.
pub(crate) enum WorkerMessage {
    Run { id: JobId, body: ErasedBody },
    /// Release scratch buffers.
    Reclaim,
    /// Finish queued jobs, then exit.
    Shutdown,
}

/// A job outcome on its way back to the main context.
pub(crate) struct Finished {
    pub(crate) worker: usize,
    pub(crate) id: JobId,
    pub(crate) result: Result<Box<dyn Any + Send>, JobError>,
}

/// Per-thread state a job body may borrow.
///
/// Buffers grow to fit the largest job a worker has run and are only
/// released by the periodic memory reclamation sweep.
#[derive(Debug, Default)]
pub struct WorkerScratch {
    /// Traversal stack for directory walks.
    pub(crate) dirs: Vec<PathBuf>,
    /// Directories to remove once their contents are gone (post-order).
    pub(crate) visited: Vec<PathBuf>,
    jobs_run: u64,
}

impl WorkerScratch {
    /// Jobs this worker has executed.
    pub fn jobs_run(&self) -> u64 {
        self.jobs_run
    }

    /// Drops every retained buffer. Returns the number of path slots freed.
    pub fn reclaim(&mut self) -> usize {
        let freed = self.dirs.capacity() + self.visited.capacity();
        self.dirs = Vec::new();
        self.visited = Vec::new();
        freed
    }
}

/// Worker thread body. Runs until `Shutdown` or until the pool drops
/// its sender.
pub(crate) fn run_worker(
    worker: usize,
    mut jobs: mpsc::UnboundedReceiver<WorkerMessage>,
    done: mpsc::UnboundedSender<Finished>,
) {
    tracing::debug!(worker, "worker started");
    let mut scratch = WorkerScratch::default();

    while let Some(msg) = jobs.blocking_recv() {
        match msg {
            WorkerMessage::Run { id, body } => {
                let result = panic::catch_unwind(AssertUnwindSafe(|| body(&mut scratch)))
                    .unwrap_or_else(|payload| Err(JobError::Panicked(panic_message(&payload))));
                scratch.jobs_run += 1;
                scratch.dirs.clear();
                scratch.visited.clear();

                if let Err(e) = &result {
                    tracing::debug!(worker, %id, error = %e, "job failed");
                }
                if done.send(Finished { worker, id, result }).is_err() {
                    // Pool is gone; nobody is left to run the callback.
                    break;
                }
            }
            WorkerMessage::Reclaim => {
                let freed = scratch.reclaim();
                tracing::trace!(worker, freed, "worker scratch reclaimed");
            }
            WorkerMessage::Shutdown => break,
        }
    }

    tracing::debug!(worker, jobs = scratch.jobs_run, "worker stopped");
}

fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_reclaim_releases_capacity() {
        let mut scratch = WorkerScratch::default();
        scratch.dirs.reserve(32);
        scratch.visited.push(PathBuf::from("a"));

        let freed = scratch.reclaim();

        assert!(freed >= 33);
        assert_eq!(scratch.dirs.capacity(), 0);
        assert_eq!(scratch.visited.capacity(), 0);
    }

    #[test]
    fn test_panic_message_extracts_strings() {
        let a: Box<dyn Any + Send> = Box::new("boom");
        let b: Box<dyn Any + Send> = Box::new(String::from("bang"));
        let c: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(&a), "boom");
        assert_eq!(panic_message(&b), "bang");
        assert_eq!(panic_message(&c), "non-string panic payload");
    }
}
