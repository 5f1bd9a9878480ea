//! The elastic worker pool and its main-context completion queue.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tokio::sync::mpsc;

use crate::worker::{ErasedBody, Finished, WorkerMessage, run_worker};
use crate::{JobError, PoolConfig, PoolError, WorkerScratch};

/// Identifier of a submitted job, unique per pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Main-side callback, type-erased. Runs with the main-context state `C`.
type ErasedCallback<C> = Box<dyn FnOnce(&mut C, Result<Box<dyn Any + Send>, JobError>)>;

/// A finished job whose completion callback has not run yet.
///
/// Returned by [`WorkerPool::collect`]. The owner runs it against its
/// main-context state with [`Completed::dispatch`]; keeping the two
/// steps apart lets the pool live inside that same state.
#[must_use = "a completed job does nothing until dispatched"]
pub struct Completed<C> {
    id: JobId,
    callback: ErasedCallback<C>,
    result: Result<Box<dyn Any + Send>, JobError>,
}

impl<C> Completed<C> {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Whether the job body succeeded.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Runs the completion callback.
    pub fn dispatch(self, ctx: &mut C) {
        (self.callback)(ctx, self.result);
    }
}

impl<C> fmt::Debug for Completed<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completed")
            .field("id", &self.id)
            .field("ok", &self.result.is_ok())
            .finish()
    }
}

/// Outcome of one maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Idle workers that were shut down.
    pub reclaimed_workers: usize,
    /// Workers that received a memory reclamation request.
    pub swept_workers: usize,
}

/// Main-side bookkeeping for one worker thread.
struct WorkerSlot {
    id: usize,
    sender: mpsc::UnboundedSender<WorkerMessage>,
    handle: Option<JoinHandle<()>>,
    in_flight: usize,
    idle_since: Instant,
}

impl WorkerSlot {
    fn stop(&mut self) {
        let _ = self.sender.send(WorkerMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!(worker = self.id, "worker thread panicked during shutdown");
            }
        }
    }
}

/// Elastic pool of worker threads.
///
/// `C` is the main-context state completion callbacks receive. The pool
/// is not `Send`: callbacks are plain closures that never leave the
/// thread that submitted them.
///
/// ```text
/// submit() ──→ worker thread runs body ──→ Finished queued
///                                               │
///              collect() on the main context ◀──┘
///                  │
///                  ▼
///           Completed::dispatch(&mut ctx) → callback(ctx, result)
/// ```
pub struct WorkerPool<C> {
    config: PoolConfig,
    workers: Vec<WorkerSlot>,
    next_worker_id: usize,
    next_job_id: u64,
    /// Callbacks waiting for their job, keyed by job. Main side only.
    pending: HashMap<JobId, ErasedCallback<C>>,
    done_tx: mpsc::UnboundedSender<Finished>,
    done_rx: mpsc::UnboundedReceiver<Finished>,
    shut_down: bool,
}

impl<C> WorkerPool<C> {
    /// Creates an empty pool. Threads are spawned on demand.
    pub fn new(config: PoolConfig) -> Self {
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        Self {
            config: config.validated(),
            workers: Vec::new(),
            next_worker_id: 0,
            next_job_id: 1,
            pending: HashMap::new(),
            done_tx,
            done_rx,
            shut_down: false,
        }
    }

    /// Submits a job.
    ///
    /// `body` runs on a worker thread with only what it captured.
    /// `on_complete` runs later, on the main context, when the owner
    /// dispatches the [`Completed`] entry returned by [`collect`](Self::collect).
    /// It always runs exactly once, with the body's result. Failed jobs
    /// are not retried.
    pub fn submit<T, B, F>(&mut self, body: B, on_complete: F) -> Result<JobId, PoolError>
    where
        T: Send + 'static,
        B: FnOnce(&mut WorkerScratch) -> Result<T, JobError> + Send + 'static,
        F: FnOnce(&mut C, Result<T, JobError>) + 'static,
    {
        if self.shut_down {
            return Err(PoolError::ShutDown);
        }

        let id = JobId(self.next_job_id);
        self.next_job_id += 1;

        let erased: ErasedBody = Box::new(move |scratch: &mut WorkerScratch| {
            body(scratch).map(|value| Box::new(value) as Box<dyn Any + Send>)
        });
        let callback: ErasedCallback<C> = Box::new(move |ctx, result| {
            let typed = result.and_then(|value| {
                value
                    .downcast::<T>()
                    .map(|boxed| *boxed)
                    .map_err(|_| JobError::Failed("job produced an unexpected result type".into()))
            });
            on_complete(ctx, typed);
        });

        let worker = self.dispatch_to_worker(id, erased)?;
        self.pending.insert(id, callback);
        tracing::debug!(%id, worker, "job submitted");
        Ok(id)
    }

    /// Hands the body to a worker: an idle one if possible, a new one if
    /// under the ceiling, otherwise the least loaded. Returns the worker id.
    fn dispatch_to_worker(&mut self, id: JobId, body: ErasedBody) -> Result<usize, PoolError> {
        let mut msg = WorkerMessage::Run { id, body };
        loop {
            let idx = match self.workers.iter().position(|w| w.in_flight == 0) {
                Some(idx) => idx,
                None if self.workers.len() < self.config.max_workers => self.spawn_worker()?,
                None => self
                    .workers
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, w)| w.in_flight)
                    .map(|(idx, _)| idx)
                    .ok_or(PoolError::ShutDown)?,
            };

            let slot = &mut self.workers[idx];
            match slot.sender.send(msg) {
                Ok(()) => {
                    slot.in_flight += 1;
                    return Ok(slot.id);
                }
                Err(mpsc::error::SendError(returned)) => {
                    // The thread is gone; drop the slot and try another.
                    tracing::warn!(worker = slot.id, "worker channel closed, replacing worker");
                    let mut dead = self.workers.remove(idx);
                    dead.handle.take();
                    msg = returned;
                }
            }
        }
    }

    fn spawn_worker(&mut self) -> Result<usize, PoolError> {
        let id = self.next_worker_id;
        let (tx, rx) = mpsc::unbounded_channel();
        let done = self.done_tx.clone();
        let handle = thread::Builder::new()
            .name(format!("{}-{id}", self.config.thread_name))
            .spawn(move || run_worker(id, rx, done))
            .map_err(PoolError::Spawn)?;

        self.next_worker_id += 1;
        self.workers.push(WorkerSlot {
            id,
            sender: tx,
            handle: Some(handle),
            in_flight: 0,
            idle_since: Instant::now(),
        });
        tracing::debug!(worker = id, workers = self.workers.len(), "worker spawned");
        Ok(self.workers.len() - 1)
    }

    /// Drains every finished job without blocking.
    ///
    /// This is the only place results cross back into main-context
    /// bookkeeping. Entries come out in completion order.
    pub fn collect(&mut self) -> Vec<Completed<C>> {
        let mut ready = Vec::new();
        while let Ok(finished) = self.done_rx.try_recv() {
            if let Some(done) = self.settle(finished) {
                ready.push(done);
            }
        }
        ready
    }

    /// Waits for the next finished job. Returns `None` when nothing is
    /// pending.
    pub async fn next_completed(&mut self) -> Option<Completed<C>> {
        while !self.pending.is_empty() {
            let finished = self.done_rx.recv().await?;
            if let Some(done) = self.settle(finished) {
                return Some(done);
            }
        }
        None
    }

    fn settle(&mut self, finished: Finished) -> Option<Completed<C>> {
        if let Some(slot) = self.workers.iter_mut().find(|w| w.id == finished.worker) {
            slot.in_flight = slot.in_flight.saturating_sub(1);
            if slot.in_flight == 0 {
                slot.idle_since = Instant::now();
            }
        }

        let Some(callback) = self.pending.remove(&finished.id) else {
            tracing::warn!(id = %finished.id, "completion for unknown job dropped");
            return None;
        };

        Some(Completed {
            id: finished.id,
            callback,
            result: finished.result,
        })
    }

    /// Stops workers that have been idle longer than `idle_timeout`.
    ///
    /// Returns how many were shut down.
    pub fn shutdown_idle_workers(&mut self) -> usize {
        let timeout = self.config.idle_timeout;
        let mut reclaimed = 0;
        self.workers.retain_mut(|slot| {
            if slot.in_flight == 0 && slot.idle_since.elapsed() >= timeout {
                slot.stop();
                reclaimed += 1;
                false
            } else {
                true
            }
        });
        reclaimed
    }

    /// Asks every running worker to release its scratch memory.
    ///
    /// Returns how many workers were signalled.
    pub fn reclaim_memory(&mut self) -> usize {
        self.workers
            .iter()
            .filter(|slot| slot.sender.send(WorkerMessage::Reclaim).is_ok())
            .count()
    }

    /// Periodic maintenance: idle-worker reclamation, then a memory sweep
    /// over the survivors.
    pub fn run_maintenance(&mut self) -> MaintenanceReport {
        let reclaimed_workers = self.shutdown_idle_workers();
        if reclaimed_workers > 0 {
            tracing::debug!(reclaimed_workers, "shut down idle pool workers");
        }
        let swept_workers = self.reclaim_memory();
        MaintenanceReport {
            reclaimed_workers,
            swept_workers,
        }
    }

    /// Stops accepting jobs, lets workers finish what they have queued,
    /// and joins them. Returns the completions that arrived meanwhile so
    /// the owner can still dispatch them.
    pub fn shutdown(&mut self) -> Vec<Completed<C>> {
        if self.shut_down {
            return Vec::new();
        }
        self.shut_down = true;
        for slot in &mut self.workers {
            slot.stop();
        }
        self.workers.clear();
        let ready = self.collect();
        if !self.pending.is_empty() {
            tracing::warn!(lost = self.pending.len(), "jobs lost during pool shutdown");
            self.pending.clear();
        }
        tracing::info!("worker pool shut down");
        ready
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Workers with at least one job in flight.
    pub fn busy_workers(&self) -> usize {
        self.workers.iter().filter(|w| w.in_flight > 0).count()
    }

    /// Jobs submitted whose callback has not been handed out yet.
    pub fn pending_jobs(&self) -> usize {
        self.pending.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

impl<C> Drop for WorkerPool<C> {
    fn drop(&mut self) {
        for slot in &mut self.workers {
            let _ = slot.sender.send(WorkerMessage::Shutdown);
        }
    }
}
