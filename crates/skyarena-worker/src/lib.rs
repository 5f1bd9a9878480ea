//! Background worker pool for SkyArena.
//!
//! Some work must never run on the main context: deleting a world's
//! directory tree can take seconds and would stall every connected
//! player. The [`WorkerPool`] runs such jobs on OS threads and hands
//! the results back to the main context.
//!
//! # Key types
//!
//! - [`WorkerPool`] — submits jobs, sizes itself between zero and
//!   `max_workers` threads, reclaims idle ones
//! - [`Completed`] — a finished job whose callback has not run yet
//! - [`WorkerScratch`] — per-thread buffers a job body may borrow
//! - [`delete_tree`] — the canonical job body
//!
//! # Threading rule
//!
//! Job bodies only see what they captured at submission. Callbacks stay
//! on the main side keyed by [`JobId`] and only run when the owner
//! dispatches what [`WorkerPool::collect`] returned, so results re-enter
//! main-context state through exactly one path.

mod config;
mod error;
mod fs;
mod pool;
mod worker;

pub use config::PoolConfig;
pub use error::{JobError, PoolError};
pub use fs::{DeletedTree, delete_tree};
pub use pool::{Completed, JobId, MaintenanceReport, WorkerPool};
pub use worker::WorkerScratch;
