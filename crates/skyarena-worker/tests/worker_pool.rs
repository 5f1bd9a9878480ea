//! Integration tests for the elastic worker pool.
//!
//! The main context is simulated by a plain struct passed to
//! `Completed::dispatch`. Blocking job bodies are held open with a
//! std channel "gate" so elastic sizing can be observed.

use std::sync::mpsc as std_mpsc;
use std::time::Duration;

use skyarena_worker::{JobError, PoolConfig, PoolError, WorkerPool, delete_tree};

// =========================================================================
// Helpers
// =========================================================================

/// Stand-in for main-context state.
#[derive(Default)]
struct MainContext {
    results: Vec<Result<u32, String>>,
    callbacks_run: usize,
}

fn pool(max_workers: usize, idle_timeout: Duration) -> WorkerPool<MainContext> {
    WorkerPool::new(PoolConfig {
        max_workers,
        idle_timeout,
        ..PoolConfig::default()
    })
}

fn record(ctx: &mut MainContext, result: Result<u32, JobError>) {
    ctx.callbacks_run += 1;
    ctx.results.push(result.map_err(|e| e.to_string()));
}

async fn drain(pool: &mut WorkerPool<MainContext>, ctx: &mut MainContext) {
    while let Some(done) = pool.next_completed().await {
        done.dispatch(ctx);
    }
}

// =========================================================================
// submit / collect / dispatch
// =========================================================================

#[tokio::test]
async fn test_submit_success_runs_callback_on_dispatch() {
    let mut pool = pool(2, Duration::from_secs(60));
    let mut ctx = MainContext::default();

    pool.submit(|_| Ok(40 + 2), record).unwrap();
    assert_eq!(ctx.callbacks_run, 0, "submit must not run the callback");

    drain(&mut pool, &mut ctx).await;

    assert_eq!(ctx.results, vec![Ok(42)]);
    assert_eq!(pool.pending_jobs(), 0);
}

#[tokio::test]
async fn test_failed_body_reports_failure_exactly_once() {
    let mut pool = pool(1, Duration::from_secs(60));
    let mut ctx = MainContext::default();

    pool.submit(|_| Err::<u32, _>(JobError::Failed("disk on fire".into())), record)
        .unwrap();
    drain(&mut pool, &mut ctx).await;

    assert_eq!(ctx.callbacks_run, 1);
    assert!(matches!(&ctx.results[0], Err(msg) if msg.contains("disk on fire")));

    // Nothing resubmitted behind our back.
    assert!(pool.collect().is_empty());
    assert_eq!(pool.pending_jobs(), 0);
}

#[tokio::test]
async fn test_panicking_body_is_reported_and_worker_survives() {
    let mut pool = pool(1, Duration::from_secs(60));
    let mut ctx = MainContext::default();

    pool.submit(|_| -> Result<u32, JobError> { panic!("kaboom") }, record)
        .unwrap();
    pool.submit(|_| Ok(7), record).unwrap();
    drain(&mut pool, &mut ctx).await;

    assert_eq!(ctx.callbacks_run, 2);
    assert!(matches!(&ctx.results[0], Err(msg) if msg.contains("kaboom")));
    assert_eq!(ctx.results[1], Ok(7));
    assert_eq!(pool.worker_count(), 1, "the same worker ran both jobs");
}

#[tokio::test]
async fn test_collect_does_not_dispatch() {
    let mut pool = pool(1, Duration::from_secs(60));
    let mut ctx = MainContext::default();
    pool.submit(|_| Ok(1), record).unwrap();

    let done = pool.next_completed().await.expect("one job pending");
    assert!(done.is_ok());
    assert_eq!(ctx.callbacks_run, 0, "results wait for the owner");

    done.dispatch(&mut ctx);
    assert_eq!(ctx.callbacks_run, 1);
}

#[tokio::test]
async fn test_next_completed_returns_none_when_idle() {
    let mut pool = pool(1, Duration::from_secs(60));
    assert!(pool.next_completed().await.is_none());
}

// =========================================================================
// Elastic sizing
// =========================================================================

#[tokio::test]
async fn test_pool_grows_on_demand_up_to_ceiling() {
    let mut pool = pool(2, Duration::from_secs(60));
    let mut ctx = MainContext::default();
    assert_eq!(pool.worker_count(), 0, "pool starts empty");

    let mut gates = Vec::new();
    for i in 0..3 {
        let (open, gate) = std_mpsc::channel::<()>();
        gates.push(open);
        pool.submit(
            move |_| {
                let _ = gate.recv();
                Ok(i)
            },
            record,
        )
        .unwrap();
    }

    assert_eq!(pool.worker_count(), 2, "third job queues behind the ceiling");
    assert_eq!(pool.busy_workers(), 2);

    for open in gates {
        open.send(()).unwrap();
    }
    drain(&mut pool, &mut ctx).await;

    let mut values: Vec<u32> = ctx.results.iter().map(|r| *r.as_ref().unwrap()).collect();
    values.sort();
    assert_eq!(values, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_idle_workers_are_reclaimed() {
    let mut pool = pool(2, Duration::ZERO);
    let mut ctx = MainContext::default();
    pool.submit(|_| Ok(1), record).unwrap();
    pool.submit(|_| Ok(2), record).unwrap();
    drain(&mut pool, &mut ctx).await;
    assert!(pool.worker_count() >= 1);

    let before = pool.worker_count();
    let reclaimed = pool.shutdown_idle_workers();

    assert_eq!(reclaimed, before);
    assert_eq!(pool.worker_count(), 0);

    // Grows again on the next submission.
    pool.submit(|_| Ok(3), record).unwrap();
    assert_eq!(pool.worker_count(), 1);
    drain(&mut pool, &mut ctx).await;
    assert_eq!(ctx.callbacks_run, 3);
}

#[tokio::test]
async fn test_busy_workers_are_not_reclaimed() {
    let mut pool = pool(1, Duration::ZERO);
    let mut ctx = MainContext::default();
    let (open, gate) = std_mpsc::channel::<()>();
    pool.submit(
        move |_| {
            let _ = gate.recv();
            Ok(5)
        },
        record,
    )
    .unwrap();

    assert_eq!(pool.shutdown_idle_workers(), 0);
    assert_eq!(pool.worker_count(), 1);

    open.send(()).unwrap();
    drain(&mut pool, &mut ctx).await;
    assert_eq!(ctx.results, vec![Ok(5)]);
}

#[tokio::test]
async fn test_maintenance_sweeps_surviving_workers() {
    let mut pool = pool(2, Duration::from_secs(3600));
    let mut ctx = MainContext::default();
    pool.submit(|_| Ok(1), record).unwrap();
    drain(&mut pool, &mut ctx).await;

    let report = pool.run_maintenance();

    assert_eq!(report.reclaimed_workers, 0);
    assert_eq!(report.swept_workers, 1);
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test]
async fn test_shutdown_rejects_new_jobs() {
    let mut pool = pool(1, Duration::from_secs(60));
    let mut ctx = MainContext::default();
    pool.submit(|_| Ok(9), record).unwrap();

    for done in pool.shutdown() {
        done.dispatch(&mut ctx);
    }

    assert!(pool.is_shut_down());
    assert_eq!(pool.worker_count(), 0);
    assert_eq!(ctx.results, vec![Ok(9)], "queued job finished before join");
    assert!(matches!(
        pool.submit(|_| Ok(1), record),
        Err(PoolError::ShutDown)
    ));
}

// =========================================================================
// Directory deletion through the pool
// =========================================================================

#[tokio::test]
async fn test_delete_tree_job_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let world = tmp.path().join("arena-world");
    std::fs::create_dir_all(world.join("db")).unwrap();
    std::fs::write(world.join("db/000001.log"), b"data").unwrap();

    let mut pool: WorkerPool<Vec<u64>> = WorkerPool::new(PoolConfig::default());
    let mut removed = Vec::new();
    let path = world.clone();
    pool.submit(
        move |scratch| Ok(delete_tree(&path, scratch)?),
        |removed: &mut Vec<u64>, result| {
            if let Ok(tree) = result {
                removed.push(tree.files);
            }
        },
    )
    .unwrap();

    while let Some(done) = pool.next_completed().await {
        done.dispatch(&mut removed);
    }

    assert!(!world.exists());
    assert_eq!(removed, vec![1]);
}
