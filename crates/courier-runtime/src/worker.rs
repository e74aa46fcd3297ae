//! Worker pool collaborator interface.
//!
//! The supervisor never awaits dispatched work; it submits each update's
//! pipeline to a pool and moves on to the next fetch. Scheduling policy is
//! the pool's business. [`SpawnPool`] is the default implementation used for
//! wiring and tests: it spawns every task onto the tokio runtime and keeps
//! counters.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::debug;

/// A unit of dispatched work: one update's full middleware + handler run.
///
/// The future resolves to whether the pipeline succeeded; pools use it only
/// for their failure counter.
pub type Task = BoxFuture<'static, bool>;

/// Pool statistics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkerStats {
    /// Configured worker parallelism (0 when unbounded).
    pub workers: usize,
    /// Tasks submitted but not yet finished.
    pub queue_size: usize,
    /// Tasks finished, successfully or not.
    pub processed: usize,
    /// Tasks that finished with a handler failure.
    pub failed: usize,
}

/// Executes dispatched update pipelines.
#[async_trait]
pub trait WorkerPool: Send + Sync {
    /// Submits a task for execution. Must not block the caller.
    fn submit(&self, task: Task);

    /// Starts the pool. Called once before the polling loop begins.
    async fn start(&self);

    /// Stops the pool. Called when the supervisor shuts down; already
    /// submitted tasks may still run to completion.
    async fn stop(&self);

    /// Current statistics.
    fn stats(&self) -> WorkerStats;
}

/// Default pool backed by `tokio::spawn`.
///
/// Every submitted task gets its own tokio task; there is no queue and no
/// worker cap beyond what the runtime provides. Good enough for bots whose
/// handlers are I/O bound, and for tests.
#[derive(Default)]
pub struct SpawnPool {
    in_flight: Arc<AtomicUsize>,
    processed: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
}

impl SpawnPool {
    /// Creates a pool.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkerPool for SpawnPool {
    fn submit(&self, task: Task) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let in_flight = Arc::clone(&self.in_flight);
        let processed = Arc::clone(&self.processed);
        let failed = Arc::clone(&self.failed);
        tokio::spawn(async move {
            let ok = task.await;
            if !ok {
                failed.fetch_add(1, Ordering::SeqCst);
            }
            processed.fetch_add(1, Ordering::SeqCst);
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });
    }

    async fn start(&self) {
        debug!("spawn pool started");
    }

    async fn stop(&self) {
        debug!(
            in_flight = self.in_flight.load(Ordering::SeqCst),
            "spawn pool stopping"
        );
    }

    fn stats(&self) -> WorkerStats {
        WorkerStats {
            workers: 0,
            queue_size: self.in_flight.load(Ordering::SeqCst),
            processed: self.processed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}
