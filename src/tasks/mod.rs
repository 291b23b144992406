//! Task Pool
//!
//! A thin wrapper over a work-stealing thread pool, plus cooperative
//! cancellation tokens. The engine owns a single pool instance and hands
//! references to it through the frame context; the core never reaches for a
//! process-global.
//!
//! Three dispatch shapes are exposed:
//! - [`TaskPool::scope`] — structured fork/join used by the parallel frame
//!   phase. All spawned tasks complete before the call returns, which gives
//!   the inter-phase happens-before barrier.
//! - [`TaskPool::spawn_detached`] — fire-and-forget background work.
//! - [`TaskPool::yield_now`] — a no-op task submitted at the end of each
//!   frame so queued detached work gets a fairness slot.

mod cancel;

pub use cancel::CancelToken;

use crate::errors::{EngineError, Result};

/// Work-stealing task pool shared by the whole engine.
///
/// Parallel-phase module hooks, detached services, and per-surface command
/// recording all run here. The pool is cancellation-aware: tasks are handed
/// a [`CancelToken`] clone and are expected to observe it promptly.
pub struct TaskPool {
    pool: rayon::ThreadPool,
    cancel: CancelToken,
}

impl TaskPool {
    /// Creates a pool with the given number of worker threads.
    ///
    /// `0` selects the default thread count for the host.
    pub fn new(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("cadence-worker-{i}"))
            .build()
            .map_err(|e| EngineError::TaskPool(e.to_string()))?;
        Ok(Self {
            pool,
            cancel: CancelToken::new(),
        })
    }

    /// Number of worker threads in the pool.
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Returns a clone of the pool-wide cancellation token.
    ///
    /// Cancelling this token signals every cooperative task started through
    /// the pool; it does not interrupt running closures.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Requests cooperative cancellation of all pool work.
    pub fn cancel_all(&self) {
        self.cancel.cancel();
    }

    /// Runs a structured fork/join scope on the pool.
    ///
    /// Every task spawned inside the scope completes before this returns,
    /// so callers can borrow stack data into spawned closures. This is the
    /// barrier used by the parallel frame phase.
    pub fn scope<'scope, OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce(&rayon::Scope<'scope>) -> R + Send,
        R: Send,
    {
        self.pool.scope(op)
    }

    /// Spawns a fire-and-forget task.
    ///
    /// The closure receives a cancellation token clone; long-running work
    /// must poll it.
    pub fn spawn_detached<F>(&self, f: F)
    where
        F: FnOnce(&CancelToken) + Send + 'static,
    {
        let token = self.cancel.clone();
        self.pool.spawn(move || f(&token));
    }

    /// Submits a no-op task and waits for it, yielding a fairness slot to
    /// queued background work. Called once at the end of each frame.
    pub fn yield_now(&self) {
        self.pool.install(|| {});
    }
}

impl std::fmt::Debug for TaskPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskPool")
            .field("threads", &self.thread_count())
            .field("canceled", &self.cancel.is_canceled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn scope_joins_all_tasks() {
        let pool = TaskPool::new(2).unwrap();
        let counter = AtomicUsize::new(0);
        pool.scope(|s| {
            for _ in 0..8 {
                s.spawn(|_| {
                    counter.fetch_add(1, Ordering::Relaxed);
                });
            }
        });
        assert_eq!(counter.load(Ordering::Relaxed), 8);
    }

    #[test]
    fn cancel_token_observed_by_detached_task() {
        let pool = TaskPool::new(1).unwrap();
        pool.cancel_all();
        let (tx, rx) = std::sync::mpsc::channel();
        pool.spawn_detached(move |token| {
            tx.send(token.is_canceled()).unwrap();
        });
        assert!(rx.recv().unwrap());
    }
}
