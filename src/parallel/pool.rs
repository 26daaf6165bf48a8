//! Rayon thread pool configuration for the scoring phase.
//!
//! Use [WorkerPool::install] to score with a fixed number of threads, or rely on
//! Rayon's default (all CPU cores).

use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to build scoring thread pool: {0}")]
pub struct PoolError(#[from] ThreadPoolBuildError);

/// Configures how many worker threads score squads.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerPool {
    /// Number of worker threads. If 0, use the global Rayon pool.
    pub workers: usize,
}

impl WorkerPool {
    pub fn with_workers(n: usize) -> Self {
        Self { workers: n }
    }

    /// Build the dedicated pool, or `None` when the global pool should be used.
    pub fn build(&self) -> Result<Option<ThreadPool>, PoolError> {
        if self.workers == 0 {
            return Ok(None);
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|index| format!("gaffer-score-{index}"))
            .build()?;
        Ok(Some(pool))
    }

    /// Run a closure with this worker count. If [workers](WorkerPool::workers) is 0, runs on
    /// the global Rayon pool; otherwise builds a temporary pool with that many threads.
    pub fn install<F, R>(&self, f: F) -> Result<R, PoolError>
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        match self.build()? {
            Some(pool) => Ok(pool.install(f)),
            None => Ok(f()),
        }
    }
}
