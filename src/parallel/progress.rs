//! Shared progress counter for parallel work.
//!
//! Workers call [ProgressTracker::advance] as they finish items. The counter and the
//! throttle clock sit behind one mutex and the emit callback runs while it is held, so
//! every emitted snapshot is consistent and snapshots arrive in increasing order.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Minimum wall time between two throttled emissions.
pub const DEFAULT_THROTTLE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub done: u64,
    pub total: u64,
}

impl ProgressSnapshot {
    /// Completed fraction in `[0, 1]`; an empty workload counts as complete.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.done.min(self.total) as f64) / self.total as f64
    }

    pub fn is_complete(&self) -> bool {
        self.done >= self.total
    }
}

#[derive(Debug)]
struct Counter {
    done: u64,
    total: u64,
    last_emit: Option<Instant>,
}

#[derive(Debug)]
pub struct ProgressTracker {
    counter: Mutex<Counter>,
    throttle: Duration,
}

impl ProgressTracker {
    pub fn new(total: u64) -> Self {
        Self::with_throttle(total, DEFAULT_THROTTLE)
    }

    pub fn with_throttle(total: u64, throttle: Duration) -> Self {
        Self {
            counter: Mutex::new(Counter {
                done: 0,
                total,
                last_emit: None,
            }),
            throttle,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Counter> {
        // Recover from poisoning; the counter stays consistent.
        self.counter
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let counter = self.lock();
        ProgressSnapshot {
            done: counter.done,
            total: counter.total,
        }
    }

    /// Record `n` finished items. Calls `emit` on the first advance, whenever the throttle
    /// interval has elapsed since the previous emission, and when the work completes.
    /// Returns whether `emit` was called.
    pub fn advance<F>(&self, n: u64, emit: F) -> bool
    where
        F: FnOnce(ProgressSnapshot),
    {
        let mut counter = self.lock();
        counter.done = counter.done.saturating_add(n);
        let snapshot = ProgressSnapshot {
            done: counter.done,
            total: counter.total,
        };
        let due = match counter.last_emit {
            None => true,
            Some(at) => at.elapsed() >= self.throttle,
        };
        if !(due || snapshot.is_complete()) {
            return false;
        }
        counter.last_emit = Some(Instant::now());
        emit(snapshot);
        true
    }
}
