pub mod batch;
pub mod pool;
pub mod progress;

pub use batch::{batch_ranges, batches};
pub use pool::{PoolError, WorkerPool};
pub use progress::{ProgressSnapshot, ProgressTracker, DEFAULT_THROTTLE};
