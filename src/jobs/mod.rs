//! Asynchronous optimization jobs: lifecycle, progress queue, cancellation and eviction.

pub mod cancel;
pub mod job;
pub mod manager;
mod runner;

pub use cancel::CancelToken;
pub use job::{Job, JobId, JobSnapshot, JobStatus};
pub use manager::{JobManager, DEFAULT_JOB_TTL};
