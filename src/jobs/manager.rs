use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info};

use crate::data::player::PlayerPool;
use crate::error::StartError;
use crate::jobs::job::{Job, JobId, JobSnapshot, JobStatus, Outcome};
use crate::jobs::runner::run_job;
use crate::optimizer::{prepare, OptimizationConfig, OptimizationResult, ProgressEvent};

/// Terminal jobs older than this are evicted.
pub const DEFAULT_JOB_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug)]
struct Registry {
    jobs: RwLock<HashMap<JobId, Arc<Job>>>,
    ttl: Duration,
    workers: usize,
}

/// Owns every job of the process. Cheap to clone; clones share the registry.
#[derive(Debug, Clone)]
pub struct JobManager {
    registry: Arc<Registry>,
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new(DEFAULT_JOB_TTL)
    }
}

impl JobManager {
    pub fn new(ttl: Duration) -> Self {
        Self::with_workers(ttl, 0)
    }

    /// `workers` sizes each job's scoring pool; 0 uses the global rayon pool.
    pub fn with_workers(ttl: Duration, workers: usize) -> Self {
        Self {
            registry: Arc::new(Registry {
                jobs: RwLock::new(HashMap::new()),
                ttl,
                workers,
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.registry.ttl
    }

    /// Validate and resolve synchronously, then run the job on its own worker thread.
    /// Nothing is registered when validation or name resolution fails.
    pub fn start(&self, pool: Arc<PlayerPool>, config: OptimizationConfig) -> Result<JobId, StartError> {
        let overrides = prepare(&pool, &config)?;
        let config = OptimizationConfig {
            workers: self.registry.workers,
            ..config
        };

        let (sender, receiver) = mpsc::unbounded_channel();
        let job = Arc::new(Job::new(receiver));
        let id = job.id;
        self.registry.jobs.write().insert(id, Arc::clone(&job));

        let worker_job = Arc::clone(&job);
        let spawned = thread::Builder::new()
            .name(format!("gaffer-job-{}", &id.simple().to_string()[..8]))
            .spawn(move || run_job(worker_job, pool, config, overrides, sender));
        if let Err(err) = spawned {
            error!(job_id = %id, error = %err, "failed to spawn job worker");
            job.finish(Outcome::Error(format!("failed to spawn worker: {err}")));
        } else {
            info!(job_id = %id, "job queued");
        }
        Ok(id)
    }

    pub fn get(&self, id: &JobId) -> Option<Arc<Job>> {
        self.registry.jobs.read().get(id).cloned()
    }

    pub fn status(&self, id: &JobId) -> Option<JobStatus> {
        self.get(id).map(|job| job.status())
    }

    pub fn snapshot(&self, id: &JobId) -> Option<JobSnapshot> {
        self.get(id).map(|job| job.snapshot())
    }

    /// The result once the job is `Done`; `None` for unknown, running, canceled or failed jobs.
    pub fn result(&self, id: &JobId) -> Option<Arc<OptimizationResult>> {
        self.get(id).and_then(|job| job.result())
    }

    /// Request cooperative cancellation. False for unknown or already finished jobs.
    pub fn cancel(&self, id: &JobId) -> bool {
        self.get(id).map_or(false, |job| job.cancel())
    }

    /// Progress events in production order, ending when the job reaches a terminal state.
    /// Unknown ids and repeat calls get an immediately-ended stream.
    pub fn stream_progress(&self, id: &JobId) -> UnboundedReceiverStream<ProgressEvent> {
        let receiver = self
            .get(id)
            .and_then(|job| job.take_progress())
            .unwrap_or_else(|| {
                let (_, receiver) = mpsc::unbounded_channel();
                receiver
            });
        UnboundedReceiverStream::new(receiver)
    }

    pub fn len(&self) -> usize {
        self.registry.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop terminal jobs that finished at least one TTL before `now`. Returns how many went.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let ttl = self.registry.ttl;
        let mut jobs = self.registry.jobs.write();
        let before = jobs.len();
        jobs.retain(|_, job| {
            let expired = job
                .finished_at()
                .and_then(|finished| (now - finished).to_std().ok())
                .map_or(false, |age| age >= ttl);
            !expired
        });
        let evicted = before - jobs.len();
        if evicted > 0 {
            debug!(evicted, remaining = jobs.len(), "evicted expired jobs");
        }
        evicted
    }
}
