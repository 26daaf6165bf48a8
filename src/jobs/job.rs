use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use crate::jobs::cancel::CancelToken;
use crate::optimizer::{OptimizationResult, ProgressEvent, Stage};

pub type JobId = Uuid;

/// Lifecycle: `Created -> Running -> Done | Canceled | Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Created,
    Running { stage: Stage, percent: u8 },
    Done,
    Canceled,
    Error { message: String },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Canceled | Self::Error { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running { .. } => "running",
            Self::Done => "done",
            Self::Canceled => "canceled",
            Self::Error { .. } => "error",
        }
    }
}

/// Terminal outcome handed back by the runner.
#[derive(Debug)]
pub enum Outcome {
    Done(OptimizationResult),
    Canceled,
    Error(String),
}

#[derive(Debug)]
struct JobState {
    status: JobStatus,
    result: Option<Arc<OptimizationResult>>,
    finished_at: Option<DateTime<Utc>>,
}

/// One optimization job: status, result slot, cancellation handle and the (single-use)
/// receiving end of its progress queue.
#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    pub created_at: DateTime<Utc>,
    cancel: CancelToken,
    state: Mutex<JobState>,
    progress: Mutex<Option<UnboundedReceiver<ProgressEvent>>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: JobId,
    #[serde(flatten)]
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(progress: UnboundedReceiver<ProgressEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            cancel: CancelToken::new(),
            state: Mutex::new(JobState {
                status: JobStatus::Created,
                result: None,
                finished_at: None,
            }),
            progress: Mutex::new(Some(progress)),
        }
    }

    pub fn status(&self) -> JobStatus {
        self.state.lock().status.clone()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let state = self.state.lock();
        JobSnapshot {
            id: self.id,
            status: state.status.clone(),
            created_at: self.created_at,
            finished_at: state.finished_at,
        }
    }

    /// The result, only once the job is `Done`.
    pub fn result(&self) -> Option<Arc<OptimizationResult>> {
        self.state.lock().result.clone()
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().finished_at
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Request cancellation. Returns false when the job already finished.
    pub fn cancel(&self) -> bool {
        let state = self.state.lock();
        if state.status.is_terminal() {
            return false;
        }
        self.cancel.cancel();
        true
    }

    /// Hand out the progress receiver; `None` after the first call.
    pub fn take_progress(&self) -> Option<UnboundedReceiver<ProgressEvent>> {
        self.progress.lock().take()
    }

    pub(crate) fn record_progress(&self, event: &ProgressEvent) {
        let mut state = self.state.lock();
        if !state.status.is_terminal() {
            state.status = JobStatus::Running {
                stage: event.stage,
                percent: event.percent,
            };
        }
    }

    /// Stage and percent last reported, for the terminal progress event.
    pub(crate) fn last_position(&self) -> (Stage, u8) {
        match self.state.lock().status {
            JobStatus::Running { stage, percent } => (stage, percent),
            _ => (Stage::Import, 0),
        }
    }

    pub(crate) fn finish(&self, outcome: Outcome) {
        let mut state = self.state.lock();
        state.finished_at = Some(Utc::now());
        match outcome {
            Outcome::Done(result) => {
                state.status = JobStatus::Done;
                state.result = Some(Arc::new(result));
            }
            Outcome::Canceled => state.status = JobStatus::Canceled,
            Outcome::Error(message) => state.status = JobStatus::Error { message },
        }
    }
}
