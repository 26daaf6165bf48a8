use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

use crate::data::player::PlayerPool;
use crate::error::EngineError;
use crate::jobs::job::{Job, Outcome};
use crate::optimizer::candidate_filter::Overrides;
use crate::optimizer::{optimize_with_progress, OptimizationConfig, ProgressEvent};

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

/// Run one job to a terminal state on the current thread.
///
/// Progress goes to `sender` without blocking; a missing consumer is ignored. A final event
/// is sent for cancellation and faults, then the sender is dropped so the stream ends.
pub(crate) fn run_job(
    job: Arc<Job>,
    pool: Arc<PlayerPool>,
    config: OptimizationConfig,
    overrides: Overrides,
    sender: UnboundedSender<ProgressEvent>,
) {
    info!(job_id = %job.id, window = ?config.window, "job started");
    let forward = |event: ProgressEvent| {
        job.record_progress(&event);
        let _ = sender.send(event);
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        optimize_with_progress(&pool, &config, overrides, job.cancel_token(), &forward)
    }))
    .unwrap_or_else(|payload| Err(EngineError::Fault(panic_message(payload.as_ref()))));

    let (stage, percent) = job.last_position();
    let outcome = match outcome {
        Ok(result) => {
            info!(job_id = %job.id, squads = result.squads.len(), "job done");
            Outcome::Done(result)
        }
        Err(EngineError::Cancelled) => {
            warn!(job_id = %job.id, %stage, "job cancelled");
            let _ = sender.send(ProgressEvent {
                stage,
                message: "cancelled".to_string(),
                percent,
            });
            Outcome::Canceled
        }
        Err(err) => {
            error!(job_id = %job.id, %stage, error = %err, "job failed");
            let _ = sender.send(ProgressEvent {
                stage,
                message: format!("error: {err}"),
                percent,
            });
            Outcome::Error(err.to_string())
        }
    };
    job.finish(outcome);
    drop(sender);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_become_messages() {
        let payload = panic::catch_unwind(|| panic!("scoring exploded")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "scoring exploded");
        let payload = panic::catch_unwind(|| panic!("{} squads", 3)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "3 squads");
    }
}
