use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{Stream, StreamExt};
use tracing::debug;

use crate::config::Settings;
use crate::data::player::PlayerPool;
use crate::error::{EvaluateError, StartError};
use crate::jobs::{JobId, JobManager};
use crate::optimizer::ranking::RankedSquad;
use crate::optimizer::{evaluate_squad, OptimizationConfig};
use crate::server::api::{
    body_error_payload, health_payload, unresolved_payload, validation_payload, EvaluateRequest,
    MessageResponse, StartResponse,
};

#[derive(Debug, Clone)]
pub struct AppState {
    pub players: Arc<PlayerPool>,
    pub jobs: JobManager,
    pub settings: Arc<Settings>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/optimize", post(start_optimization))
        .route("/api/optimize/:id", get(job_status).delete(cancel_job))
        .route("/api/optimize/:id/progress", get(job_progress))
        .route("/api/optimize/:id/result", get(job_result))
        .route("/api/squad/evaluate", post(evaluate))
        .with_state(state)
}

fn not_found(id: &JobId) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(MessageResponse::error(format!("job {id} not found"))),
    )
        .into_response()
}

fn start_error_response(err: StartError) -> Response {
    match err {
        StartError::Invalid(errors) => {
            (StatusCode::BAD_REQUEST, Json(validation_payload(&errors))).into_response()
        }
        StartError::Data(err) => {
            (StatusCode::UNPROCESSABLE_ENTITY, Json(unresolved_payload(&err))).into_response()
        }
    }
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(health_payload(state.players.len(), state.jobs.len()))
}

async fn start_optimization(
    State(state): State<AppState>,
    body: Result<Json<OptimizationConfig>, JsonRejection>,
) -> Response {
    let Json(config) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return (StatusCode::BAD_REQUEST, Json(body_error_payload(rejection.body_text())))
                .into_response()
        }
    };
    match state.jobs.start(Arc::clone(&state.players), config) {
        Ok(id) => (StatusCode::ACCEPTED, Json(StartResponse::new(id))).into_response(),
        Err(err) => {
            debug!(error = %err, "optimization request rejected");
            start_error_response(err)
        }
    }
}

async fn job_status(State(state): State<AppState>, Path(id): Path<JobId>) -> Response {
    match state.jobs.snapshot(&id) {
        Some(snapshot) => Json(snapshot).into_response(),
        None => not_found(&id),
    }
}

async fn job_progress(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let events = state
        .jobs
        .stream_progress(&id)
        .map(|event| Event::default().event("progress").json_data(event));
    Sse::new(events).keep_alive(KeepAlive::default())
}

async fn job_result(State(state): State<AppState>, Path(id): Path<JobId>) -> Response {
    match state.jobs.result(&id) {
        Some(result) => Json(result.as_ref().clone()).into_response(),
        None => match state.jobs.status(&id) {
            Some(status) => (
                StatusCode::NOT_FOUND,
                Json(MessageResponse::error(format!(
                    "job {id} has no result (status: {})",
                    status.label()
                ))),
            )
                .into_response(),
            None => not_found(&id),
        },
    }
}

async fn cancel_job(State(state): State<AppState>, Path(id): Path<JobId>) -> Response {
    match state.jobs.status(&id) {
        None => not_found(&id),
        Some(_) if state.jobs.cancel(&id) => (
            StatusCode::ACCEPTED,
            Json(MessageResponse::ok(format!("cancellation requested for job {id}"))),
        )
            .into_response(),
        Some(status) => (
            StatusCode::CONFLICT,
            Json(MessageResponse::error(format!(
                "job {id} already finished (status: {})",
                status.label()
            ))),
        )
            .into_response(),
    }
}

async fn evaluate(
    State(state): State<AppState>,
    body: Result<Json<EvaluateRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return (StatusCode::BAD_REQUEST, Json(body_error_payload(rejection.body_text())))
                .into_response()
        }
    };
    match evaluate_squad(&state.players, request.players.as_slice(), request.window, request.bench_boost) {
        Ok(scored) => Json(RankedSquad::from_scored(1, &scored)).into_response(),
        Err(EvaluateError::Input(err)) => {
            (StatusCode::BAD_REQUEST, Json(validation_payload(&[err]))).into_response()
        }
        Err(EvaluateError::Data(err)) => {
            (StatusCode::UNPROCESSABLE_ENTITY, Json(unresolved_payload(&err))).into_response()
        }
    }
}
