use serde::{Deserialize, Serialize};

use crate::data::player::GameweekWindow;
use crate::error::{DataError, InputError};
use crate::jobs::JobId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub players: usize,
    pub jobs: usize,
}

pub fn health_payload(players: usize, jobs: usize) -> HealthResponse {
    HealthResponse {
        status: "ok".to_string(),
        service: "gaffer-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        players,
        jobs,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResponse {
    pub job_id: JobId,
    pub status_url: String,
    pub progress_url: String,
    pub result_url: String,
}

impl StartResponse {
    pub fn new(job_id: JobId) -> Self {
        let base = format!("/api/optimize/{job_id}");
        Self {
            job_id,
            status_url: base.clone(),
            progress_url: format!("{base}/progress"),
            result_url: format!("{base}/result"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateRequest {
    pub players: Vec<String>,
    #[serde(default)]
    pub window: GameweekWindow,
    #[serde(default)]
    pub bench_boost: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorResponse {
    pub status: String,
    pub message: String,
    pub errors: Vec<ValidationIssue>,
}

/// Group input errors by field, keeping first-seen field order.
pub fn validation_payload(errors: &[InputError]) -> ValidationErrorResponse {
    let mut issues: Vec<ValidationIssue> = Vec::new();
    for error in errors {
        let message = error.to_string();
        match issues.iter_mut().find(|issue| issue.field == error.field()) {
            Some(issue) => issue.messages.push(message),
            None => issues.push(ValidationIssue {
                field: error.field().to_string(),
                messages: vec![message],
            }),
        }
    }
    ValidationErrorResponse {
        status: "error".to_string(),
        message: "Validation failed".to_string(),
        errors: issues,
    }
}

/// A request body that could not be parsed at all.
pub fn body_error_payload(message: impl Into<String>) -> ValidationErrorResponse {
    ValidationErrorResponse {
        status: "error".to_string(),
        message: "Validation failed".to_string(),
        errors: vec![ValidationIssue {
            field: "body".to_string(),
            messages: vec![message.into()],
        }],
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnresolvedResponse {
    pub status: String,
    pub message: String,
    pub unresolved: Vec<String>,
}

pub fn unresolved_payload(error: &DataError) -> UnresolvedResponse {
    UnresolvedResponse {
        status: "error".to_string(),
        message: error.to_string(),
        unresolved: error.unresolved_names().to_vec(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub status: String,
    pub message: String,
}

impl MessageResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
        }
    }
}
