pub mod events;
pub mod jobs;
pub mod runs;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use engine::{EngineError, Scheduler};
use serde::Serialize;

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unknown job")]
    UnknownJob(String),
    #[error("invalid request")]
    BadRequest(String),
    #[error("conflict")]
    Conflict(String),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::UnknownJob(name) => ApiError::UnknownJob(name),
            EngineError::DuplicateName(_) | EngineError::UnknownTaskReference { .. } | EngineError::InvalidDag(_) => {
                ApiError::BadRequest(err.to_string())
            }
            EngineError::Cancelled(msg) => ApiError::Conflict(msg),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::UnknownJob(name) => (StatusCode::NOT_FOUND, format!("unknown job: '{name}'")),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
