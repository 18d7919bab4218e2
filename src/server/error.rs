//! Mapping of domain failures onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

use crate::pipeline::{PipelineError, PipelineOutcome};
use crate::storage::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    /// The run finished with errors. The outcome is returned as the body.
    #[error("pipeline run failed")]
    PipelineFailed(Box<PipelineOutcome>),

    /// Logged in full, reported generically.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PipelineFailed(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { table, id } => {
                ApiError::NotFound(format!("Record not found: {}/{}", table, id))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::RegulationNotFound(_) | PipelineError::FindingNotFound(_) => {
                ApiError::NotFound(e.to_string())
            }
            PipelineError::UnlinkedFinding(_) => ApiError::BadRequest(e.to_string()),
            PipelineError::Store(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::PipelineFailed(outcome) => (status, Json(*outcome)).into_response(),
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed");
                (status, Json(json!({ "detail": "Internal server error" }))).into_response()
            }
            ApiError::NotFound(detail) | ApiError::BadRequest(detail) => {
                (status, Json(json!({ "detail": detail }))).into_response()
            }
        }
    }
}
