use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::error::PipelineError;

/// A pipeline error on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    error: PipelineError,
    query_id: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    message: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_id: Option<i64>,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        PipelineError::Validation(message.into()).into()
    }

    /// Attaches the query id so the client can correlate the failure.
    pub fn for_query(mut self, id: i64) -> Self {
        self.query_id = Some(id);
        self
    }

    pub fn status(&self) -> StatusCode {
        match &self.error {
            PipelineError::Validation(_) | PipelineError::UnsafeQuery(_) => StatusCode::BAD_REQUEST,
            PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
            PipelineError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            PipelineError::Upstream(_)
            | PipelineError::QueryExecution(_)
            | PipelineError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(error: PipelineError) -> Self {
        let query_id = match &error {
            PipelineError::NotFound(id) => Some(*id),
            _ => None,
        };
        Self { error, query_id }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Server-side detail stays in the log and the activity trail.
        let message = if status.is_server_error() {
            error!("Request failed ({}): {}", self.error.kind(), self.error);
            match &self.error {
                PipelineError::Timeout { operation, .. } => format!("The {} timed out", operation),
                _ => "The request could not be completed".to_string(),
            }
        } else {
            self.error.to_string()
        };

        let body = ErrorBody {
            message,
            kind: self.error.kind(),
            query_id: self.query_id,
        };
        (status, Json(body)).into_response()
    }
}
