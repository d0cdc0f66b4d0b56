use std::time::Duration;
use thiserror::Error;

use crate::llm::LlmError;
use crate::pipeline::guard::UnsafeQuery;

/// Errors surfaced by the NL→SQL pipeline.
///
/// Each variant has a stable [`kind`](PipelineError::kind) so the web layer
/// and the activity trail can report it without string matching.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("completion service error: {0}")]
    Upstream(String),

    #[error("unsafe query rejected: {0}")]
    UnsafeQuery(#[from] UnsafeQuery),

    #[error("query execution failed: {0}")]
    QueryExecution(String),

    #[error("query {0} not found")]
    NotFound(i64),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

impl PipelineError {
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "ValidationError",
            PipelineError::Upstream(_) => "UpstreamServiceError",
            PipelineError::UnsafeQuery(_) => "UnsafeQueryError",
            PipelineError::QueryExecution(_) => "QueryExecutionError",
            PipelineError::NotFound(_) => "NotFoundError",
            PipelineError::Storage(_) => "StorageError",
            PipelineError::Timeout { .. } => "TimeoutError",
        }
    }
}

impl From<LlmError> for PipelineError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Timeout(after) => PipelineError::Timeout {
                operation: "completion request",
                after,
            },
            other => PipelineError::Upstream(other.to_string()),
        }
    }
}

impl From<r2d2::Error> for PipelineError {
    fn from(err: r2d2::Error) -> Self {
        PipelineError::Storage(format!("connection pool: {}", err))
    }
}

impl From<duckdb::Error> for PipelineError {
    fn from(err: duckdb::Error) -> Self {
        PipelineError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Storage(format!("stored JSON is invalid: {}", err))
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(err: tokio::task::JoinError) -> Self {
        PipelineError::Storage(format!("background task failed: {}", err))
    }
}
