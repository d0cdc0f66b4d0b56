use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::info;

use crate::catalog;
use crate::error::PipelineError;
use crate::pipeline::{ExecutionOutcome, GenerateOutcome};
use crate::store::models::{ActivityRecord, QueryFilter, QueryRecord};
use crate::web::error::ApiError;
use crate::web::state::AppState;

// Request types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NlToSqlRequest {
    #[serde(default)]
    pub natural_language_query: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SaveQueryRequest {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQueryRequest {
    #[serde(default)]
    pub sql_query: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ActivityParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SuggestionParams {
    pub intent: Option<String>,
}

// Response types

#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub schema: String,
}

#[derive(Debug, Serialize)]
pub struct SuggestionsResponse {
    pub suggestions: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: i64,
    pub llm_backend: &'static str,
    pub llm_model: String,
    pub query_count: i64,
}

/// Runs `work` on its own task so a client hanging up does not cancel a
/// completion call or statement half way; the result is simply dropped.
async fn detached<T, F>(work: F) -> Result<T, PipelineError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, PipelineError>> + Send + 'static,
{
    tokio::spawn(work).await?
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::validation(rejection.body_text()))
}

fn query_params<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    params
        .map(|Query(params)| params)
        .map_err(|rejection| ApiError::validation(rejection.body_text()))
}

// Question → SQL
pub async fn nl_to_sql(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NlToSqlRequest>, JsonRejection>,
) -> Result<Json<GenerateOutcome>, ApiError> {
    let request = json_body(payload)?;
    info!("Generating SQL for: {}", request.natural_language_query);

    let outcome = detached(async move {
        state
            .service
            .generate(&request.natural_language_query)
            .await
    })
    .await?;
    Ok(Json(outcome))
}

pub async fn execute_query(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ExecutionOutcome>, ApiError> {
    let outcome = detached(async move { state.service.execute(id).await })
        .await
        .map_err(|e| ApiError::from(e).for_query(id))?;
    Ok(Json(outcome))
}

/// The body is optional; an empty one saves under the default name.
pub async fn save_query(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Json<QueryRecord>, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        SaveQueryRequest::default()
    } else {
        serde_json::from_slice::<SaveQueryRequest>(&body)
            .map_err(|e| ApiError::validation(format!("Invalid request body: {}", e)))?
    };

    let record = state
        .service
        .save(id, request.name)
        .await
        .map_err(|e| ApiError::from(e).for_query(id))?;
    Ok(Json(record))
}

pub async fn list_queries(
    State(state): State<Arc<AppState>>,
    filter: Result<Query<QueryFilter>, QueryRejection>,
) -> Result<Json<Vec<QueryRecord>>, ApiError> {
    let filter = query_params(filter)?;
    Ok(Json(state.service.queries().list(filter).await?))
}

pub async fn get_query(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<QueryRecord>, ApiError> {
    state
        .service
        .queries()
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| PipelineError::NotFound(id).into())
}

pub async fn create_query(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateQueryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<QueryRecord>), ApiError> {
    let request = json_body(payload)?;
    let record = state
        .service
        .create_manual(&request.sql_query, request.name)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_activities(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ActivityParams>, QueryRejection>,
) -> Result<Json<Vec<ActivityRecord>>, ApiError> {
    let params = query_params(params)?;
    Ok(Json(state.service.activities().list(params.limit).await?))
}

pub async fn get_schema() -> Json<SchemaResponse> {
    Json(SchemaResponse {
        schema: catalog::describe_schema(),
    })
}

pub async fn suggestions(
    params: Result<Query<SuggestionParams>, QueryRejection>,
) -> Result<Json<SuggestionsResponse>, ApiError> {
    let intent = query_params(params)?.intent.unwrap_or_default();
    Ok(Json(SuggestionsResponse {
        suggestions: catalog::suggest_questions(&intent),
    }))
}

// System status
pub async fn system_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SystemStatus>, ApiError> {
    let now = chrono::Utc::now();
    let uptime = now.signed_duration_since(state.startup_time).num_seconds();

    Ok(Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        llm_backend: state.service.llm_backend(),
        llm_model: state.config.llm.model.clone(),
        query_count: state.service.queries().count().await?,
    }))
}
