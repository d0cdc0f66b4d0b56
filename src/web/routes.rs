use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

// API Routes - REST API for programmatic access
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/api",
        Router::new()
            // Question → SQL
            .route("/nl-to-sql", post(handlers::api::nl_to_sql))
            // Query records
            .route(
                "/queries",
                get(handlers::api::list_queries).post(handlers::api::create_query),
            )
            .route("/queries/{id}", get(handlers::api::get_query))
            .route("/queries/{id}/execute", post(handlers::api::execute_query))
            .route("/queries/{id}/save", post(handlers::api::save_query))
            // Audit trail
            .route("/activities", get(handlers::api::list_activities))
            // Catalog
            .route("/schema", get(handlers::api::get_schema))
            .route("/suggestions", get(handlers::api::suggestions))
            // System status
            .route("/status", get(handlers::api::system_status)),
    )
}
