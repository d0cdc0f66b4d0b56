// HTTP surface for the question → SQL pipeline. Everything lives under /api;
// handlers are thin and hand work to the QueryService held in AppState.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::WebConfig;
use self::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    routes::api_routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serves the API until Ctrl-C.
pub async fn run_server(config: WebConfig, state: Arc<AppState>) -> std::io::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::llm::tests::ScriptedProvider;
    use crate::pipeline::tests::service_with;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn app(reply: &str) -> Router {
        let service = service_with(ScriptedProvider::replying(reply)).await;
        router(Arc::new(AppState::new(AppConfig::default(), service)))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let resp = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
        let parsed = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, parsed)
    }

    #[tokio::test]
    async fn generate_execute_save_and_list() {
        let reply = json!({
            "sql": "SELECT domain, COUNT(*) AS page_count FROM scraped_data GROUP BY domain ORDER BY page_count DESC LIMIT 10",
            "explanation": "Counts pages per domain",
            "confidence": 0.9
        });
        let app = app(&reply.to_string()).await;

        let (status, generated) = send(
            &app,
            "POST",
            "/api/nl-to-sql",
            Some(json!({"naturalLanguageQuery": "top domains"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(generated["explanation"], "Counts pages per domain");
        assert_eq!(generated["parseFailed"], false);
        let id = generated["queryId"].as_i64().unwrap();

        let (status, executed) = send(&app, "POST", &format!("/api/queries/{}/execute", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(executed["resultCount"], 3);
        assert_eq!(executed["results"][0]["domain"], "news.example.com");

        let (status, saved) = send(
            &app,
            "POST",
            &format!("/api/queries/{}/save", id),
            Some(json!({"name": "Top domains"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved["isSaved"], true);
        assert_eq!(saved["name"], "Top domains");

        let (status, listed) = send(&app, "GET", "/api/queries?saved=true", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["id"], id);

        let (_, activities) = send(&app, "GET", "/api/activities?limit=10", None).await;
        assert_eq!(activities.as_array().unwrap().len(), 2);
        assert_eq!(activities[0]["type"], "query");

        let (_, status_body) = send(&app, "GET", "/api/status", None).await;
        assert_eq!(status_body["queryCount"], 1);
        assert_eq!(status_body["llmBackend"], "scripted");
    }

    #[tokio::test]
    async fn empty_question_is_a_bad_request() {
        let app = app("{}").await;
        for body in [json!({"naturalLanguageQuery": "  "}), json!({})] {
            let (status, error) = send(&app, "POST", "/api/nl-to-sql", Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(error["kind"], "ValidationError");
        }
    }

    #[tokio::test]
    async fn malformed_query_strings_get_the_error_body() {
        let app = app("{}").await;
        for uri in ["/api/queries?limit=abc", "/api/queries?saved=maybe", "/api/activities?limit=-1"] {
            let (status, error) = send(&app, "GET", uri, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(error["kind"], "ValidationError", "{}", uri);
            assert!(error["message"].is_string(), "{}", uri);
        }
    }

    #[tokio::test]
    async fn unsafe_and_missing_queries_map_to_client_errors() {
        let app = app("{}").await;

        let (status, created) = send(
            &app,
            "POST",
            "/api/queries",
            Some(json!({"sqlQuery": "DELETE FROM scrapers"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_i64().unwrap();

        let (status, error) = send(&app, "POST", &format!("/api/queries/{}/execute", id), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["kind"], "UnsafeQueryError");
        assert_eq!(error["queryId"], id);

        let (status, error) = send(&app, "POST", "/api/queries/9999/execute", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error["kind"], "NotFoundError");

        let (status, _) = send(&app, "GET", "/api/queries/9999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, "POST", "/api/queries/9999/save", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn save_without_body_uses_default_name() {
        let app = app("{}").await;
        let (_, created) = send(&app, "POST", "/api/queries", Some(json!({"sqlQuery": "SELECT 1"}))).await;
        let id = created["id"].as_i64().unwrap();
        assert_eq!(created["isSaved"], false);

        let (status, saved) = send(&app, "POST", &format!("/api/queries/{}/save", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved["name"], format!("Saved Query {}", id));
    }

    #[tokio::test]
    async fn catalog_endpoints_describe_the_database() {
        let app = app("{}").await;

        let (status, schema) = send(&app, "GET", "/api/schema", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(schema["schema"].as_str().unwrap().contains("Table: scraped_data"));

        let (status, suggestions) = send(&app, "GET", "/api/suggestions?intent=data", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!suggestions["suggestions"].as_array().unwrap().is_empty());
    }
}
