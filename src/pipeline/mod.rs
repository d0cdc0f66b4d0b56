pub mod executor;
pub mod guard;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::db::results::RowMapping;
use crate::error::PipelineError;
use crate::llm::models::SqlGeneration;
use crate::llm::prompt::build_prompt;
use crate::llm::LlmManager;
use crate::store::models::{ActivityMetadata, ActivityStatus, NewQuery, QueryRecord, QueryUpdate};
use crate::store::{ActivityLog, QueryStore};

use self::executor::QueryExecutor;

const ACTIVITY_KIND: &str = "query";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOutcome {
    #[serde(flatten)]
    pub generation: SqlGeneration,
    /// `None` when the model produced no SQL and nothing was stored.
    pub query_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    pub query_id: i64,
    pub results: Vec<RowMapping>,
    pub result_count: usize,
}

/// Ties the question → SQL → results lifecycle together and keeps the
/// activity trail in step with it.
pub struct QueryService {
    llm: LlmManager,
    queries: QueryStore,
    activities: ActivityLog,
    executor: QueryExecutor,
}

impl QueryService {
    pub fn new(
        llm: LlmManager,
        queries: QueryStore,
        activities: ActivityLog,
        executor: QueryExecutor,
    ) -> Self {
        Self {
            llm,
            queries,
            activities,
            executor,
        }
    }

    pub fn queries(&self) -> &QueryStore {
        &self.queries
    }

    pub fn activities(&self) -> &ActivityLog {
        &self.activities
    }

    pub fn llm_backend(&self) -> &'static str {
        self.llm.backend()
    }

    /// Turns a question into SQL and stores it as an unsaved query.
    pub async fn generate(&self, question: &str) -> Result<GenerateOutcome, PipelineError> {
        let prompt = build_prompt(question)?;
        let question = question.trim();

        let generation = match self.llm.generate_sql(&prompt).await {
            Ok(generation) => generation,
            Err(e) => {
                let err = PipelineError::from(e);
                self.activities
                    .record(
                        ACTIVITY_KIND,
                        format!("SQL generation failed for: {}", question),
                        ActivityStatus::Error,
                        Some(ActivityMetadata::QueryFailed {
                            query_id: None,
                            kind: err.kind().to_string(),
                            error: err.to_string(),
                        }),
                    )
                    .await;
                return Err(err);
            }
        };

        if !generation.has_sql() {
            warn!("Completion returned no SQL for: {}", question);
            self.activities
                .record(
                    ACTIVITY_KIND,
                    format!("No SQL generated for: {}", question),
                    ActivityStatus::Warning,
                    Some(ActivityMetadata::Other(json!({
                        "parseFailed": generation.parse_failed
                    }))),
                )
                .await;
            return Ok(GenerateOutcome {
                generation,
                query_id: None,
            });
        }

        // Stored anyway: the executor refuses to run it.
        if let Err(e) = guard::ensure_read_only(&generation.sql) {
            warn!("Generated SQL would be rejected at execution ({}): {}", e, generation.sql);
        }

        let record = self
            .queries
            .create(NewQuery {
                natural_language_query: Some(question.to_string()),
                sql_query: generation.sql.clone(),
                ..NewQuery::default()
            })
            .await?;

        info!(
            "Generated query {} (confidence {:.2}) for: {}",
            record.id, generation.confidence, question
        );
        self.activities
            .record(
                ACTIVITY_KIND,
                format!("Generated SQL for: {}", question),
                ActivityStatus::Success,
                Some(ActivityMetadata::QueryGenerated {
                    query_id: record.id,
                    confidence: generation.confidence,
                }),
            )
            .await;

        Ok(GenerateOutcome {
            generation,
            query_id: Some(record.id),
        })
    }

    /// Runs a stored query and caches its rows on the record. Records exactly
    /// one activity whichever way it ends.
    pub async fn execute(&self, id: i64) -> Result<ExecutionOutcome, PipelineError> {
        let outcome = self.run_stored(id).await;

        match &outcome {
            Ok(executed) => {
                self.activities
                    .record(
                        ACTIVITY_KIND,
                        format!("Executed query {} ({} rows)", id, executed.result_count),
                        ActivityStatus::Success,
                        Some(ActivityMetadata::QueryExecuted {
                            query_id: id,
                            result_count: executed.result_count,
                        }),
                    )
                    .await;
            }
            Err(e) => {
                warn!("Execution of query {} failed: {}", id, e);
                self.activities
                    .record(
                        ACTIVITY_KIND,
                        format!("Execution of query {} failed", id),
                        ActivityStatus::Error,
                        Some(ActivityMetadata::QueryFailed {
                            query_id: Some(id),
                            kind: e.kind().to_string(),
                            error: e.to_string(),
                        }),
                    )
                    .await;
            }
        }

        outcome
    }

    async fn run_stored(&self, id: i64) -> Result<ExecutionOutcome, PipelineError> {
        let record = self
            .queries
            .get(id)
            .await?
            .ok_or(PipelineError::NotFound(id))?;

        let results = self.executor.run(&record.sql_query).await?;
        let result_count = results.len();

        self.queries
            .update(
                id,
                QueryUpdate {
                    results: Some(results.clone()),
                    executed_at: Some(Utc::now()),
                    ..QueryUpdate::default()
                },
            )
            .await?;

        Ok(ExecutionOutcome {
            query_id: id,
            results,
            result_count,
        })
    }

    /// Marks a query as saved. Saving twice leaves the same state.
    pub async fn save(&self, id: i64, name: Option<String>) -> Result<QueryRecord, PipelineError> {
        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("Saved Query {}", id));

        self.queries
            .update(
                id,
                QueryUpdate {
                    name: Some(name),
                    is_saved: Some(true),
                    ..QueryUpdate::default()
                },
            )
            .await
    }

    /// Stores hand-written SQL. Named queries are stored as saved.
    pub async fn create_manual(
        &self,
        sql: &str,
        name: Option<String>,
    ) -> Result<QueryRecord, PipelineError> {
        let name = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        self.queries
            .create(NewQuery {
                is_saved: name.is_some(),
                name,
                sql_query: sql.trim().to_string(),
                ..NewQuery::default()
            })
            .await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::bootstrap::tests::seeded_pool;
    use crate::llm::tests::{manager, ScriptedProvider};
    use crate::llm::LlmError;
    use crate::store::models::ActivityRecord;
    use crate::store::ListLimits;
    use serde_json::Value;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    pub(crate) async fn service_with(provider: ScriptedProvider) -> QueryService {
        let pool = seeded_pool().await;
        QueryService::new(
            manager(provider),
            QueryStore::new(pool.clone(), ListLimits::default()),
            ActivityLog::new(pool.clone(), ListLimits::default()),
            QueryExecutor::new(pool, Duration::from_secs(5)),
        )
    }

    async fn activities(service: &QueryService) -> Vec<ActivityRecord> {
        service.activities().list(Some(100)).await.unwrap()
    }

    async fn stored(service: &QueryService, sql: &str) -> i64 {
        service
            .queries()
            .create(NewQuery {
                sql_query: sql.to_string(),
                ..NewQuery::default()
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn select_one_round_trip_records_one_success() {
        let service = service_with(ScriptedProvider::replying("{}")).await;
        let id = stored(&service, "SELECT 1").await;

        let outcome = service.execute(id).await.unwrap();
        assert_eq!(outcome.result_count, 1);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].values().next(), Some(&json!(1)));

        let record = service.queries().get(id).await.unwrap().unwrap();
        assert_eq!(record.results, Some(outcome.results));
        assert!(record.executed_at.is_some());

        let trail = activities(&service).await;
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].status, ActivityStatus::Success);
        assert_eq!(
            trail[0].metadata,
            Some(ActivityMetadata::QueryExecuted {
                query_id: id,
                result_count: 1
            })
        );
    }

    #[tokio::test]
    async fn update_statement_is_refused_and_results_untouched() {
        let service = service_with(ScriptedProvider::replying("{}")).await;
        let id = stored(&service, "UPDATE scrapers SET is_active=false").await;

        let err = service.execute(id).await.unwrap_err();
        assert_eq!(err.kind(), "UnsafeQueryError");

        let record = service.queries().get(id).await.unwrap().unwrap();
        assert_eq!(record.results, None);
        assert_eq!(record.executed_at, None);

        let trail = activities(&service).await;
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].status, ActivityStatus::Error);
        assert!(matches!(
            &trail[0].metadata,
            Some(ActivityMetadata::QueryFailed { query_id: Some(q), kind, .. })
                if *q == id && kind == "UnsafeQueryError"
        ));
    }

    #[tokio::test]
    async fn unknown_query_is_not_found_with_one_error_activity() {
        let service = service_with(ScriptedProvider::replying("{}")).await;
        let err = service.execute(404).await.unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(404)));

        let trail = activities(&service).await;
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].status, ActivityStatus::Error);
    }

    #[tokio::test]
    async fn save_is_idempotent() {
        let service = service_with(ScriptedProvider::replying("{}")).await;
        let id = stored(&service, "SELECT 1").await;

        let first = service.save(id, None).await.unwrap();
        let second = service.save(id, None).await.unwrap();
        assert!(first.is_saved);
        assert_eq!(first.name.as_deref(), Some(format!("Saved Query {}", id).as_str()));
        assert_eq!(first, second);

        let named = service.save(id, Some("  Pages per domain ".into())).await.unwrap();
        assert_eq!(named.name.as_deref(), Some("Pages per domain"));

        assert!(matches!(
            service.save(999, None).await,
            Err(PipelineError::NotFound(999))
        ));
    }

    #[tokio::test]
    async fn top_domains_end_to_end() {
        let reply = json!({
            "sql": "SELECT domain, COUNT(*) AS page_count FROM scraped_data GROUP BY domain ORDER BY page_count DESC LIMIT 10",
            "explanation": "Counts pages per domain",
            "confidence": 0.92,
            "suggestions": ["Show pages per scraper"]
        });
        let service = service_with(ScriptedProvider::replying(&reply.to_string())).await;

        let generated = service.generate("What are the top 10 domains we scraped?").await.unwrap();
        let id = generated.query_id.unwrap();
        assert_eq!(generated.generation.confidence, 0.92);

        let record = service.queries().get(id).await.unwrap().unwrap();
        assert!(!record.is_saved);
        assert!(record.results.is_none());
        assert_eq!(
            record.natural_language_query.as_deref(),
            Some("What are the top 10 domains we scraped?")
        );

        let executed = service.execute(id).await.unwrap();
        assert_eq!(executed.result_count, 3);
        assert_eq!(executed.results[0]["domain"], json!("news.example.com"));
        assert_eq!(executed.results[0]["page_count"], json!(4));

        let trail = activities(&service).await;
        assert_eq!(trail.len(), 2);
        assert!(trail.iter().all(|a| a.status == ActivityStatus::Success));
    }

    #[tokio::test]
    async fn top_domains_with_unaliased_count() {
        let reply = json!({
            "sql": "SELECT domain, COUNT(*) FROM scraped_data GROUP BY domain ORDER BY COUNT(*) DESC LIMIT 100",
            "explanation": "Counts scraped pages per domain",
            "confidence": 0.9
        });
        let service = service_with(ScriptedProvider::replying(&reply.to_string())).await;

        let generated = service.generate("show me the top domains").await.unwrap();
        assert_eq!(generated.generation.confidence, 0.9);
        let id = generated.query_id.unwrap();

        let executed = service.execute(id).await.unwrap();
        assert_eq!(executed.result_count, 3);
        let counts: Vec<(&Value, &Value)> = executed
            .results
            .iter()
            .map(|row| (&row["domain"], &row["count_star()"]))
            .collect();
        assert_eq!(
            counts,
            vec![
                (&json!("news.example.com"), &json!(4)),
                (&json!("shop.example.com"), &json!(2)),
                (&json!("blog.example.org"), &json!(1)),
            ]
        );

        let record = service.queries().get(id).await.unwrap().unwrap();
        assert_eq!(record.results, Some(executed.results));
    }

    #[tokio::test]
    async fn empty_question_never_reaches_the_model() {
        let provider = ScriptedProvider::replying(r#"{"sql": "SELECT 1"}"#);
        let calls = std::sync::Arc::clone(&provider.calls);
        let service = service_with(provider).await;

        for question in ["", "   \n\t"] {
            let err = service.generate(question).await.unwrap_err();
            assert_eq!(err.kind(), "ValidationError");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(service.queries().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reply_without_sql_stores_nothing_and_warns() {
        let service = service_with(ScriptedProvider::replying("I cannot help with that")).await;

        let outcome = service.generate("delete everything").await.unwrap();
        assert_eq!(outcome.query_id, None);
        assert!(outcome.generation.parse_failed);
        assert_eq!(service.queries().count().await.unwrap(), 0);

        let trail = activities(&service).await;
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].status, ActivityStatus::Warning);
    }

    #[tokio::test]
    async fn upstream_failure_records_error_and_no_query() {
        let service = service_with(ScriptedProvider::scripted(vec![Err(LlmError::StatusError {
            status: 401,
            body: "invalid key".into(),
        })]))
        .await;

        let err = service.generate("top domains").await.unwrap_err();
        assert_eq!(err.kind(), "UpstreamServiceError");
        assert_eq!(service.queries().count().await.unwrap(), 0);

        let trail = activities(&service).await;
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].status, ActivityStatus::Error);
    }

    #[tokio::test]
    async fn unsafe_generated_sql_is_still_stored() {
        let service =
            service_with(ScriptedProvider::replying(r#"{"sql": "DROP TABLE scrapers"}"#)).await;
        let outcome = service.generate("remove scrapers").await.unwrap();
        let id = outcome.query_id.unwrap();

        let err = service.execute(id).await.unwrap_err();
        assert_eq!(err.kind(), "UnsafeQueryError");
    }

    #[tokio::test]
    async fn manual_queries_are_saved_when_named() {
        let service = service_with(ScriptedProvider::replying("{}")).await;

        let named = service
            .create_manual(" SELECT 1 ", Some("One".into()))
            .await
            .unwrap();
        assert!(named.is_saved);
        assert_eq!(named.sql_query, "SELECT 1");
        assert_eq!(named.natural_language_query, None);

        let unnamed = service.create_manual("SELECT 2", None).await.unwrap();
        assert!(!unnamed.is_saved);

        let err = service.create_manual("  ", None).await.unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
    }
}
