use chrono::{DateTime, Utc};
use duckdb::{params, OptionalExt, Row};
use tracing::debug;

use crate::db::db_pool::DbPool;
use crate::db::results::RowMapping;
use crate::db::with_connection;
use crate::error::PipelineError;
use crate::store::models::{NewQuery, QueryFilter, QueryRecord, QueryUpdate};
use crate::store::ListLimits;

const QUERY_COLUMNS: &str = "id, name, natural_language_query, sql_query, CAST(results AS VARCHAR), \
     is_saved, epoch_ms(executed_at), epoch_ms(created_at)";

/// Column values as DuckDB hands them back, before JSON and timestamp decoding.
struct StoredQuery {
    id: i64,
    name: Option<String>,
    natural_language_query: Option<String>,
    sql_query: String,
    results: Option<String>,
    is_saved: bool,
    executed_at: Option<i64>,
    created_at: i64,
}

impl StoredQuery {
    fn from_row(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            natural_language_query: row.get(2)?,
            sql_query: row.get(3)?,
            results: row.get(4)?,
            is_saved: row.get(5)?,
            executed_at: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn into_record(self) -> Result<QueryRecord, PipelineError> {
        let results = self
            .results
            .map(|json| serde_json::from_str::<Vec<RowMapping>>(&json))
            .transpose()?;
        Ok(QueryRecord {
            id: self.id,
            name: self.name,
            natural_language_query: self.natural_language_query,
            sql_query: self.sql_query,
            results,
            is_saved: self.is_saved,
            executed_at: self.executed_at.map(from_millis).transpose()?,
            created_at: from_millis(self.created_at)?,
        })
    }
}

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>, PipelineError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| PipelineError::Storage(format!("timestamp out of range: {}", ms)))
}

fn encode_results(results: Option<&Vec<RowMapping>>) -> Result<Option<String>, PipelineError> {
    Ok(results.map(serde_json::to_string).transpose()?)
}

/// Persistent store for generated and saved queries.
#[derive(Clone)]
pub struct QueryStore {
    pool: DbPool,
    limits: ListLimits,
}

impl QueryStore {
    pub fn new(pool: DbPool, limits: ListLimits) -> Self {
        Self { pool, limits }
    }

    pub async fn create(&self, new: NewQuery) -> Result<QueryRecord, PipelineError> {
        if new.sql_query.trim().is_empty() {
            return Err(PipelineError::Validation("SQL query is required".to_string()));
        }
        let results = encode_results(new.results.as_ref())?;
        let now = Utc::now().timestamp_millis();

        let record = with_connection(&self.pool, move |conn| {
            let stored = conn.query_row(
                &format!(
                    "INSERT INTO queries (name, natural_language_query, sql_query, results, is_saved, created_at)
                     VALUES (?, ?, ?, CAST(? AS JSON), ?, epoch_ms(CAST(? AS BIGINT)))
                     RETURNING {}",
                    QUERY_COLUMNS
                ),
                params![
                    new.name,
                    new.natural_language_query,
                    new.sql_query,
                    results,
                    new.is_saved,
                    now
                ],
                StoredQuery::from_row,
            )?;
            stored.into_record()
        })
        .await?;

        debug!("Created query record {}", record.id);
        Ok(record)
    }

    pub async fn get(&self, id: i64) -> Result<Option<QueryRecord>, PipelineError> {
        with_connection(&self.pool, move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM queries WHERE id = ?", QUERY_COLUMNS),
                params![id],
                StoredQuery::from_row,
            )
            .optional()?
            .map(StoredQuery::into_record)
            .transpose()
        })
        .await
    }

    /// Newest first. The limit defaults to the configured page size and is
    /// capped at the configured maximum.
    pub async fn list(&self, filter: QueryFilter) -> Result<Vec<QueryRecord>, PipelineError> {
        let limit = self.limits.resolve(filter.limit);
        let condition = match filter.saved {
            Some(saved) => format!("WHERE is_saved = {}", saved),
            None => String::new(),
        };
        let sql = format!(
            "SELECT {} FROM queries {} ORDER BY created_at DESC, id DESC LIMIT {}",
            QUERY_COLUMNS, condition, limit
        );

        with_connection(&self.pool, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let stored = stmt
                .query_map([], StoredQuery::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            stored.into_iter().map(StoredQuery::into_record).collect()
        })
        .await
    }

    /// Applies the fields set in `update` in a single statement. Concurrent
    /// updates to one id are last-writer-wins.
    pub async fn update(&self, id: i64, update: QueryUpdate) -> Result<QueryRecord, PipelineError> {
        let results = encode_results(update.results.as_ref())?;
        let executed_at = update.executed_at.map(|at| at.timestamp_millis());

        with_connection(&self.pool, move |conn| {
            conn.query_row(
                &format!(
                    "UPDATE queries SET
                        name = COALESCE(CAST(? AS VARCHAR), name),
                        results = COALESCE(CAST(? AS JSON), results),
                        is_saved = COALESCE(CAST(? AS BOOLEAN), is_saved),
                        executed_at = COALESCE(epoch_ms(CAST(? AS BIGINT)), executed_at)
                     WHERE id = ?
                     RETURNING {}",
                    QUERY_COLUMNS
                ),
                params![update.name, results, update.is_saved, executed_at, id],
                StoredQuery::from_row,
            )
            .optional()?
            .ok_or(PipelineError::NotFound(id))?
            .into_record()
        })
        .await
    }

    pub async fn count(&self) -> Result<i64, PipelineError> {
        with_connection(&self.pool, |conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM queries", [], |row| row.get(0))?)
        })
        .await
    }
}
