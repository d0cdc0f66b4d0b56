use std::time::Duration;
use tracing::{debug, warn};

use crate::db::db_pool::DbPool;
use crate::db::results::{query_rows, RowMapping};
use crate::db::with_connection;
use crate::error::PipelineError;
use crate::pipeline::guard::ensure_read_only;

/// Runs guarded, read-only SQL against the analytics database.
#[derive(Clone)]
pub struct QueryExecutor {
    pool: DbPool,
    timeout: Duration,
}

impl QueryExecutor {
    pub fn new(pool: DbPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Rejected statements never reach the database. Accepted ones run inside
    /// a transaction that is always rolled back. On timeout the caller
    /// gets `TimeoutError` straight away; the statement itself is left to
    /// finish on the blocking pool and its rows are discarded.
    pub async fn run(&self, sql: &str) -> Result<Vec<RowMapping>, PipelineError> {
        let statement = ensure_read_only(sql).map_err(|e| {
            warn!("Rejected unsafe SQL ({}): {}", e, sql);
            PipelineError::UnsafeQuery(e)
        })?;

        let statement = statement.to_string();
        debug!("Executing SQL: {}", statement);
        let work = with_connection(&self.pool, move |conn| {
            conn.execute_batch("BEGIN TRANSACTION")?;
            let rows = query_rows(conn, &statement);
            if let Err(e) = conn.execute_batch("ROLLBACK") {
                warn!("Failed to roll back query transaction: {}", e);
            }
            rows.map_err(|e| PipelineError::QueryExecution(e.to_string()))
        });

        match tokio::time::timeout(self.timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout {
                operation: "query execution",
                after: self.timeout,
            }),
        }
    }
}
