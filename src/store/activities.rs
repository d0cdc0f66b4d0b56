use chrono::Utc;
use duckdb::{params, Row};
use tracing::error;

use crate::db::db_pool::DbPool;
use crate::db::with_connection;
use crate::error::PipelineError;
use crate::store::models::{ActivityMetadata, ActivityRecord, ActivityStatus};
use crate::store::queries::from_millis;
use crate::store::ListLimits;

const ACTIVITY_COLUMNS: &str =
    "id, type, message, status, CAST(metadata AS VARCHAR), epoch_ms(created_at)";

/// Append-only audit trail of pipeline operations.
#[derive(Clone)]
pub struct ActivityLog {
    pool: DbPool,
    limits: ListLimits,
}

fn read_activity(row: &Row<'_>) -> duckdb::Result<(i64, String, String, String, Option<String>, i64)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn into_record(
    (id, kind, message, status, metadata, created_at): (i64, String, String, String, Option<String>, i64),
) -> Result<ActivityRecord, PipelineError> {
    let status = ActivityStatus::parse(&status)
        .ok_or_else(|| PipelineError::Storage(format!("unknown activity status: {}", status)))?;
    let metadata = metadata
        .map(|json| serde_json::from_str::<ActivityMetadata>(&json))
        .transpose()?;
    Ok(ActivityRecord {
        id,
        kind,
        message,
        status,
        metadata,
        created_at: from_millis(created_at)?,
    })
}

impl ActivityLog {
    pub fn new(pool: DbPool, limits: ListLimits) -> Self {
        Self { pool, limits }
    }

    /// Appends an activity. A failure to write is logged and swallowed so
    /// the operation being audited is never failed by its own audit trail.
    pub async fn record(
        &self,
        kind: &str,
        message: impl Into<String>,
        status: ActivityStatus,
        metadata: Option<ActivityMetadata>,
    ) -> Option<ActivityRecord> {
        let message = message.into();
        match self.insert(kind.to_string(), message.clone(), status, metadata).await {
            Ok(record) => Some(record),
            Err(e) => {
                error!("Failed to record {} activity '{}': {}", kind, message, e);
                None
            }
        }
    }

    async fn insert(
        &self,
        kind: String,
        message: String,
        status: ActivityStatus,
        metadata: Option<ActivityMetadata>,
    ) -> Result<ActivityRecord, PipelineError> {
        let metadata = metadata.as_ref().map(serde_json::to_string).transpose()?;
        let now = Utc::now().timestamp_millis();

        with_connection(&self.pool, move |conn| {
            let stored = conn.query_row(
                &format!(
                    "INSERT INTO activities (type, message, status, metadata, created_at)
                     VALUES (?, ?, ?, CAST(? AS JSON), epoch_ms(CAST(? AS BIGINT)))
                     RETURNING {}",
                    ACTIVITY_COLUMNS
                ),
                params![kind, message, status.as_str(), metadata, now],
                read_activity,
            )?;
            into_record(stored)
        })
        .await
    }

    /// Most recent activities first.
    pub async fn list(&self, limit: Option<usize>) -> Result<Vec<ActivityRecord>, PipelineError> {
        let sql = format!(
            "SELECT {} FROM activities ORDER BY created_at DESC, id DESC LIMIT {}",
            ACTIVITY_COLUMNS,
            self.limits.resolve(limit)
        );
        with_connection(&self.pool, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], read_activity)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(into_record).collect()
        })
        .await
    }
}
