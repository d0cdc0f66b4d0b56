use arrow::json::writer::JsonArray;
use arrow::json::WriterBuilder;
use arrow::record_batch::RecordBatch;
use duckdb::Connection;
use serde_json::{Map, Value};

/// One result row: column name → JSON value.
pub type RowMapping = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum RowsError {
    #[error("{0}")]
    Database(#[from] duckdb::Error),

    #[error("failed to encode result rows: {0}")]
    Encode(#[from] arrow::error::ArrowError),

    #[error("failed to decode result rows: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Runs a single statement and returns its rows in result order.
///
/// Rows travel through Arrow batches, the same path DuckDB uses for bulk
/// reads, and are then written out as JSON objects. NULL columns are kept as
/// explicit `null` values so every row has the same keys.
pub fn query_rows(conn: &Connection, sql: &str) -> Result<Vec<RowMapping>, RowsError> {
    let mut stmt = conn.prepare(sql)?;
    let batches: Vec<RecordBatch> = stmt.query_arrow([])?.collect();
    batches_to_rows(&batches)
}

pub fn batches_to_rows(batches: &[RecordBatch]) -> Result<Vec<RowMapping>, RowsError> {
    let row_count: usize = batches.iter().map(|batch| batch.num_rows()).sum();
    if row_count == 0 {
        return Ok(Vec::new());
    }

    let mut writer = WriterBuilder::new()
        .with_explicit_nulls(true)
        .build::<_, JsonArray>(Vec::new());
    let refs: Vec<&RecordBatch> = batches.iter().collect();
    writer.write_batches(&refs)?;
    writer.finish()?;

    let rows: Vec<RowMapping> = serde_json::from_slice(&writer.into_inner())?;
    Ok(rows)
}
