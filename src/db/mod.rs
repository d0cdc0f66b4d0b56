pub mod bootstrap;
pub mod db_pool;
pub mod results;

use duckdb::Connection;

use crate::error::PipelineError;
use self::db_pool::DbPool;

/// Runs `f` on the blocking pool with a connection checked out of `pool`.
///
/// The connection goes back to the pool when the closure returns, whichever
/// way it returns.
pub async fn with_connection<T, F>(pool: &DbPool, f: F) -> Result<T, PipelineError>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T, PipelineError> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool.get()?;
        f(&conn)
    })
    .await?
}
