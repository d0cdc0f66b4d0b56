use duckdb::{Config, Connection};
use r2d2::{ManageConnection, Pool};
use std::sync::Mutex;

pub const IN_MEMORY: &str = ":memory:";

/// Hands out connections to one DuckDB database.
///
/// Every pooled connection is cloned from a single root connection, so an
/// in-memory database is shared by the whole pool instead of each connection
/// getting its own empty one.
///
/// The database is opened with external access disabled: statements can only
/// see the tables inside it, never host files, URLs or attached databases.
pub struct DuckDBConnectionManager {
    root: Mutex<Connection>,
}

impl DuckDBConnectionManager {
    pub fn open(connection_string: &str) -> Result<Self, duckdb::Error> {
        let root = if connection_string.is_empty() || connection_string == IN_MEMORY {
            Connection::open_in_memory_with_flags(restricted_config()?)?
        } else {
            Connection::open_with_flags(connection_string, restricted_config()?)?
        };
        Ok(Self {
            root: Mutex::new(root),
        })
    }
}

fn restricted_config() -> Result<Config, duckdb::Error> {
    Config::default().enable_external_access(false)
}

impl ManageConnection for DuckDBConnectionManager {
    type Connection = Connection;
    type Error = duckdb::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let root = self.root.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        root.try_clone()
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.execute_batch("SELECT 1")
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

pub type DbPool = Pool<DuckDBConnectionManager>;

pub fn build_pool(connection_string: &str, pool_size: u32) -> Result<DbPool, DbInitError> {
    let manager = DuckDBConnectionManager::open(connection_string)?;
    Ok(Pool::builder().max_size(pool_size).build(manager)?)
}

#[derive(Debug, thiserror::Error)]
pub enum DbInitError {
    #[error("failed to open database: {0}")]
    Open(#[from] duckdb::Error),

    #[error("failed to build connection pool: {0}")]
    Pool(#[from] r2d2::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_pool_shares_one_database() {
        let pool = build_pool(IN_MEMORY, 2).unwrap();
        let first = pool.get().unwrap();
        let second = pool.get().unwrap();

        first
            .execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (42);")
            .unwrap();
        let x: i32 = second.query_row("SELECT x FROM t", [], |row| row.get(0)).unwrap();
        assert_eq!(x, 42);
    }

    #[test]
    fn host_files_are_not_readable() {
        let pool = build_pool(IN_MEMORY, 1).unwrap();
        let conn = pool.get().unwrap();
        let read = conn.query_row("SELECT content FROM read_text('/etc/hostname')", [], |row| {
            row.get::<_, String>(0)
        });
        assert!(read.is_err());
    }
}
