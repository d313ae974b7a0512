/// Connection Management Module
///
/// This module owns the live SQLite handle, applies connection pragmas and
/// executes raw parameterized statements.

use crate::config::ConnectionConfig;
use crate::core::db::query::{CursorResult, Params};
use crate::core::{Result, TablekitError};
use std::time::Duration;
use tracing::debug;

/// Path string SQLite uses for a private in-memory database
pub const MEMORY_PATH: &str = ":memory:";

/// A live connection to one SQLite database.
#[derive(Debug)]
pub struct Connection {
    inner: rusqlite::Connection,
    /// Path to the database file (None for in-memory databases)
    path: Option<String>,
}

impl Connection {
    /// Opens a SQLite database at the specified path with default pragmas
    ///
    /// # Arguments
    ///
    /// * `db_path` - Path to the SQLite database file, or ":memory:" for in-memory database
    ///
    /// # Returns
    ///
    /// The open connection, or `TablekitError::Backend` on failure.
    pub fn open(db_path: &str) -> Result<Self> {
        Self::open_with(db_path, &ConnectionConfig::default())
    }

    /// Opens a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::open(MEMORY_PATH)
    }

    /// Opens a SQLite database and applies the given connection settings
    pub fn open_with(db_path: &str, config: &ConnectionConfig) -> Result<Self> {
        let inner = rusqlite::Connection::open(db_path)
            .map_err(TablekitError::backend("open", ""))?;

        inner
            .pragma_update(None, "foreign_keys", config.foreign_keys)
            .map_err(TablekitError::backend("configure", ""))?;
        if let Some(mode) = &config.journal_mode {
            // journal_mode answers with the resulting mode, so it is queried rather than set
            inner
                .pragma_update_and_check(None, "journal_mode", mode, |row| row.get::<_, String>(0))
                .map_err(TablekitError::backend("configure", ""))?;
        }
        inner
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .map_err(TablekitError::backend("configure", ""))?;

        debug!("Opened database {}", db_path);
        Ok(Connection {
            inner,
            path: if db_path != MEMORY_PATH {
                Some(db_path.to_string())
            } else {
                None
            },
        })
    }

    /// Path of the database file, `None` for in-memory databases
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// The underlying rusqlite connection
    pub fn raw(&self) -> &rusqlite::Connection {
        &self.inner
    }

    /// Prepares, binds and executes one statement
    ///
    /// Statements without result columns run before this returns; queries
    /// are stepped as the returned cursor is read.
    pub fn execute(&self, sql: &str, params: impl Into<Params>) -> Result<CursorResult<'_>> {
        self.execute_on(sql, params.into(), "execute", "")
    }

    /// Same as [`Connection::execute`], reporting failures against a table operation
    pub(crate) fn execute_on(
        &self,
        sql: &str,
        params: Params,
        operation: &str,
        table: &str,
    ) -> Result<CursorResult<'_>> {
        debug!(sql, ?params, "Executing statement");
        let mut stmt = self
            .inner
            .prepare(sql)
            .map_err(TablekitError::backend(operation, table))?;
        params
            .bind(&mut stmt)
            .map_err(TablekitError::backend(operation, table))?;
        CursorResult::new(stmt).map_err(TablekitError::backend(operation, table))
    }

    /// Executes several `;`-separated statements without parameters
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.inner
            .execute_batch(sql)
            .map_err(TablekitError::backend("execute_batch", ""))
    }

    /// Rowid of the most recent successful INSERT on this connection
    pub fn last_insert_rowid(&self) -> i64 {
        self.inner.last_insert_rowid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(conn.path(), None);

        let fk: bool = conn
            .raw()
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert!(fk);
    }

    #[test]
    fn test_connection_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.db");
        let config = ConnectionConfig {
            foreign_keys: false,
            busy_timeout_ms: 250,
            journal_mode: Some("WAL".to_string()),
        };

        let conn = Connection::open_with(path.to_str().unwrap(), &config).unwrap();
        assert_eq!(conn.path(), path.to_str());

        let mode: String = conn
            .raw()
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        let fk: bool = conn
            .raw()
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert!(!fk);
    }

    #[test]
    fn test_connection_error_handling() {
        let result = Connection::open("/nonexistent/path/database.db");
        match result.unwrap_err() {
            TablekitError::Backend { operation, .. } => assert_eq!(operation, "open"),
            other => panic!("Expected Backend error, got {:?}", other),
        }
    }

    #[test]
    fn test_execute_reports_context() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn.execute("SELECT * FROM missing", ()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("execute"), "{}", msg);
        assert!(msg.contains("no such table"), "{}", msg);
    }

    #[test]
    fn test_last_insert_rowid() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)")
            .unwrap();
        let result = conn.execute("INSERT INTO t (v) VALUES ('a')", ()).unwrap();
        assert_eq!(result.rowcount(), 1);
        drop(result);
        assert_eq!(conn.last_insert_rowid(), 1);
    }
}
