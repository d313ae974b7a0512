//! Top-level entry point: one connection plus its schema catalog.

use crate::config::Config;
use crate::core::db::connection::{Connection, MEMORY_PATH};
use crate::core::db::query::{CursorResult, Params};
use crate::core::db::schema::Catalog;
use crate::core::Result;
use crate::row::{Row, RowShape};
use crate::sql;
use crate::table::DbTable;
use std::fmt;
use tracing::info;

/// A database and the lazily reflected catalog of its tables.
///
/// Not `Sync`: callers sharing one across threads must serialize access.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
    catalog: Catalog,
}

impl Database {
    /// Opens a SQLite file with default connection settings
    pub fn open(path: &str) -> Result<Self> {
        Ok(Self::from_connection(Connection::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    /// Opens the database named in the configuration, in memory when none is
    pub fn from_config(config: &Config) -> Result<Self> {
        let path = config.database.path.as_deref().unwrap_or(MEMORY_PATH);
        Ok(Self::from_connection(Connection::open_with(path, &config.connection)?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Database {
            conn,
            catalog: Catalog::new(),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Runs arbitrary parameterized SQL
    pub fn execute(&self, sql: &str, params: impl Into<Params>) -> Result<CursorResult<'_>> {
        self.conn.execute(sql, params)
    }

    /// Runs a query and collects every row
    pub fn query(&self, sql: &str, params: impl Into<Params>) -> Result<Vec<Row>> {
        let mut cursor = self.execute(sql, params)?;
        let rows = cursor.rows().collect();
        rows
    }

    /// A dynamic handle for the named table
    pub fn table(&self, name: &str) -> Result<DbTable<'_>> {
        let schema = self.catalog.get_table(&self.conn, name)?;
        Ok(DbTable::new(schema, &self.conn))
    }

    /// Table names in reflection order
    pub fn table_names(&self) -> Result<Vec<String>> {
        self.catalog.list_tables(&self.conn)
    }

    /// Handles for every enumerable table
    pub fn tables(&self) -> Result<Vec<DbTable<'_>>> {
        self.table_names()?
            .iter()
            .map(|name| self.table(name))
            .collect()
    }

    /// CREATE TABLE text for one table.
    ///
    /// Reflected tables report the statement SQLite stored, constraints and
    /// key order included. Tables merged by [`Database::create`] are rendered
    /// from their shape.
    pub fn schema(&self, name: &str) -> Result<String> {
        let schema = self.catalog.get_table(&self.conn, name)?;
        Ok(match schema.definition() {
            Some(definition) => definition.to_string(),
            None => sql::create_table(&schema),
        })
    }

    /// CREATE TABLE text for every enumerable table, `;`-terminated
    pub fn full_schema(&self) -> Result<String> {
        let statements = self
            .table_names()?
            .iter()
            .map(|name| self.schema(name).map(|ddl| format!("{};", ddl)))
            .collect::<Result<Vec<_>>>()?;
        Ok(statements.join("\n\n"))
    }

    /// Creates a table from a row shape and returns a handle to it.
    ///
    /// The new table is merged into an already loaded catalog without
    /// reflecting again. If the DDL fails the catalog is left untouched.
    pub fn create(&self, name: &str, shape: &RowShape) -> Result<DbTable<'_>> {
        let schema = shape.to_schema(name)?;
        let ddl = sql::create_table(&schema);
        self.conn
            .execute_on(&ddl, Params::None, "create", name)?;
        info!(table = name, "Created table");

        if !self.catalog.merge(schema) {
            self.catalog.ensure_loaded(&self.conn)?;
        }
        self.table(name)
    }

    /// Drops the cached catalog and reflects the schema again
    pub fn refresh(&mut self) -> Result<()> {
        self.catalog.close();
        self.catalog.ensure_loaded(&self.conn)
    }

    /// Releases the cached catalog. Idempotent; the next lookup reflects again.
    pub fn close(&mut self) {
        self.catalog.close();
    }
}

impl fmt::Display for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Database({})", self.conn.path().unwrap_or(MEMORY_PATH))
    }
}
