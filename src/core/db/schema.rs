/// Schema Reflection Module
///
/// This module discovers table and column definitions from a live SQLite
/// connection and caches them for the lifetime of the connection. It is the
/// metadata layer every dynamic table handle is built on.

use crate::core::db::connection::Connection;
use crate::core::{Result, TablekitError};
use once_cell::sync::OnceCell;
use rusqlite::Row;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Single reflection pass over every user table, in creation order then
/// column declaration order.
const REFLECTION_SQL: &str = "
    SELECT m.name, p.name, p.type, p.\"notnull\", p.dflt_value, p.pk, m.sql
    FROM sqlite_master AS m
    JOIN pragma_table_info(m.name) AS p
    WHERE m.type = 'table' AND m.name NOT LIKE 'sqlite_%'
    ORDER BY m.rowid, p.cid";

/// Semantic column type, derived from the declared SQLite type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Integer,
    Text,
    /// Arbitrary-precision base-10 number
    Decimal,
    Timestamp,
    Blob,
}

impl ColumnType {
    /// Maps a declared type to a semantic type using SQLite's affinity rules,
    /// with DATE/TIME names split out of the numeric affinity. DECIMAL and
    /// NUMERIC names are decimals even when they also name a text type.
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.to_uppercase();
        if upper.contains("INT") {
            ColumnType::Integer
        } else if upper.contains("DECIMAL") || upper.contains("NUMERIC") {
            ColumnType::Decimal
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            ColumnType::Text
        } else if upper.contains("BLOB") || upper.trim().is_empty() {
            ColumnType::Blob
        } else if upper.contains("DATE") || upper.contains("TIME") {
            ColumnType::Timestamp
        } else {
            ColumnType::Decimal
        }
    }

    /// Type name used in generated DDL. Reflects back to the same `ColumnType`.
    ///
    /// Decimals get TEXT affinity so SQLite stores the bound digits as is
    /// instead of coercing them to a 64-bit float.
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Text => "TEXT",
            ColumnType::Decimal => "DECIMAL_TEXT",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Blob => "BLOB",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_type())
    }
}

/// Represents a table column with its metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Type as written in the table definition (e.g. "NVARCHAR(120)")
    pub declared_type: String,
    /// Semantic type derived from `declared_type`
    pub column_type: ColumnType,
    /// Whether the column allows NULL values
    pub nullable: bool,
    /// Whether this column is part of the primary key
    pub primary_key: bool,
    /// Default value expression (if any)
    pub default: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Column {
            name: name.into(),
            declared_type: column_type.sql_type().to_string(),
            column_type,
            nullable: true,
            primary_key: false,
            default: None,
        }
    }

    /// Creates a Column from one row of the reflection query
    fn from_reflection_row(row: &Row) -> rusqlite::Result<Self> {
        let declared_type: String = row.get(2)?;
        Ok(Column {
            name: row.get(1)?,
            column_type: ColumnType::from_declared(&declared_type),
            declared_type,
            nullable: !row.get::<_, bool>(3)?,
            default: row.get(4)?,
            primary_key: row.get::<_, i64>(5)? > 0,
        })
    }
}

/// Names starting with an underscore are implementation details and are
/// left out of enumerations.
pub(crate) fn is_public_name(name: &str) -> bool {
    !name.starts_with('_')
}

/// A reflected table: its name and ordered columns.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    name: String,
    columns: Vec<Column>,
    /// CREATE statement as stored by SQLite, for reflected tables
    definition: Option<String>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        TableSchema {
            name: name.into(),
            columns,
            definition: None,
        }
    }

    /// The CREATE TABLE text SQLite recorded for this table. `None` for
    /// schemas built in memory, such as the ones [`Catalog::merge`] takes.
    pub fn definition(&self) -> Option<&str> {
        self.definition.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns in declaration order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Looks up a column by exact (case-sensitive) name
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| TablekitError::UnknownColumn {
                table: self.name.clone(),
                column: name.to_string(),
            })
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Enumerable column names, declaration order, internal columns hidden
    pub fn column_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .map(|c| c.name.as_str())
            .filter(|n| is_public_name(n))
            .collect()
    }

    /// Primary-key columns in declaration order
    pub fn primary_key(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.primary_key).collect()
    }

    /// The column SQLite fills with a generated key: a sole `INTEGER` primary key.
    pub fn rowid_alias(&self) -> Option<&Column> {
        match self.primary_key().as_slice() {
            [pk] if pk.declared_type.eq_ignore_ascii_case("INTEGER") => Some(*pk),
            _ => None,
        }
    }
}

/// Helper function running the reflection query and grouping rows by table
fn reflect_tables(conn: &Connection) -> Result<Vec<Arc<TableSchema>>> {
    let mut stmt = conn
        .raw()
        .prepare(REFLECTION_SQL)
        .map_err(TablekitError::backend("reflect", ""))?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(6)?,
                Column::from_reflection_row(row)?,
            ))
        })
        .map_err(TablekitError::backend("reflect", ""))?;

    let mut tables: Vec<TableSchema> = Vec::new();
    for row in rows {
        let (table_name, definition, column) =
            row.map_err(TablekitError::backend("reflect", ""))?;
        match tables.last_mut() {
            Some(last) if last.name == table_name => last.columns.push(column),
            _ => {
                let mut table = TableSchema::new(table_name, vec![column]);
                table.definition = definition;
                tables.push(table);
            }
        }
    }

    debug!("Reflected {} table(s)", tables.len());
    Ok(tables.into_iter().map(Arc::new).collect())
}

/// Lazily-populated cache of every table in a database.
///
/// The first lookup reflects the whole schema in one query; later lookups
/// are in-memory reads. Nothing is invalidated automatically: call
/// [`Catalog::close`] to force the next lookup to reflect again.
#[derive(Debug, Default)]
pub struct Catalog {
    tables: OnceCell<RwLock<Vec<Arc<TableSchema>>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.tables.get().is_some()
    }

    /// Reflects the schema unless already loaded. Concurrent first calls
    /// reflect once.
    pub fn ensure_loaded(&self, conn: &Connection) -> Result<()> {
        self.loaded(conn).map(|_| ())
    }

    fn loaded(&self, conn: &Connection) -> Result<&RwLock<Vec<Arc<TableSchema>>>> {
        self.tables.get_or_try_init(|| {
            let tables = reflect_tables(conn)?;
            info!("Catalog loaded with {} table(s)", tables.len());
            Ok(RwLock::new(tables))
        })
    }

    /// Looks up a table by exact (case-sensitive) name
    pub fn get_table(&self, conn: &Connection, name: &str) -> Result<Arc<TableSchema>> {
        let tables = self.loaded(conn)?;
        let guard = tables.read().unwrap_or_else(|e| e.into_inner());
        guard
            .iter()
            .find(|t| t.name == name)
            .cloned()
            .ok_or_else(|| TablekitError::UnknownTable(name.to_string()))
    }

    /// Table names in reflection order, internal tables hidden
    pub fn list_tables(&self, conn: &Connection) -> Result<Vec<String>> {
        self.loaded(conn)?;
        Ok(self.cached_table_names())
    }

    /// Table names already in the cache. Never touches the backend, so it
    /// is empty before the first load.
    pub fn cached_table_names(&self) -> Vec<String> {
        self.tables
            .get()
            .map(|tables| {
                tables
                    .read()
                    .unwrap_or_else(|e| e.into_inner())
                    .iter()
                    .map(|t| t.name.clone())
                    .filter(|n| is_public_name(n))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Adds a table to a loaded cache, replacing any entry with the same
    /// name. Returns false (and does nothing) when the cache is not loaded
    /// yet, since the first load will reflect the table anyway.
    pub fn merge(&self, schema: TableSchema) -> bool {
        let Some(tables) = self.tables.get() else {
            return false;
        };
        let mut guard = tables.write().unwrap_or_else(|e| e.into_inner());
        let schema = Arc::new(schema);
        match guard.iter_mut().find(|t| t.name == schema.name) {
            Some(existing) => *existing = schema,
            None => guard.push(schema),
        }
        true
    }

    /// Drops the cached schema. Idempotent.
    pub fn close(&mut self) {
        if self.tables.take().is_some() {
            debug!("Catalog cache released");
        }
    }
}
