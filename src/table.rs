//! Dynamic CRUD handle over one reflected table.

use crate::core::db::query::Params;
use crate::core::db::schema::{Column, TableSchema};
use crate::core::db::Connection;
use crate::core::{Field, Result, TablekitError, Value};
use crate::row::{Record, Row};
use crate::sql::{self, SqlStatement};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A stateless handle generating and running SQL for one table.
///
/// Holds the reflected schema and a borrowed connection; cheap to create,
/// so callers can make one per use.
#[derive(Debug, Clone)]
pub struct DbTable<'conn> {
    schema: Arc<TableSchema>,
    conn: &'conn Connection,
}

impl<'conn> DbTable<'conn> {
    pub fn new(schema: Arc<TableSchema>, conn: &'conn Connection) -> Self {
        DbTable { schema, conn }
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Column metadata by exact name
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.schema.column(name)
    }

    /// Enumerable column names in declaration order
    pub fn column_names(&self) -> Vec<&str> {
        self.schema.column_names()
    }

    fn run(&self, stmt: SqlStatement, operation: &str) -> Result<Vec<Row>> {
        debug!(table = self.name(), operation, sql = %stmt.sql, "Running table statement");
        let mut cursor =
            self.conn
                .execute_on(&stmt.sql, Params::Positional(stmt.params), operation, self.name())?;
        let columns = cursor.columns().to_vec();
        let mut rows = Vec::new();
        for values in cursor.tuples() {
            let values = values.map_err(|e| with_table(e, operation, self.name()))?;
            rows.push(self.typed_row(&columns, values));
        }
        Ok(rows)
    }

    fn run_changes(&self, stmt: SqlStatement, operation: &str) -> Result<usize> {
        debug!(table = self.name(), operation, sql = %stmt.sql, "Running table statement");
        let cursor =
            self.conn
                .execute_on(&stmt.sql, Params::Positional(stmt.params), operation, self.name())?;
        Ok(cursor.rowcount())
    }

    /// Re-decodes raw values through the reflected column types
    fn typed_row(&self, columns: &[String], values: Vec<Value>) -> Row {
        Row::new(
            columns
                .iter()
                .cloned()
                .zip(values)
                .map(|(name, value)| {
                    let value = match self.schema.column(&name) {
                        Ok(column) => value.into_column_type(column.column_type),
                        Err(_) => value,
                    };
                    (name, value)
                })
                .collect(),
        )
    }

    /// Fetches the row with the given primary-key values, in key declaration order.
    ///
    /// # Errors
    ///
    /// `NoPrimaryKey` or `PrimaryKeyArity` before any backend call;
    /// `Backend` if the query fails.
    pub fn get(&self, pk: &[Value]) -> Result<Option<Row>> {
        let stmt = sql::select_by_pk(&self.schema, pk)?;
        Ok(self.run(stmt, "get")?.into_iter().next())
    }

    /// Whether a row with the given primary key exists, without fetching it.
    pub fn exists(&self, pk: &[Value]) -> Result<bool> {
        let stmt = sql::exists_by_pk(&self.schema, pk)?;
        debug!(table = self.name(), sql = %stmt.sql, "Running table statement");
        let mut cursor = self.conn.execute_on(
            &stmt.sql,
            Params::Positional(stmt.params),
            "exists",
            self.name(),
        )?;
        let found = cursor
            .tuples()
            .next()
            .transpose()
            .map_err(|e| with_table(e, "exists", self.name()))?
            .is_some();
        Ok(found)
    }

    /// Callable shorthand: primary-key values given by column name, in any order.
    ///
    /// # Errors
    ///
    /// `UnknownColumn` if a name is not a primary-key column,
    /// `PrimaryKeyArity` if a key column is missing.
    pub fn lookup(&self, keys: &[(&str, Value)]) -> Result<Option<Row>> {
        let pk_columns = self.schema.primary_key();
        if pk_columns.is_empty() {
            return Err(TablekitError::NoPrimaryKey(self.name().to_string()));
        }
        if let Some((name, _)) = keys
            .iter()
            .find(|(name, _)| !pk_columns.iter().any(|c| c.name == *name))
        {
            return Err(TablekitError::UnknownColumn {
                table: self.name().to_string(),
                column: name.to_string(),
            });
        }
        let ordered: Vec<Value> = pk_columns
            .iter()
            .filter_map(|c| keys.iter().find(|(name, _)| *name == c.name).map(|(_, v)| v.clone()))
            .collect();
        if ordered.len() != pk_columns.len() || keys.len() != pk_columns.len() {
            return Err(TablekitError::PrimaryKeyArity {
                table: self.name().to_string(),
                expected: pk_columns.len(),
                got: keys.len(),
            });
        }
        self.get(&ordered)
    }

    /// Every row of the table
    pub fn all(&self) -> Result<Vec<Row>> {
        self.run(sql::select_all(&self.schema), "all")
    }

    /// Inserts the supplied fields of `record`.
    ///
    /// When the table's key is a rowid alias the record left unset or NULL,
    /// SQLite generates the key and the stored row is re-read through it so
    /// defaults show up. Otherwise the supplied columns are returned as given.
    pub fn insert(&self, record: &Record) -> Result<Row> {
        let stmt = sql::insert(&self.schema, record)?;
        let supplied = Row::new(
            self.schema
                .columns()
                .iter()
                .filter_map(|c| record.get(&c.name).bound_value().map(|v| (c.name.clone(), v)))
                .collect(),
        );
        self.run_changes(stmt, "insert")?;

        if let Some(key) = self.schema.rowid_alias() {
            if matches!(
                record.get(&key.name),
                Field::Unset | Field::Null | Field::Value(Value::Null)
            ) {
                let rowid = self.conn.last_insert_rowid();
                debug!(table = self.name(), rowid, "Re-reading inserted row");
                if let Some(row) = self.get(&[Value::Integer(rowid)])? {
                    return Ok(row);
                }
            }
        }
        Ok(supplied)
    }

    /// Writes the supplied fields of `record` to the row with this primary key.
    /// Returns the number of rows changed.
    pub fn update(&self, record: &Record, pk: &[Value]) -> Result<usize> {
        match sql::update(&self.schema, record, pk)? {
            Some(stmt) => self.run_changes(stmt, "update"),
            None => Ok(0),
        }
    }

    /// Deletes the row with this primary key. Deleting a missing row is not
    /// an error; the returned count is 0.
    pub fn delete(&self, pk: &[Value]) -> Result<usize> {
        let stmt = sql::delete(&self.schema, pk)?;
        self.run_changes(stmt, "delete")
    }
}

fn with_table(err: TablekitError, operation: &str, table: &str) -> TablekitError {
    match err {
        TablekitError::Backend { source, .. } => TablekitError::backend(operation, table)(source),
        other => other,
    }
}

impl fmt::Display for DbTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<DbTable {} ({})>", self.name(), self.column_names().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::Catalog;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn setup() -> (Connection, Catalog) {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE Artist (
                ArtistId INTEGER PRIMARY KEY,
                Name NVARCHAR(120)
            );
            CREATE TABLE Invoice (
                InvoiceId INTEGER PRIMARY KEY,
                InvoiceDate DATETIME NOT NULL,
                Total NUMERIC(10,2) NOT NULL,
                Status TEXT DEFAULT 'open'
            );
            CREATE TABLE PlaylistTrack (
                PlaylistId INTEGER NOT NULL,
                TrackId INTEGER NOT NULL,
                Position INTEGER,
                PRIMARY KEY (PlaylistId, TrackId)
            );
            CREATE TABLE Log (Message TEXT);
        ",
        )
        .unwrap();
        (conn, Catalog::new())
    }

    fn table<'c>(conn: &'c Connection, catalog: &Catalog, name: &str) -> DbTable<'c> {
        DbTable::new(catalog.get_table(conn, name).unwrap(), conn)
    }

    #[test]
    fn test_artist_lifecycle() {
        let (conn, catalog) = setup();
        let artists = table(&conn, &catalog, "Artist");

        let row = artists.insert(&Record::new().set("Name", "Queen")).unwrap();
        let id = row.get("ArtistId").cloned().unwrap();
        assert_eq!(id, Value::Integer(1));
        assert_eq!(row.get("Name"), Some(&Value::from("Queen")));

        let fetched = artists.get(&[id.clone()]).unwrap().unwrap();
        assert_eq!(fetched, row);
        assert!(artists.exists(&[id.clone()]).unwrap());

        assert_eq!(artists.delete(&[id.clone()]).unwrap(), 1);
        assert!(!artists.exists(&[id.clone()]).unwrap());
        assert_eq!(artists.get(&[id.clone()]).unwrap(), None);
        // deleting again is not an error
        assert_eq!(artists.delete(&[id]).unwrap(), 0);
    }

    #[test]
    fn test_insert_rereads_defaults() {
        let (conn, catalog) = setup();
        let invoices = table(&conn, &catalog, "Invoice");
        let date = NaiveDate::from_ymd_opt(2009, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();

        let row = invoices
            .insert(
                &Record::new()
                    .set("Total", Decimal::from_str("1.98").unwrap())
                    .set("InvoiceDate", date),
            )
            .unwrap();
        assert_eq!(row.get("Status"), Some(&Value::from("open")));
        assert_eq!(row.get("InvoiceDate"), Some(&Value::Timestamp(date)));
        assert_eq!(
            row.get("Total"),
            Some(&Value::Decimal(Decimal::from_str("1.98").unwrap()))
        );
    }

    #[test]
    fn test_insert_with_null_key_rereads_generated_key() {
        let (conn, catalog) = setup();
        let artists = table(&conn, &catalog, "Artist");

        let row = artists
            .insert(&Record::new().null("ArtistId").set("Name", "Queen"))
            .unwrap();
        assert_eq!(row.get("ArtistId"), Some(&Value::Integer(1)));

        let row = artists
            .insert(&Record::new().set("ArtistId", Value::Null).set("Name", "Muse"))
            .unwrap();
        assert_eq!(row.get("ArtistId"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_keyword_column_names_are_quoted() {
        let (conn, catalog) = setup();
        conn.execute_batch(
            "CREATE TABLE \"Order\" (Id INTEGER PRIMARY KEY, \"Commit\" TEXT, \"Filter\" TEXT)",
        )
        .unwrap();
        let orders = table(&conn, &catalog, "Order");

        let row = orders.insert(&Record::new().set("Commit", "abc")).unwrap();
        assert_eq!(row.get("Commit"), Some(&Value::from("abc")));
        assert_eq!(row.get("Filter"), Some(&Value::Null));
        orders
            .update(&Record::new().set("Filter", "x"), &[Value::Integer(1)])
            .unwrap();
        assert!(orders
            .lookup(&[("Id", Value::Integer(1))])
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_insert_with_explicit_key_returns_supplied() {
        let (conn, catalog) = setup();
        let tracks = table(&conn, &catalog, "PlaylistTrack");

        let row = tracks
            .insert(&Record::new().set("TrackId", 9).set("PlaylistId", 1))
            .unwrap();
        assert_eq!(
            row.into_tuple(),
            vec![Value::Integer(1), Value::Integer(9)]
        );
        assert!(tracks.exists(&[Value::Integer(1), Value::Integer(9)]).unwrap());
    }

    #[test]
    fn test_update_only_touches_supplied_columns() {
        let (conn, catalog) = setup();
        let tracks = table(&conn, &catalog, "PlaylistTrack");
        tracks
            .insert(&Record::new().set("PlaylistId", 1).set("TrackId", 2).set("Position", 5))
            .unwrap();

        let mut record = Record::new().set("Position", 6);
        record.assign("TrackId", Field::Unset);
        let changed = tracks
            .update(&record, &[Value::Integer(1), Value::Integer(2)])
            .unwrap();
        assert_eq!(changed, 1);

        let row = tracks
            .get(&[Value::Integer(1), Value::Integer(2)])
            .unwrap()
            .unwrap();
        assert_eq!(row.get("Position"), Some(&Value::Integer(6)));
        assert_eq!(row.get("TrackId"), Some(&Value::Integer(2)));

        assert_eq!(
            tracks
                .update(&Record::new(), &[Value::Integer(1), Value::Integer(2)])
                .unwrap(),
            0
        );
    }

    #[test]
    fn test_primary_key_errors() {
        let (conn, catalog) = setup();
        let tracks = table(&conn, &catalog, "PlaylistTrack");
        assert!(matches!(
            tracks.get(&[Value::Integer(1)]),
            Err(TablekitError::PrimaryKeyArity { expected: 2, got: 1, .. })
        ));
        assert!(matches!(
            tracks.update(&Record::new().set("Position", 1), &[]),
            Err(TablekitError::PrimaryKeyArity { .. })
        ));

        let log = table(&conn, &catalog, "Log");
        assert!(matches!(log.exists(&[]), Err(TablekitError::NoPrimaryKey(_))));
        assert!(matches!(log.delete(&[Value::Integer(1)]), Err(TablekitError::NoPrimaryKey(_))));
    }

    #[test]
    fn test_lookup_by_name() {
        let (conn, catalog) = setup();
        let tracks = table(&conn, &catalog, "PlaylistTrack");
        tracks
            .insert(&Record::new().set("PlaylistId", 3).set("TrackId", 4))
            .unwrap();

        let row = tracks
            .lookup(&[("TrackId", Value::Integer(4)), ("PlaylistId", Value::Integer(3))])
            .unwrap();
        assert!(row.is_some());

        assert!(matches!(
            tracks.lookup(&[("Position", Value::Integer(1))]),
            Err(TablekitError::UnknownColumn { column, .. }) if column == "Position"
        ));
        assert!(matches!(
            tracks.lookup(&[("TrackId", Value::Integer(4))]),
            Err(TablekitError::PrimaryKeyArity { .. })
        ));
    }

    #[test]
    fn test_backend_errors_carry_table() {
        let (conn, catalog) = setup();
        let invoices = table(&conn, &catalog, "Invoice");
        let err = invoices.insert(&Record::new().set("Total", 1)).unwrap_err();
        match err {
            TablekitError::Backend { operation, table, .. } => {
                assert_eq!(operation, "insert");
                assert_eq!(table, "Invoice");
            }
            other => panic!("Expected Backend error, got {:?}", other),
        }
    }

    #[test]
    fn test_display_and_columns() {
        let (conn, catalog) = setup();
        let artists = table(&conn, &catalog, "Artist");
        assert_eq!(artists.to_string(), "<DbTable Artist (ArtistId, Name)>");
        assert_eq!(artists.column("Name").unwrap().declared_type, "NVARCHAR(120)");
        assert!(artists.column("Title").is_err());
    }
}
