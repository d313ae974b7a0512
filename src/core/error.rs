/// Tablekit Error Module
///
/// This module defines the error taxonomy for tablekit. Misuse of a table
/// (wrong name, wrong primary-key arity) and backend failures are kept apart
/// so callers can tell them apart without parsing messages.
use thiserror::Error;

/// Error type for every fallible tablekit operation.
///
/// None of these are retried internally. Backend failures always carry the
/// operation and table that triggered them.
#[derive(Error, Debug)]
pub enum TablekitError {
    /// The catalog has no table with this name
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// The table has no column with this name (or the column is not usable here)
    #[error("Unknown column '{column}' on table {table}")]
    UnknownColumn { table: String, column: String },

    /// A primary-key operation was attempted on a table without a primary key
    #[error("Table {0} has no primary key")]
    NoPrimaryKey(String),

    /// The number of primary-key values does not match the table's key
    #[error("Table {table} has {expected} primary key column(s), got {got} value(s)")]
    PrimaryKeyArity {
        table: String,
        expected: usize,
        got: usize,
    },

    /// Any failure surfaced by SQLite (constraint violations, I/O, syntax)
    #[error("Backend error during {operation}{}: {source}", table_suffix(.table))]
    Backend {
        operation: String,
        table: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A value could not be converted to the requested Rust type
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn table_suffix(table: &str) -> String {
    if table.is_empty() {
        String::new()
    } else {
        format!(" on {}", table)
    }
}

impl TablekitError {
    /// Returns a closure wrapping a `rusqlite::Error` with operation context.
    ///
    /// Meant for `map_err`: `stmt.execute(..).map_err(TablekitError::backend("delete", "Artist"))`.
    pub fn backend<'a>(
        operation: &'a str,
        table: &'a str,
    ) -> impl FnOnce(rusqlite::Error) -> TablekitError + 'a {
        move |source| TablekitError::Backend {
            operation: operation.to_string(),
            table: table.to_string(),
            source,
        }
    }
}

/// Type alias for Result to use TablekitError as the error type.
pub type Result<T> = std::result::Result<T, TablekitError>;
