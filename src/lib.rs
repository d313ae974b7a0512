//! Runtime schema reflection and dynamic CRUD tables for SQLite.
//!
//! A [`Database`] reflects its schema once, on first use, and hands out
//! [`DbTable`] handles that generate parameterized SQL from the cached
//! metadata.

// Core infrastructure modules
pub mod core;

// Feature-specific modules
pub mod config;
pub mod database;
pub mod row;
pub mod sql;
pub mod table;

#[cfg(test)]
mod test_utils;

pub use crate::core::db::{Catalog, Column, ColumnType, Connection, CursorResult, Params, TableSchema};
pub use crate::core::{Field, Result, TablekitError, Value};
pub use database::Database;
pub use row::{Record, Row, RowShape};
pub use table::DbTable;
