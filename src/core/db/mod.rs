/// Database Module
///
/// The backend-facing layer of tablekit, organized into focused submodules.
///
/// ## Architecture
///
/// - **Connection Management** (`connection.rs`): owns the SQLite handle and executes statements
/// - **Schema Reflection** (`schema.rs`): discovers and caches table metadata
/// - **Query Execution** (`query.rs`): parameter binding and the row cursor adapter
///
/// ## Error Handling
///
/// Every backend failure is surfaced as `TablekitError::Backend` with the
/// attempted operation and table attached.
pub mod connection;
pub mod query;
pub mod schema;

pub use connection::*;
pub use query::*;
pub use schema::*;
