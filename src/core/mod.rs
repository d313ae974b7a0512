/// Core Module for tablekit
///
/// This module contains the building blocks every higher-level handle is
/// made of: the backend layer, the value model and the error type.

pub mod db;
pub mod error;
pub mod value;

// Re-export commonly used types for convenience
pub use error::{Result, TablekitError};
pub use value::{Field, Value};
