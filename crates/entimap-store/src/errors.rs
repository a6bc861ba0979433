//! Error handling for entimap-store
//!
//! Store operations share the core error type. This module holds the
//! helpers that translate driver failures into it.

use entimap_core::errors::EntimapError;
use entimap_core::host::{Database, HostError};

/// Result type alias using EntimapError
pub type Result<T> = std::result::Result<T, EntimapError>;

/// Create a host error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> HostError {
    let code = match &err {
        rusqlite::Error::SqliteFailure(failure, _) => format!("sqlite_{:?}", failure.code),
        _ => "sqlite".to_string(),
    };
    HostError::new(code.to_lowercase(), err.to_string())
}

/// Create an SQL error from a failed raw database call.
///
/// Prefers the handle's `last_error` text, which carries the driver message
/// for the statement that failed.
pub fn sql_failure(db: &dyn Database, err: HostError) -> EntimapError {
    let last_error = db.last_error();
    if last_error.is_empty() {
        EntimapError::sql(err.message)
    } else {
        EntimapError::sql(last_error)
    }
}

/// Create a migration error
pub fn migration_error(table: &str, reason: &str) -> EntimapError {
    EntimapError::sql(format!("Migration of table {} failed: {}", table, reason))
}

/// Create a persistence error for a failed row write
pub fn write_error(table: &str, err: HostError) -> EntimapError {
    EntimapError::CouldNotPersist {
        model: table.to_string(),
        detail: err.to_string(),
    }
}
