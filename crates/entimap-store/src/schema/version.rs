//! Schema versions
//!
//! A table's version is the SHA256 of its rendered DDL, kept in the option
//! store under `custom_table_<table>_version`.

use sha2::{Digest, Sha256};

/// Compute the version hash of a `CREATE TABLE` statement
pub fn schema_version(ddl: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ddl.as_bytes());
    hex::encode(hasher.finalize())
}

/// Option name holding the installed version of `table` (unprefixed).
pub fn version_option_name(table: &str) -> String {
    format!("custom_table_{table}_version")
}
