//! Custom table schemas: DDL, versions and migration.

mod ddl;
mod migrate;
mod version;

pub use ddl::{TableColumn, TableDefinition};
pub use migrate::{migrate, MigrationOutcome};
pub use version::{schema_version, version_option_name};
