//! Entimap Store - table-backed models on a relational database
//!
//! Provides:
//! - A rusqlite-backed [`db::SqliteDatabase`] serving as the raw database
//!   handle and the settings store
//! - DDL generation, schema version hashing and migration for custom tables
//! - The WHERE/HAVING compiler and SELECT assembly
//! - [`repo::CustomTableRepository`], a repository over one custom table

pub mod db;
pub mod errors;
pub mod query;
pub mod repo;
pub mod schema;

// Re-export key types
pub use db::SqliteDatabase;
pub use errors::Result;
pub use query::{Conditions, Glue, TableQuery, Where};
pub use repo::{CustomTableRepository, TableOptions};
pub use schema::{MigrationOutcome, TableDefinition};
