//! Entimap Core - entity mapping over a host platform's persistence
//!
//! This crate maps host entities (posts, terms, users, orders, ...) onto
//! typed models, including:
//! - Model schemas with per-field source strategies, hooks and coercion
//! - Lazy per-model value cache with change tracking and read-only fields
//! - Repositories with a single-write save protocol and relation cascade
//! - A manager registry resolving repositories by model kind or name
//! - Identity storage keyed by lookup, with aliases
//! - A default catalog of entity models and their repositories
//!
//! Custom table repositories live in `entimap-store`.

pub mod catalog;
pub mod coerce;
pub mod errors;
pub mod host;
pub mod logging_facility;
pub mod manager;
pub mod model;
pub mod repository;
pub mod schema;
pub mod source;
pub mod storage;
pub mod value;

// Re-export commonly used types
pub use errors::{EntimapError, ExError, ExErrorKind, Result};
pub use host::{Host, Lookup, RecordRef};
pub use manager::Manager;
pub use model::{Model, Snapshot};
pub use repository::{EntityConfig, EntityRepository, FindArgs, MetaBinding, Repository};
pub use schema::{ColumnDescriptor, ColumnType, FieldDescriptor, FieldType, ModelKind, ModelSchema};
pub use source::{Relation, Source};
pub use value::Value;
