//! Table-backed repositories.

mod custom_table;

pub use custom_table::{CustomTableRepository, TableOptions};
