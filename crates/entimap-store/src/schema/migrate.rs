//! Table migration
//!
//! Creates a missing table or adds the columns an existing table lacks, then
//! records the new schema version. Nothing happens while the installed
//! version matches.

use super::ddl::TableDefinition;
use super::version::schema_version;
use crate::errors::{migration_error, sql_failure, Result};
use entimap_core::host::{Database, OptionStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The installed version already matches
    UpToDate,
    Created,
    /// The table existed; `added` lists the new columns
    Altered { added: Vec<String> },
}

/// Bring the table of `definition` up to date.
///
/// # Errors
///
/// `Sql` when a DDL statement fails. The stored version is left untouched
/// so the next run tries again.
pub fn migrate(
    db: &dyn Database,
    options: &dyn OptionStore,
    definition: &TableDefinition,
    option_name: &str,
) -> Result<MigrationOutcome> {
    let dialect = db.dialect();
    let ddl = definition.create_table_sql(dialect, &db.charset_collate());
    let version = schema_version(&ddl);
    let installed = options.get_option(option_name).unwrap_or_default();
    if installed == version {
        tracing::debug!(table = definition.table(), "schema up to date");
        return Ok(MigrationOutcome::UpToDate);
    }

    let existing = db
        .table_columns(definition.table())
        .map_err(|err| sql_failure(db, err))?;
    let outcome = match existing {
        None => {
            db.query(&ddl)
                .map_err(|err| migration_error(definition.table(), &err.message))?;
            MigrationOutcome::Created
        }
        Some(existing) => {
            let mut added = Vec::new();
            for column in definition.columns() {
                if existing.iter().any(|name| name.eq_ignore_ascii_case(&column.name)) {
                    continue;
                }
                for statement in definition.add_column_sql(column, dialect) {
                    db.query(&statement)
                        .map_err(|err| migration_error(definition.table(), &err.message))?;
                }
                added.push(column.name.clone());
            }
            MigrationOutcome::Altered { added }
        }
    };

    if !options.update_option(option_name, &version) {
        tracing::warn!(option = option_name, "schema version not recorded");
    }
    tracing::debug!(
        table = definition.table(),
        schema_version = %version,
        outcome = ?outcome,
        "schema migrated"
    );
    Ok(outcome)
}
