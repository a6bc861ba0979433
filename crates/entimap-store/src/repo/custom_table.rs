//! Repository over a custom database table
//!
//! Each column-backed field of the model maps onto one column. The table is
//! created or extended on first use when `auto_migrate` is on, and every
//! query goes through the condition compiler.

use crate::errors::{sql_failure, write_error, Result};
use crate::query::{render_count, render_select, Conditions, TableQuery, Where};
use crate::schema::{
    migrate as migrate_table, schema_version, version_option_name, MigrationOutcome,
    TableColumn, TableDefinition,
};
use entimap_core::host::{Database, HostResult, Lookup, OptionStore, Payload, Record, RecordRef};
use entimap_core::repository::{save_model, FindArgs, RecordWriter, Repository, RepositoryContext};
use entimap_core::schema::{ModelKind, ModelSchema};
use entimap_core::value::Value;
use entimap_core::{log_op, Model};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Table behaviour switches. Every flag defaults to `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableOptions {
    /// Migrate before the first read or write
    pub auto_migrate: bool,
    /// Prepend the database prefix to the table name
    pub use_prefix: bool,
    /// Reload the row into the model after a save
    pub refresh_after_save: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            auto_migrate: true,
            use_prefix: true,
            refresh_after_save: true,
        }
    }
}

pub struct CustomTableRepository {
    context: RepositoryContext,
    schema: Rc<ModelSchema>,
    table: String,
    options: TableOptions,
    db: Rc<dyn Database>,
    settings: Rc<dyn OptionStore>,
    definition: TableDefinition,
    create_sql: String,
    version: String,
    migrated: Cell<bool>,
}

impl CustomTableRepository {
    /// `table` is the bare table name; the database prefix is added when
    /// `use_prefix` is set.
    ///
    /// # Errors
    ///
    /// `PrimaryKey` unless the schema declares exactly one primary key column.
    pub fn new(
        schema: Rc<ModelSchema>,
        table: &str,
        db: Rc<dyn Database>,
        settings: Rc<dyn OptionStore>,
        options: TableOptions,
    ) -> Result<Self> {
        let prefixed = if options.use_prefix {
            format!("{}{}", db.prefix(), table)
        } else {
            table.to_string()
        };
        let definition = TableDefinition::from_schema(&schema, &prefixed, db.prefix())?;
        let create_sql = definition.create_table_sql(db.dialect(), &db.charset_collate());
        let version = schema_version(&create_sql);
        Ok(Self {
            context: RepositoryContext::new(),
            schema,
            table: table.to_string(),
            options,
            db,
            settings,
            definition,
            create_sql,
            version,
            migrated: Cell::new(false),
        })
    }

    /// Table name without the database prefix
    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn prefixed_table_name(&self) -> &str {
        self.definition.table()
    }

    pub fn definition(&self) -> &TableDefinition {
        &self.definition
    }

    pub fn options(&self) -> TableOptions {
        self.options
    }

    pub fn create_table_sql(&self) -> &str {
        &self.create_sql
    }

    /// Version of the current schema
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Version recorded by the last successful migration
    pub fn installed_version(&self) -> Option<String> {
        self.settings
            .get_option(&version_option_name(&self.table))
            .filter(|version| !version.is_empty())
    }

    fn primary_column(&self) -> &TableColumn {
        self.definition.primary_key()
    }

    /// Create or extend the table unless this repository already did, or
    /// the installed version matches.
    ///
    /// # Errors
    ///
    /// `Sql` when a DDL statement fails.
    pub fn migrate(&self) -> Result<MigrationOutcome> {
        if self.migrated.get() {
            return Ok(MigrationOutcome::UpToDate);
        }
        let outcome = log_op!(
            "table_migrate",
            migrate_table(
                &*self.db,
                &*self.settings,
                &self.definition,
                &version_option_name(&self.table),
            ),
            table = self.prefixed_table_name(),
            schema_version = self.version.as_str()
        )?;
        self.migrated.set(true);
        Ok(outcome)
    }

    fn auto_migrate(&self) -> Result<()> {
        if self.options.auto_migrate {
            self.migrate()?;
        }
        Ok(())
    }

    /// Drop the table and forget its installed version, so the next
    /// migration recreates it.
    ///
    /// # Errors
    ///
    /// `Sql` when the statement fails.
    pub fn drop_table(&self) -> Result<bool> {
        let sql = format!(
            "DROP TABLE IF EXISTS {}",
            self.db.dialect().quote_identifier(self.prefixed_table_name())
        );
        self.db
            .query(&sql)
            .map_err(|err| sql_failure(&*self.db, err))?;
        self.settings
            .update_option(&version_option_name(&self.table), "");
        self.migrated.set(false);
        self.context.flush_storage();
        tracing::debug!(table = self.prefixed_table_name(), "table dropped");
        Ok(true)
    }

    fn rows(&self, query: &TableQuery) -> Result<Vec<RecordRef>> {
        self.auto_migrate()?;
        let sql = render_select(
            self.prefixed_table_name(),
            &self.definition.column_names(),
            query,
            self.db.dialect(),
        )?;
        tracing::debug!(table = self.prefixed_table_name(), sql = %sql, "select");
        let rows = self
            .db
            .get_results(&sql)
            .map_err(|err| sql_failure(&*self.db, err))?;
        Ok(rows.into_iter().map(Record::into_ref).collect())
    }

    /// The row whose primary key equals `key`.
    ///
    /// # Errors
    ///
    /// `Sql` when the query fails.
    pub fn query_single(&self, key: &Value) -> Result<Option<RecordRef>> {
        if key.is_empty() {
            return Ok(None);
        }
        let conditions =
            Conditions::new().compare(&self.primary_column().name, "=", key.clone());
        let query = TableQuery::new().filter(conditions).limit(1);
        Ok(self.rows(&query)?.into_iter().next())
    }

    /// Run an arbitrary table query and hydrate the rows.
    ///
    /// # Errors
    ///
    /// `Sql` for compilation or driver failures.
    pub fn select(&self, query: &TableQuery) -> Result<Vec<Model>> {
        let manager = self.manager()?;
        self.rows(query)?
            .into_iter()
            .map(|record| {
                let mut model = Model::new(self.schema(), manager.clone(), Some(record));
                self.remember(&mut model)?;
                Ok(model)
            })
            .collect()
    }

    /// Number of rows matching `where_clause`.
    ///
    /// # Errors
    ///
    /// `Sql` for compilation or driver failures.
    pub fn count(&self, where_clause: Option<Where>) -> Result<usize> {
        self.auto_migrate()?;
        let query = TableQuery {
            where_clause,
            ..TableQuery::default()
        };
        let sql = render_count(self.prefixed_table_name(), &query, self.db.dialect())?;
        let rows = self
            .db
            .get_results(&sql)
            .map_err(|err| sql_failure(&*self.db, err))?;
        let total = rows
            .first()
            .and_then(|row| row.value("total"))
            .and_then(Value::as_int)
            .unwrap_or_default();
        Ok(usize::try_from(total).unwrap_or_default())
    }

    fn table_query(&self, args: &FindArgs) -> TableQuery {
        let mut conditions = Conditions::new();
        for (key, value) in &args.filters {
            conditions = conditions.with(key, value.clone());
        }
        if let Some(ids) = &args.include {
            conditions = conditions.compare(
                &self.primary_column().name,
                "IN",
                Value::Array(ids.clone()),
            );
        }
        let offset = args.effective_offset();
        TableQuery {
            where_clause: (!conditions.is_empty()).then(|| conditions.into()),
            order_by: args.order_by.clone(),
            limit: args.limit,
            offset: (offset > 0).then_some(offset),
            ..TableQuery::default()
        }
    }

    fn remember(&self, model: &mut Model) -> Result<()> {
        let key = model.get(self.primary_key_field())?;
        if !key.is_empty() {
            self.context
                .remember(&Lookup::Id(key).cache_key(), model.snapshot(), &[]);
        }
        Ok(())
    }

    /// Column value as stored: JSON columns hold encoded text.
    fn encode(column: &TableColumn, value: &Value) -> Value {
        match value {
            Value::Null if column.nullable => Value::Null,
            value if column.is_json() => Value::String(value.to_json().to_string()),
            value => value.clone(),
        }
    }
}

impl Repository for CustomTableRepository {
    fn kind(&self) -> ModelKind {
        self.schema.kind()
    }

    fn schema(&self) -> Rc<ModelSchema> {
        Rc::clone(&self.schema)
    }

    fn context(&self) -> &RepositoryContext {
        &self.context
    }

    fn primary_key_field(&self) -> &str {
        &self.primary_column().field
    }

    /// Ids and slugs both look up the primary key column; `By` looks up
    /// the field's column.
    fn get(&self, lookup: Lookup) -> Result<Option<Model>> {
        if lookup.is_empty() {
            return Ok(None);
        }
        let manager = self.manager()?;
        if let Some(snapshot) = self.context.cached(&lookup.cache_key()) {
            return Ok(Some(Model::from_snapshot(snapshot, manager)));
        }
        let record = match lookup {
            Lookup::Id(key) => self.query_single(&key)?,
            Lookup::Slug(key) => self.query_single(&Value::String(key))?,
            Lookup::By { field, value } => {
                let column = self.schema.target_name(&field).to_string();
                let query = TableQuery::new()
                    .filter(Conditions::new().compare(&column, "=", value))
                    .limit(1);
                self.rows(&query)?.into_iter().next()
            }
        };
        let Some(record) = record else {
            return Ok(None);
        };
        let mut model = Model::new(self.schema(), manager, Some(record));
        self.remember(&mut model)?;
        Ok(Some(model))
    }

    fn save(&self, model: &mut Model) -> Result<()> {
        let key = log_op!(
            "repository_save",
            self.auto_migrate()
                .and_then(|()| save_model(self, self, model, self.options.refresh_after_save)),
            repository = self.name(),
            table = self.prefixed_table_name()
        )?;
        self.context.forget(&Lookup::Id(key).cache_key());
        Ok(())
    }

    fn delete(&self, model: &mut Model) -> Result<bool> {
        let key = model.get(self.primary_key_field())?;
        if key.is_empty() {
            return Ok(false);
        }
        let mut conditions = BTreeMap::new();
        conditions.insert(self.primary_column().name.clone(), key.clone());
        let deleted = log_op!(
            "repository_delete",
            self.auto_migrate().and_then(|()| {
                self.db
                    .delete(self.prefixed_table_name(), &conditions)
                    .map_err(|err| write_error(self.prefixed_table_name(), err))
            }),
            repository = self.name(),
            table = self.prefixed_table_name()
        )?;
        self.context.forget(&Lookup::Id(key).cache_key());
        Ok(deleted > 0)
    }

    fn find(&self, args: &FindArgs) -> Result<Vec<Model>> {
        if args.include.as_ref().is_some_and(Vec::is_empty) {
            return Ok(Vec::new());
        }
        self.select(&self.table_query(args))
    }
}

impl RecordWriter for CustomTableRepository {
    /// A model is stored when it is bound to a row and has a key.
    fn is_persisted(&self, model: &Model, key: &Value) -> bool {
        model.record().is_some() && !key.is_empty()
    }

    fn write(&self, existing: bool, key: &Value, payload: &Payload) -> HostResult<Value> {
        let primary = self.primary_column();
        let data: BTreeMap<String, Value> = payload
            .fields
            .iter()
            .filter_map(|(name, value)| {
                let column = self.definition.column(name)?;
                Some((name.clone(), Self::encode(column, value)))
            })
            .collect();

        if existing {
            let mut conditions = BTreeMap::new();
            conditions.insert(primary.name.clone(), key.clone());
            if !data.is_empty() {
                self.db
                    .update(self.prefixed_table_name(), &data, &conditions)?;
            }
            return Ok(key.clone());
        }

        let mut data = data;
        if !key.is_empty() {
            data.insert(primary.name.clone(), key.clone());
        }
        self.db.insert(self.prefixed_table_name(), &data)?;
        let insert_id = self.db.insert_id();
        Ok(if primary.auto_increment && insert_id > 0 {
            Value::Int(insert_id)
        } else {
            key.clone()
        })
    }

    fn reload(&self, key: &Value) -> Result<Option<RecordRef>> {
        self.query_single(key)
    }
}
