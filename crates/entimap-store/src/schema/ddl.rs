//! Table definitions and DDL rendering
//!
//! MySQL output follows the dbDelta layout (one clause per line, two spaces
//! after `PRIMARY KEY`). SQLite output uses type affinities and inline
//! primary keys.

use crate::errors::Result;
use crate::query::{escape_string, sql_literal};
use entimap_core::errors::EntimapError;
use entimap_core::host::Dialect;
use entimap_core::schema::{
    ColumnDescriptor, ColumnParams, ColumnType, FieldDescriptor, ForeignKey, ModelSchema,
};
use entimap_core::value::Value;

/// A column with every inferred attribute filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct TableColumn {
    /// Model field backed by the column
    pub field: String,
    pub name: String,
    pub sql_type: ColumnType,
    pub params: Option<ColumnParams>,
    pub unsigned: bool,
    pub nullable: bool,
    pub auto_increment: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub foreign_key: Option<ForeignKey>,
    pub default: Value,
}

impl TableColumn {
    fn new(field: &FieldDescriptor, column: &ColumnDescriptor) -> Self {
        let field_type = field.field_type();
        Self {
            field: field.name().to_string(),
            name: column.column_name(field.name()).to_string(),
            sql_type: column.resolved_type(field_type),
            params: column.resolved_params(field_type),
            unsigned: column.unsigned,
            nullable: column.nullable,
            auto_increment: column.auto_increment,
            primary_key: column.primary_key,
            unique: column.unique,
            foreign_key: column.foreign_key.clone(),
            default: field.default_value().clone(),
        }
    }

    pub fn is_json(&self) -> bool {
        self.sql_type == ColumnType::Json
    }

    fn sqlite_affinity(&self) -> &'static str {
        match self.sql_type {
            t if t.is_integer() => "INTEGER",
            ColumnType::Decimal => "REAL",
            ColumnType::Blob => "BLOB",
            _ => "TEXT",
        }
    }

    /// Literal used as the SQLite column default for NOT NULL columns.
    fn sqlite_default(&self) -> String {
        let value = match &self.default {
            Value::Null => match self.sql_type {
                t if t.is_integer() => Value::Int(0),
                ColumnType::Decimal => Value::Int(0),
                _ => Value::String(String::new()),
            },
            Value::Bool(b) => Value::Int(i64::from(*b)),
            Value::Array(_) | Value::Object(_) => Value::String(self.default.to_json().to_string()),
            other => other.clone(),
        };
        sql_literal(&value, Dialect::Sqlite)
    }
}

/// The columns of one custom table, validated to carry exactly one
/// primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    table: String,
    prefix: String,
    columns: Vec<TableColumn>,
    primary: usize,
}

impl TableDefinition {
    /// `table` is the final table name; `prefix` is prepended to tables
    /// referenced by foreign keys.
    ///
    /// # Errors
    ///
    /// `PrimaryKey` unless exactly one column is flagged as primary key.
    pub fn from_schema(schema: &ModelSchema, table: &str, prefix: &str) -> Result<Self> {
        let columns: Vec<TableColumn> = schema
            .columns()
            .into_iter()
            .map(|(field, column)| TableColumn::new(field, column))
            .collect();
        let primaries: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, column)| column.primary_key)
            .map(|(i, _)| i)
            .collect();
        let &[primary] = primaries.as_slice() else {
            return Err(EntimapError::PrimaryKey {
                model: schema.kind().to_string(),
                found: primaries.len(),
            });
        };
        Ok(Self {
            table: table.to_string(),
            prefix: prefix.to_string(),
            columns,
            primary,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    pub fn primary_key(&self) -> &TableColumn {
        &self.columns[self.primary]
    }

    /// Column by column name.
    pub fn column(&self, name: &str) -> Option<&TableColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// One column clause, e.g. `total decimal(65,10) UNSIGNED NOT NULL`.
    pub fn column_sql(&self, column: &TableColumn, dialect: Dialect) -> String {
        match dialect {
            Dialect::MySql => {
                let mut sql = format!("{} {}", column.name, column.sql_type.sql_name());
                if let Some(params) = &column.params {
                    sql.push_str(&render_params(params));
                }
                if column.unsigned {
                    sql.push_str(" UNSIGNED");
                }
                sql.push_str(if column.nullable { " NULL" } else { " NOT NULL" });
                if column.auto_increment {
                    sql.push_str(" AUTO_INCREMENT");
                }
                sql
            }
            Dialect::Sqlite => {
                let mut sql = format!(
                    "{} {}",
                    dialect.quote_identifier(&column.name),
                    column.sqlite_affinity()
                );
                if column.primary_key {
                    sql.push_str(" PRIMARY KEY");
                    if column.auto_increment && column.sql_type.is_integer() {
                        sql.push_str(" AUTOINCREMENT");
                    }
                } else if !column.nullable {
                    sql.push_str(" NOT NULL DEFAULT ");
                    sql.push_str(&column.sqlite_default());
                }
                sql
            }
        }
    }

    /// The `CREATE TABLE` statement. Rendering is deterministic, so the
    /// text doubles as the input of the schema version hash.
    pub fn create_table_sql(&self, dialect: Dialect, charset_collate: &str) -> String {
        let mut clauses: Vec<String> = self
            .columns
            .iter()
            .map(|column| self.column_sql(column, dialect))
            .collect();

        for column in self.columns.iter().filter(|c| c.unique) {
            clauses.push(match dialect {
                Dialect::MySql => format!("UNIQUE KEY ({})", column.name),
                Dialect::Sqlite => format!("UNIQUE ({})", dialect.quote_identifier(&column.name)),
            });
        }

        let foreign_keys = self.columns.iter().filter_map(|column| {
            column
                .foreign_key
                .as_ref()
                .filter(|fk| !fk.table.is_empty() && !fk.column.is_empty())
                .map(|fk| (column, fk))
        });
        for (n, (column, fk)) in foreign_keys.enumerate() {
            let quote = |name: &str| dialect.quote_identifier(name);
            let clause = format!(
                "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) {}",
                quote(&format!("{}_ibfk_{}", self.table, n + 1)),
                quote(&column.name),
                quote(&format!("{}{}", self.prefix, fk.table)),
                quote(&fk.column),
                fk.settings
            );
            clauses.push(clause.trim_end().to_string());
        }

        match dialect {
            Dialect::MySql => {
                clauses.push(format!("PRIMARY KEY  ({})", self.primary_key().name));
                let tail = if charset_collate.is_empty() {
                    String::new()
                } else {
                    format!(" {charset_collate}")
                };
                format!(
                    "CREATE TABLE {} (\n\t{}\n){};",
                    self.table,
                    clauses.join(",\n\t"),
                    tail
                )
            }
            Dialect::Sqlite => format!(
                "CREATE TABLE {} (\n\t{}\n);",
                dialect.quote_identifier(&self.table),
                clauses.join(",\n\t")
            ),
        }
    }

    /// Statements adding `column` to an existing table.
    pub fn add_column_sql(&self, column: &TableColumn, dialect: Dialect) -> Vec<String> {
        let table = match dialect {
            Dialect::MySql => self.table.clone(),
            Dialect::Sqlite => dialect.quote_identifier(&self.table),
        };
        let mut statements = vec![format!(
            "ALTER TABLE {} ADD COLUMN {}",
            table,
            self.column_sql(column, dialect)
        )];
        if column.unique {
            statements.push(match dialect {
                Dialect::MySql => format!("ALTER TABLE {} ADD UNIQUE KEY ({})", table, column.name),
                Dialect::Sqlite => format!(
                    "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({})",
                    dialect.quote_identifier(&format!("{}_{}_unique", self.table, column.name)),
                    table,
                    dialect.quote_identifier(&column.name)
                ),
            });
        }
        statements
    }
}

fn render_params(params: &ColumnParams) -> String {
    match params {
        ColumnParams::Size(size) => format!("({size})"),
        ColumnParams::Precision(precision, scale) => format!("({precision},{scale})"),
        ColumnParams::Values(values) => {
            let quoted: Vec<String> = values
                .iter()
                .map(|v| format!("'{}'", escape_string(v, Dialect::MySql)))
                .collect();
            format!("({})", quoted.join(","))
        }
    }
}
