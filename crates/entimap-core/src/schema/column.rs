//! Column metadata for table-backed models.

use super::FieldType;
use crate::errors::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    TinyInt,
    Int,
    BigInt,
    Boolean,
    Decimal,
    Date,
    DateTime,
    Timestamp,
    Time,
    Char,
    Varchar,
    Blob,
    Text,
    Enum,
    Set,
    Json,
}

impl ColumnType {
    /// MySQL type keyword.
    pub fn sql_name(&self) -> &'static str {
        match self {
            ColumnType::TinyInt => "tinyint",
            ColumnType::Int => "int",
            ColumnType::BigInt => "bigint",
            ColumnType::Boolean => "boolean",
            ColumnType::Decimal => "decimal",
            ColumnType::Date => "date",
            ColumnType::DateTime => "datetime",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Time => "time",
            ColumnType::Char => "char",
            ColumnType::Varchar => "varchar",
            ColumnType::Blob => "blob",
            ColumnType::Text => "text",
            ColumnType::Enum => "enum",
            ColumnType::Set => "set",
            ColumnType::Json => "json",
        }
    }

    /// Size parameters used when a column declares none.
    pub fn default_params(&self) -> Option<ColumnParams> {
        match self {
            ColumnType::Varchar => Some(ColumnParams::Size(255)),
            ColumnType::Char => Some(ColumnParams::Size(1)),
            ColumnType::TinyInt => Some(ColumnParams::Size(4)),
            ColumnType::Int => Some(ColumnParams::Size(11)),
            ColumnType::BigInt => Some(ColumnParams::Size(21)),
            ColumnType::Decimal => Some(ColumnParams::Precision(65, 10)),
            _ => None,
        }
    }

    /// Column type for a field that does not declare one.
    pub fn infer(field_type: &FieldType) -> ColumnType {
        match field_type {
            FieldType::Bool => ColumnType::Boolean,
            FieldType::Int => ColumnType::Int,
            FieldType::Float => ColumnType::Decimal,
            FieldType::String => ColumnType::Varchar,
            FieldType::Array | FieldType::Object => ColumnType::Text,
            FieldType::Model(_) => ColumnType::BigInt,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ColumnType::TinyInt | ColumnType::Int | ColumnType::BigInt | ColumnType::Boolean
        )
    }
}

/// Parenthesized type parameters: `(255)`, `(65,10)`, `('a','b')`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnParams {
    Size(u32),
    Precision(u32, u32),
    Values(Vec<String>),
}

/// `FOREIGN KEY (column) REFERENCES table (column) settings`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Referenced table, without the database prefix
    pub table: String,
    pub column: String,
    /// Trailing referential actions, e.g. `ON DELETE CASCADE`
    #[serde(default)]
    pub settings: String,
}

/// Storage attributes of one column.
///
/// Unset `name` falls back to the field name; unset `sql_type` and
/// `params` are inferred from the field type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnDescriptor {
    pub name: Option<String>,
    pub sql_type: Option<ColumnType>,
    pub params: Option<ColumnParams>,
    pub unsigned: bool,
    pub nullable: bool,
    pub auto_increment: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub foreign_key: Option<ForeignKey>,
}

impl ColumnDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn sql_type(mut self, sql_type: ColumnType) -> Self {
        self.sql_type = Some(sql_type);
        self
    }

    pub fn params(mut self, params: ColumnParams) -> Self {
        self.params = Some(params);
        self
    }

    pub fn unsigned(mut self) -> Self {
        self.unsigned = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn references(mut self, table: &str, column: &str, settings: &str) -> Self {
        self.foreign_key = Some(ForeignKey {
            table: table.to_string(),
            column: column.to_string(),
            settings: settings.to_string(),
        });
        self
    }

    /// Parse a descriptor from JSON configuration text.
    ///
    /// # Errors
    ///
    /// `Serialization` when the text is not a valid descriptor.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// An auto-incrementing unsigned `bigint` primary key.
    pub fn id() -> Self {
        Self::new()
            .sql_type(ColumnType::BigInt)
            .unsigned()
            .auto_increment()
            .primary_key()
    }

    pub fn column_name<'a>(&'a self, field: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(field)
    }

    pub fn resolved_type(&self, field_type: &FieldType) -> ColumnType {
        self.sql_type
            .unwrap_or_else(|| ColumnType::infer(field_type))
    }

    pub fn resolved_params(&self, field_type: &FieldType) -> Option<ColumnParams> {
        self.params
            .clone()
            .or_else(|| self.resolved_type(field_type).default_params())
    }
}
