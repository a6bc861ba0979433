//! SQLite database handle
//!
//! [`SqliteDatabase`] implements the raw [`Database`] handle custom tables run
//! on, and the [`OptionStore`] schema versions are kept in.

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, Result};
use entimap_core::errors::EntimapError;
use entimap_core::host::{Database, Dialect, HostError, HostResult, OptionStore, Record};
use entimap_core::value::Value;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, OptionalExtension};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::Path;

const OPTIONS_TABLE: &str = "entimap_options";

pub struct SqliteDatabase {
    conn: Connection,
    prefix: String,
    last_error: RefCell<String>,
    insert_id: Cell<i64>,
}

impl SqliteDatabase {
    /// Open a SQLite database at the given path
    ///
    /// # Errors
    ///
    /// `HostFailure` when the file cannot be opened or configured.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path).map_err(open_error)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .map_err(open_error)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory SQLite database (for testing)
    ///
    /// # Errors
    ///
    /// `HostFailure` when SQLite cannot allocate the database.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory().map_err(open_error)?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(open_error)?;
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {OPTIONS_TABLE} (
                    name TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )"
            ),
            [],
        )
        .map_err(open_error)?;
        Ok(Self {
            conn,
            prefix: String::new(),
            last_error: RefCell::new(String::new()),
            insert_id: Cell::new(0),
        })
    }

    /// Table name prefix applied by repositories that opt into it
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// When the option was last written.
    ///
    /// # Errors
    ///
    /// `HostFailure` when the options table cannot be read.
    pub fn option_updated_at(&self, name: &str) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
        let stamp: Option<String> = self
            .conn
            .query_row(
                &format!("SELECT updated_at FROM {OPTIONS_TABLE} WHERE name = ?1"),
                [name],
                |row| row.get(0),
            )
            .optional()
            .map_err(open_error)?;
        Ok(stamp
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
            .map(|t| t.with_timezone(&chrono::Utc)))
    }

    /// Record the outcome of a statement so `last_error` reflects it.
    fn track<T>(&self, result: rusqlite::Result<T>) -> HostResult<T> {
        match result {
            Ok(value) => {
                self.last_error.borrow_mut().clear();
                Ok(value)
            }
            Err(err) => {
                *self.last_error.borrow_mut() = err.to_string();
                tracing::debug!(error = %err, "sqlite statement failed");
                Err(from_rusqlite(err))
            }
        }
    }

    fn read_rows(&self, sql: &str) -> rusqlite::Result<Vec<Record>> {
        let mut stmt = self.conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Record::new();
            for (i, name) in names.iter().enumerate() {
                record = record.with(name, from_sql(row.get_ref(i)?));
            }
            records.push(record);
        }
        Ok(records)
    }

    fn quote(&self, name: &str) -> String {
        Dialect::Sqlite.quote_identifier(name)
    }

    /// `"a" = ?n AND "b" = ?n+1`, numbering from `first`.
    fn assignments(&self, columns: &BTreeMap<String, Value>, first: usize, glue: &str) -> String {
        columns
            .keys()
            .enumerate()
            .map(|(i, name)| format!("{} = ?{}", self.quote(name), first + i))
            .collect::<Vec<_>>()
            .join(glue)
    }
}

fn open_error(err: rusqlite::Error) -> EntimapError {
    EntimapError::HostFailure {
        operation: "sqlite_open".to_string(),
        detail: err.to_string(),
    }
}

/// Collections are stored as JSON text, booleans as integers.
fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null | Value::Model(_) => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_json().to_string()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

impl Database for SqliteDatabase {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn query(&self, sql: &str) -> HostResult<usize> {
        tracing::trace!(sql, "sqlite query");
        self.track(self.conn.execute(sql, []))
    }

    fn get_results(&self, sql: &str) -> HostResult<Vec<Record>> {
        tracing::trace!(sql, "sqlite get_results");
        self.track(self.read_rows(sql))
    }

    fn insert(&self, table: &str, data: &BTreeMap<String, Value>) -> HostResult<usize> {
        let sql = if data.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", self.quote(table))
        } else {
            let columns: Vec<String> = data.keys().map(|name| self.quote(name)).collect();
            let placeholders: Vec<String> = (1..=data.len()).map(|i| format!("?{i}")).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.quote(table),
                columns.join(", "),
                placeholders.join(", ")
            )
        };
        tracing::trace!(sql = %sql, "sqlite insert");
        let params = data.values().map(to_sql);
        let count = self.track(self.conn.execute(&sql, rusqlite::params_from_iter(params)))?;
        self.insert_id.set(self.conn.last_insert_rowid());
        Ok(count)
    }

    fn update(
        &self,
        table: &str,
        data: &BTreeMap<String, Value>,
        conditions: &BTreeMap<String, Value>,
    ) -> HostResult<usize> {
        if conditions.is_empty() {
            return Err(HostError::new("invalid_update", "update requires conditions"));
        }
        if data.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            self.quote(table),
            self.assignments(data, 1, ", "),
            self.assignments(conditions, data.len() + 1, " AND ")
        );
        tracing::trace!(sql = %sql, "sqlite update");
        let params = data.values().chain(conditions.values()).map(to_sql);
        self.track(self.conn.execute(&sql, rusqlite::params_from_iter(params)))
    }

    fn delete(&self, table: &str, conditions: &BTreeMap<String, Value>) -> HostResult<usize> {
        if conditions.is_empty() {
            return Err(HostError::new("invalid_delete", "delete requires conditions"));
        }
        let sql = format!(
            "DELETE FROM {} WHERE {}",
            self.quote(table),
            self.assignments(conditions, 1, " AND ")
        );
        tracing::trace!(sql = %sql, "sqlite delete");
        let params = conditions.values().map(to_sql);
        self.track(self.conn.execute(&sql, rusqlite::params_from_iter(params)))
    }

    fn table_columns(&self, table: &str) -> HostResult<Option<Vec<String>>> {
        let sql = format!("PRAGMA table_info({})", self.quote(table));
        let columns = self.track(self.conn.prepare(&sql).and_then(|mut stmt| {
            let names = stmt
                .query_map([], |row| row.get::<_, String>(1))?
                .collect::<rusqlite::Result<Vec<String>>>();
            names
        }))?;
        Ok(if columns.is_empty() { None } else { Some(columns) })
    }

    fn last_error(&self) -> String {
        self.last_error.borrow().clone()
    }

    fn insert_id(&self) -> i64 {
        self.insert_id.get()
    }
}

impl OptionStore for SqliteDatabase {
    fn get_option(&self, name: &str) -> Option<String> {
        let result = self
            .conn
            .query_row(
                &format!("SELECT value FROM {OPTIONS_TABLE} WHERE name = ?1"),
                [name],
                |row| row.get(0),
            )
            .optional();
        match result {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(option = name, error = %err, "option read failed");
                None
            }
        }
    }

    fn update_option(&self, name: &str, value: &str) -> bool {
        let now = chrono::Utc::now().to_rfc3339();
        let result = self.conn.execute(
            &format!(
                "INSERT INTO {OPTIONS_TABLE} (name, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at"
            ),
            rusqlite::params![name, value, now],
        );
        match result {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(option = name, error = %err, "option write failed");
                false
            }
        }
    }
}
