//! Host platform collaborators.
//!
//! The mapping layer never talks to the platform directly. It consumes the
//! traits in this module: an opaque record per entity ([`HostObject`]), a
//! store per entity family ([`EntityStore`]), the meta side store, term
//! assignments, the option store and a raw [`Database`] handle.
//! [`memory`] implements all of them in memory.

pub mod memory;
mod record;

pub use record::Record;

use crate::errors::{EntimapError, Result};
use crate::repository::FindArgs;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Failure reported by a host primitive.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct HostError {
    pub code: String,
    pub message: String,
}

impl HostError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

pub type HostResult<T> = std::result::Result<T, HostError>;

/// The opaque platform object behind a model.
pub trait HostObject: fmt::Debug {
    fn property(&self, name: &str) -> Option<Value>;

    fn property_names(&self) -> Vec<String>;

    fn set_property(&mut self, name: &str, value: Value);

    fn has_method(&self, method: &str) -> bool {
        let _ = method;
        false
    }

    /// Invoke an accessor method. `None` when the method does not exist.
    fn call(&mut self, method: &str, args: &[Value]) -> Option<Value> {
        let _ = (method, args);
        None
    }

    /// Meta stored on the object itself (commerce objects).
    fn meta(&self, key: &str, single: bool) -> Option<Value> {
        let _ = (key, single);
        None
    }

    fn set_meta(&mut self, key: &str, value: Value) -> bool {
        let _ = (key, value);
        false
    }
}

pub type RecordRef = Rc<RefCell<dyn HostObject>>;

/// Wrap any host object as a shared record reference.
pub fn record_ref<T: HostObject + 'static>(object: T) -> RecordRef {
    Rc::new(RefCell::new(object))
}

/// How a single entity is looked up.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Id(Value),
    Slug(String),
    By { field: String, value: Value },
}

impl Lookup {
    /// Identity-storage key for this lookup.
    pub fn cache_key(&self) -> String {
        match self {
            Lookup::Id(id) => format!("id:{id}"),
            Lookup::Slug(slug) => format!("slug:{slug}"),
            Lookup::By { field, value } => format!("{field}:{value}"),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Lookup::Id(id) => id.is_empty(),
            Lookup::Slug(slug) => slug.is_empty(),
            Lookup::By { value, .. } => value.is_null(),
        }
    }
}

impl From<Value> for Lookup {
    /// Integers and numeric strings are ids, other strings are slugs.
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => match s.trim().parse::<i64>() {
                Ok(id) => Lookup::Id(Value::Int(id)),
                Err(_) => Lookup::Slug(s),
            },
            other => Lookup::Id(other),
        }
    }
}

impl From<i64> for Lookup {
    fn from(id: i64) -> Self {
        Lookup::Id(Value::Int(id))
    }
}

impl From<i32> for Lookup {
    fn from(id: i32) -> Self {
        Lookup::Id(Value::Int(i64::from(id)))
    }
}

impl From<&str> for Lookup {
    fn from(s: &str) -> Self {
        Lookup::from(Value::from(s))
    }
}

impl From<String> for Lookup {
    fn from(s: String) -> Self {
        Lookup::from(Value::String(s))
    }
}

/// Values sent to an insert or update primitive, keyed by target name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    pub fields: BTreeMap<String, Value>,
    pub meta: BTreeMap<String, Value>,
}

impl Payload {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.meta.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

#[derive(Debug, Default)]
pub struct QueryResult {
    pub records: Vec<RecordRef>,
    /// Matches before limit and offset were applied
    pub found: usize,
}

/// Native record primitives for one entity family.
pub trait EntityStore {
    fn fetch(&self, lookup: &Lookup) -> HostResult<Option<RecordRef>>;

    fn query(&self, args: &FindArgs) -> HostResult<QueryResult>;

    /// Returns the new record's id.
    fn insert(&self, payload: &Payload) -> HostResult<Value>;

    fn update(&self, id: &Value, payload: &Payload) -> HostResult<Value>;

    fn delete(&self, id: &Value) -> HostResult<bool>;
}

/// Side-channel key/value store keyed by (entity type, id, key).
pub trait MetaStore {
    fn get(&self, meta_type: &str, id: &Value, key: &str, single: bool) -> Value;

    fn set(&self, meta_type: &str, id: &Value, key: &str, value: &Value) -> bool;
}

/// Term assignments of content objects.
pub trait TermAssignments {
    fn terms_of(&self, object_id: &Value, taxonomy: &str) -> HostResult<Vec<Value>>;

    /// Ids of the objects that carry `term_id` in `taxonomy`.
    fn objects_of(&self, taxonomy: &str, term_id: &Value) -> HostResult<Vec<Value>>;

    fn set_terms(&self, object_id: &Value, taxonomy: &str, term_ids: &[Value]) -> HostResult<()>;
}

/// Persistent settings, used for schema version strings.
pub trait OptionStore {
    fn get_option(&self, name: &str) -> Option<String>;

    fn update_option(&self, name: &str, value: &str) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Sqlite,
}

impl Dialect {
    pub fn quote_identifier(&self, name: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", name.replace('`', "``")),
            Dialect::Sqlite => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }
}

/// Raw relational database handle.
pub trait Database {
    /// Table name prefix
    fn prefix(&self) -> &str;

    fn dialect(&self) -> Dialect;

    /// Character set clause appended to `CREATE TABLE`.
    fn charset_collate(&self) -> String {
        String::new()
    }

    /// Execute a statement, returning the affected row count.
    fn query(&self, sql: &str) -> HostResult<usize>;

    fn get_results(&self, sql: &str) -> HostResult<Vec<Record>>;

    fn insert(&self, table: &str, data: &BTreeMap<String, Value>) -> HostResult<usize>;

    fn update(
        &self,
        table: &str,
        data: &BTreeMap<String, Value>,
        conditions: &BTreeMap<String, Value>,
    ) -> HostResult<usize>;

    fn delete(&self, table: &str, conditions: &BTreeMap<String, Value>) -> HostResult<usize>;

    /// Column names of `table`, or `None` when it does not exist.
    fn table_columns(&self, table: &str) -> HostResult<Option<Vec<String>>>;

    fn last_error(&self) -> String;

    fn insert_id(&self) -> i64;
}

/// The collaborators a [`crate::Manager`] hands to its repositories.
#[derive(Clone)]
pub struct Host {
    stores: BTreeMap<String, Rc<dyn EntityStore>>,
    meta: Rc<dyn MetaStore>,
    terms: Rc<dyn TermAssignments>,
    options: Rc<dyn OptionStore>,
}

impl Host {
    pub fn new(
        meta: Rc<dyn MetaStore>,
        terms: Rc<dyn TermAssignments>,
        options: Rc<dyn OptionStore>,
    ) -> Self {
        Self {
            stores: BTreeMap::new(),
            meta,
            terms,
            options,
        }
    }

    pub fn with_store(mut self, family: impl Into<String>, store: Rc<dyn EntityStore>) -> Self {
        self.stores.insert(family.into(), store);
        self
    }

    /// # Errors
    ///
    /// `HostFailure` when no store serves `family`.
    pub fn store(&self, family: &str) -> Result<Rc<dyn EntityStore>> {
        self.stores
            .get(family)
            .cloned()
            .ok_or_else(|| EntimapError::HostFailure {
                operation: "store".to_string(),
                detail: format!("no entity store for family {family}"),
            })
    }

    pub fn meta(&self) -> Rc<dyn MetaStore> {
        Rc::clone(&self.meta)
    }

    pub fn terms(&self) -> Rc<dyn TermAssignments> {
        Rc::clone(&self.terms)
    }

    pub fn options(&self) -> Rc<dyn OptionStore> {
        Rc::clone(&self.options)
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("families", &self.stores.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_strings_look_up_by_id() {
        assert_eq!(Lookup::from("12"), Lookup::Id(Value::Int(12)));
        assert_eq!(Lookup::from("hello-world"), Lookup::Slug("hello-world".into()));
        assert_eq!(Lookup::from(7).cache_key(), "id:7");
    }

    #[test]
    fn identifiers_are_quoted_per_dialect() {
        assert_eq!(Dialect::MySql.quote_identifier("order"), "`order`");
        assert_eq!(Dialect::Sqlite.quote_identifier("a\"b"), "\"a\"\"b\"");
    }
}
