//! Lazily resolved entity instances.

use crate::coerce::coerce;
use crate::errors::{EntimapError, Result};
use crate::host::RecordRef;
use crate::manager::Manager;
use crate::repository::Repository;
use crate::schema::{FieldDescriptor, ModelKind, ModelSchema};
use crate::value::Value;
use std::collections::{btree_map, BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

/// A hydrated entity.
///
/// Field values are resolved on first read through the field's source,
/// coerced to the declared type and cached until [`Model::refresh`].
/// Writes are coerced and cached too; accessor and meta fields also write
/// through to the record or side store right away, everything else waits
/// for [`Repository::save`].
#[derive(Clone)]
pub struct Model {
    schema: Rc<ModelSchema>,
    manager: Manager,
    record: Option<RecordRef>,
    values: HashMap<String, Value>,
    changed: BTreeSet<String>,
    resolving: HashSet<String>,
}

/// What identity storage keeps of a model: its type and record, without
/// cached values or the manager.
#[derive(Clone)]
pub struct Snapshot {
    schema: Rc<ModelSchema>,
    record: Option<RecordRef>,
}

impl Snapshot {
    pub fn kind(&self) -> ModelKind {
        self.schema.kind()
    }

    pub fn record(&self) -> Option<&RecordRef> {
        self.record.as_ref()
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("kind", &self.kind())
            .field("record", &self.record.is_some())
            .finish()
    }
}

impl Model {
    /// Bind a model to `record`. The first model of a type fixes the
    /// sources of its schema.
    pub fn new(schema: Rc<ModelSchema>, manager: Manager, record: Option<RecordRef>) -> Self {
        schema.seal(record.as_ref());
        Self {
            schema,
            manager,
            record,
            values: HashMap::new(),
            changed: BTreeSet::new(),
            resolving: HashSet::new(),
        }
    }

    pub fn from_snapshot(snapshot: Snapshot, manager: Manager) -> Self {
        Self::new(snapshot.schema, manager, snapshot.record)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            schema: Rc::clone(&self.schema),
            record: self.record.clone(),
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.schema.kind()
    }

    pub fn schema(&self) -> &Rc<ModelSchema> {
        &self.schema
    }

    pub fn manager(&self) -> &Manager {
        &self.manager
    }

    pub fn record(&self) -> Option<&RecordRef> {
        self.record.as_ref()
    }

    /// # Errors
    ///
    /// `RepositoryNotRegistered` when nothing is registered for this kind.
    pub fn repository(&self) -> Result<Rc<dyn Repository>> {
        self.manager.get_model_repository(self.kind())
    }

    fn field_at(&self, name: &str) -> Result<(Rc<ModelSchema>, usize)> {
        let schema = Rc::clone(&self.schema);
        match schema.position(name) {
            Some(position) => Ok((schema, position)),
            None => Err(EntimapError::PropertyNotDefined {
                model: self.kind().to_string(),
                field: name.to_string(),
            }),
        }
    }

    /// Read a field, resolving it on first access.
    ///
    /// # Errors
    ///
    /// `PropertyNotDefined` for undeclared names. Relation fields surface
    /// repository and host failures.
    pub fn get(&mut self, name: &str) -> Result<Value> {
        if let Some(value) = self.values.get(name) {
            return Ok(value.clone());
        }
        let (schema, position) = self.field_at(name)?;
        let field = &schema.fields()[position];
        if !self.resolving.insert(name.to_string()) {
            // Alias or hook cycle back into this field.
            return Ok(field.default_value().clone());
        }
        let raw = match field.hooks().get {
            Some(getter) => getter(self),
            None => schema.source_at(position).get(self, name),
        };
        self.resolving.remove(name);
        // Missing values and soft coercion failures both fall back to the default.
        let value = match raw? {
            Value::Null => field.default_value().clone(),
            raw => match coerce(field, raw) {
                Value::Null => field.default_value().clone(),
                value => value,
            },
        };
        tracing::trace!(model = %self.kind(), field = name, "field resolved");
        self.values.insert(name.to_string(), value.clone());
        Ok(value)
    }

    /// Write a field and mark it changed.
    ///
    /// # Errors
    ///
    /// `ReadOnlyViolation` when the field is read-only and already holds a
    /// non-empty value (cached, or its default when nothing is cached).
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let (schema, position) = self.field_at(name)?;
        let field = &schema.fields()[position];
        if field.is_readonly() && !self.current_or_default(field).is_empty() {
            return Err(EntimapError::ReadOnlyViolation {
                model: self.kind().to_string(),
                field: name.to_string(),
            });
        }
        let stored = match field.hooks().set {
            Some(setter) => setter(self, value)?,
            None => coerce(field, value),
        };
        let source = schema.source_at(position);
        if source.writes_through() {
            source.write_through(self, name, &stored)?;
        }
        self.values.insert(name.to_string(), stored);
        self.changed.insert(name.to_string());
        if let Some(after_set) = field.hooks().after_set {
            after_set(self)?;
        }
        Ok(())
    }

    fn current_or_default<'a>(&'a self, field: &'a FieldDescriptor) -> &'a Value {
        self.values
            .get(field.name())
            .unwrap_or_else(|| field.default_value())
    }

    /// Cache a server-assigned value without change tracking or read-only checks.
    pub(crate) fn assign(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Cached value, if the field has been resolved or written.
    pub fn cached(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub(crate) fn cached_values(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_changed(&self, name: &str) -> bool {
        self.changed.contains(name)
    }

    pub fn changed_fields(&self) -> impl Iterator<Item = &str> + '_ {
        self.changed.iter().map(String::as_str)
    }

    /// Whether `name` is a declared field.
    pub fn contains(&self, name: &str) -> bool {
        self.schema.contains(name)
    }

    /// Drop one cached value so the next read resolves it again.
    pub fn unset(&mut self, name: &str) {
        self.values.remove(name);
    }

    /// Forget every cached value and change flag. A new record replaces the
    /// current one; `None` keeps it.
    pub fn refresh(&mut self, record: Option<RecordRef>) {
        self.values.clear();
        self.changed.clear();
        if record.is_some() {
            self.record = record;
        }
    }

    /// Value of the repository's primary key field.
    ///
    /// # Errors
    ///
    /// Fails when no repository is registered for this kind.
    pub fn primary_key(&mut self) -> Result<Value> {
        let field = self.repository()?.primary_key_field().to_string();
        self.get(&field)
    }

    /// Project `fields` (all declared fields when empty) into a map.
    /// Models and lists of models under a `recursive` field are projected
    /// too, with the same `recursive` list applied at every level.
    ///
    /// # Errors
    ///
    /// Propagates resolution errors.
    pub fn to_array(
        &mut self,
        fields: &[&str],
        recursive: &[&str],
    ) -> Result<BTreeMap<String, Value>> {
        let names: Vec<String> = if fields.is_empty() {
            self.schema
                .fields()
                .iter()
                .map(|f| f.name().to_string())
                .collect()
        } else {
            fields.iter().map(|f| f.to_string()).collect()
        };
        let mut projected = BTreeMap::new();
        for name in names {
            let mut value = self.get(&name)?;
            if recursive.contains(&name.as_str()) {
                value = project(value, recursive)?;
            }
            projected.insert(name, value);
        }
        Ok(projected)
    }

    /// # Errors
    ///
    /// Propagates resolution errors.
    pub fn to_json(&mut self) -> Result<serde_json::Value> {
        Ok(Value::Object(self.to_array(&[], &[])?).to_json())
    }

    /// Iterate over every declared field and its resolved value.
    ///
    /// # Errors
    ///
    /// Propagates resolution errors.
    pub fn iter(&mut self) -> Result<btree_map::IntoIter<String, Value>> {
        Ok(self.to_array(&[], &[])?.into_iter())
    }
}

fn project(value: Value, recursive: &[&str]) -> Result<Value> {
    match value {
        Value::Model(mut model) => Ok(Value::Object(model.to_array(&[], recursive)?)),
        Value::Array(items) => Ok(Value::Array(
            items
                .into_iter()
                .map(|item| project(item, recursive))
                .collect::<Result<_>>()?,
        )),
        other => Ok(other),
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        let same_record = match (&self.record, &other.record) {
            (Some(a), Some(b)) => Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const (),
            (None, None) => true,
            _ => false,
        };
        self.kind() == other.kind() && same_record && self.values == other.values
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("kind", &self.kind())
            .field("record", &self.record.is_some())
            .field("values", &self.values)
            .field("changed", &self.changed)
            .finish()
    }
}
