//! Field resolution strategies.
//!
//! Every declared field resolves through exactly one [`Source`]. Sources are
//! plain data; the engine dispatches on the variant.

use crate::errors::Result;
use crate::host::{HostObject, Lookup};
use crate::model::Model;
use crate::schema::{ColumnDescriptor, ColumnType, ModelKind};
use crate::value::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// A property (or dotted path) on the host record
    Object { key: Option<String> },
    /// An entry in the side store, keyed by entity type and id
    Meta { key: Option<String>, single: bool },
    /// Getter and setter methods on the host record
    Accessor {
        key: Option<String>,
        getter: Option<String>,
        setter: Option<String>,
    },
    /// Another field of the same model
    Alias { target: String },
    Relation(Relation),
    /// A column of a custom table row
    Column(ColumnDescriptor),
    /// Produced by the field's get hook
    Computed,
}

/// Where a field's value goes in a save payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSlot {
    Field,
    Meta,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Relation {
    /// The entity whose primary key is stored in `foreign_key`
    ManyToOne {
        target: ModelKind,
        foreign_key: String,
    },
    /// Entities whose ids are listed in `source_key`
    Ids {
        target: ModelKind,
        source_key: String,
    },
    /// Entities whose `parent_key` holds this model's primary key. Saving
    /// the field rebinds and saves every child.
    Children {
        target: Option<ModelKind>,
        parent_key: String,
    },
    /// Topmost ancestor along `parent_key`
    TopLevelParent { parent_key: String },
    /// Terms of the target taxonomy assigned to this model. Saving the
    /// field replaces the assignment.
    Terms { target: ModelKind },
    /// Entities of the target kind carrying this term. Read-only.
    TermObjects { target: ModelKind },
}

impl Source {
    /// Name the host knows the field by.
    pub fn target_name<'a>(&'a self, field: &'a str) -> &'a str {
        match self {
            Source::Object { key } | Source::Meta { key, .. } | Source::Accessor { key, .. } => {
                key.as_deref().unwrap_or(field)
            }
            Source::Column(column) => column.column_name(field),
            _ => field,
        }
    }

    pub fn payload_slot(&self) -> Option<PayloadSlot> {
        match self {
            Source::Object { .. } | Source::Accessor { .. } | Source::Column(_) => {
                Some(PayloadSlot::Field)
            }
            Source::Meta { .. } => Some(PayloadSlot::Meta),
            _ => None,
        }
    }

    /// Accessor and meta writes reach the host immediately.
    pub fn writes_through(&self) -> bool {
        matches!(self, Source::Accessor { .. } | Source::Meta { .. })
    }

    pub fn can_persist(&self) -> bool {
        matches!(self, Source::Relation(relation) if relation.can_persist())
    }

    pub(crate) fn get(&self, model: &mut Model, field: &str) -> Result<Value> {
        match self {
            Source::Object { key } => {
                let path = key.as_deref().unwrap_or(field);
                Ok(model
                    .record()
                    .map(|record| read_path(&*record.borrow(), path))
                    .unwrap_or_default())
            }
            Source::Meta { key, single } => {
                let key = key.as_deref().unwrap_or(field);
                let repository = model.repository()?;
                repository.fetch_meta(model, key, *single)
            }
            Source::Accessor { key, getter, .. } => {
                let key = key.as_deref().unwrap_or(field);
                let Some(record) = model.record().cloned() else {
                    return Ok(Value::Null);
                };
                let getter = getter.clone().unwrap_or_else(|| format!("get_{key}"));
                let mut record = record.borrow_mut();
                let value = if record.has_method(&getter) {
                    record.call(&getter, &[])
                } else if record.has_method(key) {
                    record.call(key, &[])
                } else {
                    None
                };
                Ok(value.unwrap_or_default())
            }
            Source::Alias { target } => model.get(target),
            Source::Relation(relation) => relation.resolve(model),
            Source::Column(column) => {
                let name = column.column_name(field);
                let raw = model
                    .record()
                    .and_then(|record| record.borrow().property(name))
                    .unwrap_or_default();
                Ok(match (column.sql_type, raw) {
                    (Some(ColumnType::Json), Value::String(text)) => {
                        Value::parse_json(&text).unwrap_or_default()
                    }
                    (_, raw) => raw,
                })
            }
            Source::Computed => Ok(Value::Null),
        }
    }

    /// Push an accepted write toward the record or side store.
    pub(crate) fn write_through(&self, model: &mut Model, field: &str, value: &Value) -> Result<()> {
        match self {
            Source::Accessor { key, setter, .. } => {
                let key = key.as_deref().unwrap_or(field);
                if let Some(record) = model.record().cloned() {
                    let setter = setter.clone().unwrap_or_else(|| format!("set_{key}"));
                    let mut record = record.borrow_mut();
                    let args = std::slice::from_ref(value);
                    if record.has_method(&setter) {
                        record.call(&setter, args);
                    } else if record.has_method(key) {
                        record.call(key, args);
                    }
                }
                Ok(())
            }
            Source::Meta { key, .. } => {
                let key = key.as_deref().unwrap_or(field);
                let repository = model.repository()?;
                repository.store_meta(model, key, value)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn persist(&self, model: &mut Model, field: &str, value: Value) -> Result<()> {
        match self {
            Source::Relation(relation) => relation.persist(model, value),
            _ => {
                tracing::debug!(model = %model.kind(), field, "source has no persist step");
                Ok(())
            }
        }
    }
}

fn read_path(record: &dyn HostObject, path: &str) -> Value {
    if let Some(value) = record.property(path) {
        return value;
    }
    let mut segments = path.split('.');
    let Some(mut current) = segments.next().and_then(|first| record.property(first)) else {
        return Value::Null;
    };
    for segment in segments {
        current = match current {
            Value::Object(mut map) => map.remove(segment).unwrap_or_default(),
            _ => return Value::Null,
        };
    }
    current
}

impl Relation {
    pub fn can_persist(&self) -> bool {
        matches!(self, Relation::Children { .. } | Relation::Terms { .. })
    }

    fn resolve(&self, model: &mut Model) -> Result<Value> {
        let manager = model.manager().clone();
        match self {
            Relation::ManyToOne {
                target,
                foreign_key,
            } => {
                let key = model.get(foreign_key)?;
                if key.is_empty() {
                    return Ok(Value::Null);
                }
                let repository = manager.get_model_repository(*target)?;
                Ok(repository
                    .get(Lookup::from(key))?
                    .map(Value::from)
                    .unwrap_or_default())
            }
            Relation::Ids { target, source_key } => {
                let ids: Vec<Value> = match model.get(source_key)? {
                    Value::Array(items) => items,
                    Value::Null => Vec::new(),
                    single => vec![single],
                }
                .into_iter()
                .filter(|id| !id.is_empty())
                .collect();
                if ids.is_empty() {
                    return Ok(Value::Array(Vec::new()));
                }
                let repository = manager.get_model_repository(*target)?;
                Ok(Value::from(repository.find_by_ids(&ids)?))
            }
            Relation::Children { target, parent_key } => {
                let repository = manager.get_model_repository(target.unwrap_or(model.kind()))?;
                Ok(Value::from(repository.find_children_of(model, parent_key)?))
            }
            Relation::TopLevelParent { parent_key } => {
                let repository = manager.get_model_repository(model.kind())?;
                let mut visited = HashSet::new();
                visited.insert(model.primary_key()?.to_text());
                let mut parent_id = model.get(parent_key)?;
                let mut top = None;
                while !parent_id.is_empty() && visited.insert(parent_id.to_text()) {
                    match repository.get(Lookup::from(parent_id))? {
                        Some(mut parent) => {
                            parent_id = parent.get(parent_key)?;
                            top = Some(parent);
                        }
                        None => break,
                    }
                }
                Ok(top.map(Value::from).unwrap_or_default())
            }
            Relation::Terms { target } => {
                let repository = manager.get_model_repository(*target)?;
                Ok(Value::from(repository.find_terms_of(model)?))
            }
            Relation::TermObjects { target } => {
                let repository = manager.get_model_repository(*target)?;
                Ok(Value::from(repository.find_by_term(model)?))
            }
        }
    }

    fn persist(&self, model: &mut Model, value: Value) -> Result<()> {
        let manager = model.manager().clone();
        match self {
            Relation::Children { parent_key, .. } => {
                let parent_id = model.primary_key()?;
                for mut child in value.into_models() {
                    child.set(parent_key, parent_id.clone())?;
                    let repository = manager.get_model_repository(child.kind())?;
                    repository.save(&mut child)?;
                }
                Ok(())
            }
            Relation::Terms { target } => {
                let mut terms = value.into_models();
                manager
                    .get_model_repository(*target)?
                    .assign_terms(model, &mut terms)
            }
            _ => Ok(()),
        }
    }
}
