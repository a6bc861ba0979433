//! Model type metadata.
//!
//! A [`ModelSchema`] is the per-type table of declared fields. Each field is
//! assigned exactly one [`Source`] the first time a model of the type is
//! constructed; the assignment is shared by every instance afterwards.

mod column;
mod field;

pub use column::{ColumnDescriptor, ColumnParams, ColumnType, ForeignKey};
pub use field::{
    AfterSetHook, FieldDescriptor, FieldHooks, FieldType, GetHook, PersistHook, SetHook,
};

use crate::errors::{EntimapError, Result};
use crate::host::RecordRef;
use crate::source::{Relation, Source};
use std::cell::OnceCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// Name of a model type, e.g. `post` or `product_cat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelKind(&'static str);

impl ModelKind {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

pub struct ModelSchema {
    kind: ModelKind,
    fields: Vec<FieldDescriptor>,
    positions: HashMap<String, usize>,
    relations: BTreeMap<String, Relation>,
    strategies: OnceCell<Vec<Source>>,
}

impl ModelSchema {
    pub fn builder(kind: ModelKind) -> ModelSchemaBuilder {
        ModelSchemaBuilder {
            kind,
            fields: Vec::new(),
            relations: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    /// Declared fields in registration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.position(name).map(|i| &self.fields[i])
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    pub fn is_sealed(&self) -> bool {
        self.strategies.get().is_some()
    }

    /// Assign a source to every field, once.
    ///
    /// Declared sources are kept. Otherwise, in order: a get hook makes the
    /// field computed, a relation annotation makes it a relation, a property
    /// of the same name on `record` makes it an object field, and anything
    /// left falls back to a side-store entry keyed by the field name.
    pub(crate) fn seal(&self, record: Option<&RecordRef>) -> &[Source] {
        self.strategies.get_or_init(|| {
            let names: HashSet<String> = record
                .map(|r| r.borrow().property_names().into_iter().collect())
                .unwrap_or_default();
            let sources: Vec<Source> = self
                .fields
                .iter()
                .map(|field| self.infer_source(field, &names))
                .collect();
            tracing::debug!(model = %self.kind, fields = sources.len(), "model schema sealed");
            sources
        })
    }

    fn infer_source(&self, field: &FieldDescriptor, record_fields: &HashSet<String>) -> Source {
        if let Some(source) = field.declared_source() {
            return source.clone();
        }
        if field.hooks().get.is_some() {
            return Source::Computed;
        }
        if let Some(relation) = self.relations.get(field.name()) {
            return Source::Relation(relation.clone());
        }
        if record_fields.contains(field.name()) {
            return Source::Object { key: None };
        }
        Source::Meta {
            key: None,
            single: true,
        }
    }

    /// Source of the field at `position`, sealing without a record if needed.
    pub fn source_at(&self, position: usize) -> &Source {
        &self.seal(None)[position]
    }

    pub fn source(&self, name: &str) -> Option<&Source> {
        self.position(name).map(|i| self.source_at(i))
    }

    /// Name the host knows the field by: object path, meta key, accessor
    /// key or column name.
    pub fn target_name<'a>(&'a self, name: &'a str) -> &'a str {
        match self.source(name) {
            Some(source) => source.target_name(name),
            None => name,
        }
    }

    /// Table-backed fields with their column metadata.
    pub fn columns(&self) -> Vec<(&FieldDescriptor, &ColumnDescriptor)> {
        self.fields
            .iter()
            .filter_map(|field| match field.declared_source() {
                Some(Source::Column(column)) => Some((field, column)),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Debug for ModelSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSchema")
            .field("kind", &self.kind)
            .field("fields", &self.fields.len())
            .field("sealed", &self.is_sealed())
            .finish()
    }
}

pub struct ModelSchemaBuilder {
    kind: ModelKind,
    fields: Vec<FieldDescriptor>,
    relations: BTreeMap<String, Relation>,
}

impl ModelSchemaBuilder {
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Relation annotation for a field that declares no source of its own.
    pub fn relation(mut self, field: &str, relation: Relation) -> Self {
        self.relations.insert(field.to_string(), relation);
        self
    }

    /// # Errors
    ///
    /// Fails with `InvalidInput` when two fields share a name, when a
    /// relation annotation names an undeclared field, or when an alias
    /// points at an undeclared field.
    pub fn build(self) -> Result<ModelSchema> {
        let mut positions = HashMap::with_capacity(self.fields.len());
        for (i, field) in self.fields.iter().enumerate() {
            if positions.insert(field.name().to_string(), i).is_some() {
                return Err(EntimapError::InvalidInput {
                    reason: format!("field {} declared twice on {}", field.name(), self.kind),
                });
            }
        }
        if let Some(name) = self.relations.keys().find(|n| !positions.contains_key(*n)) {
            return Err(EntimapError::InvalidInput {
                reason: format!("relation annotation for undeclared field {} on {}", name, self.kind),
            });
        }
        for field in &self.fields {
            if let Some(Source::Alias { target }) = field.declared_source() {
                if !positions.contains_key(target) {
                    return Err(EntimapError::InvalidInput {
                        reason: format!(
                            "field {} on {} aliases undeclared field {}",
                            field.name(),
                            self.kind,
                            target
                        ),
                    });
                }
            }
        }
        Ok(ModelSchema {
            kind: self.kind,
            fields: self.fields,
            positions,
            relations: self.relations,
            strategies: OnceCell::new(),
        })
    }
}
