//! Per-field metadata.

use super::{ColumnDescriptor, ModelKind};
use crate::errors::Result;
use crate::model::Model;
use crate::source::{Relation, Source};
use crate::value::Value;
use std::fmt;

/// Declared semantic type of a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Int,
    Float,
    String,
    Bool,
    Array,
    Object,
    /// A related entity of the given kind
    Model(ModelKind),
}

impl FieldType {
    /// The value a field of this type holds before anything is resolved.
    pub fn zero_value(&self) -> Value {
        match self {
            FieldType::Int => Value::Int(0),
            FieldType::Float => Value::Float(0.0),
            FieldType::String => Value::String(String::new()),
            FieldType::Bool => Value::Bool(false),
            FieldType::Array => Value::Array(Vec::new()),
            FieldType::Object => Value::Object(Default::default()),
            FieldType::Model(_) => Value::Null,
        }
    }
}

/// Produces a field's value in place of its source.
pub type GetHook = fn(&mut Model) -> Result<Value>;
/// Converts an incoming value; the result is cached instead of the coerced input.
pub type SetHook = fn(&mut Model, Value) -> Result<Value>;
/// Runs after every accepted write.
pub type AfterSetHook = fn(&mut Model) -> Result<()>;
/// Persists a changed field after the primary record is written.
pub type PersistHook = fn(&mut Model, Value) -> Result<()>;

#[derive(Clone, Copy, Default)]
pub struct FieldHooks {
    pub get: Option<GetHook>,
    pub set: Option<SetHook>,
    pub after_set: Option<AfterSetHook>,
    pub persist: Option<PersistHook>,
}

impl fmt::Debug for FieldHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldHooks")
            .field("get", &self.get.is_some())
            .field("set", &self.set.is_some())
            .field("after_set", &self.after_set.is_some())
            .field("persist", &self.persist.is_some())
            .finish()
    }
}

/// Static description of one declared field.
///
/// Built with a fluent API and frozen once added to a
/// [`super::ModelSchema`]:
///
/// ```
/// use entimap_core::schema::{FieldDescriptor, FieldType};
///
/// let title = FieldDescriptor::new("title", FieldType::String).object("post_title");
/// assert_eq!(title.name(), "title");
/// ```
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: String,
    field_type: FieldType,
    default: Value,
    explicit_default: bool,
    allows_null: bool,
    readonly: bool,
    source: Option<Source>,
    hooks: FieldHooks,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let default = field_type.zero_value();
        Self {
            name: name.into(),
            field_type,
            default,
            explicit_default: false,
            allows_null: false,
            readonly: false,
            source: None,
            hooks: FieldHooks::default(),
        }
    }

    /// Allow empty values. The default becomes `Null` unless one was given
    /// with [`FieldDescriptor::default`], before or after.
    pub fn nullable(mut self) -> Self {
        self.allows_null = true;
        if !self.explicit_default {
            self.default = Value::Null;
        }
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = value.into();
        self.explicit_default = true;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub fn source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    /// Read and write `key` (a dotted path) on the host record.
    pub fn object(self, key: &str) -> Self {
        self.source(Source::Object {
            key: Some(key.to_string()),
        })
    }

    /// Single-valued side-store entry under `key`.
    pub fn meta(self, key: &str) -> Self {
        self.source(Source::Meta {
            key: Some(key.to_string()),
            single: true,
        })
    }

    /// Accessor methods on the record, `get_<key>` / `set_<key>`.
    pub fn accessor(self, key: &str) -> Self {
        self.source(Source::Accessor {
            key: Some(key.to_string()),
            getter: None,
            setter: None,
        })
    }

    pub fn alias(self, target: &str) -> Self {
        self.source(Source::Alias {
            target: target.to_string(),
        })
    }

    pub fn relation(self, relation: Relation) -> Self {
        self.source(Source::Relation(relation))
    }

    pub fn column(self, column: ColumnDescriptor) -> Self {
        self.source(Source::Column(column))
    }

    /// No backing storage; the value comes from `getter`.
    pub fn computed(mut self, getter: GetHook) -> Self {
        self.hooks.get = Some(getter);
        self.source(Source::Computed)
    }

    pub fn on_get(mut self, hook: GetHook) -> Self {
        self.hooks.get = Some(hook);
        self
    }

    pub fn on_set(mut self, hook: SetHook) -> Self {
        self.hooks.set = Some(hook);
        self
    }

    pub fn after_set(mut self, hook: AfterSetHook) -> Self {
        self.hooks.after_set = Some(hook);
        self
    }

    pub fn on_persist(mut self, hook: PersistHook) -> Self {
        self.hooks.persist = Some(hook);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub fn allows_null(&self) -> bool {
        self.allows_null
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Source declared on the field itself, before inference.
    pub fn declared_source(&self) -> Option<&Source> {
        self.source.as_ref()
    }

    pub fn hooks(&self) -> &FieldHooks {
        &self.hooks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nullable_keeps_an_explicit_default() {
        let before = FieldDescriptor::new("status", FieldType::String)
            .default("draft")
            .nullable();
        let after = FieldDescriptor::new("status", FieldType::String)
            .nullable()
            .default("draft");
        for field in [before, after] {
            assert!(field.allows_null());
            assert_eq!(field.default_value(), &Value::from("draft"));
        }
    }

    #[test]
    fn nullable_without_default_starts_null() {
        let plain = FieldDescriptor::new("count", FieldType::Int);
        assert_eq!(plain.default_value(), &Value::Int(0));
        assert_eq!(plain.nullable().default_value(), &Value::Null);
    }
}
