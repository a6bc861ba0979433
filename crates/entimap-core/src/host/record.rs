use super::{HostObject, Payload, RecordRef};
use crate::value::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Map-backed host object.
///
/// `props` are public properties. `data` is only reachable through accessor
/// methods (`get_<key>`, `set_<key>` or a method named `<key>`), the way
/// commerce objects hide their state. `meta` is meta embedded in the object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    props: BTreeMap<String, Value>,
    data: BTreeMap<String, Value>,
    meta: BTreeMap<String, Vec<Value>>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.props.insert(name.to_string(), value.into());
        self
    }

    pub fn with_data(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.data.insert(name.to_string(), value.into());
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.meta
            .entry(key.to_string())
            .or_default()
            .push(value.into());
        self
    }

    pub fn props(&self) -> &BTreeMap<String, Value> {
        &self.props
    }

    pub fn data(&self) -> &BTreeMap<String, Value> {
        &self.data
    }

    /// Property or accessor-backed value, whichever holds `name`.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.props.get(name).or_else(|| self.data.get(name))
    }

    /// Apply a write payload. Fields already held as accessor data stay
    /// accessor data; meta replaces every stored value for its key.
    pub fn merge(&mut self, payload: &Payload) {
        for (name, value) in &payload.fields {
            match self.data.get_mut(name) {
                Some(slot) => *slot = value.clone(),
                None => {
                    self.props.insert(name.clone(), value.clone());
                }
            }
        }
        for (key, value) in &payload.meta {
            self.meta.insert(key.clone(), vec![value.clone()]);
        }
    }

    pub(crate) fn insert_data(&mut self, name: &str, value: Value) {
        self.data.insert(name.to_string(), value);
    }

    pub fn into_ref(self) -> RecordRef {
        Rc::new(RefCell::new(self))
    }

    fn accessor_key<'a>(&self, method: &'a str) -> Option<(&'a str, bool)> {
        if let Some(key) = method.strip_prefix("get_") {
            if self.data.contains_key(key) {
                return Some((key, false));
            }
        }
        if let Some(key) = method.strip_prefix("set_") {
            if self.data.contains_key(key) {
                return Some((key, true));
            }
        }
        None
    }
}

impl HostObject for Record {
    fn property(&self, name: &str) -> Option<Value> {
        self.props.get(name).cloned()
    }

    fn property_names(&self) -> Vec<String> {
        self.props.keys().cloned().collect()
    }

    fn set_property(&mut self, name: &str, value: Value) {
        self.props.insert(name.to_string(), value);
    }

    fn has_method(&self, method: &str) -> bool {
        self.accessor_key(method).is_some() || self.data.contains_key(method)
    }

    fn call(&mut self, method: &str, args: &[Value]) -> Option<Value> {
        let (key, is_setter) = match self.accessor_key(method) {
            Some(found) => found,
            None if self.data.contains_key(method) => (method, !args.is_empty()),
            None => return None,
        };
        if is_setter {
            let value = args.first().cloned().unwrap_or_default();
            self.data.insert(key.to_string(), value);
            Some(Value::Null)
        } else {
            self.data.get(key).cloned()
        }
    }

    fn meta(&self, key: &str, single: bool) -> Option<Value> {
        let values = self.meta.get(key)?;
        if single {
            values.first().cloned()
        } else {
            Some(Value::Array(values.clone()))
        }
    }

    fn set_meta(&mut self, key: &str, value: Value) -> bool {
        self.meta.insert(key.to_string(), vec![value]);
        true
    }
}
