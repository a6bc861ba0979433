//! Dynamic field values.
//!
//! Host records are untyped, so every field travels as a [`Value`] until it
//! is coerced to its declared [`crate::schema::FieldType`]. Emptiness follows
//! the host platform's loose rules (see [`Value::is_empty`]).

use crate::model::Model;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    /// A hydrated related entity
    Model(Box<Model>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Loose emptiness: null, `false`, `0`, `0.0`, `""`, `"0"` and empty
    /// collections are empty. Models never are.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Float(f) => *f == 0.0,
            Value::String(s) => s.is_empty() || s == "0",
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
            Value::Model(_) => false,
        }
    }

    /// Numbers and strings that parse as numbers.
    pub fn is_numeric(&self) -> bool {
        match self {
            Value::Int(_) | Value::Float(_) => true,
            Value::String(s) => {
                let trimmed = s.trim();
                !trimmed.is_empty() && trimmed.parse::<f64>().is_ok()
            }
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_model(&self) -> Option<&Model> {
        match self {
            Value::Model(model) => Some(model),
            _ => None,
        }
    }

    pub fn into_model(self) -> Option<Model> {
        match self {
            Value::Model(model) => Some(*model),
            _ => None,
        }
    }

    /// A single model, or every model inside a list. Other values yield nothing.
    pub fn into_models(self) -> Vec<Model> {
        match self {
            Value::Model(model) => vec![*model],
            Value::Array(items) => items.into_iter().filter_map(Value::into_model).collect(),
            _ => Vec::new(),
        }
    }

    /// String form used for payload keys, cache keys and loose comparison.
    ///
    /// Null and `false` render as `""`, `true` as `"1"`; collections render
    /// as JSON text.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null | Value::Model(_) => String::new(),
            Value::Bool(true) => "1".to_string(),
            Value::Bool(false) => String::new(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Array(_) | Value::Object(_) => self.to_json().to_string(),
        }
    }

    /// Equality after converting both sides to text, so `5` matches `"5"`.
    pub fn loose_eq(&self, other: &Value) -> bool {
        self == other || self.to_text() == other.to_text()
    }

    /// Parse JSON text. Malformed input yields `None`.
    pub fn parse_json(text: &str) -> Option<Value> {
        serde_json::from_str::<serde_json::Value>(text)
            .ok()
            .map(Value::from)
    }

    /// JSON view of the value. Models contribute the fields they have
    /// already resolved; nothing is fetched.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::String(s) => Json::String(s.clone()),
            Value::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Model(model) => Json::Object(
                model
                    .cached_values()
                    .map(|(k, v)| (k.to_string(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Model(a), Value::Model(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Object(map)
    }
}

impl From<Model> for Value {
    fn from(model: Model) -> Self {
        Value::Model(Box::new(model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emptiness_follows_loose_rules() {
        for empty in [
            Value::Null,
            Value::Bool(false),
            Value::Int(0),
            Value::Float(0.0),
            Value::from(""),
            Value::from("0"),
            Value::Array(vec![]),
            Value::Object(BTreeMap::new()),
        ] {
            assert!(empty.is_empty(), "{empty:?} should be empty");
        }
        for full in [Value::from("0.0"), Value::from(" "), Value::Int(-1)] {
            assert!(!full.is_empty(), "{full:?} should not be empty");
        }
    }

    #[test]
    fn loose_equality_crosses_types() {
        assert!(Value::Int(5).loose_eq(&Value::from("5")));
        assert!(!Value::Int(5).loose_eq(&Value::from("05")));
        assert!(Value::Bool(true).loose_eq(&Value::from("1")));
    }

    #[test]
    fn json_round_trips_structure() {
        let value = Value::parse_json(r#"{"a":[1,2.5,"x",null,true]}"#).unwrap();
        assert_eq!(
            value.to_json(),
            serde_json::json!({"a": [1, 2.5, "x", null, true]})
        );
        assert!(Value::parse_json("{broken").is_none());
    }

    #[test]
    fn text_rendering() {
        assert_eq!(Value::Float(2.0).to_text(), "2");
        assert_eq!(Value::Bool(false).to_text(), "");
        assert_eq!(Value::from(vec![1, 2]).to_text(), "[1,2]");
    }
}
