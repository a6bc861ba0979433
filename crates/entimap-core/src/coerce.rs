//! Conversion of raw resolved values to a field's declared type.
//!
//! Conversion never fails. Malformed JSON text coerces to `Null`, which the
//! model then replaces with the field's default.

use crate::schema::{FieldDescriptor, FieldType};
use crate::value::Value;
use std::collections::BTreeMap;

/// Coerce `raw` for `field`. Empty input on a nullable field yields the
/// field's default without conversion.
pub fn coerce(field: &FieldDescriptor, raw: Value) -> Value {
    if raw.is_empty() && field.allows_null() {
        return field.default_value().clone();
    }
    convert(field.field_type(), raw)
}

pub fn convert(field_type: &FieldType, raw: Value) -> Value {
    match field_type {
        FieldType::Int => Value::Int(to_int(&raw)),
        FieldType::Float => Value::Float(to_float(&raw)),
        FieldType::String => match raw {
            Value::String(s) => Value::String(s),
            other => Value::String(other.to_text()),
        },
        FieldType::Bool => match raw {
            Value::String(ref s) if s == "true" => Value::Bool(true),
            Value::String(ref s) if s == "false" => Value::Bool(false),
            other => Value::Bool(!other.is_empty()),
        },
        FieldType::Array => match raw {
            Value::String(s) => Value::parse_json(&s).unwrap_or(Value::Null),
            Value::Null => Value::Array(Vec::new()),
            Value::Array(items) => Value::Array(items),
            Value::Object(map) => Value::Object(map),
            other => Value::Array(vec![other]),
        },
        FieldType::Object => match raw {
            Value::String(s) => Value::parse_json(&s).unwrap_or(Value::Null),
            Value::Null => Value::Object(BTreeMap::new()),
            Value::Array(items) => Value::Object(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (i.to_string(), v))
                    .collect(),
            ),
            Value::Object(map) => Value::Object(map),
            Value::Model(model) => Value::Model(model),
            scalar => {
                let mut map = BTreeMap::new();
                map.insert("scalar".to_string(), scalar);
                Value::Object(map)
            }
        },
        FieldType::Model(_) => match raw {
            model @ Value::Model(_) => model,
            _ => Value::Null,
        },
    }
}

fn to_int(raw: &Value) -> i64 {
    match raw {
        Value::Null => 0,
        Value::Bool(b) => i64::from(*b),
        Value::Int(i) => *i,
        Value::Float(f) => *f as i64,
        Value::String(s) => parse_int(s),
        Value::Array(items) => i64::from(!items.is_empty()),
        Value::Object(map) => i64::from(!map.is_empty()),
        Value::Model(_) => 1,
    }
}

fn to_float(raw: &Value) -> f64 {
    match raw {
        Value::Float(f) => *f,
        Value::String(s) => parse_float(s),
        other => to_int(other) as f64,
    }
}

/// Integer prefix of `s`, accepting float notation (`"1.5e3"` is 1500).
fn parse_int(s: &str) -> i64 {
    let trimmed = s.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return i;
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return f as i64;
    }
    let end = numeric_prefix_len(trimmed, false);
    trimmed[..end].parse::<i64>().unwrap_or(0)
}

fn parse_float(s: &str) -> f64 {
    let trimmed = s.trim();
    if let Ok(f) = trimmed.parse::<f64>() {
        return f;
    }
    let end = numeric_prefix_len(trimmed, true);
    trimmed[..end].parse::<f64>().unwrap_or(0.0)
}

fn numeric_prefix_len(s: &str, allow_fraction: bool) -> usize {
    let mut seen_dot = false;
    let mut end = 0;
    for (i, c) in s.char_indices() {
        let accepted = c.is_ascii_digit()
            || (i == 0 && (c == '-' || c == '+'))
            || (allow_fraction && c == '.' && !seen_dot);
        if !accepted {
            break;
        }
        seen_dot |= c == '.';
        end = i + c.len_utf8();
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(field_type: FieldType) -> FieldDescriptor {
        FieldDescriptor::new("f", field_type)
    }

    #[test]
    fn numeric_conversions() {
        assert_eq!(convert(&FieldType::Int, Value::from("42abc")), Value::Int(42));
        assert_eq!(convert(&FieldType::Int, Value::from("1.5e3")), Value::Int(1500));
        assert_eq!(convert(&FieldType::Int, Value::from("abc")), Value::Int(0));
        assert_eq!(convert(&FieldType::Int, Value::Float(3.9)), Value::Int(3));
        assert_eq!(
            convert(&FieldType::Float, Value::from("-2.25 kg")),
            Value::Float(-2.25)
        );
        assert_eq!(convert(&FieldType::Float, Value::Int(2)), Value::Float(2.0));
    }

    #[test]
    fn bool_literals_win_over_truthiness() {
        assert_eq!(convert(&FieldType::Bool, Value::from("false")), Value::Bool(false));
        assert_eq!(convert(&FieldType::Bool, Value::from("true")), Value::Bool(true));
        assert_eq!(convert(&FieldType::Bool, Value::from("0")), Value::Bool(false));
        assert_eq!(convert(&FieldType::Bool, Value::from("no")), Value::Bool(true));
        assert_eq!(convert(&FieldType::Bool, Value::Int(0)), Value::Bool(false));
    }

    #[test]
    fn array_from_json_text() {
        assert_eq!(
            convert(&FieldType::Array, Value::from("[1,\"a\"]")),
            Value::from(vec![Value::Int(1), Value::from("a")])
        );
        assert_eq!(convert(&FieldType::Array, Value::from("[1,")), Value::Null);
        assert_eq!(
            convert(&FieldType::Array, Value::Int(7)),
            Value::from(vec![7])
        );
    }

    #[test]
    fn object_from_scalar_wraps_it() {
        let coerced = convert(&FieldType::Object, Value::Int(3));
        assert_eq!(coerced.as_object().unwrap().get("scalar"), Some(&Value::Int(3)));
    }

    #[test]
    fn nullable_empty_yields_default() {
        let nullable = field(FieldType::Int).nullable();
        assert_eq!(coerce(&nullable, Value::from("")), Value::Null);
        let with_default = field(FieldType::String).nullable().default("n/a");
        assert_eq!(coerce(&with_default, Value::Null), Value::from("n/a"));
        let strict = field(FieldType::Int);
        assert_eq!(coerce(&strict, Value::Null), Value::Int(0));
    }

    #[test]
    fn string_conversion_of_collections_is_json() {
        assert_eq!(
            convert(&FieldType::String, Value::from(vec![1, 2])),
            Value::from("[1,2]")
        );
        assert_eq!(convert(&FieldType::String, Value::Bool(true)), Value::from("1"));
    }
}
