//! WHERE/HAVING compiler
//!
//! A condition list is a sequence of [`Token`]s: clauses and the glue words
//! between them. Compilation follows one rule for glue: the default is `AND`,
//! a glue token seen before the first clause replaces the default, and a glue
//! token between clauses overrides only the next join.
//!
//! ```
//! use entimap_core::host::Dialect;
//! use entimap_store::query::{compile, Conditions};
//!
//! let conditions = Conditions::new().raw("a = 1").or().raw("b = 2").raw("c = 3");
//! assert_eq!(
//!     compile(&conditions.into(), Dialect::Sqlite).unwrap(),
//!     "(a = 1) OR (b = 2) AND (c = 3)"
//! );
//! ```

use crate::errors::Result;
use entimap_core::errors::EntimapError;
use entimap_core::host::Dialect;
use entimap_core::value::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Glue {
    And,
    Or,
}

impl Glue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Glue::And => "AND",
            Glue::Or => "OR",
        }
    }

    /// `AND` or `OR` in any case.
    pub fn parse(word: &str) -> Option<Glue> {
        let word = word.trim();
        if word.eq_ignore_ascii_case("AND") {
            Some(Glue::And)
        } else if word.eq_ignore_ascii_case("OR") {
            Some(Glue::Or)
        } else {
            None
        }
    }
}

impl fmt::Display for Glue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// SQL passed through, parenthesized
    Raw(String),
    /// Nested condition list, parenthesized
    Group(Conditions),
    /// `column operator value`
    Compare {
        column: String,
        operator: Option<String>,
        value: Value,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Glue(Glue),
    Clause(Clause),
}

/// Fluent builder for a condition list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    tokens: Vec<Token>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// True when nothing would compile: no clauses, or only empty groups.
    pub fn is_empty(&self) -> bool {
        self.tokens.iter().all(|token| match token {
            Token::Glue(_) => true,
            Token::Clause(Clause::Group(group)) => group.is_empty(),
            Token::Clause(_) => false,
        })
    }

    pub fn push(mut self, token: Token) -> Self {
        self.tokens.push(token);
        self
    }

    pub fn glue(self, glue: Glue) -> Self {
        self.push(Token::Glue(glue))
    }

    pub fn and(self) -> Self {
        self.glue(Glue::And)
    }

    pub fn or(self) -> Self {
        self.glue(Glue::Or)
    }

    pub fn raw(self, sql: impl Into<String>) -> Self {
        self.push(Token::Clause(Clause::Raw(sql.into())))
    }

    pub fn group(self, conditions: Conditions) -> Self {
        self.push(Token::Clause(Clause::Group(conditions)))
    }

    /// Keyed condition. `key` is `column` or `column operator`, e.g.
    /// `"price >="` or `"status NOT IN"`.
    pub fn with(self, key: &str, value: impl Into<Value>) -> Self {
        let key = key.trim();
        let (column, operator) = match key.split_once(char::is_whitespace) {
            Some((column, operator)) => (column, Some(operator.trim())),
            None => (key, None),
        };
        self.push(Token::Clause(Clause::Compare {
            column: column.to_string(),
            operator: operator.filter(|op| !op.is_empty()).map(str::to_string),
            value: value.into(),
        }))
    }

    /// Explicit column and operator.
    pub fn compare(self, column: &str, operator: &str, value: impl Into<Value>) -> Self {
        self.push(Token::Clause(Clause::Compare {
            column: column.to_string(),
            operator: Some(operator.to_string()),
            value: value.into(),
        }))
    }

    /// `EXISTS (subquery)`
    pub fn exists(self, subquery: &str) -> Self {
        self.with("EXISTS", subquery)
    }

    /// `NOT EXISTS (subquery)`
    pub fn not_exists(self, subquery: &str) -> Self {
        self.with("NOT EXISTS", subquery)
    }

    /// Build from the JSON form of the condition DSL: an array mixes glue
    /// words, raw fragments, nested arrays and objects of keyed conditions;
    /// an object is a list of keyed conditions.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for positional numbers, booleans or nulls.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        let mut conditions = Conditions::new();
        match json {
            serde_json::Value::Object(map) => {
                for (key, value) in map {
                    conditions = conditions.with(key, Value::from(value.clone()));
                }
            }
            serde_json::Value::Array(items) => {
                for item in items {
                    conditions = match item {
                        serde_json::Value::String(s) => match Glue::parse(s) {
                            Some(glue) => conditions.glue(glue),
                            None => conditions.raw(s.clone()),
                        },
                        serde_json::Value::Array(_) => conditions.group(Self::from_json(item)?),
                        serde_json::Value::Object(map) => {
                            let mut keyed = conditions;
                            for (key, value) in map {
                                keyed = keyed.with(key, Value::from(value.clone()));
                            }
                            keyed
                        }
                        other => {
                            return Err(EntimapError::InvalidInput {
                                reason: format!("unsupported positional condition {other}"),
                            })
                        }
                    };
                }
            }
            other => {
                return Err(EntimapError::InvalidInput {
                    reason: format!("conditions must be an array or object, got {other}"),
                })
            }
        }
        Ok(conditions)
    }
}

/// A WHERE or HAVING argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Where {
    /// Passed through untouched
    Raw(String),
    Conditions(Conditions),
}

impl Where {
    pub fn is_empty(&self) -> bool {
        match self {
            Where::Raw(sql) => sql.trim().is_empty(),
            Where::Conditions(conditions) => conditions.is_empty(),
        }
    }

    /// A JSON string is raw SQL, anything else goes through
    /// [`Conditions::from_json`].
    ///
    /// # Errors
    ///
    /// See [`Conditions::from_json`].
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        match json {
            serde_json::Value::String(sql) => Ok(Where::Raw(sql.clone())),
            other => Conditions::from_json(other).map(Where::Conditions),
        }
    }
}

impl From<&str> for Where {
    fn from(sql: &str) -> Self {
        Where::Raw(sql.to_string())
    }
}

impl From<String> for Where {
    fn from(sql: String) -> Self {
        Where::Raw(sql)
    }
}

impl From<Conditions> for Where {
    fn from(conditions: Conditions) -> Self {
        Where::Conditions(conditions)
    }
}

/// Compile a WHERE/HAVING argument to SQL text.
///
/// # Errors
///
/// `Sql` when a `BETWEEN` condition does not carry exactly two values.
pub fn compile(where_clause: &Where, dialect: Dialect) -> Result<String> {
    match where_clause {
        Where::Raw(sql) => Ok(sql.clone()),
        Where::Conditions(conditions) => compile_conditions(conditions, Glue::And, dialect),
    }
}

fn compile_conditions(conditions: &Conditions, glue: Glue, dialect: Dialect) -> Result<String> {
    let mut default_glue = glue;
    let mut next_glue = glue;
    let mut is_first = true;
    let mut parts: Vec<String> = Vec::new();

    for token in conditions.tokens() {
        let clause = match token {
            Token::Glue(glue) => {
                next_glue = *glue;
                if is_first {
                    default_glue = *glue;
                }
                continue;
            }
            Token::Clause(clause) => clause,
        };
        let compiled = match clause {
            Clause::Raw(sql) => format!("({sql})"),
            Clause::Group(group) => {
                let inner = compile_conditions(group, Glue::And, dialect)?;
                if inner.is_empty() {
                    continue;
                }
                format!("({inner})")
            }
            Clause::Compare {
                column,
                operator,
                value,
            } => compile_comparison(column, operator.as_deref(), value, dialect)?,
        };
        if !is_first {
            parts.push(next_glue.as_str().to_string());
            next_glue = default_glue;
        }
        parts.push(compiled);
        is_first = false;
    }

    Ok(parts.join(" "))
}

fn compile_comparison(
    column: &str,
    operator: Option<&str>,
    value: &Value,
    dialect: Dialect,
) -> Result<String> {
    let value = match value {
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other.clone(),
    };
    let mut operator = match operator {
        Some(op) => normalize_operator(op),
        None if matches!(value, Value::Array(_)) => "IN".to_string(),
        None => "=".to_string(),
    };

    let operand = match &value {
        Value::String(s) if is_select(s) => {
            // The column word is the operator for EXISTS checks. A `NOT EXISTS`
            // key arrives as column `NOT` with operator `EXISTS` and needs nothing.
            let column_word = normalize_operator(column);
            if column_word == "EXISTS" || column_word == "NOT EXISTS" {
                operator.clear();
            }
            format!("({s})")
        }
        _ if operator == "BETWEEN" || operator == "NOT BETWEEN" => match value.as_array() {
            Some([low, high]) => {
                format!("{} AND {}", sql_literal(low, dialect), sql_literal(high, dialect))
            }
            _ => {
                return Err(EntimapError::sql(format!(
                    "The condition for the column {column} must be an array with two values."
                )))
            }
        },
        _ => sql_literal(&value, dialect),
    };

    if operand == "NULL" && operator != "IS" && operator != "IS NOT" {
        operator = match operator.as_str() {
            "!=" | "<>" | "NOT IN" | "NOT LIKE" => "IS NOT".to_string(),
            _ => "IS".to_string(),
        };
    }

    Ok([column, operator.as_str(), operand.as_str()]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" "))
}

/// Uppercase with inner whitespace collapsed: `not  in` becomes `NOT IN`.
fn normalize_operator(operator: &str) -> String {
    operator
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

fn is_select(text: &str) -> bool {
    let mut chars = text.char_indices();
    match (text.get(..6), chars.nth(6)) {
        (Some(word), Some((_, next))) => word.eq_ignore_ascii_case("SELECT") && next.is_whitespace(),
        _ => false,
    }
}

/// Render a value as an SQL literal.
///
/// Booleans become `TRUE`/`FALSE`, null `NULL`, numbers pass through,
/// strings are escaped and quoted, and lists become a parenthesized tuple.
pub fn sql_literal(value: &Value, dialect: Dialect) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) if f.is_finite() => f.to_string(),
        Value::Float(_) => "NULL".to_string(),
        Value::String(s) => format!("'{}'", escape_string(s, dialect)),
        Value::Array(items) => tuple(items.iter(), dialect),
        Value::Object(map) => tuple(map.values(), dialect),
        Value::Model(_) => "''".to_string(),
    }
}

fn tuple<'a>(items: impl Iterator<Item = &'a Value>, dialect: Dialect) -> String {
    let rendered: Vec<String> = items.map(|item| sql_literal(item, dialect)).collect();
    format!("({})", rendered.join(","))
}

/// Escape string contents for a single-quoted literal.
pub fn escape_string(text: &str, dialect: Dialect) -> String {
    match dialect {
        Dialect::Sqlite => text.replace('\0', "").replace('\'', "''"),
        Dialect::MySql => {
            let mut escaped = String::with_capacity(text.len());
            for c in text.chars() {
                match c {
                    '\0' => escaped.push_str("\\0"),
                    '\n' => escaped.push_str("\\n"),
                    '\r' => escaped.push_str("\\r"),
                    '\\' => escaped.push_str("\\\\"),
                    '\'' => escaped.push_str("\\'"),
                    '"' => escaped.push_str("\\\""),
                    '\x1a' => escaped.push_str("\\Z"),
                    c => escaped.push(c),
                }
            }
            escaped
        }
    }
}
