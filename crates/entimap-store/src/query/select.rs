//! SELECT assembly for custom tables.

use super::where_clause::{compile, Where};
use crate::errors::Result;
use entimap_core::host::Dialect;

/// Arguments of a table query.
///
/// Clauses render in SQL order: WHERE, GROUP BY, HAVING, ORDER BY, LIMIT,
/// OFFSET.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableQuery {
    pub where_clause: Option<Where>,
    /// `column` or `column DESC`
    pub order_by: Vec<String>,
    pub group_by: Vec<String>,
    pub having: Option<Where>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub distinct: bool,
}

impl TableQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, where_clause: impl Into<Where>) -> Self {
        self.where_clause = Some(where_clause.into());
        self
    }

    pub fn order_by(mut self, spec: &str) -> Self {
        self.order_by.push(spec.to_string());
        self
    }

    pub fn group_by(mut self, column: &str) -> Self {
        self.group_by.push(column.to_string());
        self
    }

    pub fn having(mut self, having: impl Into<Where>) -> Self {
        self.having = Some(having.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}

/// Render `SELECT columns FROM table ...`.
///
/// # Errors
///
/// Propagates WHERE/HAVING compilation errors.
pub fn render_select(
    table: &str,
    columns: &[String],
    query: &TableQuery,
    dialect: Dialect,
) -> Result<String> {
    let columns: Vec<String> = columns
        .iter()
        .map(|column| dialect.quote_identifier(column))
        .collect();
    let mut sql = String::from("SELECT ");
    if query.distinct {
        sql.push_str("DISTINCT ");
    }
    sql.push_str(&columns.join(", "));
    sql.push_str(" FROM ");
    sql.push_str(&dialect.quote_identifier(table));
    push_tail(&mut sql, query, dialect)?;
    Ok(sql)
}

/// Render `SELECT COUNT(*) FROM table ...`. Limit and offset are ignored.
///
/// # Errors
///
/// Propagates WHERE/HAVING compilation errors.
pub fn render_count(table: &str, query: &TableQuery, dialect: Dialect) -> Result<String> {
    let unpaged = TableQuery {
        limit: None,
        offset: None,
        order_by: Vec::new(),
        ..query.clone()
    };
    let mut sql = format!("SELECT COUNT(*) AS total FROM {}", dialect.quote_identifier(table));
    push_tail(&mut sql, &unpaged, dialect)?;
    Ok(sql)
}

fn push_tail(sql: &mut String, query: &TableQuery, dialect: Dialect) -> Result<()> {
    push_condition(sql, " WHERE ", query.where_clause.as_ref(), dialect)?;
    if !query.group_by.is_empty() {
        sql.push_str(" GROUP BY ");
        sql.push_str(&query.group_by.join(", "));
    }
    push_condition(sql, " HAVING ", query.having.as_ref(), dialect)?;
    if !query.order_by.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&query.order_by.join(", "));
    }
    match (query.limit, query.offset.filter(|offset| *offset > 0)) {
        (Some(limit), offset) => {
            sql.push_str(&format!(" LIMIT {limit}"));
            if let Some(offset) = offset {
                sql.push_str(&format!(" OFFSET {offset}"));
            }
        }
        // Both dialects need a LIMIT before OFFSET.
        (None, Some(offset)) => {
            let unbounded = match dialect {
                Dialect::Sqlite => "-1",
                Dialect::MySql => "18446744073709551615",
            };
            sql.push_str(&format!(" LIMIT {unbounded} OFFSET {offset}"));
        }
        (None, None) => {}
    }
    Ok(())
}

/// Append `keyword` and the compiled condition, unless it compiles to nothing.
fn push_condition(
    sql: &mut String,
    keyword: &str,
    condition: Option<&Where>,
    dialect: Dialect,
) -> Result<()> {
    let Some(condition) = condition.filter(|c| !c.is_empty()) else {
        return Ok(());
    };
    let compiled = compile(condition, dialect)?;
    if !compiled.trim().is_empty() {
        sql.push_str(keyword);
        sql.push_str(&compiled);
    }
    Ok(())
}
