//! Query compilation: the WHERE/HAVING condition compiler and SELECT assembly.

mod select;
mod where_clause;

pub use select::{render_count, render_select, TableQuery};
pub use where_clause::{compile, escape_string, sql_literal, Clause, Conditions, Glue, Token, Where};
