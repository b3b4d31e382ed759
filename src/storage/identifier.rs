//! SQL identifiers and static row filters.
//!
//! Dependency checks, cascade steps and merge relations are declared as data
//! and may come from configuration, so every table and column name is checked
//! before it is spliced into a statement. Values are always bound as
//! parameters; only identifiers are formatted into SQL text.

use super::traits::{StorageError, StorageResult};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};

/// Check that `name` is a plain SQL identifier (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn validate_identifier(name: &str) -> StorageResult<()> {
    let mut chars = name.chars();
    let valid_head = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_head && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(StorageError::InvalidIdentifier(name.to_string()))
    }
}

/// An equality filter restricting a relation to a subset of its rows,
/// e.g. `subject_type = 'person'` on the shared identifier table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFilter {
    pub column: String,
    pub value: String,
}

impl RowFilter {
    pub fn new(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn validate(&self) -> StorageResult<()> {
        validate_identifier(&self.column)
    }
}

/// Render the `AND column = ?N` fragment for an optional filter.
///
/// Returns the SQL fragment (empty without a filter) and the value to bind at
/// position `param_index`.
pub(crate) fn filter_clause(filter: Option<&RowFilter>, param_index: usize) -> (String, Option<&String>) {
    match filter {
        Some(f) => (format!(" AND {} = ?{}", f.column, param_index), Some(&f.value)),
        None => (String::new(), None),
    }
}

/// Append an optional filter value to positional parameters.
pub(crate) fn bind_filter<'a>(mut params: Vec<&'a dyn ToSql>, value: Option<&'a String>) -> Vec<&'a dyn ToSql> {
    if let Some(v) = value {
        params.push(v);
    }
    params
}
