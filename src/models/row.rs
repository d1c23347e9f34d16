//! Decoded result rows.

use crate::error::{DbError, DbResult};
use crate::models::value::{FromValue, Value};
use serde::Serialize;

/// One decoded result row. Column lookup is case-insensitive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

static NULL: Value = Value::Null;

impl Row {
    /// Create a row from parallel column and value lists.
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Position of a column, ignoring case.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Value of a column. A column absent from the result reads as NULL.
    pub fn get(&self, name: &str) -> &Value {
        self.index_of(name)
            .and_then(|idx| self.values.get(idx))
            .unwrap_or(&NULL)
    }

    /// Value at a position.
    pub fn get_index(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Convert a column to a Rust value.
    pub fn get_as<T: FromValue>(&self, name: &str) -> DbResult<T> {
        T::from_value(self.get(name)).map_err(|e| match e {
            DbError::InvalidInput { message } => {
                DbError::invalid_input(format!("Column '{}': {}", name, message))
            }
            other => other,
        })
    }

    /// Consume the row into its values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Row {
        Row::new(
            vec!["Id".into(), "Name".into()],
            vec![Value::Int(1), Value::String("A".into())],
        )
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let row = sample();
        assert_eq!(row.get("name"), &Value::String("A".into()));
        assert_eq!(row.get_as::<i64>("ID").unwrap(), 1);
    }

    #[test]
    fn test_missing_column_is_null() {
        let row = sample();
        assert!(row.get("Price").is_null());
        assert_eq!(row.get_as::<Option<f64>>("Price").unwrap(), None);
        assert!(row.get_as::<f64>("Price").is_err());
    }

    #[test]
    fn test_conversion_error_names_column() {
        let err = sample().get_as::<i64>("Name").unwrap_err();
        assert!(err.to_string().contains("Column 'Name'"));
    }
}
