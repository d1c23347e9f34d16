//! Table and column descriptors.

use crate::error::{DbError, DbResult};
use serde::Serialize;

/// One mapped column of a record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    /// Column name in the database.
    pub name: String,
    /// Member (struct field) the column maps to.
    pub member: String,
    /// Computed column: read from results, never written.
    pub result_only: bool,
}

/// Resolved mapping of a record type to its table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDescriptor {
    /// Empty when the record type declares no table.
    pub table_name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub primary_key: Option<String>,
    pub auto_increment: bool,
}

impl TableDescriptor {
    /// Whether the record type declared a table name.
    pub fn is_named(&self) -> bool {
        !self.table_name.is_empty()
    }

    /// Return the table name, or fail when the record type declares none.
    pub fn require_named(&self) -> DbResult<&str> {
        if self.is_named() {
            Ok(&self.table_name)
        } else {
            Err(DbError::schema(
                "Record type has no table name; refusing to generate SQL",
                self.columns
                    .iter()
                    .map(|c| c.member.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
            ))
        }
    }

    /// Look up the column mapped to a member.
    pub fn column_for_member(&self, member: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.member == member)
    }

    /// Look up a column by name, ignoring case.
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    fn is_auto_key(&self, column: &ColumnDescriptor) -> bool {
        self.auto_increment && self.primary_key.as_deref() == Some(column.name.as_str())
    }

    /// Whether the column participates in INSERT statements.
    pub fn is_writable(&self, column: &ColumnDescriptor) -> bool {
        !column.result_only && !self.is_auto_key(column)
    }

    /// Positions of the writable columns within `columns`.
    pub fn writable_indices(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| self.is_writable(c))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Columns included in INSERT statements, in declaration order.
    pub fn writable_columns(&self) -> Vec<&ColumnDescriptor> {
        self.columns.iter().filter(|c| self.is_writable(c)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, member: &str, result_only: bool) -> ColumnDescriptor {
        ColumnDescriptor {
            name: name.into(),
            member: member.into(),
            result_only,
        }
    }

    fn widget() -> TableDescriptor {
        TableDescriptor {
            table_name: "Widget".into(),
            columns: vec![
                column("Id", "id", false),
                column("Name", "name", false),
                column("Price", "price", false),
                column("Total", "total", true),
            ],
            primary_key: Some("Id".into()),
            auto_increment: true,
        }
    }

    #[test]
    fn test_writable_excludes_auto_key_and_result_only() {
        let table = widget();
        let names: Vec<_> = table.writable_columns().iter().map(|c| &c.name).collect();
        assert_eq!(names, ["Name", "Price"]);
        assert_eq!(table.writable_indices(), vec![1, 2]);
    }

    #[test]
    fn test_manual_key_is_writable() {
        let mut table = widget();
        table.auto_increment = false;
        assert_eq!(table.writable_indices(), vec![0, 1, 2]);
    }

    #[test]
    fn test_member_lookup() {
        let table = widget();
        assert_eq!(table.column_for_member("price").unwrap().name, "Price");
        assert!(table.column_for_member("missing").is_none());
        assert_eq!(table.column("NAME").unwrap().member, "name");
    }

    #[test]
    fn test_unnamed_table_fails_fast() {
        let mut table = widget();
        table.table_name.clear();
        assert!(!table.is_named());
        assert!(matches!(
            table.require_named(),
            Err(DbError::Schema { .. })
        ));
    }
}
