//! Record types and typed field references.
//!
//! A record type describes its table statically through [`Record::definition`].
//! The definition is turned into a [`TableDescriptor`] once and cached by
//! [`MetadataCache`](super::MetadataCache). Builder methods refer to columns
//! through [`Field`] constants generated by `define_record!`, so a column is
//! always resolved from the owning type and member name rather than free text.

use crate::error::DbResult;
use crate::metadata::cache::MetadataCache;
use crate::metadata::descriptor::{ColumnDescriptor, TableDescriptor};
use crate::models::{Row, Value};
use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::Arc;

/// A type mapped to a table.
pub trait Record: Sized + Send + Sync + 'static {
    /// Static table and column declaration.
    fn definition() -> RecordDefinition;

    /// Member values, in column declaration order.
    fn values(&self) -> Vec<Value>;

    /// Build a record from a result row. Absent columns read as NULL.
    fn from_row(row: &Row) -> DbResult<Self>;
}

/// Column flag accepted by `define_record!`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnFlag {
    PrimaryKey,
    /// Implies [`ColumnFlag::PrimaryKey`].
    AutoIncrement,
    ResultOnly,
}

/// Static declaration of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub member: &'static str,
    pub column: &'static str,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub result_only: bool,
}

impl ColumnSpec {
    pub const fn new(member: &'static str, column: &'static str) -> Self {
        Self {
            member,
            column,
            primary_key: false,
            auto_increment: false,
            result_only: false,
        }
    }

    pub fn with_flags(mut self, flags: &[ColumnFlag]) -> Self {
        for flag in flags {
            match flag {
                ColumnFlag::PrimaryKey => self.primary_key = true,
                ColumnFlag::AutoIncrement => {
                    self.primary_key = true;
                    self.auto_increment = true;
                }
                ColumnFlag::ResultOnly => self.result_only = true,
            }
        }
        self
    }
}

/// Static declaration of a record type's table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDefinition {
    pub table: &'static str,
    pub columns: Vec<ColumnSpec>,
}

impl RecordDefinition {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, spec: ColumnSpec) -> Self {
        self.columns.push(spec);
        self
    }

    /// Resolve into a descriptor. The first primary-key column wins.
    pub fn into_descriptor(self) -> TableDescriptor {
        let key = self.columns.iter().find(|c| c.primary_key);
        let primary_key = key.map(|c| c.column.to_string());
        let auto_increment = key.is_some_and(|c| c.auto_increment);
        TableDescriptor {
            table_name: self.table.to_string(),
            columns: self
                .columns
                .iter()
                .map(|c| ColumnDescriptor {
                    name: c.column.to_string(),
                    member: c.member.to_string(),
                    result_only: c.result_only,
                })
                .collect(),
            primary_key,
            auto_increment,
        }
    }
}

/// Typed reference to one member of a record type.
pub struct Field<R> {
    member: &'static str,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for Field<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for Field<R> {}

impl<R> std::fmt::Debug for Field<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("record", &std::any::type_name::<R>())
            .field("member", &self.member)
            .finish()
    }
}

impl<R: Record> Field<R> {
    pub const fn new(member: &'static str) -> Self {
        Self {
            member,
            _record: PhantomData,
        }
    }

    pub fn member(&self) -> &'static str {
        self.member
    }

    /// Erase the record type.
    pub fn field(self) -> FieldRef {
        FieldRef::from(self)
    }

    /// Select this column under an explicit output alias.
    pub fn as_(self, alias: impl Into<String>) -> FieldRef {
        self.field().with_alias(alias)
    }

    /// Qualify this column with a table alias instead of the table name.
    pub fn of(self, table_alias: impl Into<String>) -> FieldRef {
        self.field().with_table_alias(table_alias)
    }
}

/// Record-erased field reference, as consumed by the query builder.
#[derive(Clone)]
pub struct FieldRef {
    pub(crate) member: &'static str,
    pub(crate) record: TypeId,
    pub(crate) record_name: &'static str,
    pub(crate) resolve: fn(&MetadataCache) -> Arc<TableDescriptor>,
    pub(crate) alias: Option<String>,
    pub(crate) table_alias: Option<String>,
}

impl std::fmt::Debug for FieldRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldRef")
            .field("record", &self.record_name)
            .field("member", &self.member)
            .field("alias", &self.alias)
            .field("table_alias", &self.table_alias)
            .finish()
    }
}

impl FieldRef {
    pub fn member(&self) -> &'static str {
        self.member
    }

    pub fn record_type(&self) -> TypeId {
        self.record
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn table_alias(&self) -> Option<&str> {
        self.table_alias.as_deref()
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_table_alias(mut self, table_alias: impl Into<String>) -> Self {
        self.table_alias = Some(table_alias.into());
        self
    }

    /// Resolve the owning table descriptor through the cache.
    pub fn table(&self, cache: &MetadataCache) -> Arc<TableDescriptor> {
        (self.resolve)(cache)
    }
}

impl<R: Record> From<Field<R>> for FieldRef {
    fn from(field: Field<R>) -> Self {
        Self {
            member: field.member,
            record: TypeId::of::<R>(),
            record_name: std::any::type_name::<R>(),
            resolve: MetadataCache::resolve::<R>,
            alias: None,
            table_alias: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let spec = ColumnSpec::new("id", "Id").with_flags(&[ColumnFlag::AutoIncrement]);
        assert!(spec.primary_key);
        assert!(spec.auto_increment);
        assert!(!spec.result_only);

        let spec = ColumnSpec::new("total", "Total").with_flags(&[ColumnFlag::ResultOnly]);
        assert!(spec.result_only);
        assert!(!spec.primary_key);
    }

    #[test]
    fn test_flag_names() {
        assert_eq!(crate::column_flag!(primary_key), ColumnFlag::PrimaryKey);
        assert_eq!(crate::column_flag!(auto_increment), ColumnFlag::AutoIncrement);
        assert_eq!(crate::column_flag!(result_only), ColumnFlag::ResultOnly);
    }

    #[test]
    fn test_into_descriptor() {
        let descriptor = RecordDefinition::new("Widget")
            .column(ColumnSpec::new("id", "Id").with_flags(&[ColumnFlag::PrimaryKey, ColumnFlag::AutoIncrement]))
            .column(ColumnSpec::new("name", "Name"))
            .into_descriptor();
        assert_eq!(descriptor.table_name, "Widget");
        assert_eq!(descriptor.primary_key.as_deref(), Some("Id"));
        assert!(descriptor.auto_increment);
        assert_eq!(descriptor.columns.len(), 2);
        assert_eq!(descriptor.columns[1].member, "name");
    }

    #[test]
    fn test_no_key() {
        let descriptor = RecordDefinition::new("Log")
            .column(ColumnSpec::new("text", "Text"))
            .into_descriptor();
        assert_eq!(descriptor.primary_key, None);
        assert!(!descriptor.auto_increment);
    }
}
