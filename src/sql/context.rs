//! Shared SQL generation context.

use crate::dialect::Dialect;
use crate::error::{DbError, DbResult};
use crate::metadata::{FieldRef, MetadataCache, Record, TableDescriptor};
use crate::sql::builder::Sql;
use std::sync::Arc;

/// Dialect plus metadata cache. Cheap to clone; every builder carries one.
#[derive(Debug, Clone)]
pub struct SqlContext {
    dialect: Arc<Dialect>,
    metadata: Arc<MetadataCache>,
}

impl SqlContext {
    pub fn new(dialect: Arc<Dialect>, metadata: Arc<MetadataCache>) -> Self {
        Self { dialect, metadata }
    }

    /// Context with a private metadata cache, for building SQL offline.
    pub fn for_dialect(dialect: Dialect) -> Self {
        Self::new(Arc::new(dialect), Arc::new(MetadataCache::new()))
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn dialect_arc(&self) -> Arc<Dialect> {
        self.dialect.clone()
    }

    pub fn metadata(&self) -> &MetadataCache {
        &self.metadata
    }

    pub fn metadata_arc(&self) -> Arc<MetadataCache> {
        self.metadata.clone()
    }

    /// Start a new statement.
    pub fn sql(&self) -> Sql {
        Sql::new(self.clone())
    }

    pub fn table<R: Record>(&self) -> Arc<TableDescriptor> {
        self.metadata.resolve::<R>()
    }

    /// Quoted name of a record's table. Fails for unnamed tables.
    pub fn quoted_table<R: Record>(&self) -> DbResult<String> {
        let table = self.table::<R>();
        Ok(self.dialect.quote_table(table.require_named()?))
    }

    /// Resolve a field to `(qualifier, column name)`, where the qualifier is
    /// the table alias when one is set and the table name otherwise.
    pub(crate) fn resolve_field(&self, field: &FieldRef) -> DbResult<(String, String)> {
        let table = field.table(&self.metadata);
        let column = table.column_for_member(field.member()).ok_or_else(|| {
            DbError::builder(format!(
                "Member '{}' is not mapped on record {}",
                field.member(),
                field.record_name
            ))
        })?;
        let qualifier = match field.table_alias() {
            Some(alias) => alias.to_string(),
            None => table.require_named()?.to_string(),
        };
        Ok((qualifier, column.name.clone()))
    }

    /// `quote(table).quote(column)` for a field.
    pub fn quoted_field(&self, field: &FieldRef) -> DbResult<String> {
        let (qualifier, column) = self.resolve_field(field)?;
        Ok(format!(
            "{}.{}",
            self.dialect.quote_table(&qualifier),
            self.dialect.quote(&column)
        ))
    }

    /// Quoted bare column name (no table), as used in SET and INSERT lists.
    pub fn quoted_column(&self, field: &FieldRef) -> DbResult<String> {
        let (_, column) = self.resolve_field(field)?;
        Ok(self.dialect.quote(&column))
    }
}
