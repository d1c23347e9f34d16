//! Process-wide table descriptor cache.

use crate::metadata::descriptor::TableDescriptor;
use crate::metadata::record::Record;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Memoized descriptors keyed by record type.
///
/// Resolution is a pure function of the record's static definition, so a
/// racing double insert stores identical values and the first one is kept.
#[derive(Debug, Default)]
pub struct MetadataCache {
    tables: RwLock<HashMap<TypeId, Arc<TableDescriptor>>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve (and memoize) the descriptor for a record type.
    pub fn resolve<R: Record>(&self) -> Arc<TableDescriptor> {
        let key = TypeId::of::<R>();
        if let Some(found) = self
            .tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return found.clone();
        }

        let descriptor = Arc::new(R::definition().into_descriptor());
        debug!(
            record = std::any::type_name::<R>(),
            table = %descriptor.table_name,
            columns = descriptor.columns.len(),
            "Resolved table descriptor"
        );

        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_insert(descriptor)
            .clone()
    }

    /// Number of resolved record types.
    pub fn len(&self) -> usize {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
