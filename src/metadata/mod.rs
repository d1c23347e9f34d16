//! Column/table metadata resolution.
//!
//! Record types declare their mapping statically (usually via
//! [`define_record!`](crate::define_record)); [`MetadataCache`] resolves each
//! declaration once into an immutable [`TableDescriptor`] shared by every
//! database handle.

pub mod cache;
pub mod descriptor;
#[macro_use]
pub mod macros;
pub mod record;

pub use cache::MetadataCache;
pub use descriptor::{ColumnDescriptor, TableDescriptor};
pub use record::{ColumnFlag, ColumnSpec, Field, FieldRef, Record, RecordDefinition};
