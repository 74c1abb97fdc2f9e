//! Schema introspection and the staleness-bounded snapshot cache.

pub mod cache;
pub mod introspect;
pub mod snapshot;

pub use cache::{MEMORY_TTL_SECS, STORE_TTL_SECS, SchemaCache};
pub use introspect::SchemaIntrospector;
pub use snapshot::{ColumnSchema, SchemaSnapshot, TableSchema};
