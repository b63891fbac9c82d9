//! Schema value objects, deterministic naming and the metadata cache.

pub mod cache;
pub mod column;
pub mod loader;
pub mod naming;
pub mod table;

pub use cache::MetadataCache;
pub use column::{Column, ColumnDefault, ColumnLength, ColumnType, GeneratedType, GenerationStrategy};
pub use naming::{foreign_key_name, index_name, unique_name};
pub use table::{ForeignKey, ReferentialAction, Table, TableCheck, TableIndex, TableUnique};
