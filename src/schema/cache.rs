//! In-memory mirror of live table definitions.
//!
//! Entries are immutable `Arc<Table>` values. A schema change clones the current value,
//! changes the clone, runs the native statements and only then swaps the entry, so a
//! reader never observes a half-applied definition.

use super::table::Table;
use crate::error::RunnerError;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default, Clone)]
pub struct MetadataCache {
    tables: HashMap<String, Arc<Table>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached definition; a miss is a caller error
    pub fn get(&self, name: &str) -> Result<Arc<Table>, RunnerError> {
        self.find(name)
            .ok_or_else(|| RunnerError::TableNotFound(name.to_string()))
    }

    pub fn find(&self, name: &str) -> Option<Arc<Table>> {
        self.tables.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn put(&mut self, table: Table) -> Arc<Table> {
        let table = Arc::new(table);
        self.tables.insert(table.name.clone(), Arc::clone(&table));
        table
    }

    /// Swap `old` for `new`, dropping the old entry if the name changed
    pub fn replace(&mut self, old: &Table, new: Table) -> Arc<Table> {
        if old.name != new.name {
            self.tables.remove(&old.name);
        }
        self.put(new)
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<Table>> {
        self.tables.remove(name)
    }

    /// Cached table names, sorted
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
