//! DDL generation, column-change validation and up/down statement memory.

pub mod generator;
pub mod validator;

pub use generator::{
    build_add_column, build_alter_column, build_create_foreign_key, build_create_index,
    build_create_table, build_drop_column, build_drop_foreign_key, build_drop_index,
    build_drop_table, check_column_supported, check_foreign_key_supported,
    check_index_supported, synthesize_unique_indices,
};
pub use validator::validate_column_change;

/// A forward statement and its exact inverse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementPair {
    pub up: String,
    pub down: String,
}

impl StatementPair {
    pub fn new(up: impl Into<String>, down: impl Into<String>) -> Self {
        Self {
            up: up.into(),
            down: down.into(),
        }
    }

    /// The same pair run in the other direction
    pub fn inverted(self) -> Self {
        Self {
            up: self.down,
            down: self.up,
        }
    }
}

/// Up and down statements recorded by a runner, in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlInMemory {
    pub up: Vec<String>,
    pub down: Vec<String>,
}

impl SqlInMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, pairs: &[StatementPair]) {
        for pair in pairs {
            self.up.push(pair.up.clone());
            self.down.push(pair.down.clone());
        }
    }

    /// Down statements in replay order (last executed first)
    pub fn down_in_reverse(&self) -> Vec<String> {
        self.down.iter().rev().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.up.is_empty()
    }

    pub fn clear(&mut self) {
        self.up.clear();
        self.down.clear();
    }
}

/// Backtick-quote an identifier
pub fn quote(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "\\`"))
}

/// Backtick-quote and comma-join identifiers
pub fn quote_list(identifiers: &[String]) -> String {
    identifiers
        .iter()
        .map(|i| quote(i))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_replays_down_in_reverse() {
        let mut memory = SqlInMemory::new();
        memory.record(&[
            StatementPair::new("CREATE TABLE a", "DROP TABLE a"),
            StatementPair::new("CREATE INDEX i", "DROP INDEX i"),
        ]);
        assert_eq!(memory.up, vec!["CREATE TABLE a", "CREATE INDEX i"]);
        assert_eq!(memory.down_in_reverse(), vec!["DROP INDEX i", "DROP TABLE a"]);

        memory.clear();
        assert!(memory.is_empty());
    }

    #[test]
    fn test_inverted_swaps_direction() {
        let pair = StatementPair::new("up", "down").inverted();
        assert_eq!(pair.up, "down");
        assert_eq!(pair.down, "up");
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("orders"), "`orders`");
        assert_eq!(
            quote_list(&["a".to_string(), "b".to_string()]),
            "`a`, `b`"
        );
    }
}
