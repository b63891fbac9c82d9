//! Table definition metadata: indices, foreign keys, unique and check constraints.

use super::column::Column;
use super::naming::{foreign_key_name, index_name, unique_name};
use std::fmt;

/// Secondary index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableIndex {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub unique: bool,
    /// Rendered as a NULL_FILTERED index
    pub spatial: bool,
    pub fulltext: bool,
}

impl TableIndex {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: None,
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
            spatial: false,
            fulltext: false,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn spatial(mut self) -> Self {
        self.spatial = true;
        self
    }

    /// Explicit name, or the deterministic one for `table`
    pub fn name_for(&self, table: &str) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| index_name(table, &self.columns))
    }

    pub fn covers_single(&self, column: &str) -> bool {
        self.columns.len() == 1 && self.columns[0] == column
    }
}

/// ON DELETE / ON UPDATE action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferentialAction {
    Cascade,
    NoAction,
    Restrict,
    SetNull,
    SetDefault,
}

impl ReferentialAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_uppercase().as_str() {
            "CASCADE" => Some(ReferentialAction::Cascade),
            "NO ACTION" => Some(ReferentialAction::NoAction),
            "RESTRICT" => Some(ReferentialAction::Restrict),
            "SET NULL" => Some(ReferentialAction::SetNull),
            "SET DEFAULT" => Some(ReferentialAction::SetDefault),
            _ => None,
        }
    }
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Foreign key, realized as interleaving in the referenced table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
    /// Part of the table definition rather than a separate backing index
    pub interleaved: bool,
}

impl ForeignKey {
    pub fn new<I, S>(columns: I, referenced_table: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        Self {
            name: None,
            referenced_columns: columns.clone(),
            columns,
            referenced_table: referenced_table.into(),
            on_delete: None,
            on_update: None,
            interleaved: false,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn referencing<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.referenced_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = Some(action);
        self
    }

    pub fn interleaved(mut self) -> Self {
        self.interleaved = true;
        self
    }

    pub fn name_for(&self, table: &str) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| foreign_key_name(table, &self.columns))
    }
}

/// Unique constraint, backed by a unique index of the same name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableUnique {
    pub name: Option<String>,
    pub columns: Vec<String>,
}

impl TableUnique {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: None,
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name_for(&self, table: &str) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| unique_name(table, &self.columns))
    }

    /// The unique index that realizes this constraint
    pub fn backing_index(&self, table: &str) -> TableIndex {
        TableIndex::new(self.columns.clone())
            .named(self.name_for(table))
            .unique()
    }
}

/// Check constraint; the engine has none, kept so creation can be rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCheck {
    pub name: Option<String>,
    pub expression: String,
}

impl TableCheck {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            name: None,
            expression: expression.into(),
        }
    }
}

/// Table definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub indices: Vec<TableIndex>,
    pub foreign_keys: Vec<ForeignKey>,
    pub uniques: Vec<TableUnique>,
    pub checks: Vec<TableCheck>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indices: Vec::new(),
            foreign_keys: Vec::new(),
            uniques: Vec::new(),
            checks: Vec::new(),
        }
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn index(mut self, index: TableIndex) -> Self {
        self.indices.push(index);
        self
    }

    pub fn foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    pub fn unique(mut self, unique: TableUnique) -> Self {
        self.uniques.push(unique);
        self
    }

    pub fn check(mut self, check: TableCheck) -> Self {
        self.checks.push(check);
        self
    }

    /// Copy with every index, foreign key and unique constraint carrying a name
    pub fn normalized(&self) -> Table {
        let mut table = self.clone();
        for index in &mut table.indices {
            index.name = Some(index.name_for(&self.name));
        }
        for foreign_key in &mut table.foreign_keys {
            foreign_key.name = Some(foreign_key.name_for(&self.name));
        }
        for unique in &mut table.uniques {
            unique.name = Some(unique.name_for(&self.name));
        }
        table
    }

    pub fn primary_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.primary).collect()
    }

    pub fn primary_column_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.primary)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn find_index(&self, name: &str) -> Option<&TableIndex> {
        self.indices
            .iter()
            .find(|i| i.name_for(&self.name) == name)
    }

    pub fn find_foreign_key(&self, name: &str) -> Option<&ForeignKey> {
        self.foreign_keys
            .iter()
            .find(|fk| fk.name_for(&self.name) == name)
    }

    pub fn find_unique(&self, name: &str) -> Option<&TableUnique> {
        self.uniques.iter().find(|u| u.name_for(&self.name) == name)
    }

    /// First index made of exactly this one column
    pub fn single_column_index(&self, column: &str) -> Option<&TableIndex> {
        self.indices.iter().find(|i| i.covers_single(column))
    }

    /// Index-backed foreign key on exactly `column`
    pub fn single_column_foreign_key(&self, column: &str) -> Option<&ForeignKey> {
        self.foreign_keys
            .iter()
            .find(|fk| !fk.interleaved && fk.columns.len() == 1 && fk.columns[0] == column)
    }

    /// The foreign key realized as `INTERLEAVE IN PARENT` on the table itself
    pub fn interleave_parent(&self) -> Option<&ForeignKey> {
        self.foreign_keys.iter().find(|fk| fk.interleaved)
    }

    /// True when a unique index on exactly these columns exists
    pub fn has_unique_index_on(&self, columns: &[String]) -> bool {
        self.indices
            .iter()
            .any(|i| i.unique && i.columns.as_slice() == columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::column::ColumnType;

    fn orders() -> Table {
        Table::new("orders")
            .column(Column::new("id", ColumnType::String).primary())
            .column(Column::new("email", ColumnType::String))
            .column(Column::new("total", ColumnType::Numeric))
            .index(TableIndex::new(["email"]))
    }

    #[test]
    fn test_primary_columns() {
        assert_eq!(orders().primary_column_names(), vec!["id".to_string()]);
    }

    #[test]
    fn test_normalized_fills_names() {
        let table = orders()
            .unique(TableUnique::new(["email", "total"]))
            .foreign_key(ForeignKey::new(["id"], "customers"))
            .normalized();
        let index = &table.indices[0];
        assert_eq!(
            index.name.as_deref(),
            Some(index_name("orders", &["email".to_string()]).as_str())
        );
        assert!(table.uniques[0].name.as_deref().unwrap().starts_with("UQ_"));
        assert!(table.foreign_keys[0]
            .name
            .as_deref()
            .unwrap()
            .starts_with("FK_"));
    }

    #[test]
    fn test_find_by_generated_name() {
        let table = orders();
        let name = index_name("orders", &["email".to_string()]);
        assert!(table.find_index(&name).is_some());
        assert!(table.single_column_index("email").is_some());
        assert!(table.single_column_index("total").is_none());
    }

    #[test]
    fn test_foreign_key_coverage_ignores_interleave_parent() {
        let table = orders()
            .foreign_key(ForeignKey::new(["id"], "customers").interleaved())
            .foreign_key(ForeignKey::new(["total"], "totals"));
        assert!(table.single_column_foreign_key("id").is_none());
        assert_eq!(
            table.single_column_foreign_key("total").map(|fk| fk.referenced_table.as_str()),
            Some("totals")
        );
        assert_eq!(
            table.interleave_parent().map(|fk| fk.referenced_table.as_str()),
            Some("customers")
        );
    }

    #[test]
    fn test_referential_action_parse() {
        assert_eq!(
            ReferentialAction::parse("no action"),
            Some(ReferentialAction::NoAction)
        );
        assert_eq!(ReferentialAction::parse("CASCADE"), Some(ReferentialAction::Cascade));
        assert_eq!(ReferentialAction::parse("explode"), None);
    }

    #[test]
    fn test_unique_backing_index_shares_name() {
        let unique = TableUnique::new(["email"]);
        let index = unique.backing_index("orders");
        assert!(index.unique);
        assert_eq!(index.name, Some(unique.name_for("orders")));
    }
}
