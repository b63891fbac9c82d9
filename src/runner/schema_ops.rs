//! Schema-change operations on [`SpannerQueryRunner`].

use super::SpannerQueryRunner;
use crate::ddl::{
    build_add_column, build_create_foreign_key, build_create_index, build_create_table,
    build_drop_column, build_drop_foreign_key, build_drop_index, build_drop_table,
    synthesize_unique_indices, validate_column_change, StatementPair,
};
use crate::error::{RunnerError, Unsupported};
use crate::executor::SpannerExecutor;
use crate::extended_schema::ExtendedSchemaStore;
use crate::schema::{unique_name, Column, ForeignKey, Table, TableIndex, TableUnique};
use std::sync::Arc;

impl SpannerQueryRunner {
    /// Cached definition of `name`, loading it from the engine on a miss
    fn resolve_table(&mut self, name: &str) -> Result<Option<Arc<Table>>, RunnerError> {
        if let Some(table) = self.cache.find(name) {
            return Ok(Some(table));
        }
        Ok(self.load_tables(&[name.to_string()])?.into_iter().next())
    }

    fn require_table(&mut self, name: &str) -> Result<Arc<Table>, RunnerError> {
        self.resolve_table(name)?
            .ok_or_else(|| RunnerError::TableNotFound(name.to_string()))
    }

    /// Run `f` against the extended-schema store, creating and loading the shadow table
    /// first. Skipped while statements are only being recorded.
    fn with_extended_schema<F>(&mut self, f: F) -> Result<(), RunnerError>
    where
        F: FnOnce(&mut ExtendedSchemaStore, &dyn SpannerExecutor) -> Result<(), RunnerError>,
    {
        if self.sql_memory_mode {
            log::debug!("sql memory enabled; extended schema left untouched");
            return Ok(());
        }
        self.create_and_load_schema_table_if_not_exists()?;
        let executor = self.connect()?;
        f(&mut self.extended, &*executor)
    }

    fn sync_extended_column(
        &mut self,
        table: &str,
        column: &Column,
        removing: bool,
    ) -> Result<(), RunnerError> {
        let known = self.extended.metadata_for(table, &column.name).is_some();
        if !known && !column.has_extended_metadata() {
            return Ok(());
        }
        self.with_extended_schema(|store, executor| {
            store.sync_column(executor, table, column, removing)
        })
    }

    // ---- tables ----

    /// Create `table` with its indices and, when asked, its interleave parent
    pub fn create_table(
        &mut self,
        table: Table,
        if_not_exists: bool,
        create_foreign_keys: bool,
        create_indices: bool,
    ) -> Result<(), RunnerError> {
        self.ensure_open()?;
        if self.cache.contains(&table.name) {
            if if_not_exists {
                return Ok(());
            }
            return Err(RunnerError::AlreadyExists {
                kind: "table",
                name: table.name,
            });
        }
        if if_not_exists && self.has_table(&table.name)? {
            return Ok(());
        }

        let mut table = table.normalized();
        if create_foreign_keys {
            for foreign_key in &mut table.foreign_keys {
                foreign_key.interleaved = true;
            }
        } else {
            table.foreign_keys.clear();
        }
        if !create_indices {
            table.indices.clear();
        }
        let synthesized = synthesize_unique_indices(&table);
        table.indices.extend(synthesized);

        let pairs = build_create_table(&table, create_foreign_keys)?;
        self.execute_pairs(pairs)?;
        log::info!("created table {}", table.name);

        let cached = self.cache.put(table);
        if cached.name != self.extended.table_name() {
            for column in cached.columns.iter().filter(|c| c.has_extended_metadata()) {
                self.sync_extended_column(&cached.name, column, false)?;
            }
        }
        Ok(())
    }

    /// Drop `name`, its indices first unless `drop_indices` is false
    pub fn drop_table(
        &mut self,
        name: &str,
        if_exists: bool,
        drop_foreign_keys: bool,
        drop_indices: bool,
    ) -> Result<(), RunnerError> {
        self.ensure_open()?;
        let table = match self.resolve_table(name)? {
            Some(table) => table,
            None if if_exists => return Ok(()),
            None => return Err(RunnerError::TableNotFound(name.to_string())),
        };

        let mut pairs = build_drop_table(&table, drop_foreign_keys)?;
        if !drop_indices {
            // DROP TABLE is always the last pair
            pairs = pairs.split_off(pairs.len() - 1);
        }
        self.execute_pairs(pairs)?;
        self.cache.remove(&table.name);
        log::info!("dropped table {}", table.name);

        let has_metadata = table.columns.iter().any(|c| {
            c.has_extended_metadata() || self.extended.metadata_for(&table.name, &c.name).is_some()
        });
        if has_metadata && table.name != self.extended.table_name() {
            self.with_extended_schema(|store, executor| store.remove_table(executor, &table))?;
        }
        Ok(())
    }

    pub fn rename_table(&mut self, old_name: &str, new_name: &str) -> Result<(), RunnerError> {
        Err(Unsupported::TableRename {
            from: old_name.to_string(),
            to: new_name.to_string(),
        }
        .into())
    }

    // ---- columns ----

    pub fn add_column(&mut self, table_name: &str, column: Column) -> Result<(), RunnerError> {
        self.ensure_open()?;
        let table = self.require_table(table_name)?;
        if table.find_column(&column.name).is_some() {
            return Err(RunnerError::AlreadyExists {
                kind: "column",
                name: format!("{}.{}", table.name, column.name),
            });
        }
        if column.primary {
            return Err(Unsupported::AddPrimaryColumn {
                column: column.name,
            }
            .into());
        }

        let mut updated = table.as_ref().clone();
        let mut pairs = vec![build_add_column(&table.name, &column)?];
        updated.columns.push(column.clone());
        for index in synthesize_unique_indices(&updated) {
            pairs.push(build_create_index(&table.name, &index)?);
            updated.indices.push(index);
        }

        self.execute_pairs(pairs)?;
        self.cache.replace(&table, updated);
        self.sync_extended_column(&table.name, &column, false)
    }

    /// Add columns one at a time, in order
    pub fn add_columns(&mut self, table_name: &str, columns: Vec<Column>) -> Result<(), RunnerError> {
        for column in columns {
            self.add_column(table_name, column)?;
        }
        Ok(())
    }

    pub fn rename_column(
        &mut self,
        table_name: &str,
        old_name: &str,
        new_name: &str,
    ) -> Result<(), RunnerError> {
        log::debug!("rename of {}.{} rejected", table_name, old_name);
        Err(Unsupported::ColumnRename {
            from: old_name.to_string(),
            to: new_name.to_string(),
        }
        .into())
    }

    /// Change column `old_name` of `table_name` into `column`.
    ///
    /// Only whitelisted changes reach the engine; unique-flag toggles create or drop
    /// the backing unique index.
    pub fn change_column(
        &mut self,
        table_name: &str,
        old_name: &str,
        column: Column,
    ) -> Result<(), RunnerError> {
        self.ensure_open()?;
        let table = self.require_table(table_name)?;
        let old = table
            .find_column(old_name)
            .cloned()
            .ok_or_else(|| RunnerError::ColumnNotFound {
                table: table.name.clone(),
                column: old_name.to_string(),
            })?;

        let mut pairs: Vec<StatementPair> =
            validate_column_change(&table, &old, &column)?.into_iter().collect();
        let mut updated = table.as_ref().clone();
        let single = vec![column.name.clone()];

        if old.unique && !column.unique {
            if let Some(position) = updated
                .indices
                .iter()
                .position(|i| i.unique && i.columns == single)
            {
                let index = updated.indices.remove(position);
                pairs.push(build_drop_index(&table.name, &index)?);
                let index_name = index.name_for(&table.name);
                updated
                    .uniques
                    .retain(|u| u.name_for(&table.name) != index_name);
            }
        }

        if let Some(slot) = updated.columns.iter_mut().find(|c| c.name == old.name) {
            *slot = column.clone();
        }
        if column.unique && !column.primary && !updated.has_unique_index_on(&single) {
            let index = TableIndex::new(single.clone())
                .named(unique_name(&table.name, &single))
                .unique();
            pairs.push(build_create_index(&table.name, &index)?);
            updated.indices.push(index);
        }

        self.execute_pairs(pairs)?;
        self.cache.replace(&table, updated);
        if old.has_extended_metadata() || column.has_extended_metadata() {
            self.sync_extended_column(&table.name, &column, false)?;
        }
        Ok(())
    }

    /// Apply `(old name, new definition)` changes one at a time, in order
    pub fn change_columns(
        &mut self,
        table_name: &str,
        changes: Vec<(String, Column)>,
    ) -> Result<(), RunnerError> {
        for (old_name, column) in changes {
            self.change_column(table_name, &old_name, column)?;
        }
        Ok(())
    }

    /// Drop a column together with every index and unique constraint that uses it
    pub fn drop_column(&mut self, table_name: &str, column_name: &str) -> Result<(), RunnerError> {
        self.ensure_open()?;
        let table = self.require_table(table_name)?;
        let column = table
            .find_column(column_name)
            .cloned()
            .ok_or_else(|| RunnerError::ColumnNotFound {
                table: table.name.clone(),
                column: column_name.to_string(),
            })?;
        if column.primary {
            return Err(Unsupported::DropPrimaryColumn {
                column: column.name,
            }
            .into());
        }
        if let Some(foreign_key) = table
            .foreign_keys
            .iter()
            .find(|fk| fk.columns.contains(&column.name))
        {
            return Err(Unsupported::DropForeignKeyColumn {
                column: column.name,
                foreign_key: foreign_key.name_for(&table.name),
            }
            .into());
        }

        let mut updated = table.as_ref().clone();
        let (dropped, kept): (Vec<TableIndex>, Vec<TableIndex>) = updated
            .indices
            .drain(..)
            .partition(|i| i.columns.contains(&column.name));
        updated.indices = kept;
        updated.uniques.retain(|u| !u.columns.contains(&column.name));
        updated.columns.retain(|c| c.name != column.name);

        let mut pairs = Vec::with_capacity(dropped.len() + 1);
        for index in &dropped {
            pairs.push(build_drop_index(&table.name, index)?);
        }
        pairs.push(build_drop_column(&table.name, &column)?);

        self.execute_pairs(pairs)?;
        self.cache.replace(&table, updated);
        self.sync_extended_column(&table.name, &column, true)
    }

    /// Drop columns one at a time, in order
    pub fn drop_columns(&mut self, table_name: &str, column_names: &[String]) -> Result<(), RunnerError> {
        for name in column_names {
            self.drop_column(table_name, name)?;
        }
        Ok(())
    }

    // ---- primary keys and checks ----

    pub fn create_primary_key(&mut self, table_name: &str, _columns: &[String]) -> Result<(), RunnerError> {
        Err(Unsupported::PrimaryKeyConstraint {
            table: table_name.to_string(),
        }
        .into())
    }

    pub fn drop_primary_key(&mut self, table_name: &str) -> Result<(), RunnerError> {
        Err(Unsupported::PrimaryKeyConstraint {
            table: table_name.to_string(),
        }
        .into())
    }

    pub fn create_check_constraint(&mut self, table_name: &str, _expression: &str) -> Result<(), RunnerError> {
        Err(Unsupported::CheckConstraint {
            table: table_name.to_string(),
        }
        .into())
    }

    pub fn drop_check_constraint(&mut self, table_name: &str, _name: &str) -> Result<(), RunnerError> {
        Err(Unsupported::CheckConstraint {
            table: table_name.to_string(),
        }
        .into())
    }

    // ---- foreign keys ----

    pub fn create_foreign_key(
        &mut self,
        table_name: &str,
        foreign_key: ForeignKey,
    ) -> Result<(), RunnerError> {
        self.create_foreign_keys(table_name, vec![foreign_key])
    }

    /// Create independent foreign keys concurrently; the cache is updated once all of
    /// them are in place
    pub fn create_foreign_keys(
        &mut self,
        table_name: &str,
        foreign_keys: Vec<ForeignKey>,
    ) -> Result<(), RunnerError> {
        self.ensure_open()?;
        let table = self.require_table(table_name)?;
        let mut updated = table.as_ref().clone();
        let mut pairs = Vec::with_capacity(foreign_keys.len());
        for foreign_key in foreign_keys {
            let name = foreign_key.name_for(&table.name);
            if updated.find_foreign_key(&name).is_some() {
                return Err(RunnerError::AlreadyExists {
                    kind: "foreign key",
                    name,
                });
            }
            let mut foreign_key = foreign_key.named(name);
            foreign_key.interleaved = false;
            pairs.push(build_create_foreign_key(&table.name, &foreign_key)?);
            updated.foreign_keys.push(foreign_key);
        }

        self.execute_pairs_concurrently(pairs)?;
        self.cache.replace(&table, updated);
        Ok(())
    }

    pub fn drop_foreign_key(&mut self, table_name: &str, name: &str) -> Result<(), RunnerError> {
        self.ensure_open()?;
        let table = self.require_table(table_name)?;
        let foreign_key =
            table
                .find_foreign_key(name)
                .cloned()
                .ok_or_else(|| RunnerError::ForeignKeyNotFound {
                    table: table.name.clone(),
                    foreign_key: name.to_string(),
                })?;

        let pair = build_drop_foreign_key(&table.name, &foreign_key)?;
        self.execute_pairs(vec![pair])?;

        let mut updated = table.as_ref().clone();
        updated
            .foreign_keys
            .retain(|fk| fk.name_for(&table.name) != name);
        self.cache.replace(&table, updated);
        Ok(())
    }

    pub fn drop_foreign_keys(&mut self, table_name: &str, names: &[String]) -> Result<(), RunnerError> {
        for name in names {
            self.drop_foreign_key(table_name, name)?;
        }
        Ok(())
    }

    // ---- indices ----

    pub fn create_index(&mut self, table_name: &str, index: TableIndex) -> Result<(), RunnerError> {
        self.ensure_open()?;
        let table = self.require_table(table_name)?;
        let name = index.name_for(&table.name);
        if table.find_index(&name).is_some() {
            return Err(RunnerError::AlreadyExists { kind: "index", name });
        }
        let index = index.named(name);
        let pair = build_create_index(&table.name, &index)?;
        self.execute_pairs(vec![pair])?;

        let mut updated = table.as_ref().clone();
        updated.indices.push(index);
        self.cache.replace(&table, updated);
        Ok(())
    }

    pub fn create_indices(&mut self, table_name: &str, indices: Vec<TableIndex>) -> Result<(), RunnerError> {
        for index in indices {
            self.create_index(table_name, index)?;
        }
        Ok(())
    }

    /// Drop an index; a unique constraint backed by it goes with it
    pub fn drop_index(&mut self, table_name: &str, name: &str) -> Result<(), RunnerError> {
        self.ensure_open()?;
        let table = self.require_table(table_name)?;
        let index = table
            .find_index(name)
            .cloned()
            .ok_or_else(|| RunnerError::IndexNotFound {
                table: table.name.clone(),
                index: name.to_string(),
            })?;
        let pair = build_drop_index(&table.name, &index)?;
        self.execute_pairs(vec![pair])?;

        let mut updated = table.as_ref().clone();
        remove_index(&mut updated, &index);
        self.cache.replace(&table, updated);
        Ok(())
    }

    pub fn drop_indices(&mut self, table_name: &str, names: &[String]) -> Result<(), RunnerError> {
        for name in names {
            self.drop_index(table_name, name)?;
        }
        Ok(())
    }

    // ---- unique constraints ----

    /// Create a unique constraint, realized as a unique index of the same name
    pub fn create_unique_constraint(
        &mut self,
        table_name: &str,
        unique: TableUnique,
    ) -> Result<(), RunnerError> {
        self.ensure_open()?;
        let table = self.require_table(table_name)?;
        let name = unique.name_for(&table.name);
        if table.find_unique(&name).is_some() || table.find_index(&name).is_some() {
            return Err(RunnerError::AlreadyExists {
                kind: "unique constraint",
                name,
            });
        }
        let unique = unique.named(name);
        let mut updated = table.as_ref().clone();
        let mut pairs = Vec::new();
        if !updated.has_unique_index_on(&unique.columns) {
            let index = unique.backing_index(&table.name);
            pairs.push(build_create_index(&table.name, &index)?);
            updated.indices.push(index);
        }
        updated.uniques.push(unique);

        self.execute_pairs(pairs)?;
        self.cache.replace(&table, updated);
        Ok(())
    }

    pub fn create_unique_constraints(
        &mut self,
        table_name: &str,
        uniques: Vec<TableUnique>,
    ) -> Result<(), RunnerError> {
        for unique in uniques {
            self.create_unique_constraint(table_name, unique)?;
        }
        Ok(())
    }

    /// Drop a unique constraint and its backing index
    pub fn drop_unique_constraint(&mut self, table_name: &str, name: &str) -> Result<(), RunnerError> {
        self.ensure_open()?;
        let table = self.require_table(table_name)?;
        let unique = table
            .find_unique(name)
            .cloned()
            .ok_or_else(|| RunnerError::UniqueNotFound {
                table: table.name.clone(),
                unique: name.to_string(),
            })?;

        let mut updated = table.as_ref().clone();
        updated.uniques.retain(|u| u.name_for(&table.name) != name);
        let backing = table
            .find_index(name)
            .or_else(|| {
                table
                    .indices
                    .iter()
                    .find(|i| i.unique && i.columns == unique.columns)
            })
            .cloned();
        let mut pairs = Vec::new();
        if let Some(index) = backing {
            pairs.push(build_drop_index(&table.name, &index)?);
            remove_index(&mut updated, &index);
        }

        self.execute_pairs(pairs)?;
        self.cache.replace(&table, updated);
        Ok(())
    }

    pub fn drop_unique_constraints(&mut self, table_name: &str, names: &[String]) -> Result<(), RunnerError> {
        for name in names {
            self.drop_unique_constraint(table_name, name)?;
        }
        Ok(())
    }
}

/// Remove `index` from `table` along with what it backs: a same-named unique
/// constraint and, for a single-column unique index, the column's unique flag
fn remove_index(table: &mut Table, index: &TableIndex) {
    let name = index.name_for(&table.name);
    let table_name = table.name.clone();
    table.indices.retain(|i| i.name_for(&table_name) != name);
    table.uniques.retain(|u| u.name_for(&table_name) != name);
    if index.unique {
        if let [only] = index.columns.as_slice() {
            if let Some(column) = table.columns.iter_mut().find(|c| &c.name == only) {
                column.unique = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunnerConfig;
    use crate::schema::{ColumnType, GenerationStrategy, ReferentialAction};
    use crate::test_helpers::{NativeCall, RecordingExecutor};

    fn runner() -> (SpannerQueryRunner, RecordingExecutor) {
        let executor = RecordingExecutor::new();
        let config = RunnerConfig {
            project_id: "p".to_string(),
            instance_id: "i".to_string(),
            database_id: "d".to_string(),
            ..RunnerConfig::default()
        };
        let runner =
            SpannerQueryRunner::with_executor(config, Arc::new(executor.clone())).unwrap();
        (runner, executor)
    }

    fn orders() -> Table {
        Table::new("orders")
            .column(Column::new("id", ColumnType::String).primary())
            .column(Column::new("total", ColumnType::Numeric))
            .column(Column::new("email", ColumnType::String))
    }

    #[test]
    fn test_create_table_caches_normalized_definition() {
        let (mut runner, executor) = runner();
        runner
            .create_table(orders().index(TableIndex::new(["total"])), false, true, true)
            .unwrap();

        let cached = runner.get_table("orders").unwrap();
        assert!(cached.indices.iter().all(|i| i.name.is_some()));
        assert_eq!(executor.schema_batches().len(), 1);
        assert_eq!(executor.schema_batches()[0].len(), 2);
    }

    #[test]
    fn test_create_existing_table() {
        let (mut runner, _executor) = runner();
        runner.create_table(orders(), false, true, true).unwrap();
        let err = runner.create_table(orders(), false, true, true).unwrap_err();
        assert!(matches!(err, RunnerError::AlreadyExists { kind: "table", .. }));
        runner.create_table(orders(), true, true, true).unwrap();
    }

    #[test]
    fn test_add_unique_column_creates_backing_index() {
        let (mut runner, executor) = runner();
        runner.create_table(orders(), false, true, true).unwrap();
        executor.clear_calls();

        runner
            .add_column("orders", Column::new("code", ColumnType::String).unique())
            .unwrap();
        let batch = &executor.schema_batches()[0];
        assert_eq!(batch.len(), 2);
        assert!(batch[0].starts_with("ALTER TABLE `orders` ADD COLUMN `code`"));
        assert!(batch[1].starts_with("CREATE UNIQUE INDEX `UQ_"));
        assert!(runner.get_table("orders").unwrap().find_column("code").is_some());
    }

    #[test]
    fn test_add_primary_column_is_unsupported() {
        let (mut runner, executor) = runner();
        runner.create_table(orders(), false, true, true).unwrap();
        executor.clear_calls();

        let err = runner
            .add_column("orders", Column::new("k", ColumnType::Int64).primary())
            .unwrap_err();
        assert!(matches!(
            err.unsupported(),
            Some(Unsupported::AddPrimaryColumn { .. })
        ));
        assert!(executor.calls().is_empty());
    }

    #[test]
    fn test_unique_toggle_on_change_column() {
        let (mut runner, executor) = runner();
        runner.create_table(orders(), false, true, true).unwrap();
        executor.clear_calls();

        runner
            .change_column("orders", "email", Column::new("email", ColumnType::String).unique())
            .unwrap();
        runner
            .change_column("orders", "email", Column::new("email", ColumnType::String))
            .unwrap();

        let batches = executor.schema_batches();
        assert_eq!(batches.len(), 2);
        assert!(batches[0][0].starts_with("CREATE UNIQUE INDEX"));
        assert!(batches[1][0].starts_with("DROP INDEX"));
        assert!(runner.get_table("orders").unwrap().indices.is_empty());
    }

    #[test]
    fn test_drop_column_takes_indices_with_it() {
        let (mut runner, executor) = runner();
        runner
            .create_table(orders().index(TableIndex::new(["total"])), false, true, true)
            .unwrap();
        executor.clear_calls();

        runner.drop_column("orders", "total").unwrap();
        let batch = &executor.schema_batches()[0];
        assert!(batch[0].starts_with("DROP INDEX `IDX_"));
        assert_eq!(batch[1], "ALTER TABLE `orders` DROP COLUMN `total`");
        let cached = runner.get_table("orders").unwrap();
        assert!(cached.indices.is_empty());
        assert!(cached.find_column("total").is_none());
    }

    #[test]
    fn test_drop_primary_and_interleaved_columns_are_unsupported() {
        let (mut runner, _executor) = runner();
        runner.create_table(orders(), false, true, true).unwrap();
        runner
            .create_table(
                Table::new("notes")
                    .column(Column::new("id", ColumnType::String).primary())
                    .column(Column::new("order_id", ColumnType::String))
                    .foreign_key(
                        ForeignKey::new(["order_id"], "orders")
                            .referencing(["id"])
                            .on_delete(ReferentialAction::Cascade),
                    ),
                false,
                true,
                true,
            )
            .unwrap();

        let err = runner.drop_column("orders", "id").unwrap_err();
        assert!(matches!(
            err.unsupported(),
            Some(Unsupported::DropPrimaryColumn { .. })
        ));
        let err = runner.drop_column("notes", "order_id").unwrap_err();
        assert!(matches!(
            err.unsupported(),
            Some(Unsupported::DropForeignKeyColumn { .. })
        ));
    }

    #[test]
    fn test_missing_objects_are_not_found() {
        let (mut runner, _executor) = runner();
        runner.create_table(orders(), false, true, true).unwrap();

        assert!(matches!(
            runner.drop_index("orders", "IDX_nope"),
            Err(RunnerError::IndexNotFound { .. })
        ));
        assert!(matches!(
            runner.drop_foreign_key("orders", "FK_nope"),
            Err(RunnerError::ForeignKeyNotFound { .. })
        ));
        assert!(matches!(
            runner.drop_unique_constraint("orders", "UQ_nope"),
            Err(RunnerError::UniqueNotFound { .. })
        ));
        assert!(matches!(
            runner.drop_column("orders", "nope"),
            Err(RunnerError::ColumnNotFound { .. })
        ));
    }

    #[test]
    fn test_unique_constraint_round_trip() {
        let (mut runner, executor) = runner();
        runner.create_table(orders(), false, true, true).unwrap();
        executor.clear_calls();

        runner
            .create_unique_constraint("orders", TableUnique::new(["email", "total"]).named("UQ_mail"))
            .unwrap();
        assert_eq!(
            executor.schema_batches()[0],
            vec!["CREATE UNIQUE INDEX `UQ_mail` ON `orders` (`email`, `total`)".to_string()]
        );

        runner.drop_unique_constraint("orders", "UQ_mail").unwrap();
        assert_eq!(
            executor.schema_batches()[1],
            vec!["DROP INDEX `UQ_mail`".to_string()]
        );
        let cached = runner.get_table("orders").unwrap();
        assert!(cached.uniques.is_empty());
        assert!(cached.indices.is_empty());
    }

    #[test]
    fn test_fixed_capability_limits() {
        let (mut runner, executor) = runner();
        assert!(matches!(
            runner.rename_table("a", "b").unwrap_err().unsupported(),
            Some(Unsupported::TableRename { .. })
        ));
        assert!(matches!(
            runner.rename_column("a", "x", "y").unwrap_err().unsupported(),
            Some(Unsupported::ColumnRename { .. })
        ));
        assert!(runner.create_primary_key("a", &["x".to_string()]).is_err());
        assert!(runner.drop_primary_key("a").is_err());
        assert!(runner.create_check_constraint("a", "x > 0").is_err());
        assert!(runner.drop_check_constraint("a", "CHK").is_err());
        assert!(executor.calls().is_empty());
    }

    #[test]
    fn test_generated_column_syncs_shadow_table() {
        let (mut runner, executor) = runner();
        runner
            .create_table(
                Table::new("tokens").column(
                    Column::new("id", ColumnType::String)
                        .primary()
                        .generated(GenerationStrategy::Uuid),
                ),
                false,
                true,
                true,
            )
            .unwrap();

        assert!(runner.get_table("schemas").is_some());
        assert!(executor.mutations().iter().any(|call| matches!(
            call,
            NativeCall::Upsert { table, .. } if table == "schemas"
        )));
        assert!(runner.extended_schema().generator_for("tokens", "id").is_some());
    }
}
