//! Rebuild `Table` definitions from the engine's INFORMATION_SCHEMA.
//!
//! Four reads cover a batch of tables: TABLES (interleave parent and ON DELETE action),
//! COLUMNS, COLUMN_OPTIONS (commit-timestamp option) and INDEXES joined with
//! INDEX_COLUMNS. Assembly is a pure function over the returned rows.

use super::column::{Column, ColumnDefault, ColumnType};
use super::naming::foreign_key_name;
use super::table::{ForeignKey, ReferentialAction, Table, TableIndex};
use crate::error::RunnerError;
use crate::executor::{Mutator, Row, SqlStatement};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};

const TABLES_SQL: &str = "SELECT TABLE_NAME, PARENT_TABLE_NAME, ON_DELETE_ACTION \
    FROM INFORMATION_SCHEMA.TABLES \
    WHERE TABLE_SCHEMA = '' AND TABLE_NAME IN UNNEST(@p1)";

const COLUMNS_SQL: &str = "SELECT TABLE_NAME, COLUMN_NAME, SPANNER_TYPE, IS_NULLABLE, ORDINAL_POSITION \
    FROM INFORMATION_SCHEMA.COLUMNS \
    WHERE TABLE_SCHEMA = '' AND TABLE_NAME IN UNNEST(@p1) \
    ORDER BY TABLE_NAME, ORDINAL_POSITION";

const COLUMN_OPTIONS_SQL: &str = "SELECT TABLE_NAME, COLUMN_NAME, OPTION_NAME, OPTION_VALUE \
    FROM INFORMATION_SCHEMA.COLUMN_OPTIONS \
    WHERE TABLE_SCHEMA = '' AND TABLE_NAME IN UNNEST(@p1)";

const INDEXES_SQL: &str = "SELECT i.TABLE_NAME, i.INDEX_NAME, i.INDEX_TYPE, i.IS_UNIQUE, i.IS_NULL_FILTERED, \
    c.COLUMN_NAME, c.ORDINAL_POSITION \
    FROM INFORMATION_SCHEMA.INDEXES AS i \
    JOIN INFORMATION_SCHEMA.INDEX_COLUMNS AS c \
    ON i.TABLE_SCHEMA = c.TABLE_SCHEMA AND i.TABLE_NAME = c.TABLE_NAME AND i.INDEX_NAME = c.INDEX_NAME \
    WHERE i.TABLE_SCHEMA = '' AND i.TABLE_NAME IN UNNEST(@p1) \
    ORDER BY i.TABLE_NAME, i.INDEX_NAME, c.ORDINAL_POSITION";

/// Rows returned by the four INFORMATION_SCHEMA reads
#[derive(Debug, Default, Clone)]
pub struct InformationSchemaRows {
    pub tables: Vec<Row>,
    pub columns: Vec<Row>,
    pub column_options: Vec<Row>,
    pub indexes: Vec<Row>,
}

/// Read the definitions of `names`. Names the engine does not know are skipped.
pub fn load_tables<M, F>(
    mutator: &M,
    names: &[String],
    known_keys: F,
) -> Result<Vec<Table>, RunnerError>
where
    M: Mutator + ?Sized,
    F: Fn(&str) -> Option<Vec<String>>,
{
    if names.is_empty() {
        return Ok(Vec::new());
    }
    let mut params = BTreeMap::new();
    params.insert(
        "p1".to_string(),
        JsonValue::Array(names.iter().cloned().map(JsonValue::String).collect()),
    );
    let read = |sql: &str| -> Result<Vec<Row>, RunnerError> {
        let statement = SqlStatement::with_params(sql, params.clone());
        mutator
            .run(&statement)
            .map_err(|e| RunnerError::native(sql, statement.params_json(), e))
    };

    let rows = InformationSchemaRows {
        tables: read(TABLES_SQL)?,
        columns: read(COLUMNS_SQL)?,
        column_options: read(COLUMN_OPTIONS_SQL)?,
        indexes: read(INDEXES_SQL)?,
    };
    log::debug!("loaded information schema for {} table(s)", names.len());
    Ok(assemble_tables(&rows, known_keys))
}

/// Build tables from information-schema rows.
///
/// `known_keys` supplies primary-key columns of parents outside the batch; parents in
/// the batch are resolved from the rows themselves.
pub fn assemble_tables<F>(rows: &InformationSchemaRows, known_keys: F) -> Vec<Table>
where
    F: Fn(&str) -> Option<Vec<String>>,
{
    let mut tables: Vec<Table> = Vec::new();
    let mut parents: HashMap<String, (String, Option<ReferentialAction>)> = HashMap::new();
    for row in &rows.tables {
        let Some(name) = text(row, "TABLE_NAME") else {
            continue;
        };
        tables.push(Table::new(name.clone()));
        if let Some(parent) = text(row, "PARENT_TABLE_NAME").filter(|p| !p.is_empty()) {
            let action = text(row, "ON_DELETE_ACTION").and_then(|a| ReferentialAction::parse(&a));
            parents.insert(name, (parent, action));
        }
    }

    for row in &rows.columns {
        let (Some(table_name), Some(column_name), Some(type_text)) = (
            text(row, "TABLE_NAME"),
            text(row, "COLUMN_NAME"),
            text(row, "SPANNER_TYPE"),
        ) else {
            continue;
        };
        let Some(table) = tables.iter_mut().find(|t| t.name == table_name) else {
            continue;
        };
        let Some((column_type, length, is_array)) = ColumnType::parse(&type_text) else {
            log::warn!(
                "skipping column {}.{} with unrecognized type {}",
                table_name,
                column_name,
                type_text
            );
            continue;
        };
        let mut column = Column::new(column_name, column_type);
        column.length = length;
        column.is_array = is_array;
        column.nullable = text(row, "IS_NULLABLE").as_deref() != Some("NO");
        table.columns.push(column);
    }

    for row in &rows.column_options {
        let option = text(row, "OPTION_NAME");
        let value = text(row, "OPTION_VALUE");
        if option.as_deref() != Some("allow_commit_timestamp")
            || !value.is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            continue;
        }
        if let Some(column) = find_column_mut(&mut tables, row) {
            column.default = Some(ColumnDefault::CommitTimestamp);
        }
    }

    let mut index_order: Vec<(String, String)> = Vec::new();
    let mut indexes: HashMap<(String, String), (TableIndex, bool)> = HashMap::new();
    for row in &rows.indexes {
        let (Some(table_name), Some(index_name), Some(column_name)) = (
            text(row, "TABLE_NAME"),
            text(row, "INDEX_NAME"),
            text(row, "COLUMN_NAME"),
        ) else {
            continue;
        };
        // storing columns have no ordinal position
        if row.get("ORDINAL_POSITION").map_or(true, JsonValue::is_null) {
            continue;
        }
        let key = (table_name, index_name.clone());
        let primary = text(row, "INDEX_TYPE").as_deref() == Some("PRIMARY_KEY");
        let entry = indexes.entry(key.clone()).or_insert_with(|| {
            index_order.push(key.clone());
            let mut index = TableIndex::new(Vec::<String>::new()).named(index_name);
            index.unique = flag(row, "IS_UNIQUE");
            index.spatial = flag(row, "IS_NULL_FILTERED");
            (index, primary)
        });
        entry.0.columns.push(column_name);
    }

    for key in index_order {
        let Some((index, primary)) = indexes.remove(&key) else {
            continue;
        };
        let Some(table) = tables.iter_mut().find(|t| t.name == key.0) else {
            continue;
        };
        if primary {
            for column in table
                .columns
                .iter_mut()
                .filter(|c| index.columns.contains(&c.name))
            {
                column.primary = true;
            }
            continue;
        }
        if index.unique && index.columns.len() == 1 {
            if let Some(column) = table
                .columns
                .iter_mut()
                .find(|c| c.name == index.columns[0])
            {
                column.unique = true;
            }
        }
        table.indices.push(index);
    }

    let batch_keys: HashMap<String, Vec<String>> = tables
        .iter()
        .map(|t| (t.name.clone(), t.primary_column_names()))
        .collect();
    for table in &mut tables {
        let Some((parent, action)) = parents.remove(&table.name) else {
            continue;
        };
        let columns = batch_keys
            .get(&parent)
            .cloned()
            .or_else(|| known_keys(&parent))
            .unwrap_or_else(|| table.primary_column_names().into_iter().take(1).collect());
        let mut foreign_key = ForeignKey::new(columns.clone(), parent)
            .named(foreign_key_name(&table.name, &columns))
            .interleaved();
        foreign_key.on_delete = action;
        table.foreign_keys.push(foreign_key);
    }

    tables
}

fn find_column_mut<'a>(tables: &'a mut [Table], row: &Row) -> Option<&'a mut Column> {
    let table_name = text(row, "TABLE_NAME")?;
    let column_name = text(row, "COLUMN_NAME")?;
    tables
        .iter_mut()
        .find(|t| t.name == table_name)?
        .columns
        .iter_mut()
        .find(|c| c.name == column_name)
}

fn text(row: &Row, key: &str) -> Option<String> {
    match row.get(key)? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Null => None,
        other => Some(other.to_string()),
    }
}

fn flag(row: &Row, key: &str) -> bool {
    match row.get(key) {
        Some(JsonValue::Bool(b)) => *b,
        Some(JsonValue::String(s)) => s.eq_ignore_ascii_case("true") || s == "YES",
        _ => false,
    }
}
