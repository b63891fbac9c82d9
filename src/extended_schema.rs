//! Shadow table for column metadata the engine cannot store natively.
//!
//! Rows are keyed by `(table, column, type)` with `type` one of `default` or
//! `generator` and a non-null `value`: a default literal, or `uuid` / `increment`.
//!
//! Generation strategies resolve through [`GenerationPolicy`]. `increment` is served by
//! the random UUID generator, with a warning logged once per store.

use crate::config::RunnerConfig;
use crate::error::RunnerError;
use crate::executor::{KeyBatch, Mutator, Row};
use crate::query::build_select;
use crate::schema::{Column, ColumnDefault, ColumnType, GenerationStrategy, Table};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

const TABLE_COLUMN: &str = "table";
const COLUMN_COLUMN: &str = "column";
const TYPE_COLUMN: &str = "type";
const VALUE_COLUMN: &str = "value";

/// Kind of shadow-table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttributeType {
    Default,
    Generator,
}

impl AttributeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeType::Default => "default",
            AttributeType::Generator => "generator",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "default" => Some(AttributeType::Default),
            "generator" => Some(AttributeType::Generator),
            _ => None,
        }
    }
}

/// One shadow-table row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedSchemaEntry {
    pub table: String,
    pub column: String,
    pub attribute: AttributeType,
    pub value: String,
}

impl ExtendedSchemaEntry {
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert(TABLE_COLUMN.to_string(), JsonValue::String(self.table.clone()));
        row.insert(COLUMN_COLUMN.to_string(), JsonValue::String(self.column.clone()));
        row.insert(
            TYPE_COLUMN.to_string(),
            JsonValue::String(self.attribute.as_str().to_string()),
        );
        row.insert(VALUE_COLUMN.to_string(), JsonValue::String(self.value.clone()));
        row
    }

    pub fn from_row(row: &Row) -> Option<Self> {
        let text = |key: &str| row.get(key).and_then(JsonValue::as_str).map(str::to_string);
        Some(Self {
            table: text(TABLE_COLUMN)?,
            column: text(COLUMN_COLUMN)?,
            attribute: AttributeType::parse(&text(TYPE_COLUMN)?)?,
            value: text(VALUE_COLUMN)?,
        })
    }
}

fn entry_key(table: &str, column: &str, attribute: AttributeType) -> Vec<(String, JsonValue)> {
    vec![
        (TABLE_COLUMN.to_string(), JsonValue::String(table.to_string())),
        (COLUMN_COLUMN.to_string(), JsonValue::String(column.to_string())),
        (
            TYPE_COLUMN.to_string(),
            JsonValue::String(attribute.as_str().to_string()),
        ),
    ]
}

/// Value generator reconstructed from a `generator` entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnGenerator {
    RandomUuid,
}

impl ColumnGenerator {
    pub fn generate(&self) -> JsonValue {
        match self {
            ColumnGenerator::RandomUuid => JsonValue::String(Uuid::new_v4().to_string()),
        }
    }
}

/// Effective generator for a requested strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveStrategy {
    pub requested: GenerationStrategy,
    pub generator: ColumnGenerator,
    /// The requested strategy is served by a different generator
    pub substituted: bool,
}

/// Requested strategy to effective generator
pub struct GenerationPolicy;

impl GenerationPolicy {
    pub const TABLE: [EffectiveStrategy; 2] = [
        EffectiveStrategy {
            requested: GenerationStrategy::Uuid,
            generator: ColumnGenerator::RandomUuid,
            substituted: false,
        },
        EffectiveStrategy {
            requested: GenerationStrategy::Increment,
            generator: ColumnGenerator::RandomUuid,
            substituted: true,
        },
    ];

    pub fn resolve(requested: GenerationStrategy) -> EffectiveStrategy {
        match requested {
            GenerationStrategy::Uuid => Self::TABLE[0],
            GenerationStrategy::Increment => Self::TABLE[1],
        }
    }
}

/// Reconstructed metadata of one column
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedColumnMetadata {
    pub default: Option<String>,
    pub generation_strategy: Option<GenerationStrategy>,
    pub generator: Option<ColumnGenerator>,
}

impl ExtendedColumnMetadata {
    fn is_empty(&self) -> bool {
        self.default.is_none() && self.generation_strategy.is_none()
    }
}

/// In-memory view of the shadow table plus the calls that keep it in sync
pub struct ExtendedSchemaStore {
    table_name: String,
    migrations_table_name: String,
    columns: BTreeMap<String, BTreeMap<String, ExtendedColumnMetadata>>,
    loaded: bool,
    increment_warned: bool,
}

impl fmt::Debug for ExtendedSchemaStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedSchemaStore")
            .field("table_name", &self.table_name)
            .field("loaded", &self.loaded)
            .field("tables", &self.columns.len())
            .finish()
    }
}

impl ExtendedSchemaStore {
    pub fn new(table_name: impl Into<String>, migrations_table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            migrations_table_name: migrations_table_name.into(),
            columns: BTreeMap::new(),
            loaded: false,
            increment_warned: false,
        }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(&config.schema_table_name, &config.migrations_table_name)
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Definition of the shadow table itself
    pub fn definition(&self) -> Table {
        Table::new(self.table_name.clone())
            .column(Column::new(TABLE_COLUMN, ColumnType::String).primary())
            .column(Column::new(COLUMN_COLUMN, ColumnType::String).primary())
            .column(Column::new(TYPE_COLUMN, ColumnType::String).primary())
            .column(Column::new(VALUE_COLUMN, ColumnType::String).not_null())
    }

    pub fn metadata_for(&self, table: &str, column: &str) -> Option<&ExtendedColumnMetadata> {
        self.columns.get(table)?.get(column)
    }

    /// Generator for a column, if one is registered
    pub fn generator_for(&self, table: &str, column: &str) -> Option<ColumnGenerator> {
        self.metadata_for(table, column)?.generator
    }

    /// Bring the `default` and `generator` entries of `column` in line with its
    /// definition. Absent attributes (or all of them when `removing`) are deleted.
    pub fn sync_column<M: Mutator + ?Sized>(
        &mut self,
        mutator: &M,
        table: &str,
        column: &Column,
        removing: bool,
    ) -> Result<(), RunnerError> {
        let mut upserts: Vec<Row> = Vec::new();
        let mut deletes: Vec<Vec<(String, JsonValue)>> = Vec::new();

        match column.literal_default().filter(|_| !removing) {
            Some(value) => upserts.push(
                ExtendedSchemaEntry {
                    table: table.to_string(),
                    column: column.name.clone(),
                    attribute: AttributeType::Default,
                    value: value.to_string(),
                }
                .to_row(),
            ),
            None => deletes.push(entry_key(table, &column.name, AttributeType::Default)),
        }
        match column.generation_strategy.filter(|_| !removing) {
            Some(strategy) => upserts.push(
                ExtendedSchemaEntry {
                    table: table.to_string(),
                    column: column.name.clone(),
                    attribute: AttributeType::Generator,
                    value: strategy.as_str().to_string(),
                }
                .to_row(),
            ),
            None => deletes.push(entry_key(table, &column.name, AttributeType::Generator)),
        }

        if !upserts.is_empty() {
            let params = serde_json::to_value(&upserts).unwrap_or(JsonValue::Null);
            mutator
                .upsert(&self.table_name, upserts)
                .map_err(|e| RunnerError::native(format!("upsert {}", self.table_name), params, e))?;
        }
        if !deletes.is_empty() {
            let keys = KeyBatch::Composite(deletes);
            let params = keys.to_json();
            mutator
                .delete_rows(&self.table_name, keys)
                .map_err(|e| RunnerError::native(format!("delete {}", self.table_name), params, e))?;
        }

        log::debug!(
            "synced extended schema for {}.{} (removing: {})",
            table,
            column.name,
            removing
        );
        let metadata = ExtendedColumnMetadata {
            default: if removing {
                None
            } else {
                column.literal_default().map(str::to_string)
            },
            generation_strategy: None,
            generator: None,
        };
        self.set_metadata(table, &column.name, metadata);
        if let Some(strategy) = column.generation_strategy.filter(|_| !removing) {
            self.register_generator(table, &column.name, strategy);
        }
        Ok(())
    }

    /// Delete every entry recorded for `table`
    pub fn remove_table<M: Mutator + ?Sized>(
        &mut self,
        mutator: &M,
        table: &Table,
    ) -> Result<(), RunnerError> {
        let mut names: Vec<String> = table
            .columns
            .iter()
            .filter(|c| c.has_extended_metadata())
            .map(|c| c.name.clone())
            .collect();
        if let Some(known) = self.columns.get(&table.name) {
            for name in known.keys() {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        if names.is_empty() {
            return Ok(());
        }

        let keys = KeyBatch::Composite(
            names
                .iter()
                .flat_map(|column| {
                    [AttributeType::Default, AttributeType::Generator]
                        .into_iter()
                        .map(move |attribute| entry_key(&table.name, column, attribute))
                })
                .collect(),
        );
        let params = keys.to_json();
        mutator
            .delete_rows(&self.table_name, keys)
            .map_err(|e| RunnerError::native(format!("delete {}", self.table_name), params, e))?;
        self.columns.remove(&table.name);
        log::debug!("removed extended schema for table {}", table.name);
        Ok(())
    }

    /// Scan the shadow table once and rebuild the in-memory map
    pub fn load<M: Mutator + ?Sized>(&mut self, mutator: &M) -> Result<(), RunnerError> {
        let columns = [TABLE_COLUMN, COLUMN_COLUMN, TYPE_COLUMN, VALUE_COLUMN].map(str::to_string);
        let statement = build_select(&self.table_name, &columns, None, None)?;
        let rows = mutator
            .run(&statement)
            .map_err(|e| RunnerError::native(&statement.sql, statement.params_json(), e))?;
        self.ingest(&rows);
        Ok(())
    }

    /// Rebuild the map from shadow-table rows
    pub fn ingest(&mut self, rows: &[Row]) {
        self.columns.clear();
        for row in rows {
            let Some(entry) = ExtendedSchemaEntry::from_row(row) else {
                log::warn!("ignoring malformed {} row: {:?}", self.table_name, row);
                continue;
            };
            match entry.attribute {
                AttributeType::Default => {
                    self.columns
                        .entry(entry.table)
                        .or_default()
                        .entry(entry.column)
                        .or_default()
                        .default = Some(entry.value);
                }
                AttributeType::Generator => match GenerationStrategy::parse(&entry.value) {
                    Some(strategy) => self.register_generator(&entry.table, &entry.column, strategy),
                    None => log::warn!(
                        "unknown generation strategy '{}' for {}.{}",
                        entry.value,
                        entry.table,
                        entry.column
                    ),
                },
            }
        }
        self.loaded = true;
        log::debug!("loaded extended schema for {} table(s)", self.columns.len());
    }

    /// Copy defaults and generation strategies onto a loaded table definition
    pub fn apply_to(&self, table: &mut Table) {
        let Some(known) = self.columns.get(&table.name) else {
            return;
        };
        for column in &mut table.columns {
            let Some(metadata) = known.get(&column.name) else {
                continue;
            };
            if let Some(default) = &metadata.default {
                if column.default != Some(ColumnDefault::CommitTimestamp) {
                    column.default = Some(ColumnDefault::Literal(default.clone()));
                }
            }
            if metadata.generation_strategy.is_some() {
                column.generation_strategy = metadata.generation_strategy;
            }
        }
    }

    fn set_metadata(&mut self, table: &str, column: &str, metadata: ExtendedColumnMetadata) {
        if metadata.is_empty() {
            if let Some(known) = self.columns.get_mut(table) {
                known.remove(column);
                if known.is_empty() {
                    self.columns.remove(table);
                }
            }
        } else {
            self.columns
                .entry(table.to_string())
                .or_default()
                .insert(column.to_string(), metadata);
        }
    }

    fn register_generator(&mut self, table: &str, column: &str, strategy: GenerationStrategy) {
        let effective = GenerationPolicy::resolve(strategy);
        if effective.substituted && table != self.migrations_table_name && !self.increment_warned {
            log::warn!(
                "{}.{}: '{}' generation is served by random UUIDs; sequential keys are not supported",
                table,
                column,
                strategy.as_str()
            );
            self.increment_warned = true;
        }
        let metadata = self
            .columns
            .entry(table.to_string())
            .or_default()
            .entry(column.to_string())
            .or_default();
        metadata.generation_strategy = Some(strategy);
        metadata.generator = Some(effective.generator);
    }

    #[cfg(test)]
    pub(crate) fn increment_warned(&self) -> bool {
        self.increment_warned
    }
}
