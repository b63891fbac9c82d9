//! Shared fixtures for the runner integration tests.

#![allow(dead_code)]

use serde_json::Value as JsonValue;
use spanguard::executor::Row;
use spanguard::schema::GenerationStrategy;
use spanguard::test_helpers::RecordingExecutor;
use spanguard::{Column, ColumnType, RunnerConfig, SpannerQueryRunner, Table};
use std::sync::Arc;

pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .is_test(true)
        .try_init();
}

pub fn config() -> RunnerConfig {
    RunnerConfig {
        project_id: "test-project".to_string(),
        instance_id: "test-instance".to_string(),
        database_id: "shop".to_string(),
        ..RunnerConfig::default()
    }
}

/// Runner over a fresh recording executor
pub fn runner() -> (SpannerQueryRunner, RecordingExecutor) {
    init_logging();
    let executor = RecordingExecutor::new();
    let runner = SpannerQueryRunner::with_executor(config(), Arc::new(executor.clone()))
        .expect("valid test configuration");
    (runner, executor)
}

pub fn row(pairs: &[(&str, JsonValue)]) -> Row {
    pairs
        .iter()
        .map(|(column, value)| (column.to_string(), value.clone()))
        .collect()
}

/// `orders(id STRING(MAX) NOT NULL uuid-generated, total NUMERIC)`
pub fn orders() -> Table {
    Table::new("orders")
        .column(
            Column::new("id", ColumnType::String)
                .primary()
                .generated(GenerationStrategy::Uuid),
        )
        .column(Column::new("total", ColumnType::Numeric))
}

/// `order_lines(order_id, line)` keyed on both columns
pub fn order_lines() -> Table {
    Table::new("order_lines")
        .column(Column::new("order_id", ColumnType::String).primary())
        .column(Column::new("line", ColumnType::Int64).primary())
        .column(Column::new("sku", ColumnType::String))
        .column(Column::new("quantity", ColumnType::Int64))
}
