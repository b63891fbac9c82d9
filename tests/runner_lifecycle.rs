//! Connection, transactions, statement text and metadata loading.

mod common;

use common::{config, row, runner};
use serde_json::json;
use spanguard::connection::{ConnectionError, DatabasePath};
use spanguard::executor::{NativeError, SpannerExecutor};
use spanguard::extended_schema::ColumnGenerator;
use spanguard::schema::{ColumnDefault, ColumnLength, GenerationStrategy};
use spanguard::test_helpers::{NativeCall, RecordingExecutor};
use spanguard::transaction::{TransactionError, TransactionState};
use spanguard::{Column, ColumnType, RunnerError, SpannerQueryRunner};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// Connection
// ============================================================================

#[test]
fn test_connection_is_acquired_once() {
    common::init_logging();
    let executor = RecordingExecutor::new();
    let opened = Arc::new(AtomicUsize::new(0));

    let shared = executor.clone();
    let counter = Arc::clone(&opened);
    let connector = move |path: &DatabasePath| -> Result<Arc<dyn SpannerExecutor>, ConnectionError> {
        assert_eq!(path.database_id, "shop");
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(shared.clone()))
    };
    let mut runner = SpannerQueryRunner::new(config(), Box::new(connector)).unwrap();
    assert_eq!(opened.load(Ordering::SeqCst), 0);

    runner.query("SELECT 1", vec![]).unwrap();
    runner.query("SELECT 2", vec![]).unwrap();
    assert_eq!(opened.load(Ordering::SeqCst), 1);
}

#[test]
fn test_connector_failure_surfaces() {
    common::init_logging();
    let connector = |_: &DatabasePath| -> Result<Arc<dyn SpannerExecutor>, ConnectionError> {
        Err(ConnectionError::Transport("UNAVAILABLE".to_string()))
    };
    let mut runner = SpannerQueryRunner::new(config(), Box::new(connector)).unwrap();
    assert!(matches!(
        runner.query("SELECT 1", vec![]),
        Err(RunnerError::Connection(ConnectionError::Transport(_)))
    ));
}

#[test]
fn test_invalid_config_is_rejected() {
    let executor = RecordingExecutor::new();
    let mut config = config();
    config.database_id = String::new();
    assert!(SpannerQueryRunner::with_executor(config, Arc::new(executor)).is_err());
}

#[test]
fn test_released_runner_refuses_work() {
    let (mut runner, executor) = runner();
    runner.release();
    assert!(runner.is_released());
    assert!(matches!(
        runner.query("SELECT 1", vec![]),
        Err(RunnerError::Released)
    ));
    assert!(matches!(
        runner.create_table(common::orders(), false, true, true),
        Err(RunnerError::Released)
    ));
    assert!(executor.calls().is_empty());
}

#[test]
fn test_release_rolls_back_open_transaction() {
    let (mut runner, executor) = runner();
    runner.start_transaction().unwrap();
    runner.release();
    assert_eq!(executor.calls().last(), Some(&NativeCall::Rollback));
    assert_eq!(runner.transaction_state(), TransactionState::Idle);
}

// ============================================================================
// Transactions
// ============================================================================

#[test]
fn test_transaction_state_machine() {
    let (mut runner, _executor) = runner();
    assert!(matches!(
        runner.commit_transaction(),
        Err(RunnerError::Transaction(TransactionError::NotActive))
    ));
    runner.start_transaction().unwrap();
    assert!(runner.is_transaction_active());
    assert!(matches!(
        runner.start_transaction(),
        Err(RunnerError::Transaction(TransactionError::AlreadyActive))
    ));
    runner.rollback_transaction().unwrap();
    assert!(matches!(
        runner.rollback_transaction(),
        Err(RunnerError::Transaction(TransactionError::NotActive))
    ));
}

#[test]
fn test_failed_commit_returns_to_idle() {
    let (mut runner, executor) = runner();
    executor.fail_next_commit(NativeError::with_code("ABORTED", "Transaction was aborted"));
    runner.start_transaction().unwrap();
    assert!(matches!(
        runner.commit_transaction(),
        Err(RunnerError::Transaction(TransactionError::Native(_)))
    ));
    assert_eq!(runner.transaction_state(), TransactionState::Idle);
}

#[test]
fn test_select_inside_transaction_uses_transaction() {
    let (mut runner, executor) = runner();
    runner.start_transaction().unwrap();
    runner
        .query("SELECT * FROM orders WHERE id = @p1", vec![json!("a")])
        .unwrap();
    runner.commit_transaction().unwrap();

    match &executor.calls()[1] {
        NativeCall::InTransaction(call) => match call.as_ref() {
            NativeCall::Run(statement) => {
                assert_eq!(statement.sql, "SELECT * FROM orders WHERE id = @p1");
                assert_eq!(statement.params.get("p1"), Some(&json!("a")));
            }
            other => panic!("unexpected call: {other:?}"),
        },
        other => panic!("unexpected call: {other:?}"),
    }
}

// ============================================================================
// Statement text
// ============================================================================

#[test]
fn test_query_dispatches_schema_batches() {
    let (mut runner, executor) = runner();
    let rows = runner
        .query(
            "CREATE TABLE a (x INT64) PRIMARY KEY (x); CREATE INDEX ax ON a (x);",
            vec![],
        )
        .unwrap();
    assert!(rows.is_empty());
    assert_eq!(
        executor.schema_batches(),
        vec![vec![
            "CREATE TABLE a (x INT64) PRIMARY KEY (x)".to_string(),
            "CREATE INDEX ax ON a (x)".to_string(),
        ]]
    );
}

#[test]
fn test_query_database_lifecycle() {
    let (mut runner, executor) = runner();
    runner.query("CREATE DATABASE archive", vec![]).unwrap();
    assert!(runner.has_database("archive").unwrap());
    runner
        .query("CREATE DATABASE IF NOT EXISTS archive", vec![])
        .unwrap();
    runner.query("DROP DATABASE archive", vec![]).unwrap();
    runner.drop_database("archive", true).unwrap();
    assert!(runner.get_databases().unwrap().is_empty());

    let creates = executor
        .calls()
        .iter()
        .filter(|c| matches!(c, NativeCall::CreateDatabase(_)))
        .count();
    let drops = executor
        .calls()
        .iter()
        .filter(|c| matches!(c, NativeCall::DropDatabase(_)))
        .count();
    assert_eq!((creates, drops), (1, 1));
}

#[test]
fn test_query_rejects_malformed_and_unhandled_text() {
    let (mut runner, executor) = runner();
    assert!(matches!(
        runner.query("CREATE DATABASE IF NOT archive", vec![]),
        Err(RunnerError::Shape(_))
    ));
    assert!(matches!(
        runner.query("UPDATE orders SET total = 0", vec![]),
        Err(RunnerError::Unhandled(_))
    ));
    assert!(executor.calls().is_empty());
}

#[test]
fn test_failed_select_carries_statement_and_params() {
    let (mut runner, executor) = runner();
    executor.fail_next_query(NativeError::new("Table not found: orders"));
    let err = runner
        .query("SELECT * FROM orders WHERE id = @p1", vec![json!(7)])
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("SELECT * FROM orders"));
    assert!(message.contains("Table not found"));
}

#[test]
fn test_stream_yields_rows() {
    let (mut runner, executor) = runner();
    executor.append_query_results(vec![vec![
        row(&[("id", json!(1))]),
        row(&[("id", json!(2))]),
    ]]);
    let stream = runner.stream("SELECT id FROM orders", vec![]).unwrap();
    let mut seen = Vec::new();
    let count = stream.drain(|row| seen.push(row["id"].clone())).unwrap();
    assert_eq!(count, 2);
    assert_eq!(seen, vec![json!(1), json!(2)]);

    assert!(matches!(
        runner.stream("DROP TABLE orders", vec![]),
        Err(RunnerError::Unhandled(_))
    ));
}

// ============================================================================
// Metadata loading
// ============================================================================

fn information_schema(table: &str) -> Vec<Vec<spanguard::executor::Row>> {
    vec![
        vec![row(&[("TABLE_NAME", json!(table)), ("PARENT_TABLE_NAME", json!(null))])],
        vec![
            row(&[
                ("TABLE_NAME", json!(table)),
                ("COLUMN_NAME", json!("id")),
                ("SPANNER_TYPE", json!("STRING(36)")),
                ("IS_NULLABLE", json!("NO")),
            ]),
            row(&[
                ("TABLE_NAME", json!(table)),
                ("COLUMN_NAME", json!("created_at")),
                ("SPANNER_TYPE", json!("TIMESTAMP")),
                ("IS_NULLABLE", json!("YES")),
            ]),
        ],
        vec![row(&[
            ("TABLE_NAME", json!(table)),
            ("COLUMN_NAME", json!("created_at")),
            ("OPTION_NAME", json!("allow_commit_timestamp")),
            ("OPTION_VALUE", json!("TRUE")),
        ])],
        vec![row(&[
            ("TABLE_NAME", json!(table)),
            ("INDEX_NAME", json!("PRIMARY_KEY")),
            ("INDEX_TYPE", json!("PRIMARY_KEY")),
            ("IS_UNIQUE", json!(true)),
            ("IS_NULL_FILTERED", json!(false)),
            ("COLUMN_NAME", json!("id")),
            ("ORDINAL_POSITION", json!(1)),
        ])],
    ]
}

#[test]
fn test_has_table_and_column_fall_back_to_engine() {
    let (mut runner, executor) = runner();
    executor.append_query_results(vec![
        vec![row(&[("TABLE_NAME", json!("orders"))])],
        vec![],
    ]);
    assert!(runner.has_table("orders").unwrap());
    assert!(!runner.has_column("orders", "missing").unwrap());
    assert_eq!(executor.queries().len(), 2);
}

#[test]
fn test_load_tables_populates_cache() {
    let (mut runner, executor) = runner();
    executor.append_query_results(information_schema("orders"));

    let loaded = runner.load_tables(&["orders".to_string()]).unwrap();
    assert_eq!(loaded.len(), 1);
    let orders = runner.get_table("orders").unwrap();
    assert_eq!(orders.primary_column_names(), vec!["id".to_string()]);
    let id = orders.find_column("id").unwrap();
    assert_eq!(id.length, Some(ColumnLength::Fixed(36)));
    assert!(!id.nullable);
    assert_eq!(
        orders.find_column("created_at").unwrap().default,
        Some(ColumnDefault::CommitTimestamp)
    );
    // now answered from the cache
    executor.clear_calls();
    assert!(runner.has_table("orders").unwrap());
    assert!(executor.calls().is_empty());
}

#[test]
fn test_existing_shadow_table_round_trip() {
    let (mut runner, executor) = runner();
    // shadow table exists natively and holds one generator row
    executor.append_query_results(vec![vec![row(&[("TABLE_NAME", json!("schemas"))])]]);
    executor.append_query_results(vec![
        vec![row(&[("TABLE_NAME", json!("schemas"))])],
        vec![],
        vec![],
        vec![],
    ]);
    executor.append_query_results(vec![vec![row(&[
        ("table", json!("orders")),
        ("column", json!("id")),
        ("type", json!("generator")),
        ("value", json!("uuid")),
    ])]]);

    runner.create_and_load_schema_table_if_not_exists().unwrap();
    assert!(executor.schema_batches().is_empty());
    assert_eq!(
        runner.extended_schema().generator_for("orders", "id"),
        Some(ColumnGenerator::RandomUuid)
    );

    executor.append_query_results(information_schema("orders"));
    runner.load_tables(&["orders".to_string()]).unwrap();
    let orders = runner.get_table("orders").unwrap();
    assert_eq!(
        orders.find_column("id").unwrap().generation_strategy,
        Some(GenerationStrategy::Uuid)
    );

    // dropping the strategy deletes the entry
    runner
        .change_column(
            "orders",
            "id",
            Column::new("id", ColumnType::String)
                .length(ColumnLength::Fixed(36))
                .primary(),
        )
        .unwrap();
    assert!(runner.extended_schema().generator_for("orders", "id").is_none());
    assert!(executor.schema_batches().is_empty());
}

#[test]
fn test_increment_is_served_by_random_uuids() {
    let (mut runner, _executor) = runner();
    runner
        .create_table(
            spanguard::Table::new("counters").column(
                Column::new("id", ColumnType::String)
                    .primary()
                    .generated(GenerationStrategy::Increment),
            ),
            false,
            true,
            true,
        )
        .unwrap();

    let generator = runner
        .extended_schema()
        .generator_for("counters", "id")
        .unwrap();
    assert_eq!(generator, ColumnGenerator::RandomUuid);
    let value = generator.generate();
    assert_eq!(value.as_str().map(str::len), Some(36));
}
