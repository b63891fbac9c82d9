//! Builder operations translated onto key-addressed native calls.

mod common;

use common::{order_lines, orders, row, runner};
use sea_query::{Condition, Expr, ExprTrait};
use serde_json::json;
use spanguard::executor::{KeyBatch, NativeError};
use spanguard::test_helpers::{NativeCall, RecordingExecutor};
use spanguard::{Operation, RunnerError, SpannerQueryRunner};

fn runner_with_tables() -> (SpannerQueryRunner, RecordingExecutor) {
    let (mut runner, executor) = runner();
    runner.create_table(orders(), false, true, true).unwrap();
    runner.create_table(order_lines(), false, true, true).unwrap();
    executor.clear_calls();
    (runner, executor)
}

fn over_100() -> Condition {
    Condition::all().add(Expr::col("total").gt(100))
}

// ============================================================================
// Delete
// ============================================================================

#[test]
fn test_delete_single_key_is_flat_list() {
    let (mut runner, executor) = runner_with_tables();
    executor.append_query_results(vec![vec![
        row(&[("id", json!("a"))]),
        row(&[("id", json!("b"))]),
    ]]);

    let outcome = runner
        .query_by_builder(Operation::delete("orders").filter(over_100()))
        .unwrap();

    assert_eq!(outcome.affected, 2);
    assert_eq!(
        executor.queries(),
        vec!["SELECT `id` FROM `orders` WHERE `total` > @p1".to_string()]
    );
    assert_eq!(
        executor.mutations(),
        vec![NativeCall::DeleteRows {
            table: "orders".to_string(),
            keys: KeyBatch::Single(vec![json!("a"), json!("b")]),
        }]
    );
}

#[test]
fn test_delete_composite_key_is_column_value_pairs() {
    let (mut runner, executor) = runner_with_tables();
    executor.append_query_results(vec![vec![row(&[
        ("order_id", json!("a")),
        ("line", json!(1)),
    ])]]);

    runner
        .query_by_builder(
            Operation::delete("order_lines").filter(Condition::all().add(Expr::col("sku").eq("x"))),
        )
        .unwrap();

    assert_eq!(
        executor.queries(),
        vec!["SELECT `order_id`, `line` FROM `order_lines` WHERE `sku` = @p1".to_string()]
    );
    assert_eq!(
        executor.mutations(),
        vec![NativeCall::DeleteRows {
            table: "order_lines".to_string(),
            keys: KeyBatch::Composite(vec![vec![
                ("order_id".to_string(), json!("a")),
                ("line".to_string(), json!(1)),
            ]]),
        }]
    );
}

#[test]
fn test_delete_without_matches_is_noop() {
    let (mut runner, executor) = runner_with_tables();
    let outcome = runner.clear_table("orders").unwrap();
    assert_eq!(outcome.affected, 0);
    assert_eq!(executor.queries(), vec!["SELECT `id` FROM `orders`".to_string()]);
    assert!(executor.mutations().is_empty());
}

// ============================================================================
// Insert / update / upsert
// ============================================================================

#[test]
fn test_insert_writes_rows_directly() {
    let (mut runner, executor) = runner_with_tables();
    let rows = vec![
        row(&[("id", json!("a")), ("total", json!("10.5"))]),
        row(&[("id", json!("b")), ("total", json!("99"))]),
    ];
    let outcome = runner
        .query_by_builder(Operation::insert("orders", rows.clone()))
        .unwrap();

    assert_eq!(outcome.affected, 2);
    assert!(executor.queries().is_empty());
    assert_eq!(
        executor.mutations(),
        vec![NativeCall::Insert {
            table: "orders".to_string(),
            rows,
        }]
    );
}

#[test]
fn test_update_with_full_key_skips_lookup() {
    let (mut runner, executor) = runner_with_tables();
    let values = row(&[("id", json!("a")), ("total", json!("1"))]);
    runner
        .query_by_builder(Operation::upsert("orders", values.clone()))
        .unwrap();

    assert!(executor.queries().is_empty());
    assert_eq!(
        executor.mutations(),
        vec![NativeCall::Upsert {
            table: "orders".to_string(),
            rows: vec![values],
        }]
    );
}

#[test]
fn test_update_without_key_runs_one_lookup_and_merges() {
    let (mut runner, executor) = runner_with_tables();
    executor.append_query_results(vec![vec![
        row(&[("id", json!("a"))]),
        row(&[("id", json!("b"))]),
    ]]);

    let outcome = runner
        .query_by_builder(
            Operation::update("orders", row(&[("total", json!("0"))])).filter(over_100()),
        )
        .unwrap();

    assert_eq!(outcome.affected, 2);
    assert_eq!(executor.queries().len(), 1);
    assert_eq!(
        executor.mutations(),
        vec![NativeCall::Update {
            table: "orders".to_string(),
            rows: vec![
                row(&[("id", json!("a")), ("total", json!("0"))]),
                row(&[("id", json!("b")), ("total", json!("0"))]),
            ],
        }]
    );
}

#[test]
fn test_update_lookup_without_rows_mutates_nothing() {
    let (mut runner, executor) = runner_with_tables();
    let outcome = runner
        .query_by_builder(
            Operation::update("orders", row(&[("total", json!("0"))])).filter(over_100()),
        )
        .unwrap();

    assert_eq!(outcome.affected, 0);
    assert_eq!(
        executor.queries(),
        vec!["SELECT `id` FROM `orders` WHERE `total` > @p1".to_string()]
    );
    assert!(executor.mutations().is_empty());
}

#[test]
fn test_update_requires_single_value_set() {
    let (mut runner, executor) = runner_with_tables();
    let op = Operation::update("orders", row(&[("total", json!("0"))]))
        .values(vec![row(&[("total", json!("1"))]), row(&[("total", json!("2"))])]);

    assert!(matches!(
        runner.query_by_builder(op),
        Err(RunnerError::SingleValueSet { supplied: 2 })
    ));
    assert!(executor.calls().is_empty());
}

// ============================================================================
// Select
// ============================================================================

#[test]
fn test_direct_select_runs_query() {
    let (mut runner, executor) = runner_with_tables();
    executor.append_query_results(vec![vec![row(&[("total", json!("150"))])]]);

    let outcome = runner
        .query_by_builder(Operation::select("orders", ["total"]).filter(over_100()).limit(5))
        .unwrap();

    assert_eq!(outcome.rows, vec![row(&[("total", json!("150"))])]);
    assert_eq!(
        executor.queries(),
        vec!["SELECT `total` FROM `orders` WHERE `total` > @p1 LIMIT @p2".to_string()]
    );
}

#[test]
fn test_transactional_select_reads_by_key() {
    let (mut runner, executor) = runner_with_tables();
    executor.append_query_results(vec![
        vec![row(&[("id", json!("a"))])],
        vec![row(&[("id", json!("a")), ("total", json!("150"))])],
    ]);

    runner.start_transaction().unwrap();
    let outcome = runner
        .query_by_builder(Operation::select("orders", Vec::<String>::new()).filter(over_100()))
        .unwrap();
    runner.commit_transaction().unwrap();

    assert_eq!(outcome.rows.len(), 1);
    let calls = executor.calls();
    assert_eq!(calls[0], NativeCall::BeginTransaction);
    assert!(matches!(calls[1], NativeCall::InTransaction(_)));
    assert_eq!(
        calls[2].inner(),
        &NativeCall::Read {
            table: "orders".to_string(),
            keys: KeyBatch::Single(vec![json!("a")]),
            columns: vec!["id".to_string(), "total".to_string()],
        }
    );
    assert_eq!(calls[3], NativeCall::Commit);
}

#[test]
fn test_transactional_mutations_use_transaction() {
    let (mut runner, executor) = runner_with_tables();
    runner.start_transaction().unwrap();
    runner
        .query_by_builder(Operation::insert(
            "orders",
            vec![row(&[("id", json!("a"))])],
        ))
        .unwrap();
    runner.rollback_transaction().unwrap();

    let calls = executor.calls();
    assert!(matches!(calls[1], NativeCall::InTransaction(_)));
    assert!(calls[1].is_mutation());
    assert_eq!(calls[2], NativeCall::Rollback);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_unknown_table_is_fatal() {
    let (mut runner, executor) = runner_with_tables();
    let err = runner
        .query_by_builder(Operation::delete("ghosts"))
        .unwrap_err();
    assert!(matches!(err, RunnerError::TableNotFound(ref t) if t == "ghosts"));
    assert!(err.is_fatal());
    assert!(executor.calls().is_empty());
}

#[test]
fn test_native_failure_carries_statement() {
    let (mut runner, executor) = runner_with_tables();
    executor.fail_next_mutation(NativeError::with_code("ALREADY_EXISTS", "Row [a] already exists"));

    let err = runner
        .query_by_builder(Operation::insert("orders", vec![row(&[("id", json!("a"))])]))
        .unwrap_err();
    match err {
        RunnerError::Native { statement, params, source } => {
            assert!(statement.contains("orders"));
            assert_eq!(params[0]["id"], json!("a"));
            assert_eq!(source.code.as_deref(), Some("ALREADY_EXISTS"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
