//! CRUD translation onto the engine's key-addressed mutation API.
//!
//! The engine mutates rows by primary key only. Update, upsert and delete therefore
//! recover keys with a lookup `SELECT <primary key> FROM t WHERE <filter>` whenever the
//! caller did not supply them, and transactional selects read by key after the same
//! lookup because the transaction's read API is key-addressed.

use super::key_shape::shape_keys;
use super::operation::{CrudOutcome, Operation, QueryKind};
use super::value_conversion::render_select;
use crate::error::RunnerError;
use crate::executor::{KeyBatch, Mutator, NativeError, NativeTransaction, Row, SpannerExecutor, SqlStatement};
use crate::metrics::{observe, CallKind};
use crate::schema::{MetadataCache, Table};
use sea_query::{Asterisk, Condition, Query};
use std::time::Instant;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Where native calls go: the bare connection or the open transaction
#[derive(Clone, Copy)]
pub enum Target<'a> {
    Direct(&'a dyn SpannerExecutor),
    Transaction(&'a dyn NativeTransaction),
}

impl Target<'_> {
    pub fn is_transactional(&self) -> bool {
        matches!(self, Target::Transaction(_))
    }

    /// Run a SQL read, wrapping failures with the statement
    pub fn run(&self, statement: &SqlStatement) -> Result<Vec<Row>, RunnerError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::execute_query_span(&statement.sql).entered();

        let start = Instant::now();
        let result = match self {
            Target::Direct(executor) => executor.run(statement),
            Target::Transaction(transaction) => transaction.run(statement),
        };
        observe(CallKind::Query, start, &result);
        result.map_err(|e| RunnerError::native(&statement.sql, statement.params_json(), e))
    }

    fn mutate(&self, kind: QueryKind, table: &str, rows: Vec<Row>) -> Result<(), RunnerError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::mutation_span(kind.as_str(), table).entered();

        log::debug!("{} {} row(s) in {}", kind, rows.len(), table);
        let params = serde_json::to_value(&rows).unwrap_or(serde_json::Value::Null);
        let start = Instant::now();
        let result = match self {
            Target::Direct(executor) => apply(*executor, kind, table, rows),
            Target::Transaction(transaction) => apply(*transaction, kind, table, rows),
        };
        observe(CallKind::Mutation, start, &result);
        result.map_err(|e| RunnerError::native(format!("{kind} {table}"), params, e))
    }

    fn delete_rows(&self, table: &str, keys: KeyBatch) -> Result<(), RunnerError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::mutation_span("delete", table).entered();

        log::debug!("delete {} key(s) from {}", keys.len(), table);
        let params = keys.to_json();
        let start = Instant::now();
        let result = match self {
            Target::Direct(executor) => executor.delete_rows(table, keys),
            Target::Transaction(transaction) => transaction.delete_rows(table, keys),
        };
        observe(CallKind::Mutation, start, &result);
        result.map_err(|e| RunnerError::native(format!("delete {table}"), params, e))
    }
}

fn apply<M: Mutator + ?Sized>(
    mutator: &M,
    kind: QueryKind,
    table: &str,
    rows: Vec<Row>,
) -> Result<(), NativeError> {
    match kind {
        QueryKind::Insert => mutator.insert(table, rows),
        QueryKind::Update => mutator.update(table, rows),
        QueryKind::Upsert => mutator.upsert(table, rows),
        QueryKind::Select | QueryKind::Delete => Err(NativeError::new(format!(
            "{kind} is not a row mutation"
        ))),
    }
}

/// `SELECT <primary key columns> FROM table WHERE filter`
pub fn build_key_lookup(
    table: &Table,
    filter: Option<&Condition>,
    limit: Option<u64>,
) -> Result<SqlStatement, RunnerError> {
    let primary = table.primary_column_names();
    if primary.is_empty() {
        return Err(RunnerError::Shape(format!(
            "table {} has no primary key to address rows by",
            table.name
        )));
    }
    build_select(&table.name, &primary, filter, limit)
}

/// `SELECT columns FROM table WHERE filter LIMIT n`; no columns selects `*`
pub fn build_select(
    table: &str,
    columns: &[String],
    filter: Option<&Condition>,
    limit: Option<u64>,
) -> Result<SqlStatement, RunnerError> {
    let mut query = Query::select();
    if columns.is_empty() {
        query.column(Asterisk);
    } else {
        query.columns(columns.iter().cloned());
    }
    query.from(table.to_string());
    if let Some(condition) = filter {
        query.cond_where(condition.clone());
    }
    if let Some(limit) = limit {
        query.limit(limit);
    }
    render_select(&query)
}

/// Translates [`Operation`]s using primary keys from the metadata cache
pub struct CrudTranslator<'a> {
    cache: &'a MetadataCache,
}

impl<'a> CrudTranslator<'a> {
    pub fn new(cache: &'a MetadataCache) -> Self {
        Self { cache }
    }

    pub fn execute(&self, target: Target<'_>, op: Operation) -> Result<CrudOutcome, RunnerError> {
        let table = self.cache.get(&op.table)?;
        match op.kind {
            QueryKind::Insert => self.insert(target, &table, op),
            QueryKind::Update | QueryKind::Upsert => self.update(target, &table, op),
            QueryKind::Delete => self.delete(target, &table, op),
            QueryKind::Select => self.select(target, &table, op),
        }
    }

    fn insert(&self, target: Target<'_>, table: &Table, op: Operation) -> Result<CrudOutcome, RunnerError> {
        if op.values.is_empty() {
            return Ok(CrudOutcome::nothing());
        }
        let affected = op.values.len();
        target.mutate(QueryKind::Insert, &table.name, op.values)?;
        Ok(CrudOutcome::affected(affected))
    }

    fn update(&self, target: Target<'_>, table: &Table, op: Operation) -> Result<CrudOutcome, RunnerError> {
        if op.values.len() != 1 {
            return Err(RunnerError::SingleValueSet {
                supplied: op.values.len(),
            });
        }
        let kind = op.kind;
        let values = op.values.into_iter().next().unwrap_or_default();
        let primary = table.primary_column_names();

        if !primary.is_empty() && primary.iter().all(|c| values.contains_key(c)) {
            target.mutate(kind, &table.name, vec![values])?;
            return Ok(CrudOutcome::affected(1));
        }

        let lookup = build_key_lookup(table, op.filter.as_ref(), op.limit)?;
        let keys = target.run(&lookup)?;
        if keys.is_empty() {
            log::debug!("{} on {} matched no rows", kind, table.name);
            return Ok(CrudOutcome::nothing());
        }
        let merged: Vec<Row> = keys
            .into_iter()
            .map(|mut row| {
                row.extend(values.clone());
                row
            })
            .collect();
        let affected = merged.len();
        target.mutate(kind, &table.name, merged)?;
        Ok(CrudOutcome::affected(affected))
    }

    fn delete(&self, target: Target<'_>, table: &Table, op: Operation) -> Result<CrudOutcome, RunnerError> {
        let lookup = build_key_lookup(table, op.filter.as_ref(), op.limit)?;
        let rows = target.run(&lookup)?;
        if rows.is_empty() {
            return Ok(CrudOutcome::nothing());
        }
        let keys = shape_keys(&table.primary_column_names(), &rows);
        let affected = keys.len();
        target.delete_rows(&table.name, keys)?;
        Ok(CrudOutcome::affected(affected))
    }

    fn select(&self, target: Target<'_>, table: &Table, op: Operation) -> Result<CrudOutcome, RunnerError> {
        let transaction = match target {
            Target::Direct(_) => {
                let statement =
                    build_select(&table.name, &op.columns, op.filter.as_ref(), op.limit)?;
                return Ok(CrudOutcome::rows(target.run(&statement)?));
            }
            Target::Transaction(transaction) => transaction,
        };

        let lookup = build_key_lookup(table, op.filter.as_ref(), op.limit)?;
        let rows = target.run(&lookup)?;
        if rows.is_empty() {
            return Ok(CrudOutcome::nothing());
        }
        let keys = shape_keys(&table.primary_column_names(), &rows);
        let columns = if op.columns.is_empty() {
            table.column_names()
        } else {
            op.columns
        };

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::mutation_span("read", &table.name).entered();

        let start = Instant::now();
        let result = transaction.read(&table.name, &keys, &columns);
        observe(CallKind::Query, start, &result);
        let rows = result.map_err(|e| {
            RunnerError::native(format!("read {}", table.name), keys.to_json(), e)
        })?;
        Ok(CrudOutcome::rows(rows))
    }
}
