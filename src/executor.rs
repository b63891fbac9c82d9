//! Native engine interfaces.
//!
//! The transport to the storage engine lives outside this crate. These traits describe
//! what the runner consumes from it: key-addressed mutations, SQL reads, schema-update
//! batches with an asynchronous completion handle, database lifecycle calls and
//! transactions.
//!
//! Calls are blocking from the caller's point of view. Inside a `may` coroutine they
//! suspend the coroutine rather than the worker thread, which is how the runner keeps a
//! synchronous-looking API over an asynchronous transport.

use crossbeam_channel::{Receiver, RecvTimeoutError};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// A row as exchanged with the engine: column name to JSON value, ordered by name.
pub type Row = BTreeMap<String, JsonValue>;

/// Error reported by the engine or its transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    /// Engine status code, when the transport exposes one
    pub code: Option<String>,
    /// Engine message
    pub message: String,
}

impl NativeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{code}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for NativeError {}

/// A SQL statement with named `@pN` parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlStatement {
    pub sql: String,
    pub params: BTreeMap<String, JsonValue>,
    /// Ask the engine to return rows as plain JSON objects
    pub json: bool,
}

impl SqlStatement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: BTreeMap::new(),
            json: true,
        }
    }

    pub fn with_params(sql: impl Into<String>, params: BTreeMap<String, JsonValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
            json: true,
        }
    }

    /// Parameters rendered for diagnostics
    pub fn params_json(&self) -> JsonValue {
        serde_json::to_value(&self.params).unwrap_or(JsonValue::Null)
    }
}

/// Key batch argument for `delete_rows` / `read`.
///
/// The engine takes a flat list of scalars when the primary key has one column and a
/// list of `[column, value]` pairs per row when it is composite.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyBatch {
    Single(Vec<JsonValue>),
    Composite(Vec<Vec<(String, JsonValue)>>),
}

impl KeyBatch {
    pub fn len(&self) -> usize {
        match self {
            KeyBatch::Single(keys) => keys.len(),
            KeyBatch::Composite(keys) => keys.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// JSON rendering in the engine's argument format
    pub fn to_json(&self) -> JsonValue {
        match self {
            KeyBatch::Single(keys) => JsonValue::Array(keys.clone()),
            KeyBatch::Composite(keys) => JsonValue::Array(
                keys.iter()
                    .map(|pairs| {
                        JsonValue::Array(
                            pairs
                                .iter()
                                .map(|(column, value)| {
                                    JsonValue::Array(vec![
                                        JsonValue::String(column.clone()),
                                        value.clone(),
                                    ])
                                })
                                .collect(),
                        )
                    })
                    .collect(),
            ),
        }
    }
}

/// Completion handle for a long-running engine operation (schema update, database
/// create/drop). The engine resolves it once the change has propagated.
pub struct SchemaOperation {
    name: String,
    receiver: Receiver<Result<(), NativeError>>,
}

impl SchemaOperation {
    pub fn new(name: impl Into<String>, receiver: Receiver<Result<(), NativeError>>) -> Self {
        Self {
            name: name.into(),
            receiver,
        }
    }

    /// A handle that has already resolved with `result`
    pub fn resolved(name: impl Into<String>, result: Result<(), NativeError>) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let _ = tx.send(result);
        Self::new(name, rx)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block until the engine reports completion
    pub fn wait(self, timeout: Duration) -> Result<(), NativeError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(NativeError::with_code(
                "DEADLINE_EXCEEDED",
                format!("operation {} did not complete within {:?}", self.name, timeout),
            )),
            Err(RecvTimeoutError::Disconnected) => Err(NativeError::with_code(
                "CANCELLED",
                format!("operation {} was dropped by the transport", self.name),
            )),
        }
    }
}

impl fmt::Debug for SchemaOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaOperation").field("name", &self.name).finish()
    }
}

/// Streaming read over a large result set
pub struct RowStream {
    rows: Box<dyn Iterator<Item = Result<Row, NativeError>> + Send>,
}

impl RowStream {
    pub fn new(rows: Box<dyn Iterator<Item = Result<Row, NativeError>> + Send>) -> Self {
        Self { rows }
    }

    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self::new(Box::new(rows.into_iter().map(Ok)))
    }

    /// Feed every row to `on_row`. `Ok(count)` is the end event, `Err` the error event.
    pub fn drain<F: FnMut(Row)>(self, mut on_row: F) -> Result<usize, NativeError> {
        let mut count = 0;
        for row in self.rows {
            on_row(row?);
            count += 1;
        }
        Ok(count)
    }
}

impl Iterator for RowStream {
    type Item = Result<Row, NativeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }
}

/// Per-table mutation verbs and SQL reads.
///
/// The bare connection and an open transaction both implement this trait, so the CRUD
/// translator is written once against it and both paths share one contract.
pub trait Mutator {
    fn insert(&self, table: &str, rows: Vec<Row>) -> Result<(), NativeError>;

    fn update(&self, table: &str, rows: Vec<Row>) -> Result<(), NativeError>;

    fn upsert(&self, table: &str, rows: Vec<Row>) -> Result<(), NativeError>;

    fn delete_rows(&self, table: &str, keys: KeyBatch) -> Result<(), NativeError>;

    /// Run a SQL read and return all rows
    fn run(&self, statement: &SqlStatement) -> Result<Vec<Row>, NativeError>;
}

/// An open read-write transaction
pub trait NativeTransaction: Mutator + Send {
    /// Key-addressed read
    fn read(&self, table: &str, keys: &KeyBatch, columns: &[String])
        -> Result<Vec<Row>, NativeError>;

    fn commit(self: Box<Self>) -> Result<(), NativeError>;

    fn rollback(self: Box<Self>) -> Result<(), NativeError>;
}

/// A database handle on the engine
pub trait SpannerExecutor: Mutator + Send + Sync {
    /// Streaming variant of [`Mutator::run`]
    fn run_stream(&self, statement: &SqlStatement) -> Result<RowStream, NativeError>;

    /// Submit a batch of DDL statements
    fn update_schema(&self, statements: Vec<String>) -> Result<SchemaOperation, NativeError>;

    fn create_database(&self, name: &str) -> Result<SchemaOperation, NativeError>;

    fn drop_database(&self, name: &str) -> Result<(), NativeError>;

    fn list_databases(&self) -> Result<Vec<String>, NativeError>;

    fn begin_transaction(&self) -> Result<Box<dyn NativeTransaction>, NativeError>;
}
