//! In-memory executor for tests.
//!
//! `RecordingExecutor` records every native call, replays scripted query results in
//! order and can be told to fail the next call of a given kind. Transactions it opens
//! share its log, with their calls wrapped in [`NativeCall::InTransaction`].

use crate::executor::{
    KeyBatch, Mutator, NativeError, NativeTransaction, Row, RowStream, SchemaOperation,
    SpannerExecutor, SqlStatement,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// One recorded native call
#[derive(Debug, Clone, PartialEq)]
pub enum NativeCall {
    Insert { table: String, rows: Vec<Row> },
    Update { table: String, rows: Vec<Row> },
    Upsert { table: String, rows: Vec<Row> },
    DeleteRows { table: String, keys: KeyBatch },
    Run(SqlStatement),
    RunStream(SqlStatement),
    UpdateSchema(Vec<String>),
    CreateDatabase(String),
    DropDatabase(String),
    ListDatabases,
    BeginTransaction,
    Read {
        table: String,
        keys: KeyBatch,
        columns: Vec<String>,
    },
    Commit,
    Rollback,
    InTransaction(Box<NativeCall>),
}

impl NativeCall {
    /// The call itself, unwrapping transaction scope
    pub fn inner(&self) -> &NativeCall {
        match self {
            NativeCall::InTransaction(call) => call.inner(),
            call => call,
        }
    }

    pub fn is_mutation(&self) -> bool {
        matches!(
            self.inner(),
            NativeCall::Insert { .. }
                | NativeCall::Update { .. }
                | NativeCall::Upsert { .. }
                | NativeCall::DeleteRows { .. }
        )
    }
}

#[derive(Default)]
struct State {
    calls: Vec<NativeCall>,
    query_results: VecDeque<Vec<Row>>,
    query_failures: VecDeque<NativeError>,
    mutation_failures: VecDeque<NativeError>,
    schema_failures: VecDeque<NativeError>,
    commit_failures: VecDeque<NativeError>,
    databases: Vec<String>,
}

#[derive(Clone, Default)]
pub struct RecordingExecutor {
    state: Arc<Mutex<State>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    /// Queue result sets returned by successive `run` / `read` calls
    pub fn append_query_results(&self, results: Vec<Vec<Row>>) {
        self.lock().query_results.extend(results);
    }

    pub fn fail_next_query(&self, error: NativeError) {
        self.lock().query_failures.push_back(error);
    }

    pub fn fail_next_mutation(&self, error: NativeError) {
        self.lock().mutation_failures.push_back(error);
    }

    pub fn fail_next_schema_update(&self, error: NativeError) {
        self.lock().schema_failures.push_back(error);
    }

    pub fn fail_next_commit(&self, error: NativeError) {
        self.lock().commit_failures.push_back(error);
    }

    pub fn add_database(&self, name: impl Into<String>) {
        self.lock().databases.push(name.into());
    }

    pub fn calls(&self) -> Vec<NativeCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// SQL of every `run` call, direct or transactional
    pub fn queries(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|call| match call.inner() {
                NativeCall::Run(statement) | NativeCall::RunStream(statement) => {
                    Some(statement.sql.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Every mutation call, direct or transactional
    pub fn mutations(&self) -> Vec<NativeCall> {
        self.calls()
            .into_iter()
            .filter(NativeCall::is_mutation)
            .collect()
    }

    /// Every submitted DDL batch
    pub fn schema_batches(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                NativeCall::UpdateSchema(batch) => Some(batch),
                _ => None,
            })
            .collect()
    }
}

fn lock(state: &Arc<Mutex<State>>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn record_mutation(
    state: &Arc<Mutex<State>>,
    call: NativeCall,
    transactional: bool,
) -> Result<(), NativeError> {
    let mut state = lock(state);
    state.calls.push(if transactional {
        NativeCall::InTransaction(Box::new(call))
    } else {
        call
    });
    match state.mutation_failures.pop_front() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

fn record_query(
    state: &Arc<Mutex<State>>,
    call: NativeCall,
    transactional: bool,
) -> Result<Vec<Row>, NativeError> {
    let mut state = lock(state);
    state.calls.push(if transactional {
        NativeCall::InTransaction(Box::new(call))
    } else {
        call
    });
    if let Some(error) = state.query_failures.pop_front() {
        return Err(error);
    }
    Ok(state.query_results.pop_front().unwrap_or_default())
}

impl Mutator for RecordingExecutor {
    fn insert(&self, table: &str, rows: Vec<Row>) -> Result<(), NativeError> {
        let table = table.to_string();
        record_mutation(&self.state, NativeCall::Insert { table, rows }, false)
    }

    fn update(&self, table: &str, rows: Vec<Row>) -> Result<(), NativeError> {
        let table = table.to_string();
        record_mutation(&self.state, NativeCall::Update { table, rows }, false)
    }

    fn upsert(&self, table: &str, rows: Vec<Row>) -> Result<(), NativeError> {
        let table = table.to_string();
        record_mutation(&self.state, NativeCall::Upsert { table, rows }, false)
    }

    fn delete_rows(&self, table: &str, keys: KeyBatch) -> Result<(), NativeError> {
        let table = table.to_string();
        record_mutation(&self.state, NativeCall::DeleteRows { table, keys }, false)
    }

    fn run(&self, statement: &SqlStatement) -> Result<Vec<Row>, NativeError> {
        record_query(&self.state, NativeCall::Run(statement.clone()), false)
    }
}

impl SpannerExecutor for RecordingExecutor {
    fn run_stream(&self, statement: &SqlStatement) -> Result<RowStream, NativeError> {
        let rows = record_query(&self.state, NativeCall::RunStream(statement.clone()), false)?;
        Ok(RowStream::from_rows(rows))
    }

    fn update_schema(&self, statements: Vec<String>) -> Result<SchemaOperation, NativeError> {
        let mut state = self.lock();
        state.calls.push(NativeCall::UpdateSchema(statements));
        let result = match state.schema_failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        };
        Ok(SchemaOperation::resolved(
            format!("operations/{}", state.calls.len()),
            result,
        ))
    }

    fn create_database(&self, name: &str) -> Result<SchemaOperation, NativeError> {
        let mut state = self.lock();
        state.calls.push(NativeCall::CreateDatabase(name.to_string()));
        if let Some(error) = state.schema_failures.pop_front() {
            return Ok(SchemaOperation::resolved("create-database", Err(error)));
        }
        state.databases.push(name.to_string());
        Ok(SchemaOperation::resolved("create-database", Ok(())))
    }

    fn drop_database(&self, name: &str) -> Result<(), NativeError> {
        let mut state = self.lock();
        state.calls.push(NativeCall::DropDatabase(name.to_string()));
        state
            .databases
            .retain(|d| d.rsplit('/').next() != Some(name));
        Ok(())
    }

    fn list_databases(&self) -> Result<Vec<String>, NativeError> {
        let mut state = self.lock();
        state.calls.push(NativeCall::ListDatabases);
        Ok(state.databases.clone())
    }

    fn begin_transaction(&self) -> Result<Box<dyn NativeTransaction>, NativeError> {
        self.lock().calls.push(NativeCall::BeginTransaction);
        Ok(Box::new(RecordingTransaction {
            state: Arc::clone(&self.state),
        }))
    }
}

/// Transaction handed out by [`RecordingExecutor`]
pub struct RecordingTransaction {
    state: Arc<Mutex<State>>,
}

impl Mutator for RecordingTransaction {
    fn insert(&self, table: &str, rows: Vec<Row>) -> Result<(), NativeError> {
        let table = table.to_string();
        record_mutation(&self.state, NativeCall::Insert { table, rows }, true)
    }

    fn update(&self, table: &str, rows: Vec<Row>) -> Result<(), NativeError> {
        let table = table.to_string();
        record_mutation(&self.state, NativeCall::Update { table, rows }, true)
    }

    fn upsert(&self, table: &str, rows: Vec<Row>) -> Result<(), NativeError> {
        let table = table.to_string();
        record_mutation(&self.state, NativeCall::Upsert { table, rows }, true)
    }

    fn delete_rows(&self, table: &str, keys: KeyBatch) -> Result<(), NativeError> {
        let table = table.to_string();
        record_mutation(&self.state, NativeCall::DeleteRows { table, keys }, true)
    }

    fn run(&self, statement: &SqlStatement) -> Result<Vec<Row>, NativeError> {
        record_query(&self.state, NativeCall::Run(statement.clone()), true)
    }
}

impl NativeTransaction for RecordingTransaction {
    fn read(
        &self,
        table: &str,
        keys: &KeyBatch,
        columns: &[String],
    ) -> Result<Vec<Row>, NativeError> {
        let call = NativeCall::Read {
            table: table.to_string(),
            keys: keys.clone(),
            columns: columns.to_vec(),
        };
        record_query(&self.state, call, true)
    }

    fn commit(self: Box<Self>) -> Result<(), NativeError> {
        let mut state = lock(&self.state);
        state.calls.push(NativeCall::Commit);
        match state.commit_failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn rollback(self: Box<Self>) -> Result<(), NativeError> {
        lock(&self.state).calls.push(NativeCall::Rollback);
        Ok(())
    }
}
