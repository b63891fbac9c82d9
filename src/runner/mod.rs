//! The query runner.
//!
//! `SpannerQueryRunner` is the surface a migration or ORM layer calls: transactions,
//! raw queries, builder operations, database lifecycle and every schema change. Schema
//! changes follow one pattern:
//!
//! ```text
//! clone cached table -> change clone -> build up/down pairs -> execute -> swap cache entry
//! ```
//!
//! so the cache only ever reflects statements the engine accepted. With SQL memory
//! enabled, pairs are recorded instead of executed.

mod schema_ops;

use crate::admin::{classify, AdminDispatcher, AdminStatement, Statement};
use crate::config::RunnerConfig;
use crate::connection::{ConnectionSlot, Connector};
use crate::ddl::{SqlInMemory, StatementPair};
use crate::error::RunnerError;
use crate::executor::{Row, RowStream, SpannerExecutor, SqlStatement};
use crate::extended_schema::ExtendedSchemaStore;
use crate::metrics::{observe, CallKind};
use crate::query::{positional_params, CrudOutcome, CrudTranslator, Operation, Target};
use crate::schema::{loader, MetadataCache, Table};
use crate::transaction::{TransactionController, TransactionState};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

const HAS_TABLE_SQL: &str = "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
    WHERE TABLE_SCHEMA = '' AND TABLE_NAME = @p1";

const HAS_COLUMN_SQL: &str = "SELECT COLUMN_NAME FROM INFORMATION_SCHEMA.COLUMNS \
    WHERE TABLE_SCHEMA = '' AND TABLE_NAME = @p1 AND COLUMN_NAME = @p2";

pub struct SpannerQueryRunner {
    config: RunnerConfig,
    connection: ConnectionSlot,
    cache: MetadataCache,
    extended: ExtendedSchemaStore,
    transactions: TransactionController,
    memory: SqlInMemory,
    sql_memory_mode: bool,
}

impl SpannerQueryRunner {
    /// Runner for the database named by `config`; the connection opens on first use
    pub fn new(config: RunnerConfig, connector: Box<dyn Connector>) -> Result<Self, RunnerError> {
        let path = config.database_path()?;
        Ok(Self::build(config, ConnectionSlot::new(path, connector)))
    }

    /// Runner over an executor that is already open
    pub fn with_executor(
        config: RunnerConfig,
        executor: Arc<dyn SpannerExecutor>,
    ) -> Result<Self, RunnerError> {
        let path = config.database_path()?;
        Ok(Self::build(config, ConnectionSlot::with_executor(path, executor)))
    }

    /// Runner configured from `config/config.toml` and `SPANGUARD__*` variables
    pub fn from_env(connector: Box<dyn Connector>) -> Result<Self, RunnerError> {
        let config = RunnerConfig::load().map_err(|e| RunnerError::Config(e.to_string()))?;
        Self::new(config, connector)
    }

    fn build(config: RunnerConfig, connection: ConnectionSlot) -> Self {
        let extended = ExtendedSchemaStore::from_config(&config);
        Self {
            config,
            connection,
            cache: MetadataCache::new(),
            extended,
            transactions: TransactionController::new(),
            memory: SqlInMemory::new(),
            sql_memory_mode: false,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    pub fn extended_schema(&self) -> &ExtendedSchemaStore {
        &self.extended
    }

    /// Cached definition of `name`
    pub fn get_table(&self, name: &str) -> Option<Arc<Table>> {
        self.cache.find(name)
    }

    /// Acquire (or reuse) the connection
    pub fn connect(&mut self) -> Result<Arc<dyn SpannerExecutor>, RunnerError> {
        self.ensure_open()?;
        Ok(self.connection.acquire()?)
    }

    /// Retire the runner. Later calls fail with [`RunnerError::Released`].
    pub fn release(&mut self) {
        if self.transactions.is_active() {
            log::warn!("releasing runner with an open transaction; it is rolled back");
            if let Err(e) = self.transactions.rollback() {
                log::warn!("rollback on release failed: {}", e);
            }
        }
        self.connection.release();
    }

    pub fn is_released(&self) -> bool {
        self.connection.is_released()
    }

    fn ensure_open(&self) -> Result<(), RunnerError> {
        if self.connection.is_released() {
            return Err(RunnerError::Released);
        }
        Ok(())
    }

    fn dispatch_admin(&mut self, statement: AdminStatement) -> Result<(), RunnerError> {
        let executor = self.connect()?;
        AdminDispatcher::new(&*executor, self.config.operation_timeout()).dispatch(statement)
    }

    // ---- transactions ----

    pub fn start_transaction(&mut self) -> Result<(), RunnerError> {
        let executor = self.connect()?;
        self.transactions.start(&*executor)?;
        Ok(())
    }

    pub fn commit_transaction(&mut self) -> Result<(), RunnerError> {
        self.ensure_open()?;
        Ok(self.transactions.commit()?)
    }

    pub fn rollback_transaction(&mut self) -> Result<(), RunnerError> {
        self.ensure_open()?;
        Ok(self.transactions.rollback()?)
    }

    pub fn transaction_state(&self) -> TransactionState {
        self.transactions.state()
    }

    pub fn is_transaction_active(&self) -> bool {
        self.transactions.is_active()
    }

    // ---- queries ----

    /// Run statement text. Administrative statements are dispatched and return no rows;
    /// selects bind `params` as `@p1..@pN` and run in the open transaction, if any.
    pub fn query(&mut self, sql: &str, params: Vec<JsonValue>) -> Result<Vec<Row>, RunnerError> {
        let select = match classify(sql)? {
            Statement::Administrative(statement) => {
                self.dispatch_admin(statement)?;
                return Ok(Vec::new());
            }
            Statement::Select(select) => select,
        };
        let executor = self.connect()?;
        let statement = SqlStatement::with_params(select, positional_params(params));
        let target = match self.transactions.active() {
            Some(transaction) => Target::Transaction(transaction),
            None => Target::Direct(&*executor),
        };
        target.run(&statement)
    }

    /// Streaming select over the connection
    pub fn stream(&mut self, sql: &str, params: Vec<JsonValue>) -> Result<RowStream, RunnerError> {
        let select = match classify(sql)? {
            Statement::Select(select) => select,
            Statement::Administrative(_) => {
                return Err(RunnerError::Unhandled(format!(
                    "administrative statements cannot be streamed: {}",
                    sql.trim()
                )))
            }
        };
        let executor = self.connect()?;
        let statement = SqlStatement::with_params(select, positional_params(params));

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::execute_query_span(&statement.sql).entered();

        let start = Instant::now();
        let result = executor.run_stream(&statement);
        observe(CallKind::Query, start, &result);
        result.map_err(|e| RunnerError::native(&statement.sql, statement.params_json(), e))
    }

    /// Translate and run a builder operation
    pub fn query_by_builder(&mut self, op: Operation) -> Result<CrudOutcome, RunnerError> {
        let executor = self.connect()?;
        let target = match self.transactions.active() {
            Some(transaction) => Target::Transaction(transaction),
            None => Target::Direct(&*executor),
        };
        CrudTranslator::new(&self.cache).execute(target, op)
    }

    /// Delete every row of `table`
    pub fn clear_table(&mut self, table: &str) -> Result<CrudOutcome, RunnerError> {
        self.query_by_builder(Operation::delete(table))
    }

    // ---- databases ----

    pub fn create_database(&mut self, name: &str, if_not_exists: bool) -> Result<(), RunnerError> {
        self.dispatch_admin(AdminStatement::CreateDatabase {
            name: name.to_string(),
            if_not_exists,
        })
    }

    pub fn drop_database(&mut self, name: &str, if_exists: bool) -> Result<(), RunnerError> {
        self.dispatch_admin(AdminStatement::DropDatabase {
            name: name.to_string(),
            if_exists,
        })
    }

    pub fn get_databases(&mut self) -> Result<Vec<String>, RunnerError> {
        let executor = self.connect()?;
        AdminDispatcher::new(&*executor, self.config.operation_timeout()).list_databases()
    }

    pub fn has_database(&mut self, name: &str) -> Result<bool, RunnerError> {
        Ok(self.get_databases()?.iter().any(|n| n == name))
    }

    // ---- metadata ----

    /// True when `name` is cached or known to the engine
    pub fn has_table(&mut self, name: &str) -> Result<bool, RunnerError> {
        if self.cache.contains(name) {
            return Ok(true);
        }
        let executor = self.connect()?;
        let statement = SqlStatement::with_params(
            HAS_TABLE_SQL,
            positional_params(vec![JsonValue::String(name.to_string())]),
        );
        Ok(!Target::Direct(&*executor).run(&statement)?.is_empty())
    }

    pub fn has_column(&mut self, table: &str, column: &str) -> Result<bool, RunnerError> {
        if let Some(cached) = self.cache.find(table) {
            return Ok(cached.find_column(column).is_some());
        }
        let executor = self.connect()?;
        let statement = SqlStatement::with_params(
            HAS_COLUMN_SQL,
            positional_params(vec![
                JsonValue::String(table.to_string()),
                JsonValue::String(column.to_string()),
            ]),
        );
        Ok(!Target::Direct(&*executor).run(&statement)?.is_empty())
    }

    /// Read definitions from INFORMATION_SCHEMA into the cache
    pub fn load_tables(&mut self, names: &[String]) -> Result<Vec<Arc<Table>>, RunnerError> {
        let executor = self.connect()?;
        let cache = &self.cache;
        let mut tables = loader::load_tables(&*executor, names, |parent| {
            cache.find(parent).map(|t| t.primary_column_names())
        })?;
        if self.extended.is_loaded() {
            for table in &mut tables {
                self.extended.apply_to(table);
            }
        }
        log::debug!("loaded {} table definition(s)", tables.len());
        Ok(tables.into_iter().map(|t| self.cache.put(t)).collect())
    }

    /// Create the shadow table when missing, then load its entries once
    pub fn create_and_load_schema_table_if_not_exists(&mut self) -> Result<(), RunnerError> {
        let name = self.extended.table_name().to_string();
        if self.extended.is_loaded() && self.cache.contains(&name) {
            return Ok(());
        }
        if !self.cache.contains(&name) {
            if self.has_table(&name)? {
                self.load_tables(&[name.clone()])?;
            } else {
                let definition = self.extended.definition();
                self.create_table(definition, false, false, false)?;
            }
        }
        let executor = self.connect()?;
        self.extended.load(&*executor)?;

        let names = self.cache.table_names();
        for table_name in names {
            if let Some(table) = self.cache.find(&table_name) {
                let mut updated = table.as_ref().clone();
                self.extended.apply_to(&mut updated);
                if updated != *table {
                    self.cache.replace(&table, updated);
                }
            }
        }
        Ok(())
    }

    // ---- statement memory ----

    /// Record statements instead of executing them
    pub fn enable_sql_memory(&mut self) {
        self.sql_memory_mode = true;
        self.memory.clear();
    }

    pub fn disable_sql_memory(&mut self) {
        self.sql_memory_mode = false;
        self.memory.clear();
    }

    pub fn clear_sql_memory(&mut self) {
        self.memory.clear();
    }

    pub fn sql_memory(&self) -> &SqlInMemory {
        &self.memory
    }

    /// Execute recorded down statements, last first, as one batch
    pub fn execute_memory_down_sql(&mut self) -> Result<(), RunnerError> {
        let statements = self.memory.down_in_reverse();
        let executor = self.connect()?;
        AdminDispatcher::new(&*executor, self.config.operation_timeout()).update_schema(statements)
    }

    /// Submit the up statements as one batch, or only record them in memory mode
    fn execute_pairs(&mut self, pairs: Vec<StatementPair>) -> Result<(), RunnerError> {
        self.ensure_open()?;
        if pairs.is_empty() {
            return Ok(());
        }
        if self.sql_memory_mode {
            self.memory.record(&pairs);
            return Ok(());
        }
        let executor = self.connect()?;
        let statements = pairs.iter().map(|p| p.up.clone()).collect();
        AdminDispatcher::new(&*executor, self.config.operation_timeout()).update_schema(statements)
    }

    /// Submit each up statement as its own batch on a separate coroutine, then wait for
    /// all of them. The first failure is returned once every coroutine has finished.
    fn execute_pairs_concurrently(&mut self, pairs: Vec<StatementPair>) -> Result<(), RunnerError> {
        self.ensure_open()?;
        if pairs.len() < 2 || self.sql_memory_mode {
            return self.execute_pairs(pairs);
        }
        let executor = self.connect()?;
        let timeout = self.config.operation_timeout();

        let handles: Vec<_> = pairs
            .iter()
            .map(|pair| {
                let executor = Arc::clone(&executor);
                let statement = pair.up.clone();
                may::go!(move || {
                    AdminDispatcher::new(&*executor, timeout).update_schema(vec![statement])
                })
            })
            .collect();

        let mut first_error = None;
        for handle in handles {
            let result = match handle.join() {
                Ok(join_result) => join_result,
                Err(e) => Err(RunnerError::Internal(format!(
                    "schema update coroutine panicked: {:?}",
                    e
                ))),
            };
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
