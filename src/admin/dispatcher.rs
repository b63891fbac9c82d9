//! Routes administrative statements to the engine's schema-update and
//! database-lifecycle calls and waits for their completion handles.

use super::classifier::AdminStatement;
use crate::error::RunnerError;
use crate::executor::SpannerExecutor;
use crate::metrics::{observe, CallKind};
use serde_json::Value as JsonValue;
use std::time::{Duration, Instant};

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

pub struct AdminDispatcher<'a> {
    executor: &'a dyn SpannerExecutor,
    timeout: Duration,
}

impl<'a> AdminDispatcher<'a> {
    /// `timeout` bounds the wait on each completion handle
    pub fn new(executor: &'a dyn SpannerExecutor, timeout: Duration) -> Self {
        Self { executor, timeout }
    }

    pub fn dispatch(&self, statement: AdminStatement) -> Result<(), RunnerError> {
        match statement {
            AdminStatement::CreateDatabase {
                name,
                if_not_exists,
            } => self.create_database(&name, if_not_exists),
            AdminStatement::DropDatabase { name, if_exists } => {
                self.drop_database(&name, if_exists)
            }
            AdminStatement::SchemaUpdate(statements) => self.update_schema(statements),
        }
    }

    /// Submit one DDL batch and block until the engine reports it applied
    pub fn update_schema(&self, statements: Vec<String>) -> Result<(), RunnerError> {
        if statements.is_empty() {
            return Ok(());
        }

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::schema_update_span(statements.len()).entered();

        log::debug!("submitting schema update: {:?}", statements);
        let text = statements.join(";\n");
        let start = Instant::now();
        let result = self
            .executor
            .update_schema(statements)
            .and_then(|operation| operation.wait(self.timeout));
        observe(CallKind::SchemaUpdate, start, &result);
        result.map_err(|e| RunnerError::native(text, JsonValue::Null, e))
    }

    pub fn create_database(&self, name: &str, if_not_exists: bool) -> Result<(), RunnerError> {
        if if_not_exists && self.database_exists(name)? {
            log::info!("database {} already exists", name);
            return Ok(());
        }
        let start = Instant::now();
        let result = self
            .executor
            .create_database(name)
            .and_then(|operation| operation.wait(self.timeout));
        observe(CallKind::Database, start, &result);
        result.map_err(|e| {
            RunnerError::native(format!("CREATE DATABASE {name}"), JsonValue::Null, e)
        })?;
        log::info!("created database {}", name);
        Ok(())
    }

    pub fn drop_database(&self, name: &str, if_exists: bool) -> Result<(), RunnerError> {
        if if_exists && !self.database_exists(name)? {
            log::info!("database {} does not exist", name);
            return Ok(());
        }
        let start = Instant::now();
        let result = self.executor.drop_database(name);
        observe(CallKind::Database, start, &result);
        result.map_err(|e| RunnerError::native(format!("DROP DATABASE {name}"), JsonValue::Null, e))?;
        log::info!("dropped database {}", name);
        Ok(())
    }

    /// Database ids on the instance; full resource paths are cut to their last segment
    pub fn list_databases(&self) -> Result<Vec<String>, RunnerError> {
        let start = Instant::now();
        let result = self.executor.list_databases();
        observe(CallKind::Database, start, &result);
        let names =
            result.map_err(|e| RunnerError::native("LIST DATABASES", JsonValue::Null, e))?;
        Ok(names
            .into_iter()
            .map(|n| n.rsplit('/').next().unwrap_or_default().to_string())
            .collect())
    }

    pub fn database_exists(&self, name: &str) -> Result<bool, RunnerError> {
        Ok(self.list_databases()?.iter().any(|n| n == name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::NativeError;
    use crate::test_helpers::{NativeCall, RecordingExecutor};

    fn dispatcher(executor: &RecordingExecutor) -> AdminDispatcher<'_> {
        AdminDispatcher::new(executor, Duration::from_secs(1))
    }

    #[test]
    fn test_schema_update_submits_one_batch() {
        let executor = RecordingExecutor::new();
        dispatcher(&executor)
            .dispatch(AdminStatement::SchemaUpdate(vec![
                "CREATE TABLE a (x INT64) PRIMARY KEY (x)".to_string(),
                "CREATE INDEX i ON a (x)".to_string(),
            ]))
            .unwrap();
        assert_eq!(executor.schema_batches().len(), 1);
        assert_eq!(executor.schema_batches()[0].len(), 2);
    }

    #[test]
    fn test_failed_schema_update_carries_statements() {
        let executor = RecordingExecutor::new();
        executor.fail_next_schema_update(NativeError::new("Duplicate name in schema: a"));
        let err = dispatcher(&executor)
            .update_schema(vec!["CREATE TABLE a (x INT64) PRIMARY KEY (x)".to_string()])
            .unwrap_err();
        assert!(err.to_string().contains("CREATE TABLE a"));
        assert!(err.to_string().contains("Duplicate name"));
    }

    #[test]
    fn test_create_if_not_exists_skips_existing() {
        let executor = RecordingExecutor::new();
        executor.add_database("projects/p/instances/i/databases/shop");
        dispatcher(&executor)
            .dispatch(AdminStatement::CreateDatabase {
                name: "shop".to_string(),
                if_not_exists: true,
            })
            .unwrap();
        assert!(!executor
            .calls()
            .iter()
            .any(|c| matches!(c, NativeCall::CreateDatabase(_))));
    }

    #[test]
    fn test_drop_if_exists_on_missing_is_noop() {
        let executor = RecordingExecutor::new();
        dispatcher(&executor)
            .dispatch(AdminStatement::DropDatabase {
                name: "shop".to_string(),
                if_exists: true,
            })
            .unwrap();
        assert!(!executor
            .calls()
            .iter()
            .any(|c| matches!(c, NativeCall::DropDatabase(_))));
    }

    #[test]
    fn test_create_then_drop() {
        let executor = RecordingExecutor::new();
        let admin = dispatcher(&executor);
        admin.create_database("shop", false).unwrap();
        assert!(admin.database_exists("shop").unwrap());
        admin.drop_database("shop", false).unwrap();
        assert!(!admin.database_exists("shop").unwrap());
    }
}
