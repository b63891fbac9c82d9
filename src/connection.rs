//! Connection Module
//!
//! Database path parsing and the lazily acquired connection slot.
//!
//! The transport itself (sessions, pooling, retries) belongs to the caller; it is
//! plugged in through [`Connector`]. The slot opens one executor on first use and hands
//! out the same handle for the runner's lifetime.

use crate::executor::SpannerExecutor;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Connection error type
#[derive(Debug)]
pub enum ConnectionError {
    /// Database path not of the form `projects/{p}/instances/{i}/databases/{d}`
    InvalidDatabasePath(String),
    /// Transport failed to open the database
    Transport(String),
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::InvalidDatabasePath(s) => write!(f, "Invalid database path: {}", s),
            ConnectionError::Transport(s) => write!(f, "Connection error: {}", s),
        }
    }
}

impl std::error::Error for ConnectionError {}

/// Fully qualified database name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatabasePath {
    pub project_id: String,
    pub instance_id: String,
    pub database_id: String,
}

impl DatabasePath {
    pub fn new(
        project_id: impl Into<String>,
        instance_id: impl Into<String>,
        database_id: impl Into<String>,
    ) -> Result<Self, ConnectionError> {
        let path = Self {
            project_id: project_id.into(),
            instance_id: instance_id.into(),
            database_id: database_id.into(),
        };
        for (segment, value) in [
            ("project", &path.project_id),
            ("instance", &path.instance_id),
            ("database", &path.database_id),
        ] {
            validate_segment(segment, value)?;
        }
        Ok(path)
    }

    /// Parse `projects/{p}/instances/{i}/databases/{d}`
    pub fn parse(path: &str) -> Result<Self, ConnectionError> {
        if path.is_empty() {
            return Err(ConnectionError::InvalidDatabasePath(
                "Database path cannot be empty".to_string(),
            ));
        }
        let parts: Vec<&str> = path.split('/').collect();
        match parts.as_slice() {
            ["projects", project, "instances", instance, "databases", database] => {
                Self::new(*project, *instance, *database)
            }
            _ => Err(ConnectionError::InvalidDatabasePath(format!(
                "expected projects/{{project}}/instances/{{instance}}/databases/{{database}}, got {path}"
            ))),
        }
    }

    /// Instance path, the parent of database lifecycle calls
    pub fn instance_path(&self) -> String {
        format!("projects/{}/instances/{}", self.project_id, self.instance_id)
    }
}

impl fmt::Display for DatabasePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/databases/{}", self.instance_path(), self.database_id)
    }
}

fn validate_segment(segment: &str, value: &str) -> Result<(), ConnectionError> {
    if value.trim().is_empty() {
        return Err(ConnectionError::InvalidDatabasePath(format!(
            "{segment} id cannot be empty"
        )));
    }
    if value.contains('/') {
        return Err(ConnectionError::InvalidDatabasePath(format!(
            "{segment} id cannot contain '/': {value}"
        )));
    }
    Ok(())
}

/// Opens executors for a database. Implemented by the transport.
pub trait Connector: Send + Sync {
    fn connect(&self, path: &DatabasePath) -> Result<Arc<dyn SpannerExecutor>, ConnectionError>;
}

impl<F> Connector for F
where
    F: Fn(&DatabasePath) -> Result<Arc<dyn SpannerExecutor>, ConnectionError> + Send + Sync,
{
    fn connect(&self, path: &DatabasePath) -> Result<Arc<dyn SpannerExecutor>, ConnectionError> {
        self(path)
    }
}

/// Lazily acquired executor handle
pub struct ConnectionSlot {
    path: DatabasePath,
    connector: Box<dyn Connector>,
    executor: Option<Arc<dyn SpannerExecutor>>,
    released: bool,
}

impl ConnectionSlot {
    pub fn new(path: DatabasePath, connector: Box<dyn Connector>) -> Self {
        Self {
            path,
            connector,
            executor: None,
            released: false,
        }
    }

    /// Slot around an executor that is already open
    pub fn with_executor(path: DatabasePath, executor: Arc<dyn SpannerExecutor>) -> Self {
        let shared = Arc::clone(&executor);
        Self {
            path,
            connector: Box::new(
                move |_: &DatabasePath| -> Result<Arc<dyn SpannerExecutor>, ConnectionError> {
                    Ok(Arc::clone(&shared))
                },
            ),
            executor: Some(executor),
            released: false,
        }
    }

    pub fn path(&self) -> &DatabasePath {
        &self.path
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn is_connected(&self) -> bool {
        self.executor.is_some()
    }

    /// Return the executor, opening it on first use
    pub fn acquire(&mut self) -> Result<Arc<dyn SpannerExecutor>, ConnectionError> {
        if let Some(executor) = &self.executor {
            return Ok(Arc::clone(executor));
        }

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::acquire_connection_span(&self.path.to_string()).entered();

        let start = Instant::now();
        let executor = self.connector.connect(&self.path)?;
        log::debug!("connected to {} in {:?}", self.path, start.elapsed());
        self.executor = Some(Arc::clone(&executor));
        Ok(executor)
    }

    /// Pooling is owned by the transport; releasing only retires this slot.
    pub fn release(&mut self) {
        self.released = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_database_path_valid() {
        let path = DatabasePath::parse("projects/p1/instances/i1/databases/d1").unwrap();
        assert_eq!(path.project_id, "p1");
        assert_eq!(path.instance_id, "i1");
        assert_eq!(path.database_id, "d1");
        assert_eq!(path.instance_path(), "projects/p1/instances/i1");
        assert_eq!(path.to_string(), "projects/p1/instances/i1/databases/d1");
    }

    #[test]
    fn test_parse_database_path_invalid() {
        let invalid = vec![
            "",
            "projects/p1/instances/i1",
            "projects/p1/instances/i1/databases/",
            "project/p1/instances/i1/databases/d1",
            "projects/p1/instances/i1/databases/d1/extra",
        ];
        for s in invalid {
            assert!(DatabasePath::parse(s).is_err(), "Should reject: {}", s);
        }
    }

    #[test]
    fn test_new_rejects_slash_in_segment() {
        assert!(DatabasePath::new("p", "i/x", "d").is_err());
    }

    #[test]
    fn test_connection_error_display() {
        let err = ConnectionError::InvalidDatabasePath("test".to_string());
        assert!(err.to_string().contains("Invalid database path"));
    }

    #[test]
    fn test_connector_error_propagates() {
        let path = DatabasePath::new("p", "i", "d").unwrap();
        let mut slot = ConnectionSlot::new(
            path,
            Box::new(|_: &DatabasePath| -> Result<Arc<dyn SpannerExecutor>, ConnectionError> {
                Err(ConnectionError::Transport("unreachable".to_string()))
            }),
        );
        assert!(slot.acquire().is_err());
        assert!(!slot.is_connected());
    }
}
