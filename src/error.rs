//! Error types for the runner.
//!
//! Every capability limit of the engine is expressed as an [`Unsupported`] value so the
//! boundary can be asserted on in tests instead of matched against message strings.

use crate::connection::ConnectionError;
use crate::executor::NativeError;
use crate::transaction::TransactionError;
use std::fmt;

/// A requested change the engine cannot perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unsupported {
    /// Renaming a column through a change request
    ColumnRename { from: String, to: String },
    /// Renaming a table
    TableRename { from: String, to: String },
    /// Type change outside the STRING/BYTES toggle
    TypeChange {
        column: String,
        from: String,
        to: String,
    },
    /// Length change on a type that has no length, or combined with a foreign type change
    LengthChange { column: String },
    /// Nullability toggle on a column covered by a single-column index
    IndexedNullability { column: String, index: String },
    /// Default change other than toggling the commit-timestamp option
    DefaultChange { column: String },
    /// Adding, removing or changing primary-key membership
    PrimaryKeyChange { column: String },
    /// A column attribute the engine has no equivalent for
    ColumnAttribute {
        column: String,
        attribute: &'static str,
    },
    /// Commit-timestamp option on a column that is not a TIMESTAMP
    CommitTimestampType { column: String },
    /// Fulltext indices
    FulltextIndex { index: String },
    /// Foreign keys with an ON UPDATE action
    ForeignKeyOnUpdate { foreign_key: String },
    /// ON DELETE actions other than CASCADE and NO ACTION
    OnDeleteAction {
        foreign_key: String,
        action: String,
    },
    /// ON DELETE CASCADE on a foreign key added after the table exists
    CascadeWithoutInterleave { foreign_key: String },
    /// A table can only be interleaved in one parent
    MultipleInterleaveParents { table: String },
    /// CHECK constraints
    CheckConstraint { table: String },
    /// Primary keys are fixed at table creation
    PrimaryKeyConstraint { table: String },
    /// A new column cannot join the primary key
    AddPrimaryColumn { column: String },
    /// A primary-key column cannot be dropped
    DropPrimaryColumn { column: String },
    /// A column referenced by an interleave relation cannot be dropped
    DropForeignKeyColumn { column: String, foreign_key: String },
}

impl fmt::Display for Unsupported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unsupported::ColumnRename { from, to } => {
                write!(f, "renaming column {from} to {to} is not supported")
            }
            Unsupported::TableRename { from, to } => {
                write!(f, "renaming table {from} to {to} is not supported")
            }
            Unsupported::TypeChange { column, from, to } => write!(
                f,
                "changing type of column {column} from {from} to {to} is not supported"
            ),
            Unsupported::LengthChange { column } => {
                write!(f, "changing length of column {column} is not supported")
            }
            Unsupported::IndexedNullability { column, index } => write!(
                f,
                "changing nullability of column {column} is not supported while index {index} covers it"
            ),
            Unsupported::DefaultChange { column } => write!(
                f,
                "changing default of column {column} is not supported (only the commit timestamp option can be toggled)"
            ),
            Unsupported::PrimaryKeyChange { column } => {
                write!(f, "changing primary key membership of column {column} is not supported")
            }
            Unsupported::ColumnAttribute { column, attribute } => {
                write!(f, "column {column}: attribute '{attribute}' is not supported")
            }
            Unsupported::CommitTimestampType { column } => write!(
                f,
                "column {column}: the commit timestamp option requires a TIMESTAMP column"
            ),
            Unsupported::FulltextIndex { index } => {
                write!(f, "fulltext index {index} is not supported")
            }
            Unsupported::ForeignKeyOnUpdate { foreign_key } => {
                write!(f, "foreign key {foreign_key}: ON UPDATE actions are not supported")
            }
            Unsupported::OnDeleteAction { foreign_key, action } => write!(
                f,
                "foreign key {foreign_key}: ON DELETE {action} is not supported"
            ),
            Unsupported::CascadeWithoutInterleave { foreign_key } => write!(
                f,
                "foreign key {foreign_key}: ON DELETE CASCADE requires interleaving at table creation"
            ),
            Unsupported::MultipleInterleaveParents { table } => write!(
                f,
                "table {table}: only one foreign key (interleave parent) is supported"
            ),
            Unsupported::CheckConstraint { table } => {
                write!(f, "table {table}: check constraints are not supported")
            }
            Unsupported::PrimaryKeyConstraint { table } => write!(
                f,
                "table {table}: primary keys can only be declared when the table is created"
            ),
            Unsupported::AddPrimaryColumn { column } => {
                write!(f, "adding primary key column {column} is not supported")
            }
            Unsupported::DropPrimaryColumn { column } => {
                write!(f, "dropping primary key column {column} is not supported")
            }
            Unsupported::DropForeignKeyColumn {
                column,
                foreign_key,
            } => write!(
                f,
                "column {column} is used by foreign key {foreign_key}; drop the foreign key first"
            ),
        }
    }
}

impl std::error::Error for Unsupported {}

/// Runner error type
#[derive(Debug)]
pub enum RunnerError {
    /// Change outside the engine's capability whitelist
    Unsupported(Unsupported),
    /// Table missing from the metadata cache
    TableNotFound(String),
    /// Column missing from a cached table
    ColumnNotFound { table: String, column: String },
    /// Index missing from a cached table
    IndexNotFound { table: String, index: String },
    /// Foreign key missing from a cached table
    ForeignKeyNotFound { table: String, foreign_key: String },
    /// Unique constraint missing from a cached table
    UniqueNotFound { table: String, unique: String },
    /// Object already present in the cache
    AlreadyExists { kind: &'static str, name: String },
    /// Transaction started, committed or rolled back out of sequence
    Transaction(TransactionError),
    /// Runner used after `release()`
    Released,
    /// The engine rejected a statement or mutation
    Native {
        statement: String,
        params: serde_json::Value,
        source: NativeError,
    },
    /// Malformed administrative statement
    Shape(String),
    /// Statement neither administrative nor SELECT-shaped
    Unhandled(String),
    /// Multi-value update/upsert input
    SingleValueSet { supplied: usize },
    /// Connection could not be established
    Connection(ConnectionError),
    /// Settings could not be loaded
    Config(String),
    /// A coroutine of a concurrent bulk operation panicked
    Internal(String),
}

impl RunnerError {
    /// Wrap a native failure with the statement and parameters that caused it
    pub fn native(
        statement: impl Into<String>,
        params: serde_json::Value,
        source: NativeError,
    ) -> Self {
        RunnerError::Native {
            statement: statement.into(),
            params,
            source,
        }
    }

    /// True for caller errors that must never be retried
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RunnerError::TableNotFound(_)
                | RunnerError::ColumnNotFound { .. }
                | RunnerError::IndexNotFound { .. }
                | RunnerError::ForeignKeyNotFound { .. }
                | RunnerError::UniqueNotFound { .. }
        )
    }

    /// The tagged reason when this is a capability error
    pub fn unsupported(&self) -> Option<&Unsupported> {
        match self {
            RunnerError::Unsupported(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerError::Unsupported(reason) => write!(f, "Not supported: {reason}"),
            RunnerError::TableNotFound(table) => write!(f, "Table not found: {table}"),
            RunnerError::ColumnNotFound { table, column } => {
                write!(f, "Column not found: {table}.{column}")
            }
            RunnerError::IndexNotFound { table, index } => {
                write!(f, "Index not found: {index} on {table}")
            }
            RunnerError::ForeignKeyNotFound { table, foreign_key } => {
                write!(f, "Foreign key not found: {foreign_key} on {table}")
            }
            RunnerError::UniqueNotFound { table, unique } => {
                write!(f, "Unique constraint not found: {unique} on {table}")
            }
            RunnerError::AlreadyExists { kind, name } => write!(f, "{kind} already exists: {name}"),
            RunnerError::Transaction(e) => write!(f, "{e}"),
            RunnerError::Released => write!(f, "Query runner already released"),
            RunnerError::Native {
                statement,
                params,
                source,
            } => write!(
                f,
                "Native call failed: {source}\n  Statement: {statement}\n  Parameters: {params}"
            ),
            RunnerError::Shape(msg) => write!(f, "Malformed statement: {msg}"),
            RunnerError::Unhandled(sql) => {
                write!(f, "Statement cannot be handled by this runner: {sql}")
            }
            RunnerError::SingleValueSet { supplied } => write!(
                f,
                "Only single value set supported for update/upsert (got {supplied})"
            ),
            RunnerError::Connection(e) => write!(f, "{e}"),
            RunnerError::Config(msg) => write!(f, "Configuration error: {msg}"),
            RunnerError::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for RunnerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunnerError::Unsupported(reason) => Some(reason),
            RunnerError::Transaction(e) => Some(e),
            RunnerError::Native { source, .. } => Some(source),
            RunnerError::Connection(e) => Some(e),
            _ => None,
        }
    }
}

impl From<Unsupported> for RunnerError {
    fn from(reason: Unsupported) -> Self {
        RunnerError::Unsupported(reason)
    }
}

impl From<TransactionError> for RunnerError {
    fn from(err: TransactionError) -> Self {
        RunnerError::Transaction(err)
    }
}

impl From<ConnectionError> for RunnerError {
    fn from(err: ConnectionError) -> Self {
        RunnerError::Connection(err)
    }
}
