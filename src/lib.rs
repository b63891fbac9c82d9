//! # Spanguard
//!
//! Schema-change planner and CRUD translation layer for Cloud Spanner, built on the
//! `may` coroutine runtime.
//!
//! A [`SpannerQueryRunner`] turns migration-style schema operations into GoogleSQL DDL
//! with a paired down statement for every up statement, rejects changes the engine
//! cannot perform with a tagged [`Unsupported`] reason, and maps builder operations
//! onto the engine's key-addressed mutation API. Column defaults and generation
//! strategies the engine cannot store natively live in a shadow table managed by
//! [`extended_schema::ExtendedSchemaStore`].
//!
//! The transport is external: callers hand the runner a [`connection::Connector`] (or an
//! open [`executor::SpannerExecutor`]).

pub mod admin;
pub mod config;
pub mod connection;
pub mod ddl;
pub mod error;
pub mod executor;
pub mod extended_schema;
pub mod metrics;
pub mod query;
pub mod runner;
pub mod schema;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
pub mod transaction;

pub use config::RunnerConfig;
pub use error::{RunnerError, Unsupported};
pub use query::{CrudOutcome, Operation};
pub use runner::SpannerQueryRunner;
pub use schema::{Column, ColumnType, ForeignKey, Table, TableIndex, TableUnique};
