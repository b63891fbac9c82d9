//! Builder-produced operation descriptor consumed by the CRUD translator.

use crate::executor::Row;
use sea_query::Condition;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Select,
    Insert,
    Update,
    Upsert,
    Delete,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Select => "select",
            QueryKind::Insert => "insert",
            QueryKind::Update => "update",
            QueryKind::Upsert => "upsert",
            QueryKind::Delete => "delete",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generic CRUD request against one table
#[derive(Debug, Clone)]
pub struct Operation {
    pub kind: QueryKind,
    pub table: String,
    /// Value sets; update and upsert accept exactly one
    pub values: Vec<Row>,
    /// Where-expression; `None` matches every row
    pub filter: Option<Condition>,
    /// Projection for selects; empty selects every column
    pub columns: Vec<String>,
    pub limit: Option<u64>,
}

impl Operation {
    fn new(kind: QueryKind, table: impl Into<String>) -> Self {
        Self {
            kind,
            table: table.into(),
            values: Vec::new(),
            filter: None,
            columns: Vec::new(),
            limit: None,
        }
    }

    pub fn insert(table: impl Into<String>, rows: Vec<Row>) -> Self {
        let mut op = Self::new(QueryKind::Insert, table);
        op.values = rows;
        op
    }

    pub fn update(table: impl Into<String>, values: Row) -> Self {
        let mut op = Self::new(QueryKind::Update, table);
        op.values = vec![values];
        op
    }

    pub fn upsert(table: impl Into<String>, values: Row) -> Self {
        let mut op = Self::new(QueryKind::Upsert, table);
        op.values = vec![values];
        op
    }

    pub fn delete(table: impl Into<String>) -> Self {
        Self::new(QueryKind::Delete, table)
    }

    pub fn select<I, S>(table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut op = Self::new(QueryKind::Select, table);
        op.columns = columns.into_iter().map(Into::into).collect();
        op
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.filter = Some(condition);
        self
    }

    /// Replace the value sets, e.g. to pass several to update (rejected at execution)
    pub fn values(mut self, values: Vec<Row>) -> Self {
        self.values = values;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Result of a translated operation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrudOutcome {
    /// Rows returned by a select
    pub rows: Vec<Row>,
    /// Rows handed to the native mutation call
    pub affected: usize,
}

impl CrudOutcome {
    pub fn affected(affected: usize) -> Self {
        Self {
            rows: Vec::new(),
            affected,
        }
    }

    pub fn rows(rows: Vec<Row>) -> Self {
        let affected = rows.len();
        Self { rows, affected }
    }

    /// Zero rows matched
    pub fn nothing() -> Self {
        Self::default()
    }
}
