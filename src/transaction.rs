//! Transaction Module
//!
//! Holds at most one open transaction per runner:
//!
//! ```text
//! Idle --start--> Active --commit/rollback--> Idle
//! ```
//!
//! Every mutation and select consults [`TransactionController::active`] to choose between
//! the transactional path and the direct connection path.

use crate::executor::{NativeError, NativeTransaction, SpannerExecutor};
use std::fmt;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Transaction error type
#[derive(Debug)]
pub enum TransactionError {
    /// `start` while a transaction is open
    AlreadyActive,
    /// `commit` or `rollback` with no open transaction
    NotActive,
    /// Engine failed to begin, commit or roll back
    Native(NativeError),
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionError::AlreadyActive => write!(f, "Transaction already started"),
            TransactionError::NotActive => write!(f, "Transaction is not started"),
            TransactionError::Native(e) => write!(f, "Transaction error: {}", e),
        }
    }
}

impl std::error::Error for TransactionError {}

impl From<NativeError> for TransactionError {
    fn from(err: NativeError) -> Self {
        TransactionError::Native(err)
    }
}

/// Transaction state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    Active,
}

/// Owns the single active transaction handle of a runner
#[derive(Default)]
pub struct TransactionController {
    active: Option<Box<dyn NativeTransaction>>,
}

impl TransactionController {
    pub fn new() -> Self {
        Self { active: None }
    }

    pub fn state(&self) -> TransactionState {
        if self.active.is_some() {
            TransactionState::Active
        } else {
            TransactionState::Idle
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// The open transaction, if any
    pub fn active(&self) -> Option<&dyn NativeTransaction> {
        self.active.as_deref()
    }

    /// Idle -> Active
    pub fn start(&mut self, executor: &dyn SpannerExecutor) -> Result<(), TransactionError> {
        if self.active.is_some() {
            return Err(TransactionError::AlreadyActive);
        }

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::begin_transaction_span().entered();

        let transaction = executor.begin_transaction()?;
        self.active = Some(transaction);
        log::debug!("transaction started");
        Ok(())
    }

    /// Active -> Idle, applying the buffered mutations.
    ///
    /// The handle is consumed even when the engine rejects the commit, so the runner is
    /// back to Idle either way.
    pub fn commit(&mut self) -> Result<(), TransactionError> {
        let transaction = self.active.take().ok_or(TransactionError::NotActive)?;

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::commit_transaction_span().entered();

        transaction.commit()?;
        log::debug!("transaction committed");
        Ok(())
    }

    /// Active -> Idle, discarding the buffered mutations
    pub fn rollback(&mut self) -> Result<(), TransactionError> {
        let transaction = self.active.take().ok_or(TransactionError::NotActive)?;

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::rollback_transaction_span().entered();

        transaction.rollback()?;
        log::debug!("transaction rolled back");
        Ok(())
    }
}
