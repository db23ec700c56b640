//! Transaction manager: acquires, binds, commits, rolls back and releases.

use super::context::TransactionContext;
use super::ConnectionScope;
use crate::db::source::ConnectionSource;
use crate::error::AppResult;
use rusqlite::{Connection, TransactionBehavior};
use std::sync::Arc;

/// Starts and completes transactions over one connection source.
#[derive(Clone)]
pub struct TransactionManager {
    source: Arc<dyn ConnectionSource>,
    behavior: TransactionBehavior,
}

impl TransactionManager {
    /// Uses `BEGIN IMMEDIATE`, so concurrent writers queue on the busy
    /// timeout instead of failing on a read-to-write lock upgrade.
    pub fn new(source: Arc<dyn ConnectionSource>) -> Self {
        Self::with_behavior(source, TransactionBehavior::Immediate)
    }

    pub fn with_behavior(source: Arc<dyn ConnectionSource>, behavior: TransactionBehavior) -> Self {
        Self { source, behavior }
    }

    pub fn source(&self) -> &Arc<dyn ConnectionSource> {
        &self.source
    }

    /// Acquires a connection, leaves auto-commit mode and binds the
    /// connection to a new context.
    ///
    /// # Errors
    /// - `AppError::Connection` when no connection can be acquired.
    /// - `AppError::IllegalState` when the acquired connection is already
    ///   inside a transaction.
    pub fn begin(&self) -> AppResult<TransactionContext> {
        self.begin_with(self.behavior)
    }

    pub fn begin_with(&self, behavior: TransactionBehavior) -> AppResult<TransactionContext> {
        let handle = self.source.acquire()?;
        TransactionContext::begin(Arc::clone(&self.source), handle, behavior)
    }

    /// Returns the connection bound to `context`.
    ///
    /// Fails with `AppError::IllegalState` once the context is completing.
    pub fn bound_connection<'ctx>(
        &self,
        context: &'ctx TransactionContext,
    ) -> AppResult<&'ctx Connection> {
        context.connection()
    }

    /// Commits pending work, restores auto-commit and releases the connection.
    ///
    /// A failure here leaves the server-side outcome unknown and is reported
    /// as `StorageFault::CommitOutcomeUnknown`.
    pub fn commit(&self, context: TransactionContext) -> AppResult<()> {
        context.finish_commit()
    }

    /// Rolls back pending work, restores auto-commit and releases the
    /// connection. The connection is released even when `ROLLBACK` fails.
    pub fn rollback(&self, context: TransactionContext) -> AppResult<()> {
        context.finish_rollback()
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("source", &self.source.kind())
            .finish()
    }
}
