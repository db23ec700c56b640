//! Unit-of-work boundary.
//!
//! # Invariants
//! - `work` either commits as a whole or rolls back as a whole.
//! - The error returned by `work` reaches the caller unchanged; rollback
//!   failures are only logged.
//! - A panic inside `work` unwinds through the context's `Drop`, which rolls
//!   back and releases.

use super::context::TransactionContext;
use super::manager::TransactionManager;
use crate::error::AppError;
use log::warn;

/// Wraps a closure in begin / commit-or-rollback.
#[derive(Debug, Clone)]
pub struct TransactionTemplate {
    manager: TransactionManager,
}

impl TransactionTemplate {
    pub fn new(manager: TransactionManager) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &TransactionManager {
        &self.manager
    }

    /// Runs `work` inside one transaction.
    ///
    /// Generic over the closure's error type so domain errors pass through
    /// without being folded into [`AppError`].
    pub fn execute<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&TransactionContext) -> Result<T, E>,
        E: From<AppError> + std::fmt::Display,
    {
        let context = self.manager.begin()?;
        let tx_id = context.id();

        match work(&context) {
            Ok(value) => {
                self.manager.commit(context)?;
                Ok(value)
            }
            Err(primary) => {
                if let Err(rollback_err) = self.manager.rollback(context) {
                    warn!(
                        "event=tx_rollback module=template status=error tx_id={tx_id} primary={} error={}",
                        primary, rollback_err
                    );
                }
                Err(primary)
            }
        }
    }
}
