//! Transaction synchronization and the unit-of-work boundary.
//!
//! # Responsibility
//! - Bind one connection to one unit of work and pass it explicitly to every
//!   repository call made inside it.
//! - Bracket business work with begin / commit-or-rollback / release.
//!
//! # Invariants
//! - While a context is active, repository calls receive its connection and
//!   never open another.
//! - No path returns with a transaction open or a connection unreleased.

use crate::db::source::ConnectionHandle;
use crate::error::AppResult;
use rusqlite::Connection;

mod context;
mod manager;
mod template;

pub use context::{TransactionContext, TxState};
pub use manager::TransactionManager;
pub use template::TransactionTemplate;

/// Anything repository statements can run against.
///
/// Implemented by [`TransactionContext`] (statements join the bound
/// transaction) and [`ConnectionHandle`] (each statement auto-commits).
pub trait ConnectionScope {
    fn connection(&self) -> AppResult<&Connection>;
}

impl ConnectionScope for ConnectionHandle {
    fn connection(&self) -> AppResult<&Connection> {
        Ok(&**self)
    }
}
