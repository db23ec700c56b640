//! Transaction-scoped data access for member accounts.
//!
//! A unit of work acquires one connection, binds it to a
//! [`TransactionContext`], passes that context to every repository call, and
//! then commits or rolls back. Storage failures are translated into
//! [`AppError`] before they leave the repository layer.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod tx;

pub use config::{LoggingConfig, SourceConfig, TransferPolicy};
pub use db::source::{ConnectionHandle, ConnectionSource, DriverManagerSource, PooledSource};
pub use db::translate::translate;
pub use error::{AppError, AppResult, StorageFault};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::member::Member;
pub use repo::member_repo::{MemberRepository, SqliteMemberRepository};
pub use service::member_service::{MemberService, TransactionalMemberService};
pub use tx::{
    ConnectionScope, TransactionContext, TransactionManager, TransactionTemplate, TxState,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
