//! SQLite storage bootstrap, connection sources and error translation.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the ledger.
//! - Apply schema migrations in deterministic order.
//! - Hand out exclusively owned connection handles (fresh or pooled).
//! - Translate driver failures into [`crate::error::AppError`].
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - No code reads or writes `member` rows before migrations succeed.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;
pub mod source;
pub mod translate;

pub use open::{configure_connection, open_db, open_db_in_memory};

pub type BootstrapResult<T> = Result<T, BootstrapError>;

/// Failure while opening a store or bringing its schema up to date.
///
/// Never crosses the repository boundary; sources hand it to
/// [`translate::translate_db`].
#[derive(Debug)]
pub enum BootstrapError {
    Driver(rusqlite::Error),
    /// The file was written by a newer ledger build.
    SchemaTooNew { found: u32, supported: u32 },
}

impl Display for BootstrapError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Driver(err) => write!(f, "store bootstrap failed: {err}"),
            Self::SchemaTooNew { found, supported } => write!(
                f,
                "ledger schema v{found} is ahead of this build (knows up to v{supported})"
            ),
        }
    }
}

impl Error for BootstrapError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Driver(err) => Some(err),
            Self::SchemaTooNew { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for BootstrapError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Driver(value)
    }
}
