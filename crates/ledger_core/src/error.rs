//! Application error taxonomy.
//!
//! # Responsibility
//! - Define the closed set of error kinds visible above the repository layer.
//! - Keep driver-specific error objects out of business signatures.
//!
//! # Invariants
//! - No variant stores a `rusqlite` or `r2d2` error value; only messages and
//!   numeric result codes survive translation.
//! - Callers receive exactly one `AppError` per failed operation.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub type AppResult<T> = Result<T, AppError>;

/// Sub-classification of [`AppError::Storage`] kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageFault {
    /// Statement text was rejected (syntax error, unknown table/column).
    BadGrammar,
    /// Non-key constraint violated (`NOT NULL`, `CHECK`, foreign key).
    DataIntegrity,
    /// Lock wait or interrupt elapsed while the statement was running.
    Timeout,
    /// Disk, I/O or file-level failure mid-operation.
    ResourceFailure,
    /// Row contents could not be decoded into the domain record.
    InvalidData,
    /// `COMMIT` failed; the server-side outcome is unknown to the caller.
    CommitOutcomeUnknown,
    /// Store schema is newer than this build understands.
    SchemaMismatch,
    /// Any backend failure without a dedicated mapping.
    Uncategorized,
}

impl StorageFault {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BadGrammar => "bad_grammar",
            Self::DataIntegrity => "data_integrity",
            Self::Timeout => "timeout",
            Self::ResourceFailure => "resource_failure",
            Self::InvalidData => "invalid_data",
            Self::CommitOutcomeUnknown => "commit_outcome_unknown",
            Self::SchemaMismatch => "schema_mismatch",
            Self::Uncategorized => "uncategorized",
        }
    }
}

/// Closed error taxonomy returned by repositories, the transaction layer and
/// services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// A connection could not be obtained. Retryable with backoff.
    Connection { message: String },
    /// Unique-key violation. Not retryable without changing input.
    DuplicateKey { message: String },
    /// No row for the requested identifier.
    NotFound { message: String },
    /// Any other backend failure.
    Storage {
        fault: StorageFault,
        code: Option<i32>,
        message: String,
    },
    /// Business rule or call-graph invariant violation.
    IllegalState(String),
}

impl AppError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn storage(fault: StorageFault, code: Option<i32>, message: impl Into<String>) -> Self {
        Self::Storage {
            fault,
            code,
            message: message.into(),
        }
    }

    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState(message.into())
    }

    /// Stable snake_case label used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "connection",
            Self::DuplicateKey { .. } => "duplicate_key",
            Self::NotFound { .. } => "not_found",
            Self::Storage { .. } => "storage",
            Self::IllegalState(_) => "illegal_state",
        }
    }

    /// Whether a caller may retry the same input after a backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// `true` when the caller must verify the outcome by reading it back.
    pub fn is_outcome_unknown(&self) -> bool {
        matches!(
            self,
            Self::Storage {
                fault: StorageFault::CommitOutcomeUnknown,
                ..
            }
        )
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection { message } => write!(f, "connection unavailable: {message}"),
            Self::DuplicateKey { message } => write!(f, "duplicate key: {message}"),
            Self::NotFound { message } => write!(f, "not found: {message}"),
            Self::Storage {
                fault,
                code: Some(code),
                message,
            } => write!(f, "storage error ({}, code {code}): {message}", fault.as_str()),
            Self::Storage {
                fault,
                code: None,
                message,
            } => write!(f, "storage error ({}): {message}", fault.as_str()),
            Self::IllegalState(message) => write!(f, "illegal state: {message}"),
        }
    }
}

impl Error for AppError {}
