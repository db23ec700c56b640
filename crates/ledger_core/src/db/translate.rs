//! Translation of SQLite and pool failures into [`AppError`].
//!
//! # Responsibility
//! - Map SQLite primary/extended result codes to the application taxonomy.
//! - Record the original code in diagnostics, never in the returned value.
//!
//! # Invariants
//! - Translation is pure apart from one log line per call.
//! - Unknown codes fall back to `StorageFault::Uncategorized` and keep the
//!   driver message plus extended code.

use super::BootstrapError;
use crate::error::{AppError, StorageFault};
use log::{debug, warn};
use rusqlite::{ffi, ErrorCode};

/// Translates one failed statement.
///
/// `task` names the repository operation, `sql` is the statement text and
/// `param_count` the number of bound values (values are never logged).
pub fn translate(task: &str, sql: &str, param_count: usize, err: rusqlite::Error) -> AppError {
    let code = driver_error(&err).map(|ffi_err| ffi_err.extended_code);
    let translated = classify(&err, err.to_string());

    match &translated {
        AppError::DuplicateKey { .. } | AppError::NotFound { .. } => debug!(
            "event=sql_error module=translate task={task} kind={} code={} params={param_count} sql={}",
            translated.kind(),
            code.unwrap_or_default(),
            compact_sql(sql)
        ),
        _ => warn!(
            "event=sql_error module=translate task={task} kind={} code={} params={param_count} sql={} error={}",
            translated.kind(),
            code.unwrap_or_default(),
            compact_sql(sql),
            err
        ),
    }

    translated
}

/// Translates a pool checkout failure (timeout or failed connect).
pub fn translate_pool(err: r2d2::Error) -> AppError {
    warn!("event=pool_error module=translate kind=connection error={err}");
    AppError::connection(err.to_string())
}

/// Translates a bootstrap failure raised while opening or migrating a store.
pub fn translate_db(task: &str, err: BootstrapError) -> AppError {
    match err {
        BootstrapError::Driver(err) => match translate(task, "", 0, err) {
            AppError::Storage {
                fault: StorageFault::ResourceFailure,
                message,
                ..
            } => AppError::connection(message),
            other => other,
        },
        too_new @ BootstrapError::SchemaTooNew { .. } => {
            warn!("event=db_error module=translate task={task} kind=schema_mismatch error={too_new}");
            AppError::storage(StorageFault::SchemaMismatch, None, too_new.to_string())
        }
    }
}

fn classify(err: &rusqlite::Error, message: String) -> AppError {
    if let Some(ffi_err) = driver_error(err) {
        let code = Some(ffi_err.extended_code);
        return match ffi_err.code {
            ErrorCode::ConstraintViolation if is_unique_violation(ffi_err.extended_code) => {
                AppError::DuplicateKey { message }
            }
            ErrorCode::ConstraintViolation => {
                AppError::storage(StorageFault::DataIntegrity, code, message)
            }
            // Plain SQLITE_ERROR: syntax errors, unknown tables and columns.
            ErrorCode::Unknown => AppError::storage(StorageFault::BadGrammar, code, message),
            ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::OperationInterrupted => {
                AppError::storage(StorageFault::Timeout, code, message)
            }
            ErrorCode::CannotOpen | ErrorCode::NotADatabase | ErrorCode::PermissionDenied => {
                AppError::connection(message)
            }
            ErrorCode::SystemIoFailure
            | ErrorCode::DatabaseCorrupt
            | ErrorCode::DiskFull
            | ErrorCode::FileLockingProtocolFailed
            | ErrorCode::ReadOnly => AppError::storage(StorageFault::ResourceFailure, code, message),
            _ => AppError::storage(StorageFault::Uncategorized, code, message),
        };
    }

    match err {
        rusqlite::Error::QueryReturnedNoRows => AppError::not_found(message),
        rusqlite::Error::InvalidColumnType(..)
        | rusqlite::Error::FromSqlConversionFailure(..)
        | rusqlite::Error::IntegralValueOutOfRange(..)
        | rusqlite::Error::InvalidColumnName(_)
        | rusqlite::Error::InvalidColumnIndex(_) => {
            AppError::storage(StorageFault::InvalidData, None, message)
        }
        _ => AppError::storage(StorageFault::Uncategorized, None, message),
    }
}

/// Result code carried by the driver error, including statements rejected
/// while being prepared.
fn driver_error(err: &rusqlite::Error) -> Option<&ffi::Error> {
    match err {
        rusqlite::Error::SqliteFailure(ffi_err, _)
        | rusqlite::Error::SqlInputError { error: ffi_err, .. } => Some(ffi_err),
        _ => None,
    }
}

fn is_unique_violation(extended_code: i32) -> bool {
    extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        || extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
}

fn compact_sql(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::{classify, compact_sql, translate};
    use crate::error::{AppError, StorageFault};
    use rusqlite::{ffi, Connection};

    fn failure(code: i32, message: &str) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(ffi::Error::new(code), Some(message.to_string()))
    }

    #[test]
    fn primary_key_violation_is_duplicate_key() {
        let err = failure(ffi::SQLITE_CONSTRAINT_PRIMARYKEY, "UNIQUE constraint failed");
        assert!(matches!(
            translate("save", "insert", 2, err),
            AppError::DuplicateKey { .. }
        ));
    }

    #[test]
    fn not_null_violation_is_data_integrity() {
        let err = failure(ffi::SQLITE_CONSTRAINT_NOTNULL, "NOT NULL constraint failed");
        assert!(matches!(
            classify(&err, err.to_string()),
            AppError::Storage {
                fault: StorageFault::DataIntegrity,
                ..
            }
        ));
    }

    #[test]
    fn busy_maps_to_timeout_and_cantopen_to_connection() {
        let busy = failure(ffi::SQLITE_BUSY, "database is locked");
        assert!(matches!(
            classify(&busy, busy.to_string()),
            AppError::Storage {
                fault: StorageFault::Timeout,
                code: Some(ffi::SQLITE_BUSY),
                ..
            }
        ));

        let cantopen = failure(ffi::SQLITE_CANTOPEN, "unable to open database file");
        assert!(matches!(
            classify(&cantopen, cantopen.to_string()),
            AppError::Connection { .. }
        ));
    }

    #[test]
    fn bad_grammar_from_real_statement() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn.prepare("select bad grammar").unwrap_err();
        let translated = translate("adhoc_select", "select bad grammar", 0, err);
        assert!(matches!(
            translated,
            AppError::Storage {
                fault: StorageFault::BadGrammar,
                code: Some(ffi::SQLITE_ERROR),
                ..
            }
        ));
    }

    #[test]
    fn rejected_statement_keeps_its_result_code() {
        let err = rusqlite::Error::SqlInputError {
            error: ffi::Error::new(ffi::SQLITE_ERROR),
            msg: "no such column: bad".to_string(),
            sql: "select bad grammar".to_string(),
            offset: 7,
        };
        assert!(matches!(
            classify(&err, err.to_string()),
            AppError::Storage {
                fault: StorageFault::BadGrammar,
                code: Some(ffi::SQLITE_ERROR),
                ..
            }
        ));
    }

    #[test]
    fn no_rows_is_not_found() {
        let err = rusqlite::Error::QueryReturnedNoRows;
        assert!(matches!(
            classify(&err, err.to_string()),
            AppError::NotFound { .. }
        ));
    }

    #[test]
    fn compact_sql_collapses_whitespace() {
        assert_eq!(
            compact_sql("select *\n   from member\twhere id = ?"),
            "select * from member where id = ?"
        );
    }
}
