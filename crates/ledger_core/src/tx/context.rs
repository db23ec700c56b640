//! Transaction context: one connection bound to one unit of work.
//!
//! # Invariants
//! - The bound handle is released exactly once: by commit, rollback, or drop.
//! - A context is `Send` but not `Sync`; concurrent units of work never
//!   observe each other's connection.
//! - Secondary failures while rolling back are logged, never returned in place
//!   of the primary error.

use super::ConnectionScope;
use crate::db::source::{ConnectionHandle, ConnectionSource};
use crate::db::translate::translate;
use crate::error::{AppError, AppResult, StorageFault};
use log::{debug, info, warn};
use rusqlite::{Connection, TransactionBehavior};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

static NEXT_TX_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of a [`TransactionContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Statements may run on the bound connection.
    Active,
    /// Commit or rollback has started; the connection is no longer usable.
    Completing,
}

/// Binding of one connection handle to one active unit of work.
pub struct TransactionContext {
    id: u64,
    state: TxState,
    handle: Option<ConnectionHandle>,
    source: Arc<dyn ConnectionSource>,
    started_at: Instant,
}

impl TransactionContext {
    /// Starts a transaction on `handle`, taking ownership of it.
    ///
    /// The handle is released back to `source` when the start fails.
    pub(crate) fn begin(
        source: Arc<dyn ConnectionSource>,
        handle: ConnectionHandle,
        behavior: TransactionBehavior,
    ) -> AppResult<Self> {
        if !handle.is_autocommit() {
            warn!(
                "event=tx_begin module=tx status=error handle_id={} reason=already_in_transaction",
                handle.id()
            );
            source.release(handle);
            return Err(AppError::illegal_state(
                "connection is already inside a transaction",
            ));
        }

        let sql = begin_sql(behavior);
        if let Err(err) = handle.execute_batch(sql) {
            let translated = translate("begin", sql, 0, err);
            source.release(handle);
            return Err(translated);
        }

        let id = NEXT_TX_ID.fetch_add(1, Ordering::Relaxed);
        debug!(
            "event=tx_begin module=tx status=ok tx_id={id} handle_id={} source={}",
            handle.id(),
            source.kind()
        );

        Ok(Self {
            id,
            state: TxState::Active,
            handle: Some(handle),
            source,
            started_at: Instant::now(),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    /// Id of the bound connection handle, if still bound.
    pub fn handle_id(&self) -> Option<u64> {
        self.handle.as_ref().map(ConnectionHandle::id)
    }

    pub(crate) fn finish_commit(mut self) -> AppResult<()> {
        self.state = TxState::Completing;
        let handle = self.take_handle()?;

        if let Err(err) = handle.execute_batch("COMMIT;") {
            let primary = translate("commit", "COMMIT", 0, err);
            warn!(
                "event=tx_commit module=tx status=error tx_id={} handle_id={} outcome=unknown error={}",
                self.id,
                handle.id(),
                primary
            );
            rollback_quietly(self.id, &handle);
            self.source.release(handle);
            let code = match &primary {
                AppError::Storage { code, .. } => *code,
                _ => None,
            };
            return Err(AppError::storage(
                StorageFault::CommitOutcomeUnknown,
                code,
                primary.to_string(),
            ));
        }

        ensure_autocommit(self.id, &handle);
        info!(
            "event=tx_commit module=tx status=ok tx_id={} handle_id={} duration_ms={}",
            self.id,
            handle.id(),
            self.started_at.elapsed().as_millis()
        );
        self.source.release(handle);
        Ok(())
    }

    pub(crate) fn finish_rollback(mut self) -> AppResult<()> {
        self.state = TxState::Completing;
        let handle = self.take_handle()?;

        let result = if handle.is_autocommit() {
            // SQLite already rolled back (e.g. after a failed COMMIT).
            Ok(())
        } else {
            handle
                .execute_batch("ROLLBACK;")
                .map_err(|err| translate("rollback", "ROLLBACK", 0, err))
        };

        match &result {
            Ok(()) => info!(
                "event=tx_rollback module=tx status=ok tx_id={} handle_id={} duration_ms={}",
                self.id,
                handle.id(),
                self.started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=tx_rollback module=tx status=error tx_id={} handle_id={} error={}",
                self.id,
                handle.id(),
                err
            ),
        }

        ensure_autocommit(self.id, &handle);
        self.source.release(handle);
        result
    }

    fn take_handle(&mut self) -> AppResult<ConnectionHandle> {
        self.handle
            .take()
            .ok_or_else(|| AppError::illegal_state("no active transaction"))
    }
}

impl ConnectionScope for TransactionContext {
    fn connection(&self) -> AppResult<&Connection> {
        match (&self.handle, self.state) {
            (Some(handle), TxState::Active) => Ok(&**handle),
            _ => Err(AppError::illegal_state("no active transaction")),
        }
    }
}

impl Drop for TransactionContext {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            warn!(
                "event=tx_abandoned module=tx status=rollback tx_id={} handle_id={}",
                self.id,
                handle.id()
            );
            rollback_quietly(self.id, &handle);
            self.source.release(handle);
        }
    }
}

impl std::fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionContext")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("handle_id", &self.handle_id())
            .finish()
    }
}

fn begin_sql(behavior: TransactionBehavior) -> &'static str {
    match behavior {
        TransactionBehavior::Deferred => "BEGIN DEFERRED;",
        TransactionBehavior::Immediate => "BEGIN IMMEDIATE;",
        TransactionBehavior::Exclusive => "BEGIN EXCLUSIVE;",
        _ => "BEGIN IMMEDIATE;",
    }
}

fn rollback_quietly(tx_id: u64, conn: &Connection) {
    if conn.is_autocommit() {
        return;
    }
    if let Err(err) = conn.execute_batch("ROLLBACK;") {
        warn!("event=tx_rollback module=tx status=error tx_id={tx_id} secondary=true error={err}");
    }
}

fn ensure_autocommit(tx_id: u64, conn: &Connection) {
    if !conn.is_autocommit() {
        warn!("event=tx_restore module=tx status=error tx_id={tx_id} reason=still_in_transaction");
        rollback_quietly(tx_id, conn);
    }
}
