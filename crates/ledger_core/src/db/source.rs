//! Connection sources: fresh-per-call and pooled.
//!
//! # Responsibility
//! - Hand out exclusively owned [`ConnectionHandle`]s.
//! - Take handles back through [`ConnectionSource::release`], which consumes
//!   them, so a handle cannot be released twice.
//!
//! # Invariants
//! - Every handle has `foreign_keys=ON` and the configured busy timeout.
//! - The schema is migrated before the first handle is handed out.
//! - Acquisition failures surface as `AppError::Connection`.

use super::open::configure_connection;
use super::translate::{translate_db, translate_pool};
use super::{open_db, BootstrapError};
use crate::config::SourceConfig;
use crate::db::migrations::apply_migrations;
use crate::error::{AppError, AppResult};
use log::{debug, info, warn};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Supplies connections to the transaction layer and auto-commit callers.
pub trait ConnectionSource: Send + Sync {
    /// Obtains a connection, blocking up to the configured timeout.
    fn acquire(&self) -> AppResult<ConnectionHandle>;

    /// Returns a handle to its source. Pooled handles go back to the pool,
    /// direct handles are closed.
    fn release(&self, handle: ConnectionHandle) {
        debug!(
            "event=connection_release module=source kind={} handle_id={}",
            self.kind(),
            handle.id()
        );
        drop(handle);
    }

    /// Short label used in diagnostics (`direct`, `pooled`, `memory`).
    fn kind(&self) -> &'static str;
}

enum HandleInner {
    Direct(Connection),
    Pooled(PooledConnection),
}

/// A live, exclusively owned link to the store.
pub struct ConnectionHandle {
    id: u64,
    inner: HandleInner,
}

impl ConnectionHandle {
    fn direct(conn: Connection) -> Self {
        Self {
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            inner: HandleInner::Direct(conn),
        }
    }

    fn pooled(conn: PooledConnection) -> Self {
        Self {
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            inner: HandleInner::Pooled(conn),
        }
    }

    /// Process-unique id, stable for the lifetime of this checkout.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_pooled(&self) -> bool {
        matches!(self.inner, HandleInner::Pooled(_))
    }
}

impl Deref for ConnectionHandle {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match &self.inner {
            HandleInner::Direct(conn) => conn,
            HandleInner::Pooled(conn) => &**conn,
        }
    }
}

impl Debug for ConnectionHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("pooled", &self.is_pooled())
            .finish()
    }
}

/// Opens a brand-new connection to a database file on every `acquire`.
#[derive(Debug, Clone)]
pub struct DriverManagerSource {
    path: PathBuf,
    config: SourceConfig,
}

impl DriverManagerSource {
    /// Migrates the database at `path` once and returns the source.
    pub fn open(path: impl AsRef<Path>, config: SourceConfig) -> AppResult<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();
        open_db(&path).map_err(|err| translate_db("source_open", err))?;
        Ok(Self { path, config })
    }
}

impl ConnectionSource for DriverManagerSource {
    fn acquire(&self) -> AppResult<ConnectionHandle> {
        let conn = Connection::open(&self.path)
            .and_then(|conn| {
                configure_connection(&conn, self.config.busy_timeout(), true)?;
                Ok(conn)
            })
            .map_err(|err| {
                warn!(
                    "event=connection_acquire module=source kind=direct status=error path={} error={}",
                    self.path.display(),
                    err
                );
                AppError::connection(format!(
                    "cannot open `{}`: {err}",
                    self.path.display()
                ))
            })?;

        let handle = ConnectionHandle::direct(conn);
        debug!(
            "event=connection_acquire module=source kind=direct status=ok handle_id={}",
            handle.id()
        );
        Ok(handle)
    }

    fn kind(&self) -> &'static str {
        "direct"
    }
}

#[derive(Debug)]
struct PragmaCustomizer {
    config: SourceConfig,
    wal: bool,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        configure_connection(conn, self.config.busy_timeout(), self.wal)
    }
}

/// Bounded `r2d2` pool of SQLite connections.
#[derive(Clone)]
pub struct PooledSource {
    pool: Pool<SqliteConnectionManager>,
    kind: &'static str,
}

impl PooledSource {
    /// Builds a pool over a database file and migrates its schema.
    pub fn open(path: impl AsRef<Path>, config: SourceConfig) -> AppResult<Self> {
        config.validate()?;
        let manager = SqliteConnectionManager::file(path.as_ref());
        let pool = Pool::builder()
            .max_size(config.max_pool_size)
            .connection_timeout(config.connection_timeout())
            .connection_customizer(Box::new(PragmaCustomizer {
                config: config.clone(),
                wal: true,
            }))
            .build(manager)
            .map_err(translate_pool)?;
        Self::migrated(pool, "pooled")
    }

    /// One-connection pool over a private in-memory database.
    ///
    /// Idle reaping is disabled so the single connection, and with it the
    /// data, lives as long as the source.
    pub fn in_memory(config: SourceConfig) -> AppResult<Self> {
        config.validate()?;
        let pool = Pool::builder()
            .max_size(1)
            .min_idle(Some(1))
            .idle_timeout(None)
            .max_lifetime(None)
            .connection_timeout(config.connection_timeout())
            .connection_customizer(Box::new(PragmaCustomizer {
                config: config.clone(),
                wal: false,
            }))
            .build(SqliteConnectionManager::memory())
            .map_err(translate_pool)?;
        Self::migrated(pool, "memory")
    }

    fn migrated(pool: Pool<SqliteConnectionManager>, kind: &'static str) -> AppResult<Self> {
        let mut conn = pool.get().map_err(translate_pool)?;
        apply_migrations(&mut conn).map_err(|err: BootstrapError| translate_db("migrate", err))?;
        info!(
            "event=pool_ready module=source kind={kind} status=ok max_size={}",
            pool.max_size()
        );
        Ok(Self { pool, kind })
    }

    pub fn max_size(&self) -> u32 {
        self.pool.max_size()
    }

    /// Connections currently checked out of the pool.
    pub fn in_use(&self) -> u32 {
        let state = self.pool.state();
        state.connections - state.idle_connections
    }
}

impl Debug for PooledSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledSource")
            .field("kind", &self.kind)
            .field("max_size", &self.pool.max_size())
            .finish()
    }
}

impl ConnectionSource for PooledSource {
    fn acquire(&self) -> AppResult<ConnectionHandle> {
        let started_at = Instant::now();
        let conn = self.pool.get().map_err(|err| {
            warn!(
                "event=connection_acquire module=source kind={} status=error waited_ms={}",
                self.kind,
                started_at.elapsed().as_millis()
            );
            translate_pool(err)
        })?;

        let handle = ConnectionHandle::pooled(conn);
        debug!(
            "event=connection_acquire module=source kind={} status=ok handle_id={} waited_ms={}",
            self.kind,
            handle.id(),
            started_at.elapsed().as_millis()
        );
        Ok(handle)
    }

    fn kind(&self) -> &'static str {
        self.kind
    }
}
