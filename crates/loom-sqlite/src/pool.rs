//! `r2d2` pool over `SqliteConnection`, following
//! `chem_persistence::pg::{PgPool, ConnectionProvider, PoolProvider}` with
//! `Pg` replaced by `Sqlite` throughout (§4.2).

use diesel::connection::SimpleConnection;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use diesel::sqlite::SqliteConnection;
use loom_core::StoreError;

use crate::config::{ensure_parent_dirs, StoreConfig};
use crate::error::map_pool_err;
use crate::migrations::run_pending_migrations;

pub type SqlitePool = r2d2::Pool<ConnectionManager<SqliteConnection>>;
pub type PooledSqliteConnection = r2d2::PooledConnection<ConnectionManager<SqliteConnection>>;

/// Abstracts "obtain a connection" so `catalog`/`blob` can be tested against
/// a fake without going through `r2d2`.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<PooledSqliteConnection, StoreError>;
}

pub struct PoolProvider {
    pub pool: SqlitePool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<PooledSqliteConnection, StoreError> {
        self.pool.get().map_err(map_pool_err)
    }
}

/// Sets the per-connection pragmas every pooled `SqliteConnection` needs:
/// WAL journaling (durability across a hard kill, §7), a busy timeout so
/// transient lock contention surfaces as a retryable error instead of an
/// immediate failure, and foreign key enforcement.
#[derive(Debug, Clone, Copy)]
struct ConnectionOptions {
    busy_timeout_ms: i64,
}

impl CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA journal_mode = WAL; PRAGMA busy_timeout = {}; PRAGMA foreign_keys = ON; PRAGMA synchronous = NORMAL;",
            self.busy_timeout_ms
        ))
        .map_err(r2d2::Error::QueryError)
    }
}

/// Builds a pool rooted at `config.sqlite_path()`, creating parent
/// directories and running embedded migrations against the first
/// connection before returning.
pub fn build_pool(config: &StoreConfig) -> Result<SqlitePool, StoreError> {
    let path = config.sqlite_path();
    ensure_parent_dirs(&path)?;

    let manager = ConnectionManager::<SqliteConnection>::new(path.to_string_lossy());
    let pool = r2d2::Pool::builder().max_size(config.max_connections.max(1))
                                    .connection_customizer(Box::new(ConnectionOptions { busy_timeout_ms: 5_000 }))
                                    .build(manager)
                                    .map_err(|e| StoreError::Backend(format!("pool build: {e}")))?;

    let mut conn = pool.get().map_err(map_pool_err)?;
    run_pending_migrations(&mut conn)?;
    log::info!("catalog ready at {}", path.display());
    Ok(pool)
}

/// `PRAGMA wal_checkpoint(TRUNCATE)`, the SQLite counterpart of
/// `ForceSaveWAL` (§4.2): folds the WAL back into the main database file so
/// a subsequent `cp`/backup of the catalog sees every committed write.
pub fn force_save_wal(conn: &mut SqliteConnection) -> Result<(), StoreError> {
    conn.batch_execute("PRAGMA wal_checkpoint(TRUNCATE);")
        .map_err(|e| StoreError::Backend(format!("wal checkpoint: {e}")))
}
