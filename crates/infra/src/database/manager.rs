//! Pooled SQLCipher connection manager.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ledgersync_domain::{Result, SyncError};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection};
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::errors::InfraError;

pub const SCHEMA_VERSION: i32 = 1;
const SCHEMA_SQL: &str = include_str!("schema.sql");
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

pub type SqlConnection = PooledConnection<SqliteConnectionManager>;

/// Shared connection pool. Every connection is keyed before first use.
pub struct DbManager {
    pool: Pool<SqliteConnectionManager>,
    path: PathBuf,
}

impl DbManager {
    /// Open (or create) the encrypted database at `db_path`.
    ///
    /// Fails with `Security` when no key is supplied or the key does not
    /// decrypt an existing file.
    pub fn new<P: AsRef<Path>>(
        db_path: P,
        pool_size: u32,
        encryption_key: Option<&str>,
    ) -> Result<Self> {
        let key = encryption_key
            .filter(|k| !k.is_empty())
            .map(|k| Zeroizing::new(k.to_string()))
            .ok_or_else(|| SyncError::Security("database encryption key not provided".into()))?;

        let path = db_path.as_ref().to_path_buf();

        let manager = SqliteConnectionManager::file(&path).with_init(move |conn| {
            conn.pragma_update(None, "key", key.as_str())?;
            apply_connection_pragmas(conn)
        });

        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .connection_timeout(CONNECTION_TIMEOUT)
            .build(manager)
            .map_err(|err| SyncError::from(InfraError::from(err)))?;

        {
            let conn = pool.get().map_err(|err| SyncError::from(InfraError::from(err)))?;
            verify_encryption(&conn)?;
        }

        info!(db_path = %path.display(), max_connections = pool.max_size(), "sqlcipher pool initialised");

        Ok(Self { pool, path })
    }

    pub fn get_connection(&self) -> Result<SqlConnection> {
        self.pool.get().map_err(|err| SyncError::from(InfraError::from(err)))
    }

    /// Ensure the full schema exists on the current database.
    pub fn run_migrations(&self) -> Result<()> {
        let conn = self.get_connection()?;
        create_schema(&conn)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn health_check(&self) -> Result<()> {
        let conn = self.get_connection()?;
        conn.query_row("SELECT 1", params![], |row| row.get::<_, i32>(0)).map_err(map_sql_error)?;
        Ok(())
    }
}

fn apply_connection_pragmas(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=NORMAL;
         PRAGMA foreign_keys=ON;",
    )?;
    conn.busy_timeout(BUSY_TIMEOUT)
}

/// Reading the header forces SQLCipher to decrypt a page.
fn verify_encryption(conn: &Connection) -> Result<()> {
    conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
        .map_err(map_sql_error)?;
    debug!("sqlcipher key verified");
    Ok(())
}

fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL).map_err(map_sql_error)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, CAST(strftime('%s','now') AS INTEGER))",
        params![SCHEMA_VERSION],
    )
    .map_err(map_sql_error)?;
    Ok(())
}

pub(crate) fn map_sql_error(err: rusqlite::Error) -> SyncError {
    SyncError::from(InfraError::from(err))
}

pub(crate) fn map_join_error(err: tokio::task::JoinError) -> SyncError {
    if err.is_cancelled() {
        SyncError::Internal("blocking task cancelled".into())
    } else {
        SyncError::Internal(format!("blocking task failed: {err}"))
    }
}
