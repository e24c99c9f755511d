//! Database connection manager backed by an r2d2 SQLite pool.

use std::path::{Path, PathBuf};

use amity_domain::Result;
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::info;

use crate::errors::{db_err, pool_err};

const SCHEMA_VERSION: i32 = 1;
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Pooled connection handle.
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Database manager that wraps an r2d2 SQLite pool.
pub struct DbManager {
    pool: r2d2::Pool<SqliteConnectionManager>,
    path: PathBuf,
}

impl DbManager {
    /// Create a new manager with the given pool size.
    pub fn new<P: AsRef<Path>>(db_path: P, pool_size: u32) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();

        // WAL lets webhook-triggered reconciliation read while bookings
        // write; the busy timeout covers short write bursts.
        let manager = SqliteConnectionManager::file(&path).with_init(|conn| {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update(None, "busy_timeout", 5000)?;
            Ok(())
        });

        let pool = r2d2::Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)
            .map_err(pool_err)?;

        info!(db_path = %path.display(), max_connections = pool.max_size(), "sqlite pool initialised");

        Ok(Self { pool, path })
    }

    /// Acquire a connection from the pool.
    pub fn conn(&self) -> Result<DbConnection> {
        self.pool.get().map_err(pool_err)
    }

    /// Ensure the full schema exists on the current database.
    pub fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA_SQL).map_err(db_err)?;
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at)
             VALUES (?1, CAST(strftime('%s','now') AS INTEGER))",
            params![SCHEMA_VERSION],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// Return the configured database path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Perform a health check to verify database connectivity.
    pub fn health_check(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", params![], |row| row.get::<_, i32>(0)).map_err(db_err)?;
        Ok(())
    }
}
