//! Bounded SQLite connection pool
//!
//! One ingestion run holds one connection for its whole duration, so the pool
//! is the only state shared between concurrent runs. `r2d2` enforces the
//! ceiling on checked-out connections, the bounded wait for a free one and
//! the maximum connection age; every connection it opens gets the same
//! PRAGMA setup.

use super::error::{StorageError, StorageResult};
use crate::config::PoolConfig;
use r2d2::CustomizeConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// A checked-out connection; returns itself to the pool on drop
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Session setup applied to every new connection
#[derive(Debug, Clone, Copy)]
struct SessionSetup {
    busy_timeout: Duration,
}

impl CustomizeConnection<Connection, rusqlite::Error> for SessionSetup {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        conn.busy_timeout(self.busy_timeout)?;
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            "#,
        )
    }
}

/// Snapshot of pool occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub idle: usize,
    pub in_use: usize,
    pub max: usize,
}

/// Shared handle to a bounded set of connections on one database file
#[derive(Clone)]
pub struct ConnectionPool {
    pool: r2d2::Pool<SqliteConnectionManager>,
    path: PathBuf,
    acquire_timeout: Duration,
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("path", &self.path)
            .field("max_connections", &self.pool.max_size())
            .finish()
    }
}

impl ConnectionPool {
    /// Open a pool on `path`, creating the parent directory if needed
    ///
    /// One connection is opened eagerly so a bad path fails here rather than
    /// on the first ingestion.
    pub fn open(path: impl AsRef<Path>, config: PoolConfig) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let max_size = u32::try_from(config.max_connections)
            .map_err(|_| StorageError::InvalidPool("max_connections out of range"))?;
        if max_size == 0 {
            return Err(StorageError::InvalidPool("max_connections must be at least 1"));
        }
        if config.acquire_timeout().is_zero() {
            return Err(StorageError::InvalidPool("acquire_timeout_secs must be at least 1"));
        }
        if config.recycle_after().is_zero() {
            return Err(StorageError::InvalidPool("recycle_after_secs must be at least 1"));
        }

        let manager = SqliteConnectionManager::file(&path);
        let pool = r2d2::Pool::builder()
            .max_size(max_size)
            .min_idle(Some(0))
            .connection_timeout(config.acquire_timeout())
            .max_lifetime(Some(config.recycle_after()))
            .connection_customizer(Box::new(SessionSetup {
                busy_timeout: config.busy_timeout(),
            }))
            .build(manager)?;
        drop(pool.get()?);
        debug!(path = %path.display(), max_connections = max_size, "connection pool opened");

        Ok(Self {
            pool,
            path,
            acquire_timeout: config.acquire_timeout(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check out a connection, waiting up to the configured timeout
    pub fn acquire(&self) -> StorageResult<PooledConnection> {
        self.pool.get().map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "no connection available");
            StorageError::PoolExhausted(self.acquire_timeout)
        })
    }

    pub fn status(&self) -> StorageResult<PoolStatus> {
        let state = self.pool.state();
        let total = state.connections as usize;
        let idle = state.idle_connections as usize;
        Ok(PoolStatus {
            idle,
            in_use: total.saturating_sub(idle),
            max: self.pool.max_size() as usize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn config(max: usize, timeout_secs: u64) -> PoolConfig {
        PoolConfig {
            max_connections: max,
            acquire_timeout_secs: timeout_secs,
            ..PoolConfig::default()
        }
    }

    #[test]
    fn reuses_released_connections() {
        let dir = tempfile::tempdir().unwrap();
        let pool = ConnectionPool::open(dir.path().join("p.db"), config(2, 1)).unwrap();

        {
            let conn = pool.acquire().unwrap();
            conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
            assert_eq!(pool.status().unwrap().in_use, 1);
        }
        let status = pool.status().unwrap();
        assert_eq!(status.in_use, 0);
        assert!(status.idle >= 1);

        let conn = pool.acquire().unwrap();
        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn exhausted_pool_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let pool = ConnectionPool::open(dir.path().join("p.db"), config(1, 1)).unwrap();
        let _held = pool.acquire().unwrap();

        let started = Instant::now();
        match pool.acquire() {
            Err(StorageError::PoolExhausted(waited)) => assert_eq!(waited, Duration::from_secs(1)),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("second connection handed out past the ceiling"),
        }
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn waiter_wakes_when_connection_returns() {
        let dir = tempfile::tempdir().unwrap();
        let pool = ConnectionPool::open(dir.path().join("p.db"), config(1, 10)).unwrap();
        let held = pool.acquire().unwrap();

        let waiter = {
            let pool = pool.clone();
            std::thread::spawn(move || pool.acquire().map(|_| ()))
        };
        std::thread::sleep(Duration::from_millis(50));
        drop(held);
        assert!(waiter.join().unwrap().is_ok());
    }

    #[test]
    fn zero_limits_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.db");
        assert!(matches!(
            ConnectionPool::open(&path, config(0, 1)),
            Err(StorageError::InvalidPool(_))
        ));
        assert!(matches!(
            ConnectionPool::open(&path, config(1, 0)),
            Err(StorageError::InvalidPool(_))
        ));
    }
}
