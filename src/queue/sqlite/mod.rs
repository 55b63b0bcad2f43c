//! SQLite storage layer for stashQ persistence.
//!
//! Embedded persistence with:
//! - WAL mode and relaxed sync (survives process crashes, not power loss)
//! - One connection per owner; `Connection` is `!Sync` so it is never shared
//! - Idempotent migrations with an auto-touched `updated_at`

mod entries;
mod migration;
mod options;

#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::time::Duration;

use rusqlite::Connection;
use tracing::info;

use crate::error::QueueResult;
use crate::protocol::{JobStatus, QueueEntry, QueueFilter, QueueItem, Scope};

pub use entries::WhereClause;

/// SQLite storage configuration
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Path to the database file
    pub path: PathBuf,
    /// Enable WAL mode (recommended)
    pub wal_mode: bool,
    /// Synchronous mode: 0=OFF, 1=NORMAL, 2=FULL
    pub synchronous: i32,
    /// Cache size in pages (negative = KB)
    pub cache_size: i32,
    /// How long a writer waits on a locked database before failing
    pub busy_timeout: Duration,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("stashq.db"),
            wal_mode: true,
            synchronous: 1, // NORMAL
            cache_size: -16000,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl SqliteConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let path = std::env::var("STASHQ_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.path);

        let synchronous = std::env::var("STASHQ_SQLITE_SYNCHRONOUS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.synchronous);

        let cache_size = std::env::var("STASHQ_SQLITE_CACHE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.cache_size);

        let busy_timeout = std::env::var("STASHQ_SQLITE_BUSY_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.busy_timeout);

        Self {
            path,
            wal_mode: true,
            synchronous,
            cache_size,
            busy_timeout,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }
}

/// One SQLite connection plus the queue/option operations over it.
pub struct SqliteStorage {
    conn: Connection,
    /// Path to the database file
    pub path: PathBuf,
}

impl SqliteStorage {
    /// Open a new connection.
    pub fn open(config: &SqliteConfig) -> QueueResult<Self> {
        // Create parent directories if they don't exist
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&config.path)?;
        conn.busy_timeout(config.busy_timeout)?;
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = {};
             PRAGMA synchronous = {};
             PRAGMA cache_size = {};
             PRAGMA temp_store = MEMORY;",
            if config.wal_mode { "WAL" } else { "DELETE" },
            config.synchronous,
            config.cache_size,
        ))?;

        info!(path = %config.path.display(), "SQLite connection opened");

        Ok(Self {
            conn,
            path: config.path.clone(),
        })
    }

    /// Run database migrations
    pub fn migrate(&self) -> Result<(), rusqlite::Error> {
        migration::migrate(&self.conn)
    }

    // ============== Dispatch ==============

    pub fn upsert_pending(&self, item: &QueueItem) -> Result<usize, rusqlite::Error> {
        entries::upsert_pending(&self.conn, item)
    }

    pub fn first_pending(&self) -> Result<Option<QueueEntry>, rusqlite::Error> {
        entries::first_pending(&self.conn)
    }

    pub fn mark_running(&self, job_id: &str) -> Result<usize, rusqlite::Error> {
        entries::mark_running(&self.conn, job_id)
    }

    pub fn mark_finished(&self, job_id: &str) -> Result<usize, rusqlite::Error> {
        entries::mark_finished(&self.conn, job_id)
    }

    pub fn count_remaining(&self) -> Result<u64, rusqlite::Error> {
        entries::count_remaining(&self.conn)
    }

    // ============== Browsing ==============

    pub fn count_scope(
        &self,
        scope: Scope,
        filter: &QueueFilter,
    ) -> Result<u64, rusqlite::Error> {
        let clause = WhereClause::for_scope(scope, filter, false);
        entries::count_matching(&self.conn, &clause)
    }

    pub fn page_scope(
        &self,
        scope: Scope,
        filter: &QueueFilter,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<QueueEntry>, rusqlite::Error> {
        let clause = WhereClause::for_scope(scope, filter, false);
        entries::page_matching(&self.conn, scope, &clause, offset, limit)
    }

    /// Unpaginated listing, newest first. The queue scope includes Running rows.
    pub fn list_scope(
        &self,
        scope: Scope,
        filter: &QueueFilter,
    ) -> Result<Vec<QueueEntry>, rusqlite::Error> {
        let clause = WhereClause::for_scope(scope, filter, true);
        entries::list_matching(&self.conn, &clause)
    }

    // ============== Administration ==============

    pub fn archive_pending(&self, filter: &QueueFilter) -> Result<usize, rusqlite::Error> {
        entries::archive_pending(&self.conn, filter)
    }

    pub fn archive_ids(&self, ids: &[i64]) -> Result<usize, rusqlite::Error> {
        entries::archive_ids(&self.conn, ids)
    }

    pub fn load_playable(&self, id: i64) -> Result<Option<QueueEntry>, rusqlite::Error> {
        entries::load_playable(&self.conn, id)
    }

    pub fn load_archived(&self, filter: &QueueFilter) -> Result<Vec<QueueEntry>, rusqlite::Error> {
        entries::load_archived(&self.conn, filter)
    }

    pub fn requeue_items(&self, items: &[(i64, QueueItem)]) -> Result<usize, rusqlite::Error> {
        entries::requeue_items(&self.conn, items)
    }

    pub fn insert_ignore_batch(
        &self,
        items: &[QueueItem],
        status: JobStatus,
    ) -> Result<usize, rusqlite::Error> {
        entries::insert_ignore_batch(&self.conn, items, status)
    }

    pub fn delete_job_ids(&self, job_ids: &[String]) -> Result<usize, rusqlite::Error> {
        entries::delete_job_ids(&self.conn, job_ids)
    }

    pub fn delete_scope(&self, scope: Scope, filter: &QueueFilter) -> Result<usize, rusqlite::Error> {
        let clause = WhereClause::for_scope(scope, filter, false);
        entries::delete_matching(&self.conn, &clause)
    }

    pub fn delete_running(&self, job_id: Option<&str>) -> Result<usize, rusqlite::Error> {
        entries::delete_running(&self.conn, job_id)
    }

    // ============== Recovery ==============

    /// Requeue Running rows ahead of every Pending row, skipping `live` job ids.
    pub fn requeue_orphans(&self, live: &[String]) -> Result<usize, rusqlite::Error> {
        entries::requeue_orphans(&self.conn, live)
    }

    pub fn max_active_priority(&self) -> Result<Option<i64>, rusqlite::Error> {
        entries::max_active_priority(&self.conn)
    }

    // ============== Options ==============

    pub fn load_option(&self, key: &str) -> Result<Option<(Option<String>, i64)>, rusqlite::Error> {
        options::load_option(&self.conn, key)
    }

    pub fn save_option(&self, key: &str, value: &str, updated_at: i64) -> Result<(), rusqlite::Error> {
        options::save_option(&self.conn, key, value, updated_at)
    }
}
