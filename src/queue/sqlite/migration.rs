//! SQLite database migrations for stashQ.

use rusqlite::Connection;
use tracing::info;

/// Current time in milliseconds, computed by SQLite.
pub(crate) const SQL_NOW_MS: &str = "CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER)";

/// Run all database migrations. Safe to call on every open.
pub fn migrate(conn: &Connection) -> Result<(), rusqlite::Error> {
    // Create migrations table to track applied migrations
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let applied: Vec<String> = {
        let mut stmt = conn.prepare("SELECT name FROM migrations")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<_, _>>()?
    };

    let mut applied_count = 0;

    // Migration 1: queue entries. updated_at is touched by trigger unless the
    // UPDATE sets it explicitly.
    if !applied.iter().any(|n| n == "001_create_queue") {
        conn.execute_batch(&format!(
            "CREATE TABLE queue (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id TEXT NOT NULL UNIQUE,
                priority INTEGER NOT NULL,
                name TEXT,
                workflow_id TEXT,
                payload TEXT NOT NULL,
                status INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL DEFAULT ({now}),
                updated_at INTEGER NOT NULL DEFAULT ({now})
            );

            CREATE INDEX idx_queue_status_priority ON queue(status, priority);
            CREATE INDEX idx_queue_workflow ON queue(workflow_id);

            CREATE TRIGGER queue_set_updated_at
            AFTER UPDATE ON queue
            FOR EACH ROW
            WHEN NEW.updated_at = OLD.updated_at
            BEGIN
                UPDATE queue SET updated_at = {now} WHERE rowid = NEW.rowid;
            END;

            INSERT INTO migrations (name, applied_at) VALUES ('001_create_queue', {now});
            ",
            now = SQL_NOW_MS
        ))?;
        applied_count += 1;
    }

    // Migration 2: key/value options
    if !applied.iter().any(|n| n == "002_create_options") {
        conn.execute_batch(&format!(
            "CREATE TABLE options (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                key TEXT NOT NULL UNIQUE,
                value TEXT,
                updated_at INTEGER NOT NULL
            );

            INSERT INTO migrations (name, applied_at) VALUES ('002_create_options', {now});
            ",
            now = SQL_NOW_MS
        ))?;
        applied_count += 1;
    }

    if applied_count > 0 {
        info!(count = applied_count, "Applied SQLite migrations");
    }

    Ok(())
}
