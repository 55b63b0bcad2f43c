//! SQLite key/value option rows.

use rusqlite::{params, Connection, OptionalExtension};

/// Read an option's raw JSON value and its last-updated timestamp.
pub fn load_option(
    conn: &Connection,
    key: &str,
) -> Result<Option<(Option<String>, i64)>, rusqlite::Error> {
    conn.query_row(
        "SELECT value, updated_at FROM options WHERE key = ?1",
        params![key],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
}

/// Upsert an option (last writer wins).
pub fn save_option(
    conn: &Connection,
    key: &str,
    value: &str,
    updated_at: i64,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO options (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value, updated_at],
    )?;
    Ok(())
}
