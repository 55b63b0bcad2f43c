//! SQLite queue entry operations for stashQ.

use rusqlite::types::{Type, Value as SqlValue};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::protocol::{JobStatus, QueueEntry, QueueFilter, QueueItem, Scope};

const ENTRY_COLUMNS: &str =
    "id, job_id, priority, name, workflow_id, payload, status, created_at, updated_at";

const PENDING: i64 = 0;
const RUNNING: i64 = 1;
const FINISHED: i64 = 2;
const ARCHIVED: i64 = 3;

/// A WHERE clause with its positional parameters.
pub struct WhereClause {
    sql: String,
    params: Vec<SqlValue>,
}

impl WhereClause {
    /// Status clause for a scope, plus the optional equality filter.
    /// `include_running` widens the queue scope to Running rows.
    pub fn for_scope(scope: Scope, filter: &QueueFilter, include_running: bool) -> Self {
        let status = match scope {
            Scope::Queue if include_running => "status IN (0, 1)",
            Scope::Queue => "status = 0",
            Scope::Archive => "status = 3",
            Scope::Completed => "status = 2",
        };
        Self::with_filter(status, filter)
    }

    fn with_filter(status: &str, filter: &QueueFilter) -> Self {
        let mut sql = format!("({})", status);
        let mut params = Vec::new();
        if let Some(ref workflow_id) = filter.workflow_id {
            sql.push_str(" AND workflow_id = ?");
            params.push(SqlValue::Text(workflow_id.clone()));
        }
        Self { sql, params }
    }

    fn order_by(scope: Scope) -> &'static str {
        match scope {
            Scope::Queue => "ORDER BY priority, id",
            Scope::Archive | Scope::Completed => "ORDER BY updated_at, id",
        }
    }
}

fn encode_item(item: &QueueItem) -> Result<String, rusqlite::Error> {
    serde_json::to_string(item).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Map a row selected with `ENTRY_COLUMNS`.
/// The priority column is authoritative over the one inside the payload.
fn row_to_entry(row: &Row<'_>) -> Result<QueueEntry, rusqlite::Error> {
    let payload: String = row.get(5)?;
    let mut item: QueueItem = serde_json::from_str(&payload)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;
    let priority: i64 = row.get(2)?;
    item.priority = priority;

    let code: i64 = row.get(6)?;
    let status = JobStatus::from_code(code).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            Type::Integer,
            format!("unknown status code {}", code).into(),
        )
    })?;

    Ok(QueueEntry {
        id: row.get(0)?,
        job_id: row.get(1)?,
        priority,
        name: row.get(3)?,
        workflow_id: row.get(4)?,
        item,
        status,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Insert or update an entry by job id, forcing it back to Pending.
pub fn upsert_pending(conn: &Connection, item: &QueueItem) -> Result<usize, rusqlite::Error> {
    let payload = encode_item(item)?;
    conn.execute(
        "INSERT INTO queue (job_id, priority, name, workflow_id, payload, status)
         VALUES (?1, ?2, ?3, ?4, ?5, 0)
         ON CONFLICT(job_id) DO UPDATE SET
            priority = excluded.priority,
            name = excluded.name,
            workflow_id = excluded.workflow_id,
            payload = excluded.payload,
            status = 0",
        params![
            item.job_id,
            item.priority,
            non_empty(item.workflow_name()),
            non_empty(item.workflow_id()),
            payload,
        ],
    )
}

/// Insert-or-ignore a batch with the given status. Returns rows inserted.
pub fn insert_ignore_batch(
    conn: &Connection,
    items: &[QueueItem],
    status: JobStatus,
) -> Result<usize, rusqlite::Error> {
    let tx = conn.unchecked_transaction()?;
    let mut inserted = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO queue (job_id, priority, name, workflow_id, payload, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for item in items {
            inserted += stmt.execute(params![
                item.job_id,
                item.priority,
                non_empty(item.workflow_name()),
                non_empty(item.workflow_id()),
                encode_item(item)?,
                status.code(),
            ])?;
        }
    }
    tx.commit()?;
    Ok(inserted)
}

/// The Pending entry with the globally smallest priority (ties: insertion order).
pub fn first_pending(conn: &Connection) -> Result<Option<QueueEntry>, rusqlite::Error> {
    conn.query_row(
        &format!(
            "SELECT {} FROM queue WHERE status = ?1 ORDER BY priority, id LIMIT 1",
            ENTRY_COLUMNS
        ),
        params![PENDING],
        row_to_entry,
    )
    .optional()
}

/// Pending -> Running for one job.
pub fn mark_running(conn: &Connection, job_id: &str) -> Result<usize, rusqlite::Error> {
    conn.execute(
        "UPDATE queue SET status = ?2 WHERE job_id = ?1 AND status = ?3",
        params![job_id, RUNNING, PENDING],
    )
}

/// Running -> Finished for one job.
pub fn mark_finished(conn: &Connection, job_id: &str) -> Result<usize, rusqlite::Error> {
    conn.execute(
        "UPDATE queue SET status = ?2 WHERE job_id = ?1 AND status = ?3",
        params![job_id, FINISHED, RUNNING],
    )
}

/// Pending + Running rows.
pub fn count_remaining(conn: &Connection) -> Result<u64, rusqlite::Error> {
    conn.query_row(
        "SELECT COUNT(*) FROM queue WHERE status IN (?1, ?2)",
        params![PENDING, RUNNING],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n as u64)
}

pub fn count_matching(conn: &Connection, clause: &WhereClause) -> Result<u64, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT COUNT(*) FROM queue WHERE {}", clause.sql),
        params_from_iter(clause.params.iter()),
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n as u64)
}

/// One page of a scope in dispatch (queue) or update (archive) order.
pub fn page_matching(
    conn: &Connection,
    scope: Scope,
    clause: &WhereClause,
    offset: u64,
    limit: u64,
) -> Result<Vec<QueueEntry>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM queue WHERE {} {} LIMIT ? OFFSET ?",
        ENTRY_COLUMNS,
        clause.sql,
        WhereClause::order_by(scope)
    ))?;
    let mut params = clause.params.clone();
    params.push(SqlValue::Integer(limit as i64));
    params.push(SqlValue::Integer(offset as i64));

    let rows = stmt.query_map(params_from_iter(params.iter()), row_to_entry)?;
    rows.collect()
}

/// Every row matching, newest first.
pub fn list_matching(
    conn: &Connection,
    clause: &WhereClause,
) -> Result<Vec<QueueEntry>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM queue WHERE {} ORDER BY created_at DESC, id DESC",
        ENTRY_COLUMNS, clause.sql
    ))?;
    let rows = stmt.query_map(params_from_iter(clause.params.iter()), row_to_entry)?;
    rows.collect()
}

/// Pending -> Archived for every matching row.
pub fn archive_pending(conn: &Connection, filter: &QueueFilter) -> Result<usize, rusqlite::Error> {
    let clause = WhereClause::for_scope(Scope::Queue, filter, false);
    let mut params = vec![SqlValue::Integer(ARCHIVED)];
    params.extend(clause.params.iter().cloned());
    conn.execute(
        &format!("UPDATE queue SET status = ? WHERE {}", clause.sql),
        params_from_iter(params.iter()),
    )
}

/// Pending/Running -> Archived by surrogate id.
pub fn archive_ids(conn: &Connection, ids: &[i64]) -> Result<usize, rusqlite::Error> {
    if ids.is_empty() {
        return Ok(0);
    }
    let tx = conn.unchecked_transaction()?;
    let mut archived = 0;
    {
        let mut stmt = tx.prepare(
            "UPDATE queue SET status = ?2 WHERE id = ?1 AND status IN (?3, ?4)",
        )?;
        for &id in ids {
            archived += stmt.execute(params![id, ARCHIVED, PENDING, RUNNING])?;
        }
    }
    tx.commit()?;
    Ok(archived)
}

/// Load an entry eligible for play (anything not currently running).
pub fn load_playable(conn: &Connection, id: i64) -> Result<Option<QueueEntry>, rusqlite::Error> {
    conn.query_row(
        &format!(
            "SELECT {} FROM queue WHERE id = ?1 AND status != ?2",
            ENTRY_COLUMNS
        ),
        params![id, RUNNING],
        row_to_entry,
    )
    .optional()
}

/// Archived entries matching the filter, in creation order.
pub fn load_archived(
    conn: &Connection,
    filter: &QueueFilter,
) -> Result<Vec<QueueEntry>, rusqlite::Error> {
    let clause = WhereClause::for_scope(Scope::Archive, filter, false);
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM queue WHERE {} ORDER BY created_at, id",
        ENTRY_COLUMNS, clause.sql
    ))?;
    let rows = stmt.query_map(params_from_iter(clause.params.iter()), row_to_entry)?;
    rows.collect()
}

/// Set each (id, item) back to Pending with the item's priority and payload.
pub fn requeue_items(conn: &Connection, items: &[(i64, QueueItem)]) -> Result<usize, rusqlite::Error> {
    if items.is_empty() {
        return Ok(0);
    }
    let tx = conn.unchecked_transaction()?;
    let mut moved = 0;
    {
        let mut stmt = tx.prepare(
            "UPDATE queue SET status = ?2, priority = ?3, payload = ?4 WHERE id = ?1 AND status != ?5",
        )?;
        for (id, item) in items {
            moved += stmt.execute(params![
                id,
                PENDING,
                item.priority,
                encode_item(item)?,
                RUNNING
            ])?;
        }
    }
    tx.commit()?;
    Ok(moved)
}

/// Delete by job id.
pub fn delete_job_ids(conn: &Connection, job_ids: &[String]) -> Result<usize, rusqlite::Error> {
    if job_ids.is_empty() {
        return Ok(0);
    }
    let tx = conn.unchecked_transaction()?;
    let mut deleted = 0;
    {
        let mut stmt = tx.prepare("DELETE FROM queue WHERE job_id = ?1")?;
        for job_id in job_ids {
            deleted += stmt.execute(params![job_id])?;
        }
    }
    tx.commit()?;
    Ok(deleted)
}

pub fn delete_matching(conn: &Connection, clause: &WhereClause) -> Result<usize, rusqlite::Error> {
    conn.execute(
        &format!("DELETE FROM queue WHERE {}", clause.sql),
        params_from_iter(clause.params.iter()),
    )
}

/// Delete one running job, or all of them when `job_id` is None.
pub fn delete_running(conn: &Connection, job_id: Option<&str>) -> Result<usize, rusqlite::Error> {
    conn.execute(
        "DELETE FROM queue WHERE status = ?1 AND (?2 IS NULL OR job_id = ?2)",
        params![RUNNING, job_id],
    )
}

// ============== Recovery ==============

/// Rows left Running by a previous process, in dispatch order.
pub fn load_running(conn: &Connection) -> Result<Vec<QueueEntry>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM queue WHERE status = ?1 ORDER BY priority, id",
        ENTRY_COLUMNS
    ))?;
    let rows = stmt.query_map(params![RUNNING], row_to_entry)?;
    rows.collect()
}

pub fn min_pending_priority(conn: &Connection) -> Result<Option<i64>, rusqlite::Error> {
    conn.query_row(
        "SELECT MIN(priority) FROM queue WHERE status = ?1",
        params![PENDING],
        |row| row.get(0),
    )
}

/// Highest priority over Pending and Running rows.
pub fn max_active_priority(conn: &Connection) -> Result<Option<i64>, rusqlite::Error> {
    conn.query_row(
        "SELECT MAX(priority) FROM queue WHERE status IN (?1, ?2)",
        params![PENDING, RUNNING],
        |row| row.get(0),
    )
}

/// Put orphaned Running rows back to Pending ahead of every Pending row,
/// keeping their relative order. Returns rows requeued.
pub fn requeue_orphans(conn: &Connection, live: &[String]) -> Result<usize, rusqlite::Error> {
    let tx = conn.unchecked_transaction()?;
    let orphans: Vec<QueueEntry> = load_running(&tx)?
        .into_iter()
        .filter(|entry| !live.contains(&entry.job_id))
        .collect();
    if orphans.is_empty() {
        return Ok(0);
    }

    let floor = min_pending_priority(&tx)?.unwrap_or(0);
    let count = orphans.len() as i64;
    {
        let mut stmt = tx.prepare("UPDATE queue SET status = ?2, priority = ?3 WHERE id = ?1")?;
        for (i, entry) in orphans.iter().enumerate() {
            stmt.execute(params![entry.id, PENDING, floor - count + i as i64])?;
        }
    }
    tx.commit()?;
    Ok(orphans.len())
}
