//! Core protocol types for stashQ.
//!
//! Contains QueueItem, QueueEntry, JobStatus, scopes, filters and events.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{QueueError, QueueResult};

/// Durable job status. Stored as an integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,  // Waiting for dispatch
    Running,  // Handed to the executor
    Finished, // Completed (successfully or not)
    Archived, // Retained but not scheduled
}

impl JobStatus {
    #[inline]
    pub fn code(self) -> i64 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Running => 1,
            JobStatus::Finished => 2,
            JobStatus::Archived => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(JobStatus::Pending),
            1 => Some(JobStatus::Running),
            2 => Some(JobStatus::Finished),
            3 => Some(JobStatus::Archived),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Finished => "finished",
            JobStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow metadata carried by every job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMeta {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Per-job options. Unknown keys are preserved in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobOptions {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub workflow: WorkflowMeta,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A job as submitted to and dispatched from the queue.
///
/// This is the opaque payload persisted with each entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Lower is dispatched sooner; negative means front-of-queue.
    pub priority: i64,
    pub job_id: String,
    /// Serialized job description handed to the executor untouched.
    pub spec: Value,
    #[serde(default)]
    pub options: JobOptions,
}

impl QueueItem {
    pub fn new(job_id: impl Into<String>, priority: i64, spec: Value) -> Self {
        Self {
            priority,
            job_id: job_id.into(),
            spec,
            options: JobOptions::default(),
        }
    }

    pub fn with_workflow(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.options.workflow = WorkflowMeta {
            id: id.into(),
            name: name.into(),
        };
        self
    }

    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.options.client_id = Some(client_id.into());
        self
    }

    #[inline]
    pub fn workflow_name(&self) -> &str {
        &self.options.workflow.name
    }

    #[inline]
    pub fn workflow_id(&self) -> &str {
        &self.options.workflow.id
    }
}

/// A durable queue row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueEntry {
    /// Surrogate row id (used by archive/play).
    pub id: i64,
    pub job_id: String,
    pub priority: i64,
    pub name: Option<String>,
    pub workflow_id: Option<String>,
    pub item: QueueItem,
    pub status: JobStatus,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    pub updated_at: i64,
}

/// Status scope addressed by listing and bulk operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Queue,
    Archive,
    Completed,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Queue => "queue",
            Scope::Archive => "archive",
            Scope::Completed => "completed",
        }
    }
}

impl FromStr for Scope {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queue" => Ok(Scope::Queue),
            "archive" => Ok(Scope::Archive),
            "completed" => Ok(Scope::Completed),
            other => Err(QueueError::InvalidScope(other.to_string())),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Equality filter applied on top of a scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueFilter {
    pub workflow_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FilterValue {
    value: Value,
}

impl QueueFilter {
    pub fn workflow(id: impl Into<String>) -> Self {
        Self {
            workflow_id: Some(id.into()),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.workflow_id.is_none()
    }

    /// Parse the filter document `{"workflow": {"value": "...", "valueLabel": "..."}}`.
    /// Unknown keys are ignored.
    pub fn from_json(raw: &str) -> QueueResult<Self> {
        let doc: Map<String, Value> =
            serde_json::from_str(raw).map_err(|e| QueueError::InvalidFilter(e.to_string()))?;

        let mut filter = QueueFilter::default();
        if let Some(workflow) = doc.get("workflow") {
            let parsed: FilterValue = serde_json::from_value(workflow.clone())
                .map_err(|e| QueueError::InvalidFilter(format!("workflow: {}", e)))?;
            filter.workflow_id = Some(match parsed.value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        }
        Ok(filter)
    }
}

/// Page request for status-scoped listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub scope: Scope,
    /// Negative pages clamp to zero; pages past the end clamp to the last page.
    pub page: i64,
    pub page_size: u64,
    pub filter: QueueFilter,
}

impl PageRequest {
    pub fn new(scope: Scope, page: i64, page_size: u64) -> Self {
        Self {
            scope,
            page,
            page_size,
            filter: QueueFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: QueueFilter) -> Self {
        self.filter = filter;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub total: u64,
    pub page: i64,
    pub page_size: u64,
    pub last_page: i64,
}

/// One page of a scope, plus the jobs currently executing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueuePage {
    pub running: Vec<QueueItem>,
    pub pending: Vec<QueueEntry>,
    pub info: PageInfo,
}

/// Client that took over ownership of not-yet-started jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakeoverClient {
    pub client_id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Result of a bulk import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportOutcome {
    pub inserted: usize,
    pub submitted: usize,
}

impl ImportOutcome {
    /// Items skipped because their job id already existed.
    #[inline]
    pub fn skipped(&self) -> usize {
        self.submitted.saturating_sub(self.inserted)
    }
}

/// Outcome reported by the executor on completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Error { message: String },
    Interrupted,
}

/// Change notifications for observers (e.g. a UI).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QueueEvent {
    QueueUpdated,
    PlaybackToggled { paused: bool },
    ItemsMoved { total: usize },
    ItemsDeleted { deleted: usize },
    ItemsImported { total: usize },
    Executing { job_id: String, name: String },
    Completed { job_id: String, status: ExecutionStatus },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scope_parse() {
        assert_eq!("queue".parse::<Scope>().unwrap(), Scope::Queue);
        assert_eq!("archive".parse::<Scope>().unwrap(), Scope::Archive);
        assert_eq!("completed".parse::<Scope>().unwrap(), Scope::Completed);

        let err = "history".parse::<Scope>().unwrap_err();
        assert!(err.is_client_error());
        assert!(matches!(err, QueueError::InvalidScope(ref s) if s == "history"));
    }

    #[test]
    fn test_filter_from_json() {
        let filter =
            QueueFilter::from_json(r#"{"workflow": {"value": "wf-1", "valueLabel": "Portrait"}}"#)
                .unwrap();
        assert_eq!(filter.workflow_id.as_deref(), Some("wf-1"));

        // Unknown keys are ignored
        let filter = QueueFilter::from_json(r#"{"checkpoint": {"value": "x"}}"#).unwrap();
        assert!(filter.is_empty());
    }

    #[test]
    fn test_filter_rejects_bad_json() {
        let err = QueueFilter::from_json("{workflow").unwrap_err();
        assert!(matches!(err, QueueError::InvalidFilter(_)));
        assert!(err.is_client_error());

        let err = QueueFilter::from_json(r#"{"workflow": "wf-1"}"#).unwrap_err();
        assert!(matches!(err, QueueError::InvalidFilter(_)));
    }

    #[test]
    fn test_status_codes() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Finished,
            JobStatus::Archived,
        ] {
            assert_eq!(JobStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(JobStatus::from_code(-1), None);
    }

    #[test]
    fn test_item_options_keep_unknown_keys() {
        let raw = json!({
            "priority": 4,
            "job_id": "a",
            "spec": {"nodes": 3},
            "options": {
                "client_id": "c1",
                "workflow": {"id": "wf", "name": "Upscale"},
                "create_time": 1234
            }
        });
        let item: QueueItem = serde_json::from_value(raw).unwrap();
        assert_eq!(item.workflow_name(), "Upscale");
        assert_eq!(item.options.extra.get("create_time"), Some(&json!(1234)));

        let back = serde_json::to_value(&item).unwrap();
        assert_eq!(back["options"]["create_time"], json!(1234));
    }

    #[test]
    fn test_import_outcome_skipped() {
        let outcome = ImportOutcome {
            inserted: 2,
            submitted: 5,
        };
        assert_eq!(outcome.skipped(), 3);
    }
}
