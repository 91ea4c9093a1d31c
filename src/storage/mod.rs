//! Storage traits for samples, rules, alerts and notification tasks
//!
//! Abstracts the four collections the engine reads and writes so backends
//! can be swapped without touching pipeline code:
//! - `memory`: concurrent in-memory stores for tests and single-process runs
//!
//! Implementations must be thread-safe (Send + Sync) for shared access
//! across async tasks. Methods are synchronous; none of them may block on
//! I/O for longer than a map lookup.

pub mod memory;

pub use memory::{MemoryAlertStore, MemoryNotificationStore, MemoryRuleStore, MemorySampleStore};

use chrono::{DateTime, Utc};

use crate::types::{AlertRecord, AlertRule, NotificationStatus, NotificationTask, Sample};

/// Storage errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },
    #[error("{kind} '{id}' already exists")]
    Conflict { kind: &'static str, id: String },
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }
}

/// Telemetry history, append-only.
pub trait SampleStore: Send + Sync {
    fn append(&self, sample: Sample) -> Result<(), StoreError>;

    /// Samples for `device_id` with `from <= timestamp <= to`, oldest first.
    fn window(
        &self,
        device_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Sample>, StoreError>;

    /// Every device that has reported at least one sample.
    fn devices(&self) -> Result<Vec<String>, StoreError>;
}

/// Operator-maintained rule set. Read-only to the engine apart from reloads.
pub trait RuleStore: Send + Sync {
    /// Active rules scoped to `device_id` plus active global rules.
    fn applicable(&self, device_id: &str) -> Result<Vec<AlertRule>, StoreError>;

    /// Atomically replace the whole rule set.
    fn replace_all(&self, rules: Vec<AlertRule>) -> Result<(), StoreError>;
}

pub trait AlertStore: Send + Sync {
    fn insert(&self, record: AlertRecord) -> Result<(), StoreError>;

    fn get(&self, alert_id: &str) -> Result<AlertRecord, StoreError>;

    /// Overwrite an existing record.
    fn update(&self, record: AlertRecord) -> Result<(), StoreError>;

    /// Alerts for one `(device, rule)` pair raised at or after `since`, newest first.
    fn recent_for(
        &self,
        device_id: &str,
        rule_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<AlertRecord>, StoreError>;

    /// Open alerts (ACTIVE or ACKNOWLEDGED), newest first.
    fn open(&self, device_id: Option<&str>) -> Result<Vec<AlertRecord>, StoreError>;

    /// Every alert raised at or after `since`.
    fn since(&self, since: DateTime<Utc>) -> Result<Vec<AlertRecord>, StoreError>;

    /// Delete closed alerts raised before `cutoff`; returns how many went.
    fn purge_closed_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;
}

pub trait NotificationStore: Send + Sync {
    fn insert(&self, task: NotificationTask) -> Result<(), StoreError>;

    fn get(&self, task_id: &str) -> Result<NotificationTask, StoreError>;

    fn update(&self, task: NotificationTask) -> Result<(), StoreError>;

    /// Move a task from `expected` to `next` only if it is still in `expected`.
    /// Returns whether this caller won the transition.
    fn compare_and_set_status(
        &self,
        task_id: &str,
        expected: NotificationStatus,
        next: NotificationStatus,
    ) -> Result<bool, StoreError>;

    /// FAILED tasks with attempts left whose retry time has come.
    fn due_for_retry(
        &self,
        now: DateTime<Utc>,
        max_attempts: u32,
    ) -> Result<Vec<NotificationTask>, StoreError>;

    fn for_alert(&self, alert_id: &str) -> Result<Vec<NotificationTask>, StoreError>;
}
