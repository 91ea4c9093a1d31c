//! In-memory stores
//!
//! Sharded `DashMap`s for per-key records and an `ArcSwap` snapshot for the
//! rule set, so readers never block behind a rule reload. Not durable; data
//! is lost on restart.

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{AlertStore, NotificationStore, RuleStore, SampleStore, StoreError};
use crate::types::{AlertRecord, AlertRule, NotificationStatus, NotificationTask, Sample};

// ============================================================================
// Samples
// ============================================================================

/// Per-device sample history kept in timestamp order.
#[derive(Debug, Default)]
pub struct MemorySampleStore {
    by_device: DashMap<String, Vec<Sample>>,
}

impl MemorySampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&self, samples: impl IntoIterator<Item = Sample>) -> Result<(), StoreError> {
        for sample in samples {
            self.append(sample)?;
        }
        Ok(())
    }
}

impl SampleStore for MemorySampleStore {
    fn append(&self, sample: Sample) -> Result<(), StoreError> {
        let mut series = self.by_device.entry(sample.device_id.clone()).or_default();
        // usually a push; late samples are slotted in place
        let at = series.partition_point(|s| s.timestamp <= sample.timestamp);
        series.insert(at, sample);
        Ok(())
    }

    fn window(
        &self,
        device_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Sample>, StoreError> {
        let Some(series) = self.by_device.get(device_id) else {
            return Ok(Vec::new());
        };
        let start = series.partition_point(|s| s.timestamp < from);
        let end = series.partition_point(|s| s.timestamp <= to);
        Ok(series.get(start..end).map(<[Sample]>::to_vec).unwrap_or_default())
    }

    fn devices(&self) -> Result<Vec<String>, StoreError> {
        let mut devices: Vec<String> = self.by_device.iter().map(|e| e.key().clone()).collect();
        devices.sort();
        Ok(devices)
    }
}

// ============================================================================
// Rules
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryRuleStore {
    rules: ArcSwap<Vec<AlertRule>>,
}

impl MemoryRuleStore {
    pub fn new(rules: Vec<AlertRule>) -> Self {
        Self {
            rules: ArcSwap::from_pointee(rules),
        }
    }

    /// Current snapshot of every rule, active or not.
    pub fn snapshot(&self) -> Arc<Vec<AlertRule>> {
        self.rules.load_full()
    }
}

impl RuleStore for MemoryRuleStore {
    fn applicable(&self, device_id: &str) -> Result<Vec<AlertRule>, StoreError> {
        Ok(self
            .rules
            .load()
            .iter()
            .filter(|r| r.applies_to(device_id))
            .cloned()
            .collect())
    }

    fn replace_all(&self, rules: Vec<AlertRule>) -> Result<(), StoreError> {
        tracing::info!(rules = rules.len(), "Rule set replaced");
        self.rules.store(Arc::new(rules));
        Ok(())
    }
}

// ============================================================================
// Alerts
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryAlertStore {
    alerts: DashMap<String, AlertRecord>,
}

impl MemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    fn collect_newest_first(&self, keep: impl Fn(&AlertRecord) -> bool) -> Vec<AlertRecord> {
        let mut out: Vec<AlertRecord> = self
            .alerts
            .iter()
            .filter(|e| keep(e.value()))
            .map(|e| e.value().clone())
            .collect();
        out.sort_by(|a, b| b.alert_time.cmp(&a.alert_time));
        out
    }
}

impl AlertStore for MemoryAlertStore {
    fn insert(&self, record: AlertRecord) -> Result<(), StoreError> {
        match self.alerts.entry(record.alert_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict {
                kind: "alert",
                id: record.alert_id,
            }),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    fn get(&self, alert_id: &str) -> Result<AlertRecord, StoreError> {
        self.alerts
            .get(alert_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| StoreError::not_found("alert", alert_id))
    }

    fn update(&self, record: AlertRecord) -> Result<(), StoreError> {
        let mut slot = self
            .alerts
            .get_mut(&record.alert_id)
            .ok_or_else(|| StoreError::not_found("alert", record.alert_id.clone()))?;
        *slot = record;
        Ok(())
    }

    fn recent_for(
        &self,
        device_id: &str,
        rule_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<AlertRecord>, StoreError> {
        Ok(self.collect_newest_first(|a| {
            a.device_id == device_id && a.rule_id == rule_id && a.alert_time >= since
        }))
    }

    fn open(&self, device_id: Option<&str>) -> Result<Vec<AlertRecord>, StoreError> {
        Ok(self.collect_newest_first(|a| {
            a.status.is_open() && device_id.map_or(true, |d| a.device_id == d)
        }))
    }

    fn since(&self, since: DateTime<Utc>) -> Result<Vec<AlertRecord>, StoreError> {
        Ok(self.collect_newest_first(|a| a.alert_time >= since))
    }

    fn purge_closed_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let before = self.alerts.len();
        self.alerts
            .retain(|_, a| a.status.is_open() || a.alert_time >= cutoff);
        Ok(before.saturating_sub(self.alerts.len()))
    }
}

// ============================================================================
// Notification tasks
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryNotificationStore {
    tasks: DashMap<String, NotificationTask>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<NotificationTask> {
        let mut out: Vec<NotificationTask> = self.tasks.iter().map(|e| e.value().clone()).collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.task_id.cmp(&b.task_id)));
        out
    }
}

impl NotificationStore for MemoryNotificationStore {
    fn insert(&self, task: NotificationTask) -> Result<(), StoreError> {
        match self.tasks.entry(task.task_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict {
                kind: "notification task",
                id: task.task_id,
            }),
            Entry::Vacant(slot) => {
                slot.insert(task);
                Ok(())
            }
        }
    }

    fn get(&self, task_id: &str) -> Result<NotificationTask, StoreError> {
        self.tasks
            .get(task_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| StoreError::not_found("notification task", task_id))
    }

    fn update(&self, task: NotificationTask) -> Result<(), StoreError> {
        let mut slot = self
            .tasks
            .get_mut(&task.task_id)
            .ok_or_else(|| StoreError::not_found("notification task", task.task_id.clone()))?;
        *slot = task;
        Ok(())
    }

    fn compare_and_set_status(
        &self,
        task_id: &str,
        expected: NotificationStatus,
        next: NotificationStatus,
    ) -> Result<bool, StoreError> {
        // the shard write lock makes check-and-set atomic
        let mut slot = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| StoreError::not_found("notification task", task_id))?;
        if slot.status != expected {
            return Ok(false);
        }
        slot.status = next;
        Ok(true)
    }

    fn due_for_retry(
        &self,
        now: DateTime<Utc>,
        max_attempts: u32,
    ) -> Result<Vec<NotificationTask>, StoreError> {
        let mut due: Vec<NotificationTask> = self
            .tasks
            .iter()
            .filter(|e| e.value().is_due(now, max_attempts))
            .map(|e| e.value().clone())
            .collect();
        due.sort_by(|a, b| a.next_retry_time.cmp(&b.next_retry_time));
        Ok(due)
    }

    fn for_alert(&self, alert_id: &str) -> Result<Vec<NotificationTask>, StoreError> {
        Ok(self
            .all()
            .into_iter()
            .filter(|t| t.alert_id == alert_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlertLevel, AlertStatus, Channel, RuleType};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn alert(id: &str, minutes_ago: i64, status: AlertStatus) -> AlertRecord {
        AlertRecord {
            alert_id: id.to_string(),
            rule_id: "R1".to_string(),
            rule_name: "test".to_string(),
            device_id: "P-001".to_string(),
            level: AlertLevel::Warning,
            title: String::new(),
            body: String::new(),
            triggered_value: Some(1.0),
            threshold_value: None,
            confidence: 0.9,
            alert_time: t0() - Duration::minutes(minutes_ago),
            status,
            acknowledgement: None,
            resolution: None,
        }
    }

    fn task(id: &str, status: NotificationStatus) -> NotificationTask {
        NotificationTask {
            task_id: id.to_string(),
            alert_id: "A1".to_string(),
            channel: Channel::Email,
            recipient: "ops@example.com".to_string(),
            subject: String::new(),
            body: String::new(),
            status,
            retry_count: 1,
            next_retry_time: Some(t0()),
            last_retry_time: None,
            sent_at: None,
            error_message: None,
            created_at: t0(),
        }
    }

    #[test]
    fn test_sample_window_is_ordered_and_inclusive() {
        let store = MemorySampleStore::new();
        for minutes in [20, 0, 10, 30] {
            store
                .append(Sample::new("P-001", t0() + Duration::minutes(minutes)))
                .unwrap();
        }
        store.append(Sample::new("P-002", t0())).unwrap();

        let window = store
            .window("P-001", t0() + Duration::minutes(10), t0() + Duration::minutes(30))
            .unwrap();
        let offsets: Vec<i64> = window.iter().map(|s| (s.timestamp - t0()).num_minutes()).collect();
        assert_eq!(offsets, vec![10, 20, 30]);
        assert!(store.window("P-404", t0(), t0()).unwrap().is_empty());
        assert_eq!(store.devices().unwrap(), vec!["P-001", "P-002"]);
    }

    #[test]
    fn test_rule_store_scopes_and_swaps() {
        let global = AlertRule::new("R1", "global", RuleType::HealthScore, AlertLevel::Warning);
        let scoped = AlertRule {
            device_id: Some("P-002".to_string()),
            ..AlertRule::new("R2", "scoped", RuleType::Threshold, AlertLevel::Critical)
        };
        let store = MemoryRuleStore::new(vec![global, scoped]);
        assert_eq!(store.applicable("P-001").unwrap().len(), 1);
        assert_eq!(store.applicable("P-002").unwrap().len(), 2);

        store.replace_all(Vec::new()).unwrap();
        assert!(store.applicable("P-002").unwrap().is_empty());
    }

    #[test]
    fn test_alert_insert_conflict_and_purge() {
        let store = MemoryAlertStore::new();
        store.insert(alert("A1", 0, AlertStatus::Active)).unwrap();
        assert!(matches!(
            store.insert(alert("A1", 0, AlertStatus::Active)),
            Err(StoreError::Conflict { .. })
        ));
        store.insert(alert("A2", 200, AlertStatus::Resolved)).unwrap();
        store.insert(alert("A3", 300, AlertStatus::Acknowledged)).unwrap();

        let recent = store.recent_for("P-001", "R1", t0() - Duration::minutes(250)).unwrap();
        assert_eq!(recent.iter().map(|a| a.alert_id.as_str()).collect::<Vec<_>>(), vec!["A1", "A2"]);
        assert_eq!(store.open(Some("P-001")).unwrap().len(), 2);

        // only the closed, old alert goes
        assert_eq!(store.purge_closed_before(t0() - Duration::minutes(100)).unwrap(), 1);
        assert!(matches!(store.get("A2"), Err(StoreError::NotFound { .. })));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_compare_and_set_has_one_winner() {
        let store = MemoryNotificationStore::new();
        store.insert(task("T1", NotificationStatus::Failed)).unwrap();

        assert!(store
            .compare_and_set_status("T1", NotificationStatus::Failed, NotificationStatus::Retry)
            .unwrap());
        assert!(!store
            .compare_and_set_status("T1", NotificationStatus::Failed, NotificationStatus::Retry)
            .unwrap());
        assert_eq!(store.get("T1").unwrap().status, NotificationStatus::Retry);
    }

    #[test]
    fn test_due_for_retry_respects_attempts_and_time() {
        let store = MemoryNotificationStore::new();
        store.insert(task("T1", NotificationStatus::Failed)).unwrap();
        store
            .insert(NotificationTask { retry_count: 3, ..task("T2", NotificationStatus::Failed) })
            .unwrap();
        store
            .insert(NotificationTask {
                next_retry_time: Some(t0() + Duration::minutes(5)),
                ..task("T3", NotificationStatus::Failed)
            })
            .unwrap();
        store.insert(task("T4", NotificationStatus::Success)).unwrap();

        let due = store.due_for_retry(t0(), 3).unwrap();
        assert_eq!(due.iter().map(|t| t.task_id.as_str()).collect::<Vec<_>>(), vec!["T1"]);
    }
}
