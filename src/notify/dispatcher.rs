//! Notification Dispatcher
//!
//! Fans an alert out into one [`NotificationTask`] per (channel, recipient),
//! delivers each task on its own tokio task, and re-attempts failures from a
//! periodic sweep.
//!
//! ## Task lifecycle
//!
//! ```text
//! PENDING ─► SENDING ─► SUCCESS
//!               │
//!               └─► FAILED ─(sweep, attempts left)─► RETRY ─► SENDING ─► ...
//! ```
//!
//! Every move out of PENDING, FAILED or RETRY is a compare-and-set on the
//! stored status, so a task claimed by one sweep is invisible to an
//! overlapping one. A FAILED task whose `retry_count` has reached
//! `max_attempts` is terminal.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use super::transport::{Message, NotificationTransport};
use crate::config::defaults::SYSTEM_RECIPIENT;
use crate::config::NotificationConfig;
use crate::storage::{NotificationStore, StoreError};
use crate::types::{
    AlertLevel, AlertRecord, Channel, NotificationMethod, NotificationStatus, NotificationTask,
};

#[derive(Clone)]
pub struct NotificationDispatcher {
    config: Arc<NotificationConfig>,
    store: Arc<dyn NotificationStore>,
    transport: Arc<dyn NotificationTransport>,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("transport", &self.transport.transport_name())
            .field("max_attempts", &self.config.max_attempts)
            .finish_non_exhaustive()
    }
}

impl NotificationDispatcher {
    pub fn new(
        config: NotificationConfig,
        store: Arc<dyn NotificationStore>,
        transport: Arc<dyn NotificationTransport>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            transport,
        }
    }

    /// Recipients of `channel` for an alert of `level`, each address once
    /// in first-seen order.
    pub fn recipients(&self, channel: Channel, level: AlertLevel) -> Vec<String> {
        let mut recipients = self.routed(channel, level);
        let mut seen = HashSet::with_capacity(recipients.len());
        recipients.retain(|r| seen.insert(r.clone()));
        recipients
    }

    fn routed(&self, channel: Channel, level: AlertLevel) -> Vec<String> {
        match (channel, level) {
            (Channel::Email, AlertLevel::Critical) => self
                .config
                .admin_emails
                .iter()
                .chain(&self.config.maintenance_emails)
                .cloned()
                .collect(),
            (Channel::Email, AlertLevel::Warning) => self.config.maintenance_emails.clone(),
            (Channel::Email, AlertLevel::Info) => self.config.monitoring_emails.clone(),
            (Channel::Sms, AlertLevel::Critical | AlertLevel::Warning) => {
                self.config.on_call_phones.clone()
            }
            (Channel::Sms, AlertLevel::Info) => Vec::new(),
            (Channel::Websocket | Channel::System, _) => vec![SYSTEM_RECIPIENT.to_string()],
        }
    }

    /// Build and store the tasks for an alert without delivering them.
    ///
    /// A channel with nobody to notify gets one SKIPPED task so the gap is
    /// visible in the task history.
    pub fn enqueue(
        &self,
        alert: &AlertRecord,
        methods: &[NotificationMethod],
    ) -> Result<Vec<NotificationTask>, StoreError> {
        let now = Utc::now();
        let mut tasks = Vec::new();

        for channel in Channel::from_methods(methods) {
            let recipients = self.recipients(channel, alert.level);
            if recipients.is_empty() {
                debug!(alert_id = %alert.alert_id, channel = %channel, "No recipients configured");
                let mut task = new_task(alert, channel, String::new(), now);
                task.status = NotificationStatus::Skipped;
                task.error_message = Some(format!("no {channel} recipients for {} alerts", alert.level));
                tasks.push(task);
                continue;
            }
            tasks.extend(
                recipients
                    .into_iter()
                    .map(|recipient| new_task(alert, channel, recipient, now)),
            );
        }

        for task in &tasks {
            self.store.insert(task.clone())?;
        }
        Ok(tasks)
    }

    /// Enqueue the alert's tasks and deliver each on its own tokio task.
    ///
    /// Returns once the tasks are stored; delivery outcomes are only
    /// observable through task status. Must be called inside a runtime.
    pub fn dispatch(
        &self,
        alert: &AlertRecord,
        methods: &[NotificationMethod],
    ) -> Result<Vec<String>, StoreError> {
        let tasks = self.enqueue(alert, methods)?;
        let mut ids = Vec::with_capacity(tasks.len());

        for task in tasks {
            if task.status == NotificationStatus::Pending {
                let this = self.clone();
                let task_id = task.task_id.clone();
                tokio::spawn(async move {
                    if let Err(e) = this.deliver(&task_id).await {
                        error!(task_id = %task_id, error = %e, "Notification store failed during delivery");
                    }
                });
            }
            ids.push(task.task_id);
        }

        info!(alert_id = %alert.alert_id, tasks = ids.len(), "Alert dispatched");
        Ok(ids)
    }

    /// Attempt one delivery of a PENDING or RETRY task now.
    pub async fn deliver(&self, task_id: &str) -> Result<NotificationStatus, StoreError> {
        self.attempt(task_id, Utc::now()).await
    }

    /// Re-attempt every due FAILED task. Returns how many this sweep claimed.
    pub async fn retry_due(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let due = self.store.due_for_retry(now, self.config.max_attempts)?;

        let mut claimed = Vec::with_capacity(due.len());
        for task in due {
            if self.store.compare_and_set_status(
                &task.task_id,
                NotificationStatus::Failed,
                NotificationStatus::Retry,
            )? {
                claimed.push(task.task_id);
            }
        }

        let outcomes = join_all(claimed.iter().map(|id| self.attempt(id, now))).await;
        for (id, outcome) in claimed.iter().zip(&outcomes) {
            if let Err(e) = outcome {
                error!(task_id = %id, error = %e, "Retry attempt could not be recorded");
            }
        }

        if !claimed.is_empty() {
            info!(claimed = claimed.len(), "Notification retry sweep");
        }
        Ok(claimed.len())
    }

    async fn attempt(&self, task_id: &str, now: DateTime<Utc>) -> Result<NotificationStatus, StoreError> {
        let task = self.store.get(task_id)?;
        let from = task.status;
        if !matches!(from, NotificationStatus::Pending | NotificationStatus::Retry)
            || !self
                .store
                .compare_and_set_status(task_id, from, NotificationStatus::Sending)?
        {
            debug!(task_id = %task_id, status = %from, "Task not claimable, skipping");
            return Ok(self.store.get(task_id)?.status);
        }

        let outcome = self
            .transport
            .send(Message {
                channel: task.channel,
                recipient: &task.recipient,
                subject: &task.subject,
                body: &task.body,
            })
            .await;

        let mut task = NotificationTask {
            status: NotificationStatus::Sending,
            ..task
        };
        if from == NotificationStatus::Retry {
            task.last_retry_time = Some(now);
        }

        match outcome {
            Ok(()) => {
                task.status = NotificationStatus::Success;
                task.sent_at = Some(now);
                task.next_retry_time = None;
                task.error_message = None;
            }
            Err(e) => {
                task.retry_count += 1;
                task.status = NotificationStatus::Failed;
                task.error_message = Some(e.to_string());
                if task.retry_count < self.config.max_attempts {
                    task.next_retry_time =
                        Some(now + Duration::minutes(self.config.retry_backoff_minutes));
                    warn!(
                        task_id = %task.task_id,
                        channel = %task.channel,
                        attempt = task.retry_count,
                        error = %e,
                        "Notification delivery failed, will retry"
                    );
                } else {
                    task.next_retry_time = None;
                    warn!(
                        task_id = %task.task_id,
                        channel = %task.channel,
                        attempts = task.retry_count,
                        error = %e,
                        "Notification delivery failed permanently"
                    );
                }
            }
        }

        let status = task.status;
        self.store.update(task)?;
        Ok(status)
    }
}

fn new_task(alert: &AlertRecord, channel: Channel, recipient: String, now: DateTime<Utc>) -> NotificationTask {
    NotificationTask {
        task_id: format!("NOTIFY_{}", short_id(now)),
        alert_id: alert.alert_id.clone(),
        channel,
        recipient,
        subject: alert.title.clone(),
        body: alert.body.clone(),
        status: NotificationStatus::Pending,
        retry_count: 0,
        next_retry_time: None,
        last_retry_time: None,
        sent_at: None,
        error_message: None,
        created_at: now,
    }
}

/// `<epoch millis>_<8 hex chars>`
pub(crate) fn short_id(now: DateTime<Utc>) -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", now.timestamp_millis(), &uuid[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::transport::{LogTransport, TransportError};
    use crate::storage::MemoryNotificationStore;
    use crate::types::AlertStatus;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` sends, then succeeds.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl NotificationTransport for Flaky {
        async fn send(&self, _message: Message<'_>) -> Result<(), TransportError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(TransportError::Unavailable("smtp down".to_string()))
            } else {
                Ok(())
            }
        }

        fn transport_name(&self) -> &str {
            "flaky"
        }
    }

    fn config() -> NotificationConfig {
        NotificationConfig {
            admin_emails: vec!["admin@example.com".to_string()],
            maintenance_emails: vec!["maint@example.com".to_string()],
            monitoring_emails: Vec::new(),
            on_call_phones: vec!["+100000".to_string()],
            ..NotificationConfig::default()
        }
    }

    fn alert(level: AlertLevel) -> AlertRecord {
        AlertRecord {
            alert_id: "ALERT_1".to_string(),
            rule_id: "R1".to_string(),
            rule_name: "rule".to_string(),
            device_id: "P-001".to_string(),
            level,
            title: "[WARNING] P-001 rule".to_string(),
            body: "body".to_string(),
            triggered_value: None,
            threshold_value: None,
            confidence: 0.9,
            alert_time: Utc::now(),
            status: AlertStatus::Active,
            acknowledgement: None,
            resolution: None,
        }
    }

    fn dispatcher(transport: Arc<dyn NotificationTransport>) -> (NotificationDispatcher, Arc<MemoryNotificationStore>) {
        let store = Arc::new(MemoryNotificationStore::new());
        (NotificationDispatcher::new(config(), store.clone(), transport), store)
    }

    #[test]
    fn test_recipients_by_level() {
        let (d, _) = dispatcher(Arc::new(LogTransport));
        assert_eq!(d.recipients(Channel::Email, AlertLevel::Critical).len(), 2);
        assert_eq!(d.recipients(Channel::Email, AlertLevel::Warning), vec!["maint@example.com"]);
        assert!(d.recipients(Channel::Sms, AlertLevel::Info).is_empty());
        assert_eq!(d.recipients(Channel::Websocket, AlertLevel::Info), vec!["SYSTEM"]);
    }

    #[test]
    fn test_shared_address_gets_one_task() {
        let shared = NotificationConfig {
            admin_emails: vec!["ops@example.com".to_string(), "ops@example.com".to_string()],
            maintenance_emails: vec!["ops@example.com".to_string(), "maint@example.com".to_string()],
            ..config()
        };
        let store = Arc::new(MemoryNotificationStore::new());
        let d = NotificationDispatcher::new(shared, store.clone(), Arc::new(LogTransport));

        let tasks = d
            .enqueue(&alert(AlertLevel::Critical), &[NotificationMethod::Email])
            .unwrap();
        let recipients: Vec<&str> = tasks.iter().map(|t| t.recipient.as_str()).collect();
        assert_eq!(recipients, vec!["ops@example.com", "maint@example.com"]);
        assert_eq!(store.for_alert("ALERT_1").unwrap().len(), 2);
    }

    #[test]
    fn test_enqueue_fans_out_and_marks_gaps() {
        let (d, store) = dispatcher(Arc::new(LogTransport));
        let tasks = d
            .enqueue(&alert(AlertLevel::Info), &[NotificationMethod::All])
            .unwrap();
        // email → nobody, sms → nobody, websocket → SYSTEM
        assert_eq!(tasks.len(), 3);
        let skipped = tasks.iter().filter(|t| t.status == NotificationStatus::Skipped).count();
        assert_eq!(skipped, 2);
        assert_eq!(store.all().len(), 3);

        let system = d.enqueue(&alert(AlertLevel::Critical), &[]).unwrap();
        assert_eq!(system.len(), 1);
        assert_eq!(system[0].channel, Channel::System);
    }

    #[tokio::test]
    async fn test_success_is_final() {
        let (d, _) = dispatcher(Arc::new(LogTransport));
        let tasks = d.enqueue(&alert(AlertLevel::Warning), &[NotificationMethod::Email]).unwrap();
        let id = &tasks[0].task_id;
        assert_eq!(d.deliver(id).await.unwrap(), NotificationStatus::Success);
        // a second attempt is a no-op
        assert_eq!(d.deliver(id).await.unwrap(), NotificationStatus::Success);
    }

    #[tokio::test]
    async fn test_retry_recovers_after_failure() {
        let flaky = Arc::new(Flaky { failures: 1, calls: AtomicU32::new(0) });
        let (d, store) = dispatcher(flaky.clone());
        let tasks = d.enqueue(&alert(AlertLevel::Warning), &[NotificationMethod::Email]).unwrap();
        let id = tasks[0].task_id.clone();

        assert_eq!(d.deliver(&id).await.unwrap(), NotificationStatus::Failed);
        let failed = store.get(&id).unwrap();
        assert_eq!(failed.retry_count, 1);
        let next = failed.next_retry_time.expect("retry scheduled");

        // not due yet
        assert_eq!(d.retry_due(next - Duration::seconds(1)).await.unwrap(), 0);
        assert_eq!(d.retry_due(next).await.unwrap(), 1);

        let done = store.get(&id).unwrap();
        assert_eq!(done.status, NotificationStatus::Success);
        assert_eq!(done.last_retry_time, Some(next));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    }
}
