//! Alert Manager
//!
//! Turns triggered rule evaluations into [`AlertRecord`]s and owns their
//! lifecycle.
//!
//! ## Admission
//!
//! For each triggered evaluation of `(device, rule)`:
//!
//! 1. the trigger is appended to that pair's trigger log
//! 2. **suppression**: any alert within `suppression_minutes` blocks
//! 3. **duplicate**: an alert in the duplicate window whose triggered value
//!    is within the relative tolerance of the current one blocks
//! 4. **consecutive**: the log must hold `consecutive_trigger_count`
//!    triggers inside `check_interval_minutes × consecutive_trigger_count`
//!
//! Only then is an ACTIVE record stored, the log cleared and the record
//! handed to the dispatcher. A non-triggered evaluation clears the log.
//!
//! All four steps run under one async mutex per `(device, rule)`, so two
//! concurrent evaluations of the same pair cannot both pass the
//! read-then-write checks.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::context::MetricContext;
use super::rules::RuleEngine;
use crate::config::defaults::EQUALITY_EPSILON;
use crate::config::AlertingConfig;
use crate::notify::dispatcher::short_id;
use crate::notify::NotificationDispatcher;
use crate::storage::{AlertStore, RuleStore, StoreError};
use crate::types::{
    AlertRecord, AlertRule, AlertStatistics, AlertStatus, EvaluationResult, StatusChange,
};

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("alert '{0}' not found")]
    NotFound(String),

    #[error("alert '{id}' cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: AlertStatus,
        to: AlertStatus,
    },

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AlertError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { id, .. } => AlertError::NotFound(id),
            other => AlertError::Store(other),
        }
    }
}

/// Why a triggered evaluation did not become an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Created,
    Suppressed,
    Duplicate,
    AwaitingConsecutive { seen: usize, required: u32 },
}

/// Recent trigger times for one `(device, rule)` pair.
#[derive(Debug, Default)]
struct TriggerLog {
    triggers: VecDeque<DateTime<Utc>>,
}

impl TriggerLog {
    fn record(&mut self, at: DateTime<Utc>, window: Duration) {
        self.triggers.push_back(at);
        let oldest = at - window;
        while self.triggers.front().is_some_and(|t| *t < oldest) {
            self.triggers.pop_front();
        }
    }

    fn clear(&mut self) {
        self.triggers.clear();
    }

    fn len(&self) -> usize {
        self.triggers.len()
    }
}

type PairKey = (String, String);

pub struct AlertManager {
    config: AlertingConfig,
    engine: RuleEngine,
    rules: Arc<dyn RuleStore>,
    alerts: Arc<dyn AlertStore>,
    dispatcher: Option<NotificationDispatcher>,
    pairs: DashMap<PairKey, Arc<Mutex<TriggerLog>>>,
}

impl AlertManager {
    pub fn new(
        config: AlertingConfig,
        rules: Arc<dyn RuleStore>,
        alerts: Arc<dyn AlertStore>,
    ) -> Self {
        Self {
            config,
            engine: RuleEngine::new(),
            rules,
            alerts,
            dispatcher: None,
            pairs: DashMap::new(),
        }
    }

    /// Hand every created alert to `dispatcher`.
    pub fn with_dispatcher(mut self, dispatcher: NotificationDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Evaluate every applicable rule against `ctx` and admit the triggered
    /// ones. Returns the alerts created.
    ///
    /// A store failure on one rule is logged and does not stop the others;
    /// only failing to list the rules is an error.
    pub async fn process(&self, ctx: &MetricContext) -> Result<Vec<AlertRecord>, AlertError> {
        let rules = self.rules.applicable(&ctx.device_id)?;
        let mut created = Vec::new();

        for rule in &rules {
            let result = self.engine.evaluate(rule, ctx);
            match self.admit(rule, &result, ctx).await {
                Ok(Some(record)) => created.push(record),
                Ok(None) => {}
                Err(e) => error!(
                    device_id = %ctx.device_id,
                    rule_id = %rule.rule_id,
                    error = %e,
                    "Alert admission failed"
                ),
            }
        }

        debug!(
            device_id = %ctx.device_id,
            rules = rules.len(),
            created = created.len(),
            "Rules processed"
        );
        Ok(created)
    }

    /// Run the admission checks for one evaluation.
    pub async fn admit(
        &self,
        rule: &AlertRule,
        result: &EvaluationResult,
        ctx: &MetricContext,
    ) -> Result<Option<AlertRecord>, AlertError> {
        if rule.consecutive_trigger_count > 1 && rule.check_interval_minutes == 0 {
            warn!(
                rule_id = %rule.rule_id,
                consecutive = rule.consecutive_trigger_count,
                "Rule misconfigured: consecutive triggers need a non-zero check interval, skipping"
            );
            return Ok(None);
        }

        let lock = self.pair(&ctx.device_id, &rule.rule_id);
        let mut log = lock.lock().await;

        if !result.triggered {
            log.clear();
            return Ok(None);
        }

        let now = ctx.evaluated_at;
        let required = rule.consecutive_trigger_count.max(1);
        let window = Duration::minutes(i64::from(rule.check_interval_minutes) * i64::from(required));
        log.record(now, window);

        let admission = self.check(rule, result, ctx, log.len())?;
        if admission != Admission::Created {
            debug!(
                device_id = %ctx.device_id,
                rule_id = %rule.rule_id,
                admission = ?admission,
                "Triggered rule not admitted"
            );
            return Ok(None);
        }

        let record = build_record(rule, result, ctx);
        self.alerts.insert(record.clone())?;
        log.clear();
        drop(log);

        info!(
            alert_id = %record.alert_id,
            device_id = %record.device_id,
            rule_id = %record.rule_id,
            level = %record.level,
            "Alert raised"
        );

        if let Some(dispatcher) = &self.dispatcher {
            if let Err(e) = dispatcher.dispatch(&record, &rule.notification_methods) {
                error!(alert_id = %record.alert_id, error = %e, "Failed to enqueue notifications");
            }
        }
        Ok(Some(record))
    }

    fn check(
        &self,
        rule: &AlertRule,
        result: &EvaluationResult,
        ctx: &MetricContext,
        triggers: usize,
    ) -> Result<Admission, AlertError> {
        let now = ctx.evaluated_at;

        if rule.suppression_minutes > 0 {
            let since = now - Duration::minutes(i64::from(rule.suppression_minutes));
            if !self.alerts.recent_for(&ctx.device_id, &rule.rule_id, since)?.is_empty() {
                return Ok(Admission::Suppressed);
            }
        }

        if let Some(value) = result.triggered_value {
            let since = now - Duration::minutes(self.config.duplicate_window_minutes);
            let duplicate = self
                .alerts
                .recent_for(&ctx.device_id, &rule.rule_id, since)?
                .iter()
                .filter_map(|a| a.triggered_value)
                .any(|prev| within_tolerance(prev, value, self.config.duplicate_tolerance));
            if duplicate {
                return Ok(Admission::Duplicate);
            }
        }

        let required = rule.consecutive_trigger_count;
        if required > 1 && triggers < required as usize {
            return Ok(Admission::AwaitingConsecutive {
                seen: triggers,
                required,
            });
        }

        Ok(Admission::Created)
    }

    fn pair(&self, device_id: &str, rule_id: &str) -> Arc<Mutex<TriggerLog>> {
        let key = (device_id.to_string(), rule_id.to_string());
        Arc::clone(&self.pairs.entry(key).or_default())
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    pub async fn acknowledge(
        &self,
        alert_id: &str,
        by: &str,
        note: Option<String>,
    ) -> Result<AlertRecord, AlertError> {
        self.transition(alert_id, AlertStatus::Acknowledged, by, note).await
    }

    pub async fn resolve(
        &self,
        alert_id: &str,
        by: &str,
        note: Option<String>,
    ) -> Result<AlertRecord, AlertError> {
        self.transition(alert_id, AlertStatus::Resolved, by, note).await
    }

    /// Close as a false positive; the pair's trigger streak starts over.
    pub async fn mark_false_positive(
        &self,
        alert_id: &str,
        by: &str,
        note: Option<String>,
    ) -> Result<AlertRecord, AlertError> {
        self.transition(alert_id, AlertStatus::FalsePositive, by, note).await
    }

    async fn transition(
        &self,
        alert_id: &str,
        to: AlertStatus,
        by: &str,
        note: Option<String>,
    ) -> Result<AlertRecord, AlertError> {
        let current = self.alerts.get(alert_id)?;
        let lock = self.pair(&current.device_id, &current.rule_id);
        let mut log = lock.lock().await;

        // re-read under the pair lock
        let mut record = self.alerts.get(alert_id)?;
        if !record.status.can_transition_to(to) {
            warn!(alert_id = %alert_id, from = %record.status, to = %to, "Rejected alert transition");
            return Err(AlertError::InvalidTransition {
                id: alert_id.to_string(),
                from: record.status,
                to,
            });
        }

        let change = StatusChange {
            by: by.to_string(),
            at: Utc::now(),
            note,
        };
        match to {
            AlertStatus::Acknowledged => record.acknowledgement = Some(change),
            _ => record.resolution = Some(change),
        }
        record.status = to;
        self.alerts.update(record.clone())?;

        if to == AlertStatus::FalsePositive {
            log.clear();
        }

        info!(alert_id = %alert_id, status = %to, by = %by, "Alert status changed");
        Ok(record)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn active_alerts(&self, device_id: Option<&str>) -> Result<Vec<AlertRecord>, AlertError> {
        Ok(self.alerts.open(device_id)?)
    }

    pub fn statistics(&self, since: DateTime<Utc>) -> Result<AlertStatistics, AlertError> {
        let mut stats = AlertStatistics::default();
        for alert in self.alerts.since(since)? {
            stats.total += 1;
            *stats.by_status.entry(alert.status).or_default() += 1;
            *stats.by_level.entry(alert.level).or_default() += 1;
        }
        Ok(stats)
    }

    /// Delete closed alerts older than the retention window.
    pub fn purge(&self, now: DateTime<Utc>) -> Result<usize, AlertError> {
        let cutoff = now - Duration::days(self.config.retention_days);
        let removed = self.alerts.purge_closed_before(cutoff)?;
        if removed > 0 {
            info!(removed, retention_days = self.config.retention_days, "Purged closed alerts");
        }
        Ok(removed)
    }
}

/// Relative difference within `tolerance`; values at zero compare absolutely.
fn within_tolerance(previous: f64, current: f64, tolerance: f64) -> bool {
    let scale = previous.abs().max(current.abs());
    if scale < EQUALITY_EPSILON {
        return true;
    }
    (previous - current).abs() / scale <= tolerance
}

fn build_record(rule: &AlertRule, result: &EvaluationResult, ctx: &MetricContext) -> AlertRecord {
    let level = result.severity.unwrap_or(rule.level);

    let mut body = result.message.clone();
    match (result.triggered_value, result.threshold_value) {
        (Some(current), Some(threshold)) => {
            body.push_str(&format!(" (current {current:.2}, threshold {threshold:.2})"));
        }
        (Some(current), None) => body.push_str(&format!(" (current {current:.2})")),
        _ => {}
    }
    body.push_str(&format!("\nConfidence: {:.0}%", result.confidence * 100.0));
    if let Some(line) = result.recommendation.as_deref().and_then(|r| r.lines().next()) {
        body.push_str(&format!("\nRecommendation: {line}"));
    }

    AlertRecord {
        alert_id: format!("ALERT_{}", short_id(ctx.evaluated_at)),
        rule_id: rule.rule_id.clone(),
        rule_name: rule.name.clone(),
        device_id: ctx.device_id.clone(),
        level,
        title: format!("[{level}] {} {}", ctx.device_id, rule.name),
        body,
        triggered_value: result.triggered_value,
        threshold_value: result.threshold_value,
        confidence: result.confidence,
        alert_time: ctx.evaluated_at,
        status: AlertStatus::Active,
        acknowledgement: None,
        resolution: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::t0;
    use crate::storage::{MemoryAlertStore, MemoryRuleStore};
    use crate::types::{AlertLevel, RuleType};

    fn vibration_rule() -> AlertRule {
        AlertRule::new("R1", "High vibration", RuleType::Threshold, AlertLevel::Warning)
            .with_condition("metric", "max_vibration")
            .with_condition("comparison", "gt")
            .with_condition("threshold", 4.5)
    }

    fn manager(rule: AlertRule) -> (AlertManager, Arc<MemoryAlertStore>) {
        let alerts = Arc::new(MemoryAlertStore::new());
        let rules = Arc::new(MemoryRuleStore::new(vec![rule]));
        (AlertManager::new(AlertingConfig::default(), rules, alerts.clone()), alerts)
    }

    fn ctx(minutes: i64, vibration: f64) -> MetricContext {
        MetricContext::new("P-001", t0() + Duration::minutes(minutes))
            .with_metric("max_vibration", vibration)
    }

    #[test]
    fn test_tolerance() {
        assert!(within_tolerance(6.0, 6.2, 0.05));
        assert!(!within_tolerance(6.0, 7.0, 0.05));
        assert!(within_tolerance(0.0, 0.0, 0.05));
    }

    #[tokio::test]
    async fn test_record_fields() {
        let (m, _) = manager(vibration_rule());
        let created = m.process(&ctx(0, 6.0)).await.unwrap();
        assert_eq!(created.len(), 1);
        let a = &created[0];
        assert!(a.alert_id.starts_with("ALERT_"), "{}", a.alert_id);
        assert_eq!(a.title, "[WARNING] P-001 High vibration");
        assert!(a.body.contains("(current 6.00, threshold 4.50)"), "{}", a.body);
        assert!(a.body.contains("Confidence: 90%"), "{}", a.body);
        assert_eq!(a.status, AlertStatus::Active);
    }

    #[tokio::test]
    async fn test_duplicate_values_are_dropped() {
        let (m, alerts) = manager(vibration_rule());
        assert_eq!(m.process(&ctx(0, 6.0)).await.unwrap().len(), 1);
        // within 5% and 60 minutes
        assert!(m.process(&ctx(10, 6.2)).await.unwrap().is_empty());
        // clearly different value
        assert_eq!(m.process(&ctx(20, 8.0)).await.unwrap().len(), 1);
        // outside the duplicate window
        assert_eq!(m.process(&ctx(90, 6.0)).await.unwrap().len(), 1);
        assert_eq!(alerts.len(), 3);
    }

    #[tokio::test]
    async fn test_streak_without_check_interval_is_skipped() {
        let rule = AlertRule {
            consecutive_trigger_count: 2,
            check_interval_minutes: 0,
            ..vibration_rule()
        };
        let (m, alerts) = manager(rule);
        for minute in 0..4 {
            assert!(m.process(&ctx(minute, 6.0 + minute as f64)).await.unwrap().is_empty());
        }
        assert!(alerts.is_empty());
        // rejected before any trigger bookkeeping
        assert!(m.pairs.is_empty());
    }

    #[tokio::test]
    async fn test_consecutive_streak_breaks_on_quiet_check() {
        let rule = AlertRule {
            consecutive_trigger_count: 2,
            check_interval_minutes: 5,
            ..vibration_rule()
        };
        let (m, _) = manager(rule);
        assert!(m.process(&ctx(0, 6.0)).await.unwrap().is_empty());
        assert!(m.process(&ctx(5, 3.0)).await.unwrap().is_empty());
        assert!(m.process(&ctx(10, 6.0)).await.unwrap().is_empty());
        assert_eq!(m.process(&ctx(15, 6.0)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let (m, _) = manager(vibration_rule());
        let alert = m.process(&ctx(0, 6.0)).await.unwrap().remove(0);

        let acked = m.acknowledge(&alert.alert_id, "operator", None).await.unwrap();
        assert_eq!(acked.status, AlertStatus::Acknowledged);
        assert!(acked.is_confirmed());

        let err = m.acknowledge(&alert.alert_id, "operator", None).await.unwrap_err();
        assert!(matches!(err, AlertError::InvalidTransition { .. }), "{err}");

        let resolved = m
            .resolve(&alert.alert_id, "tech", Some("bearing replaced".to_string()))
            .await
            .unwrap();
        assert_eq!(resolved.status, AlertStatus::Resolved);
        assert_eq!(resolved.resolution.as_ref().map(|c| c.by.as_str()), Some("tech"));

        assert!(matches!(
            m.mark_false_positive(&alert.alert_id, "tech", None).await,
            Err(AlertError::InvalidTransition { .. })
        ));
        assert!(matches!(
            m.resolve("ALERT_missing", "tech", None).await,
            Err(AlertError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_statistics_and_purge() {
        let (m, _) = manager(vibration_rule());
        let first = m.process(&ctx(0, 6.0)).await.unwrap().remove(0);
        m.process(&ctx(120, 9.0)).await.unwrap();
        m.resolve(&first.alert_id, "tech", None).await.unwrap();

        let stats = m.statistics(t0()).unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_status.get(&AlertStatus::Resolved), Some(&1));
        assert_eq!(stats.by_level.get(&AlertLevel::Warning), Some(&2));
        assert_eq!(m.active_alerts(Some("P-001")).unwrap().len(), 1);

        assert_eq!(m.purge(t0() + Duration::days(30)).unwrap(), 0);
        assert_eq!(m.purge(t0() + Duration::days(91)).unwrap(), 1);
        assert_eq!(m.active_alerts(None).unwrap().len(), 1);
    }
}
