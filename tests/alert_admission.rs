//! Alert Admission Tests
//!
//! Drives `AlertManager` through its public API with hand-built metric
//! contexts: suppression windows, consecutive-trigger streaks and the
//! false-positive reset.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use pump_sentinel::alerting::{AlertManager, MetricContext};
use pump_sentinel::config::AlertingConfig;
use pump_sentinel::storage::{MemoryAlertStore, MemoryRuleStore};
use pump_sentinel::types::{AlertLevel, AlertRule, AlertStatus, RuleType};

fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_709_280_000, 0).expect("valid timestamp")
}

fn pressure_rule() -> AlertRule {
    AlertRule::new("PRESS-LOW", "Discharge pressure low", RuleType::Threshold, AlertLevel::Warning)
        .with_condition("metric", "average_pressure")
        .with_condition("comparison", "<")
        .with_condition("threshold", 250.0)
}

fn manager(rule: AlertRule) -> (AlertManager, Arc<MemoryAlertStore>) {
    let alerts = Arc::new(MemoryAlertStore::new());
    let manager = AlertManager::new(
        AlertingConfig::default(),
        Arc::new(MemoryRuleStore::new(vec![rule])),
        alerts.clone(),
    );
    (manager, alerts)
}

fn reading(minutes: i64, pressure: f64) -> MetricContext {
    MetricContext::new("P-001", t0() + Duration::minutes(minutes))
        .with_metric("average_pressure", pressure)
}

#[tokio::test]
async fn suppression_window_yields_one_alert() {
    let rule = AlertRule {
        suppression_minutes: 60,
        ..pressure_rule()
    };
    let (m, alerts) = manager(rule);

    // values far apart so the duplicate check never applies
    for (minute, pressure) in [(0, 200.0), (10, 120.0), (30, 60.0), (59, 10.0)] {
        m.process(&reading(minute, pressure)).await.unwrap();
    }
    assert_eq!(alerts.len(), 1);

    // suppression has lapsed
    let created = m.process(&reading(61, 200.0)).await.unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(alerts.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checks_of_one_pair_raise_one_alert() {
    let rule = AlertRule {
        suppression_minutes: 60,
        ..pressure_rule()
    };
    let (m, alerts) = manager(rule);
    let m = Arc::new(m);

    let handles: Vec<_> = (0..64)
        .map(|i| {
            let m = Arc::clone(&m);
            // distinct values so only the suppression check can stop them
            tokio::spawn(async move { m.process(&reading(0, 10.0 + 3.0 * f64::from(i))).await })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        created += handle.await.unwrap().unwrap().len();
    }
    assert_eq!(created, 1, "created: {created}");
    assert_eq!(alerts.len(), 1, "stored: {}", alerts.len());
}

#[tokio::test]
async fn three_consecutive_triggers_required() {
    let rule = AlertRule {
        consecutive_trigger_count: 3,
        check_interval_minutes: 5,
        ..pressure_rule()
    };
    let (m, alerts) = manager(rule);

    assert!(m.process(&reading(0, 200.0)).await.unwrap().is_empty());
    assert!(m.process(&reading(5, 150.0)).await.unwrap().is_empty());
    let created = m.process(&reading(10, 100.0)).await.unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].triggered_value, Some(100.0));
    assert_eq!(alerts.len(), 1);

    // the streak restarted after creation
    assert!(m.process(&reading(15, 40.0)).await.unwrap().is_empty());
}

#[tokio::test]
async fn spread_out_triggers_do_not_form_a_streak() {
    let rule = AlertRule {
        consecutive_trigger_count: 3,
        check_interval_minutes: 5,
        ..pressure_rule()
    };
    let (m, _) = manager(rule);

    // each trigger falls outside the 15 minute streak window of the first
    for (minute, pressure) in [(0, 200.0), (20, 150.0), (40, 100.0)] {
        assert!(m.process(&reading(minute, pressure)).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn false_positive_closes_alert_and_resets_streak() {
    let rule = AlertRule {
        consecutive_trigger_count: 2,
        check_interval_minutes: 5,
        ..pressure_rule()
    };
    let (m, _) = manager(rule);

    m.process(&reading(0, 200.0)).await.unwrap();
    let alert = m.process(&reading(5, 100.0)).await.unwrap().remove(0);

    let closed = m
        .mark_false_positive(&alert.alert_id, "operator", Some("sensor swap".to_string()))
        .await
        .unwrap();
    assert_eq!(closed.status, AlertStatus::FalsePositive);
    assert!(m.active_alerts(Some("P-001")).unwrap().is_empty());

    // one trigger after the reset is not enough
    assert!(m.process(&reading(10, 30.0)).await.unwrap().is_empty());
}

#[tokio::test]
async fn rules_scoped_to_other_devices_are_ignored() {
    let rule = AlertRule {
        device_id: Some("P-002".to_string()),
        ..pressure_rule()
    };
    let (m, alerts) = manager(rule);
    assert!(m.process(&reading(0, 10.0)).await.unwrap().is_empty());
    assert!(alerts.is_empty());
}
