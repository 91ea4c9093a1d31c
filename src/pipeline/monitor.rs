//! Device Monitor - analyse a device's recent window and run its rules
//!
//! One check = sample window → analysis (on the blocking pool) → metric
//! context → alert admission. `check_all` runs one check per known device
//! concurrently; a failing device is logged and counted, never fatal.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use tracing::{debug, info, warn};

use super::engine::AnalysisEngine;
use crate::alerting::{AlertManager, MetricContext};
use crate::storage::SampleStore;
use crate::types::{AlertRecord, AnalysisReport};

/// Result of checking one device.
#[derive(Debug, Clone)]
pub struct DeviceCheck {
    pub report: Arc<AnalysisReport>,
    pub alerts: Vec<AlertRecord>,
}

/// Totals of one `check_all` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckSummary {
    pub devices: usize,
    pub alerts_created: usize,
    pub failures: usize,
}

pub struct DeviceMonitor {
    engine: Arc<AnalysisEngine>,
    samples: Arc<dyn SampleStore>,
    alerts: Arc<AlertManager>,
    lookback: Duration,
}

impl DeviceMonitor {
    pub fn new(
        engine: Arc<AnalysisEngine>,
        samples: Arc<dyn SampleStore>,
        alerts: Arc<AlertManager>,
        lookback_hours: i64,
    ) -> Self {
        Self {
            engine,
            samples,
            alerts,
            lookback: Duration::hours(lookback_hours),
        }
    }

    pub fn alert_manager(&self) -> &Arc<AlertManager> {
        &self.alerts
    }

    pub async fn check_device(&self, device_id: &str, now: DateTime<Utc>) -> Result<DeviceCheck> {
        let samples = self
            .samples
            .window(device_id, now - self.lookback, now)
            .with_context(|| format!("loading samples for {device_id}"))?;

        let engine = Arc::clone(&self.engine);
        let id = device_id.to_string();
        let report = tokio::task::spawn_blocking(move || engine.analyze(&id, &samples, now))
            .await
            .with_context(|| format!("analysis task for {device_id} did not complete"))?;

        let report = Arc::new(report);
        let ctx = MetricContext::from_report(Arc::clone(&report));
        let alerts = self
            .alerts
            .process(&ctx)
            .await
            .with_context(|| format!("evaluating rules for {device_id}"))?;

        debug!(
            device_id = %device_id,
            samples = report.sample_count,
            health_score = report.health_score,
            alerts = alerts.len(),
            "Device checked"
        );
        Ok(DeviceCheck { report, alerts })
    }

    pub async fn check_all(&self, now: DateTime<Utc>) -> Result<CheckSummary> {
        let devices = self.samples.devices().context("listing devices")?;

        let outcomes = join_all(devices.iter().map(|d| self.check_device(d, now))).await;

        let mut summary = CheckSummary {
            devices: devices.len(),
            ..CheckSummary::default()
        };
        for (device_id, outcome) in devices.iter().zip(outcomes) {
            match outcome {
                Ok(check) => summary.alerts_created += check.alerts.len(),
                Err(e) => {
                    summary.failures += 1;
                    warn!(device_id = %device_id, error = ?e, "Device check failed");
                }
            }
        }

        if summary.alerts_created > 0 || summary.failures > 0 {
            info!(
                devices = summary.devices,
                alerts = summary.alerts_created,
                failures = summary.failures,
                "Rule check complete"
            );
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AlertingConfig;
    use crate::detectors::test_support::{t0, window};
    use crate::storage::{MemoryAlertStore, MemoryRuleStore, MemorySampleStore};
    use crate::types::{AlertLevel, AlertRule, RuleType, Sample};

    fn monitor(rules: Vec<AlertRule>) -> (DeviceMonitor, Arc<MemorySampleStore>) {
        let samples = Arc::new(MemorySampleStore::new());
        let manager = AlertManager::new(
            AlertingConfig::default(),
            Arc::new(MemoryRuleStore::new(rules)),
            Arc::new(MemoryAlertStore::new()),
        );
        let monitor = DeviceMonitor::new(
            Arc::new(AnalysisEngine::default()),
            samples.clone(),
            Arc::new(manager),
            24,
        );
        (monitor, samples)
    }

    #[tokio::test]
    async fn test_check_all_raises_alerts_per_device() {
        let rule = AlertRule::new("VIB", "Vibration high", RuleType::Threshold, AlertLevel::Critical)
            .with_condition("metric", "max_vibration")
            .with_condition("comparison", ">")
            .with_condition("threshold", 4.5);
        let (monitor, store) = monitor(vec![rule]);

        let shaking = window(20, 30, |_, s| Sample { vibration_mm_s: Some(7.5), ..s });
        let calm = window(20, 30, |_, s| Sample {
            device_id: "P-002".to_string(),
            vibration_mm_s: Some(1.0),
            ..s
        });
        store.extend(shaking.into_iter().chain(calm)).unwrap();

        let now = t0() + Duration::hours(10);
        let summary = monitor.check_all(now).await.unwrap();
        assert_eq!(summary, CheckSummary { devices: 2, alerts_created: 1, failures: 0 });

        let active = monitor.alert_manager().active_alerts(None).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].device_id, "P-001");
    }

    #[tokio::test]
    async fn test_check_device_only_sees_lookback_window() {
        let (monitor, store) = monitor(Vec::new());
        store.extend(window(48, 60, |_, s| Sample { power_kw: Some(10.0), ..s })).unwrap();

        let check = monitor
            .check_device("P-001", t0() + Duration::hours(47))
            .await
            .unwrap();
        // hours 23..=47
        assert_eq!(check.report.sample_count, 25);
        assert!(check.alerts.is_empty());
    }
}
