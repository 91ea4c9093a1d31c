//! Named metric values a rule is evaluated against.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::types::{AnalysisReport, AnalysisType};

/// Flat metric map for one device at one point in time, optionally
/// carrying the analysis report it was derived from.
#[derive(Debug, Clone)]
pub struct MetricContext {
    pub device_id: String,
    pub evaluated_at: DateTime<Utc>,
    metrics: BTreeMap<String, f64>,
    report: Option<Arc<AnalysisReport>>,
}

impl MetricContext {
    pub fn new(device_id: impl Into<String>, evaluated_at: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.into(),
            evaluated_at,
            metrics: BTreeMap::new(),
            report: None,
        }
    }

    /// Standard metric set of an analysis report.
    pub fn from_report(report: Arc<AnalysisReport>) -> Self {
        let mut ctx = Self::new(report.device_id.clone(), report.analyzed_at);
        let scores = &report.performance.scores;
        let raw = &report.performance.metrics;
        let prediction = &report.prediction;

        ctx.insert("health_score", report.health_score);
        ctx.insert("efficiency_score", scores.efficiency);
        ctx.insert("reliability_score", scores.reliability);
        ctx.insert("maintenance_score", scores.maintenance);
        ctx.insert("performance_score", scores.mean());
        ctx.insert("average_power", raw.average_power_kw);
        ctx.insert("average_vibration", raw.average_vibration);
        ctx.insert("max_vibration", raw.max_vibration);
        ctx.insert("failure_probability", prediction.failure_probability);
        ctx.insert(
            "remaining_useful_life",
            f64::from(prediction.remaining_useful_life_days),
        );
        ctx.insert("risk_level", f64::from(report.risk_level.level()));
        ctx.insert("confidence_score", report.confidence);

        if let Some(rate) = report
            .finding(AnalysisType::AnomalyClassification)
            .and_then(|f| f.detected_value)
        {
            ctx.insert("anomaly_rate", rate);
        }

        for (component, p) in &prediction.component_probabilities {
            ctx.insert(format!("{}_failure_probability", component.key()), *p);
        }

        ctx.report = Some(report);
        ctx
    }

    /// Add or overwrite a metric. Non-finite values are dropped.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        if value.is_finite() {
            self.metrics.insert(name, value);
        } else {
            tracing::debug!(metric = %name, "Dropping non-finite context metric");
        }
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    pub fn metrics(&self) -> &BTreeMap<String, f64> {
        &self.metrics
    }

    pub fn report(&self) -> Option<&AnalysisReport> {
        self.report.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::{t0, window};
    use crate::pipeline::AnalysisEngine;
    use crate::types::Sample;

    #[test]
    fn test_context_from_report_has_standard_keys() {
        let samples = window(40, 30, |i, s| Sample {
            power_kw: Some(15.0 + (i % 3) as f64),
            vibration_mm_s: Some(2.0),
            alarm_level: Some(if i % 10 == 0 { 2 } else { 0 }),
            ..s
        });
        let report = AnalysisEngine::default().analyze("P-001", &samples, t0());
        let ctx = MetricContext::from_report(Arc::new(report));

        for key in [
            "health_score",
            "efficiency_score",
            "reliability_score",
            "maintenance_score",
            "performance_score",
            "average_power",
            "average_vibration",
            "max_vibration",
            "failure_probability",
            "remaining_useful_life",
            "risk_level",
            "confidence_score",
            "anomaly_rate",
            "bearing_failure_probability",
            "control_system_failure_probability",
        ] {
            assert!(ctx.get(key).is_some(), "missing {key}");
        }
        assert_eq!(ctx.get("anomaly_rate"), Some(10.0));
        assert_eq!(ctx.get("max_vibration"), Some(2.0));
        assert!(ctx.report().is_some());
    }

    #[test]
    fn test_non_finite_metrics_are_dropped() {
        let ctx = MetricContext::new("P-001", t0())
            .with_metric("a", f64::NAN)
            .with_metric("b", 1.5);
        assert_eq!(ctx.get("a"), None);
        assert_eq!(ctx.get("b"), Some(1.5));
        assert_eq!(ctx.metrics().len(), 1);
    }
}
