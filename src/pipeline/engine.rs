//! Analysis Engine - one full analytic pass over a device window
//!
//! ```text
//! samples ─┬─► AnomalyDetector ──► findings ─┐
//!          ├─► FaultPredictor ──► prediction ─┼─► MaintenanceAdvisor ─► plan
//!          └─► PerformanceScorer ► performance┘
//!                                   │
//!                                   ▼
//!                 health score, risk level, confidence
//! ```
//!
//! The engine holds no mutable state. `analyze` can run concurrently for
//! different devices; `analyze_batch` fans a batch out over the rayon pool.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::advisor::MaintenanceAdvisor;
use crate::config::EngineConfig;
use crate::detectors::AnomalyDetector;
use crate::prediction::FaultPredictor;
use crate::scoring::{health_score, overall_confidence, risk_level, PerformanceScorer};
use crate::types::{AnalysisReport, Sample};

#[derive(Debug, Default)]
pub struct AnalysisEngine {
    detector: AnomalyDetector,
    predictor: FaultPredictor,
    scorer: PerformanceScorer,
    advisor: MaintenanceAdvisor,
}

impl AnalysisEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            detector: AnomalyDetector::new(config.detection.clone()),
            predictor: FaultPredictor::new(config.prediction.clone()),
            scorer: PerformanceScorer::new(),
            advisor: MaintenanceAdvisor::new(),
        }
    }

    /// Analyse one device's window.
    ///
    /// Samples belonging to other devices are ignored; out-of-order samples
    /// are sorted by timestamp first.
    pub fn analyze(&self, device_id: &str, samples: &[Sample], now: DateTime<Utc>) -> AnalysisReport {
        let samples = prepare(device_id, samples);

        let findings = self.detector.detect_all(device_id, &samples);
        let prediction = self.predictor.predict(&samples, now);
        let performance = self.scorer.evaluate(&samples);
        let plan = self
            .advisor
            .advise(&samples, &findings, &prediction, &performance, now);

        let health = health_score(&findings, &performance.scores);
        let risk = risk_level(&findings, &prediction);
        let confidence = overall_confidence(&findings);

        debug!(
            device_id = %device_id,
            samples = samples.len(),
            health_score = health,
            risk_level = %risk,
            "Device analysed"
        );

        AnalysisReport {
            device_id: device_id.to_string(),
            analyzed_at: now,
            sample_count: samples.len(),
            window_start: samples.first().map(|s| s.timestamp),
            window_end: samples.last().map(|s| s.timestamp),
            findings,
            prediction,
            performance,
            plan,
            health_score: health,
            risk_level: risk,
            confidence,
        }
    }

    /// Analyse many devices in parallel. Output order follows input order.
    pub fn analyze_batch(
        &self,
        batch: &[(String, Vec<Sample>)],
        now: DateTime<Utc>,
    ) -> Vec<AnalysisReport> {
        let reports: Vec<AnalysisReport> = batch
            .par_iter()
            .map(|(device_id, samples)| self.analyze(device_id, samples, now))
            .collect();
        info!(devices = reports.len(), "Batch analysis complete");
        reports
    }
}

fn prepare<'a>(device_id: &str, samples: &'a [Sample]) -> Cow<'a, [Sample]> {
    let foreign = samples.iter().any(|s| s.device_id != device_id);
    let ordered = samples.windows(2).all(|w| w[0].timestamp <= w[1].timestamp);
    if !foreign && ordered {
        return Cow::Borrowed(samples);
    }

    let mut owned: Vec<Sample> = samples
        .iter()
        .filter(|s| s.device_id == device_id)
        .cloned()
        .collect();
    owned.sort_by_key(|s| s.timestamp);
    if foreign {
        debug!(device_id = %device_id, dropped = samples.len() - owned.len(), "Ignoring samples from other devices");
    }
    Cow::Owned(owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::{t0, window};
    use crate::types::{AnalysisType, RiskLevel};

    fn healthy(n: usize) -> Vec<Sample> {
        window(n, 30, |i, s| Sample {
            pump_status: Some(1),
            runtime_minutes: Some(30.0),
            power_kw: Some(15.0 + (i % 2) as f64 * 0.2),
            energy_kwh: Some(7.5),
            water_pressure_kpa: Some(300.0),
            flow_rate_m3h: Some(40.0 + (i % 3) as f64),
            vibration_mm_s: Some(1.5),
            ..s
        })
    }

    #[test]
    fn test_report_covers_every_stage() {
        let samples = healthy(48);
        let report = AnalysisEngine::default().analyze("P-001", &samples, t0());
        assert_eq!(report.findings.len(), 6);
        assert!(report.finding(AnalysisType::Vibration).is_some());
        assert_eq!(report.sample_count, 48);
        assert_eq!(report.window_start, Some(samples[0].timestamp));
        assert!(report.health_score > 50.0, "Health: {}", report.health_score);
        assert!((0.0..=1.0).contains(&report.confidence));
    }

    #[test]
    fn test_foreign_and_unordered_samples_are_normalised() {
        let mut samples = healthy(10);
        samples.reverse();
        samples.push(Sample::new("P-999", t0()));
        let report = AnalysisEngine::default().analyze("P-001", &samples, t0());
        assert_eq!(report.sample_count, 10);
        assert!(report.window_start < report.window_end);
    }

    #[test]
    fn test_empty_window_degrades() {
        let report = AnalysisEngine::default().analyze("P-001", &[], t0());
        assert_eq!(report.sample_count, 0);
        assert_eq!(report.findings.len(), 6);
        assert!(report.findings.iter().all(|f| f.confidence <= 0.5));
        assert_eq!(report.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_batch_preserves_order() {
        let batch: Vec<(String, Vec<Sample>)> = ["P-001", "P-002", "P-003"]
            .iter()
            .map(|id| {
                let samples = healthy(12)
                    .into_iter()
                    .map(|s| Sample { device_id: (*id).to_string(), ..s })
                    .collect();
                ((*id).to_string(), samples)
            })
            .collect();
        let reports = AnalysisEngine::default().analyze_batch(&batch, t0());
        let ids: Vec<&str> = reports.iter().map(|r| r.device_id.as_str()).collect();
        assert_eq!(ids, vec!["P-001", "P-002", "P-003"]);
        assert!(reports.iter().all(|r| r.sample_count == 12));
    }
}
