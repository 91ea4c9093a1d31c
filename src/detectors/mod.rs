//! Metric Anomaly Detectors
//!
//! One detector per observed metric. Each consumes a device's sample window
//! plus a threshold and returns exactly one [`Finding`].
//!
//! ## Architecture
//!
//! - `startup`: pump start frequency vs. starts-per-hour limit
//! - `runtime`: average cycle runtime vs. expected runtime
//! - `energy`: smoothed energy growth rate
//! - `vibration`: tiered vibration magnitude plus IQR outliers
//! - `power`: mean power vs. its own median baseline
//! - `classification`: share of faulted or alarmed samples
//!
//! ## Degradation
//!
//! Thin windows are not errors: each detector returns an informational
//! Finding with a low confidence (0.3–0.5) and no recommendations. A
//! detector that does fail (invalid threshold, non-finite arithmetic) is
//! isolated by [`AnomalyDetector::detect_all`], which substitutes a failed
//! Finding so the rest of the batch still runs.

pub mod classification;
pub mod energy;
pub mod power;
pub mod runtime;
pub mod startup;
pub mod vibration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::DetectionConfig;
use crate::types::{AnalysisType, Finding, Sample};

/// Confidence assigned to a detector that failed outright.
pub const FAILED_CONFIDENCE: f64 = 0.1;

#[derive(Debug, Error, PartialEq)]
pub enum DetectorError {
    #[error("threshold must be positive and finite (got {0})")]
    InvalidThreshold(f64),

    #[error("{0} is not a finite number")]
    NonFinite(&'static str),
}

/// Runs every detector over a window using per-device thresholds.
#[derive(Debug, Clone, Default)]
pub struct AnomalyDetector {
    config: DetectionConfig,
}

impl AnomalyDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    /// One Finding per detector, in a fixed order.
    ///
    /// `samples` must be ordered by timestamp.
    pub fn detect_all(&self, device_id: &str, samples: &[Sample]) -> Vec<Finding> {
        let t = self.config.thresholds_for(device_id);

        let findings = vec![
            isolate(
                device_id,
                AnalysisType::StartupFrequency,
                startup::detect(samples, t.startup_frequency_per_hour),
            ),
            isolate(
                device_id,
                AnalysisType::Runtime,
                runtime::detect(samples, t.runtime_minutes),
            ),
            isolate(
                device_id,
                AnalysisType::EnergyTrend,
                energy::detect(samples, t.energy_increase_pct),
            ),
            isolate(
                device_id,
                AnalysisType::Vibration,
                vibration::detect(samples, t.vibration_mm_s),
            ),
            isolate(
                device_id,
                AnalysisType::Power,
                power::detect(samples, t.power_deviation_pct),
            ),
            isolate(
                device_id,
                AnalysisType::AnomalyClassification,
                classification::detect(samples),
            ),
        ];

        debug!(
            device_id = %device_id,
            samples = samples.len(),
            max_severity = ?findings.iter().map(|f| f.severity).max(),
            "Anomaly detection complete"
        );
        findings
    }
}

/// Turn a detector failure into a low-confidence Finding.
fn isolate(
    device_id: &str,
    analysis_type: AnalysisType,
    result: Result<Finding, DetectorError>,
) -> Finding {
    result.unwrap_or_else(|e| {
        warn!(device_id = %device_id, analysis = %analysis_type, error = %e, "Detector failed");
        Finding::insufficient(
            analysis_type,
            FAILED_CONFIDENCE,
            format!("{analysis_type} analysis failed: {e}"),
            None,
        )
    })
}

// ============================================================================
// Shared helpers
// ============================================================================

pub(crate) fn check_threshold(threshold: f64) -> Result<f64, DetectorError> {
    if threshold.is_finite() && threshold > 0.0 {
        Ok(threshold)
    } else {
        Err(DetectorError::InvalidThreshold(threshold))
    }
}

pub(crate) fn finite(name: &'static str, value: f64) -> Result<f64, DetectorError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DetectorError::NonFinite(name))
    }
}

/// `min(cap, base + per_reading·n)`.
pub(crate) fn volume_confidence(base: f64, per_reading: f64, n: usize, cap: f64) -> f64 {
    (base + per_reading * n as f64).min(cap)
}


#[cfg(test)]
mod tests {
    use super::test_support::window;
    use super::*;
    use crate::config::ThresholdOverrides;
    use crate::types::Severity;

    #[test]
    fn test_detect_all_returns_one_finding_per_detector() {
        let samples = window(40, 10, |i, s| Sample {
            pump_status: Some(u8::from(i % 4 == 0)),
            runtime_minutes: Some(400.0 + i as f64),
            power_kw: Some(15.0),
            energy_kwh: Some(2.5),
            vibration_mm_s: Some(2.0),
            ..s
        });
        let findings = AnomalyDetector::default().detect_all("P-001", &samples);
        assert_eq!(findings.len(), 6);
        assert!(findings.iter().all(|f| (0.0..=1.0).contains(&f.confidence)));
    }

    #[test]
    fn test_bad_override_is_isolated_to_its_detector() {
        let mut config = DetectionConfig::default();
        config.devices.insert(
            "P-001".to_string(),
            ThresholdOverrides {
                vibration_mm_s: Some(0.0),
                ..Default::default()
            },
        );
        let samples = window(10, 10, |_, s| Sample {
            vibration_mm_s: Some(9.0),
            power_kw: Some(12.0),
            ..s
        });

        let findings = AnomalyDetector::new(config).detect_all("P-001", &samples);
        let vib = findings
            .iter()
            .find(|f| f.analysis_type == AnalysisType::Vibration)
            .expect("vibration finding");
        assert_eq!(vib.severity, Severity::Info);
        assert_eq!(vib.confidence, FAILED_CONFIDENCE);
        assert!(vib.description.contains("failed"), "{}", vib.description);

        let power = findings
            .iter()
            .find(|f| f.analysis_type == AnalysisType::Power)
            .expect("power finding");
        assert!(power.confidence > FAILED_CONFIDENCE);
    }
}
