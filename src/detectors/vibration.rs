//! Vibration magnitude with IQR outliers.
//!
//! Severity is tiered on magnitude rather than the shared deviation mapping:
//!
//! | Condition                | Severity |
//! |--------------------------|----------|
//! | `max > 1.5 × threshold`  | Critical |
//! | `max > threshold`        | Error    |
//! | `mean > 0.8 × threshold` | Warning  |
//! | otherwise                | Info     |

use std::collections::BTreeMap;

use super::{check_threshold, finite, volume_confidence, DetectorError};
use crate::config::defaults::VIBRATION_STOP_MM_S;
use crate::stats;
use crate::types::{AnalysisType, Finding, Metric, Sample, Severity, TrendDirection};

const INSUFFICIENT_CONFIDENCE: f64 = 0.3;

pub fn detect(samples: &[Sample], threshold: f64) -> Result<Finding, DetectorError> {
    let vibration = Metric::Vibration.positive_values(samples);
    if vibration.is_empty() {
        return Ok(Finding::insufficient(
            AnalysisType::Vibration,
            INSUFFICIENT_CONFIDENCE,
            "No vibration readings in the window",
            threshold.is_finite().then_some(threshold),
        ));
    }

    let threshold = check_threshold(threshold)?;

    let avg = finite("average vibration", stats::mean(&vibration))?;
    let max = stats::max(&vibration).unwrap_or(avg);
    let std_dev = stats::std_dev(&vibration);
    let outliers = stats::detect_outliers(&vibration);
    let outlier_pct = outliers.len() as f64 / vibration.len() as f64 * 100.0;

    let severity = tier(avg, max, threshold);
    let deviation = (avg - threshold) / threshold * 100.0;

    let mut detailed_metrics = BTreeMap::new();
    detailed_metrics.insert("average_vibration".to_string(), avg);
    detailed_metrics.insert("max_vibration".to_string(), max);
    detailed_metrics.insert("vibration_std_dev".to_string(), std_dev);
    detailed_metrics.insert("outlier_count".to_string(), outliers.len() as f64);
    detailed_metrics.insert("outlier_percentage".to_string(), outlier_pct);

    let mut recommendations: Vec<String> = Vec::new();
    if max > VIBRATION_STOP_MM_S {
        recommendations.push("Vibration is severe, stop the pump for inspection".into());
        recommendations.push("Check shaft alignment and coupling".into());
    } else if avg > threshold {
        recommendations.push("Schedule bearing maintenance".into());
        recommendations.push("Check and tighten foundation bolts".into());
    }
    if !outliers.is_empty() {
        recommendations.push("Intermittent vibration spikes seen, inspect for cavitation".into());
    }
    if severity >= Severity::Error {
        recommendations.push("Run a vibration spectrum analysis".into());
    }

    Ok(Finding {
        analysis_type: AnalysisType::Vibration,
        severity,
        confidence: volume_confidence(0.7, 0.005, vibration.len(), 0.95),
        description: format!(
            "Vibration mean {avg:.2} mm/s, max {max:.2} mm/s against {threshold:.2} mm/s, {} outliers",
            outliers.len()
        ),
        detected_value: Some(avg),
        expected_value: Some(threshold),
        deviation_pct: Some(deviation),
        trend: TrendDirection::Stable,
        detailed_metrics,
        recommendations,
    })
}

fn tier(mean: f64, max: f64, threshold: f64) -> Severity {
    if max > threshold * 1.5 {
        Severity::Critical
    } else if max > threshold {
        Severity::Error
    } else if mean > threshold * 0.8 {
        Severity::Warning
    } else {
        Severity::Info
    }
}
