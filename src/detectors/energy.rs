//! Energy consumption trend.

use std::collections::BTreeMap;

use super::{check_threshold, finite, volume_confidence, DetectorError};
use crate::config::defaults::ENERGY_URGENT_GROWTH_PCT;
use crate::stats;
use crate::types::{AnalysisType, Finding, Metric, Sample, Severity};

const INSUFFICIENT_CONFIDENCE: f64 = 0.4;
const MIN_READINGS: usize = 3;
const MAX_SMOOTHING_WINDOW: usize = 5;

/// Growth rate of the smoothed energy series, as % of its mean per sample.
///
/// Severity follows the shared deviation mapping on `|growth|`; the
/// threshold only decides whether the description flags the change.
pub fn detect(samples: &[Sample], threshold: f64) -> Result<Finding, DetectorError> {
    let energy = Metric::Energy.positive_values(samples);
    if energy.len() < MIN_READINGS {
        return Ok(Finding::insufficient(
            AnalysisType::EnergyTrend,
            INSUFFICIENT_CONFIDENCE,
            "Fewer than three energy readings, trend not assessed",
            None,
        ));
    }

    let threshold = check_threshold(threshold)?;

    let window = MAX_SMOOTHING_WINDOW.min(energy.len() / 3);
    let smoothed = stats::moving_average(&energy, window);
    let trend = stats::analyze_trend(&smoothed);
    let growth = finite(
        "energy growth rate",
        trend.slope / stats::mean(&smoothed) * 100.0,
    )?;
    let severity = Severity::from_deviation_pct(growth);

    let mut description = format!(
        "Energy trend {}, growth {growth:+.2}% per sample, strength {:.2}",
        trend.direction, trend.strength
    );
    if growth.abs() > threshold {
        description.push_str(if growth > 0.0 {
            " - abnormal increase"
        } else {
            " - abnormal decrease"
        });
    }

    let mut detailed_metrics = BTreeMap::new();
    detailed_metrics.insert("total_energy".to_string(), energy.iter().sum());
    detailed_metrics.insert("average_energy".to_string(), stats::mean(&energy));
    detailed_metrics.insert("energy_growth_rate".to_string(), growth);
    detailed_metrics.insert("trend_strength".to_string(), trend.strength);
    detailed_metrics.insert("smoothing_window".to_string(), window as f64);

    let mut recommendations: Vec<String> = if growth > 0.0 {
        vec![
            "Tune operating parameters to improve efficiency".into(),
            "Inspect impeller and casing for wear".into(),
            "Evaluate replacement with a high-efficiency pump".into(),
        ]
    } else {
        vec![
            "Verify the energy meter is reading correctly".into(),
            "Check that pump output is normal".into(),
        ]
    };
    if growth.abs() > ENERGY_URGENT_GROWTH_PCT {
        recommendations.push("Energy change is abnormal, inspect immediately".into());
    }

    Ok(Finding {
        analysis_type: AnalysisType::EnergyTrend,
        severity,
        confidence: volume_confidence(0.6, 0.01, smoothed.len(), 0.9),
        description,
        detected_value: Some(growth),
        expected_value: Some(threshold),
        deviation_pct: Some(growth),
        trend: trend.direction,
        detailed_metrics,
        recommendations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::window;
    use crate::types::TrendDirection;

    #[test]
    fn test_too_few_readings() {
        let samples = window(2, 60, |_, s| Sample {
            energy_kwh: Some(10.0),
            ..s
        });
        let f = detect(&samples, 15.0).expect("detect");
        assert_eq!(f.confidence, 0.4);
        assert!(f.detected_value.is_none());
    }

    #[test]
    fn test_flat_energy_is_info() {
        let samples = window(30, 60, |_, s| Sample {
            energy_kwh: Some(12.0),
            ..s
        });
        let f = detect(&samples, 15.0).expect("detect");
        assert_eq!(f.severity, Severity::Info);
        assert_eq!(f.trend, TrendDirection::Stable);
        assert!((f.confidence - 0.9).abs() < 1e-9);
        assert_eq!(f.detailed_metrics["smoothing_window"], 5.0);
    }

    #[test]
    fn test_steep_growth_is_flagged() {
        // energy doubles over ten samples
        let samples = window(10, 60, |i, s| Sample {
            energy_kwh: Some(10.0 + 2.0 * i as f64),
            ..s
        });
        let f = detect(&samples, 15.0).expect("detect");
        let growth = f.detected_value.unwrap_or_default();
        assert!(growth > 5.0, "growth: {growth}");
        assert_eq!(f.trend, TrendDirection::Increasing);
        assert!(f.severity >= Severity::Warning);
        assert_eq!(f.expected_value, Some(15.0));
    }
}
