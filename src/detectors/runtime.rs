//! Cycle runtime duration.

use std::collections::BTreeMap;

use super::{check_threshold, finite, volume_confidence, DetectorError};
use crate::stats;
use crate::types::{AnalysisType, Finding, Metric, Sample, Severity, TrendDirection};

const INSUFFICIENT_CONFIDENCE: f64 = 0.3;

pub fn detect(samples: &[Sample], threshold: f64) -> Result<Finding, DetectorError> {
    let runtimes = Metric::RuntimeMinutes.positive_values(samples);
    if runtimes.is_empty() {
        return Ok(Finding::insufficient(
            AnalysisType::Runtime,
            INSUFFICIENT_CONFIDENCE,
            "No runtime readings in the window",
            threshold.is_finite().then_some(threshold),
        ));
    }

    let threshold = check_threshold(threshold)?;

    let avg = finite("average runtime", stats::mean(&runtimes))?;
    let max = stats::max(&runtimes).unwrap_or(avg);
    let min = stats::min(&runtimes).unwrap_or(avg);
    let std_dev = stats::std_dev(&runtimes);
    let deviation = (avg - threshold) / threshold * 100.0;
    let severity = Severity::from_deviation_pct(deviation);
    let trend = stats::analyze_trend(&runtimes);

    let mut detailed_metrics = BTreeMap::new();
    detailed_metrics.insert("average_runtime".to_string(), avg);
    detailed_metrics.insert("max_runtime".to_string(), max);
    detailed_metrics.insert("min_runtime".to_string(), min);
    detailed_metrics.insert("runtime_std_dev".to_string(), std_dev);
    detailed_metrics.insert("total_cycles".to_string(), runtimes.len() as f64);

    let mut recommendations: Vec<String> = if deviation > 0.0 {
        vec![
            "Check whether the pump is overloaded".into(),
            "Verify pipeline resistance is within design".into(),
            "Inspect motor temperature and cooling".into(),
        ]
    } else {
        vec![
            "Check that the pump reaches normal working pressure".into(),
            "Review start/stop conditions".into(),
        ]
    };
    if trend.is(TrendDirection::Increasing, 0.7) {
        recommendations.push("Runtime keeps growing, watch overall equipment health".into());
    }

    Ok(Finding {
        analysis_type: AnalysisType::Runtime,
        severity,
        confidence: volume_confidence(0.7, 0.005, runtimes.len(), 0.95),
        description: format!(
            "Average runtime {avg:.1} min (max {max:.1}) against {threshold:.1} min ({deviation:+.1}%)"
        ),
        detected_value: Some(avg),
        expected_value: Some(threshold),
        deviation_pct: Some(deviation),
        trend: trend.direction,
        detailed_metrics,
        recommendations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::window;

    #[test]
    fn test_no_runtime_readings() {
        let samples = window(5, 10, |_, s| Sample {
            runtime_minutes: Some(0.0),
            ..s
        });
        let f = detect(&samples, 480.0).expect("detect");
        assert_eq!(f.confidence, 0.3);
        assert_eq!(f.severity, Severity::Info);
    }

    #[test]
    fn test_growing_runtime_above_limit() {
        let samples = window(20, 60, |i, s| Sample {
            runtime_minutes: Some(500.0 + 10.0 * i as f64),
            ..s
        });
        let f = detect(&samples, 480.0).expect("detect");
        // mean 595 → +24%
        assert_eq!(f.severity, Severity::Error);
        assert_eq!(f.trend, TrendDirection::Increasing);
        assert_eq!(f.recommendations.len(), 4);
        assert!((f.confidence - 0.8).abs() < 1e-9, "confidence: {}", f.confidence);
        assert_eq!(f.detailed_metrics["total_cycles"], 20.0);
    }

    #[test]
    fn test_short_runtime_recommendations() {
        let samples = window(4, 60, |_, s| Sample {
            runtime_minutes: Some(470.0),
            ..s
        });
        let f = detect(&samples, 480.0).expect("detect");
        assert_eq!(f.severity, Severity::Info);
        assert_eq!(f.trend, TrendDirection::Stable);
        assert_eq!(f.recommendations.len(), 2);
    }
}
