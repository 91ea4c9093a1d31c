//! Power draw against its own median.

use std::collections::BTreeMap;

use super::{check_threshold, finite, volume_confidence, DetectorError};
use crate::config::defaults::POWER_RECOMMENDATION_DEVIATION_PCT;
use crate::stats;
use crate::types::{AnalysisType, Finding, Metric, Sample, Severity, TrendDirection};

const INSUFFICIENT_CONFIDENCE: f64 = 0.4;
const MIN_READINGS: usize = 3;

/// Mean power compared with the window median.
///
/// The median is the expected value, so a few spikes do not move the
/// baseline. `tolerance_pct` only decides whether the description calls the
/// deviation abnormal; severity uses the shared deviation mapping.
pub fn detect(samples: &[Sample], tolerance_pct: f64) -> Result<Finding, DetectorError> {
    let power = Metric::Power.positive_values(samples);
    if power.len() < MIN_READINGS {
        return Ok(Finding::insufficient(
            AnalysisType::Power,
            INSUFFICIENT_CONFIDENCE,
            "Fewer than three power readings, power draw not assessed",
            None,
        ));
    }

    let tolerance_pct = check_threshold(tolerance_pct)?;

    let expected = stats::median(&power);
    let avg = stats::mean(&power);
    let deviation = finite(
        "power deviation",
        (avg - expected).abs() / expected * 100.0,
    )?;
    let severity = Severity::from_deviation_pct(deviation);

    let mut description = format!(
        "Average power {avg:.2} kW against median {expected:.2} kW ({deviation:.1}% apart)"
    );
    if deviation > tolerance_pct {
        description.push_str(" - abnormal power draw");
    }

    let mut detailed_metrics = BTreeMap::new();
    detailed_metrics.insert("average_power".to_string(), avg);
    detailed_metrics.insert("expected_power".to_string(), expected);
    detailed_metrics.insert("max_power".to_string(), stats::max(&power).unwrap_or(avg));
    detailed_metrics.insert("min_power".to_string(), stats::min(&power).unwrap_or(avg));
    detailed_metrics.insert("power_std_dev".to_string(), stats::std_dev(&power));

    let mut recommendations: Vec<String> = Vec::new();
    if deviation > POWER_RECOMMENDATION_DEVIATION_PCT {
        recommendations.push("Check motor condition and supply voltage".into());
        recommendations.push("Inspect the pump for mechanical binding".into());
        recommendations.push("Verify the power meter calibration".into());
    }
    if severity >= Severity::Error {
        recommendations.push("Arrange an electrical system inspection".into());
    }

    Ok(Finding {
        analysis_type: AnalysisType::Power,
        severity,
        confidence: volume_confidence(0.6, 0.01, power.len(), 0.9),
        description,
        detected_value: Some(avg),
        expected_value: Some(expected),
        deviation_pct: Some(deviation),
        trend: if avg > expected {
            TrendDirection::Increasing
        } else {
            TrendDirection::Decreasing
        },
        detailed_metrics,
        recommendations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::window;

    #[test]
    fn test_steady_power_is_info() {
        let samples = window(10, 10, |_, s| Sample {
            power_kw: Some(15.0),
            ..s
        });
        let f = detect(&samples, 20.0).expect("detect");
        assert_eq!(f.severity, Severity::Info);
        assert_eq!(f.expected_value, Some(15.0));
        assert_eq!(f.trend, TrendDirection::Decreasing);
        assert!(f.recommendations.is_empty());
        assert!((f.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_spikes_pull_mean_above_median() {
        // median 10, mean 14 → 40%
        let samples = window(5, 10, |i, s| Sample {
            power_kw: Some(if i >= 3 { 20.0 } else { 10.0 }),
            ..s
        });
        let f = detect(&samples, 20.0).expect("detect");
        assert!((f.deviation_pct.unwrap_or_default() - 40.0).abs() < 1e-9);
        assert_eq!(f.severity, Severity::Critical);
        assert_eq!(f.trend, TrendDirection::Increasing);
        assert_eq!(f.recommendations.len(), 4);
        assert!(f.description.contains("abnormal"));
    }

    #[test]
    fn test_too_few_readings() {
        let samples = window(2, 10, |_, s| Sample {
            power_kw: Some(15.0),
            ..s
        });
        let f = detect(&samples, 20.0).expect("detect");
        assert_eq!(f.confidence, 0.4);
    }
}
