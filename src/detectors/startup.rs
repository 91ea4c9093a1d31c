//! Pump start frequency.

use std::collections::BTreeMap;

use super::{check_threshold, finite, volume_confidence, DetectorError};
use crate::types::{AnalysisType, Finding, Sample, Severity, TrendDirection};

const INSUFFICIENT_CONFIDENCE: f64 = 0.5;

/// Starts per hour over the window compared with `threshold`.
///
/// A start is any sample with `pump_status == 1`. The window length is the
/// span between the first and last sample, in whole minutes.
pub fn detect(samples: &[Sample], threshold: f64) -> Result<Finding, DetectorError> {
    let mut starts: Vec<_> = samples
        .iter()
        .filter(|s| s.is_running())
        .map(|s| s.timestamp)
        .collect();
    starts.sort();

    if starts.len() < 2 {
        return Ok(Finding::insufficient(
            AnalysisType::StartupFrequency,
            INSUFFICIENT_CONFIDENCE,
            "Fewer than two pump start events, start frequency not assessed",
            threshold.is_finite().then_some(threshold),
        ));
    }

    let threshold = check_threshold(threshold)?;

    let (Some(first), Some(last)) = (
        samples.iter().map(|s| s.timestamp).min(),
        samples.iter().map(|s| s.timestamp).max(),
    ) else {
        return Err(DetectorError::NonFinite("window span"));
    };
    let hours = (last - first).num_minutes() as f64 / 60.0;
    if hours <= 0.0 {
        return Ok(Finding::insufficient(
            AnalysisType::StartupFrequency,
            INSUFFICIENT_CONFIDENCE,
            "Window spans less than a minute, start frequency not assessed",
            Some(threshold),
        ));
    }

    let events = starts.len();
    let frequency = finite("start frequency", events as f64 / hours)?;
    let deviation = (frequency - threshold) / threshold * 100.0;
    let severity = Severity::from_deviation_pct(deviation);

    let avg_interval_minutes = starts
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).num_seconds() as f64 / 60.0)
        .sum::<f64>()
        / (events - 1) as f64;

    let mut detailed_metrics = BTreeMap::new();
    detailed_metrics.insert("total_start_events".to_string(), events as f64);
    detailed_metrics.insert("time_window_hours".to_string(), hours);
    detailed_metrics.insert("avg_interval_minutes".to_string(), avg_interval_minutes);

    Ok(Finding {
        analysis_type: AnalysisType::StartupFrequency,
        severity,
        confidence: volume_confidence(0.6, 0.01, events, 0.9),
        description: format!(
            "{frequency:.2} starts/h against a limit of {threshold:.2} ({deviation:+.1}%)"
        ),
        detected_value: Some(frequency),
        expected_value: Some(threshold),
        deviation_pct: Some(deviation),
        trend: if deviation > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Decreasing
        },
        detailed_metrics,
        recommendations: recommendations(deviation, severity),
    })
}

fn recommendations(deviation: f64, severity: Severity) -> Vec<String> {
    let mut recs: Vec<String> = if deviation > 0.0 {
        vec![
            "Review pump control settings and start/stop logic".into(),
            "Check the pipework for leaks or pressure instability".into(),
            "Consider a pressure accumulator to reduce start frequency".into(),
        ]
    } else {
        vec![
            "Confirm the pump is operating normally".into(),
            "Verify that downstream demand is as expected".into(),
            "Check control signal transmission".into(),
        ]
    };
    if severity >= Severity::Error {
        recs.push("Arrange an immediate inspection by a qualified technician".into());
    }
    recs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::window;

    #[test]
    fn test_fewer_than_two_starts_is_informational() {
        let samples = window(20, 5, |i, s| Sample {
            pump_status: Some(u8::from(i == 3)),
            ..s
        });
        for threshold in [10.0, 0.1, 1_000.0, -3.0] {
            let f = detect(&samples, threshold).expect("never fails on thin data");
            assert_eq!(f.severity, Severity::Info);
            assert_eq!(f.confidence, 0.5);
            assert!(f.recommendations.is_empty());
        }
    }

    #[test]
    fn test_frequent_starts_are_critical() {
        // 13 samples over one hour, all running: 13 starts/h vs limit 5
        let samples = window(13, 5, |_, s| Sample {
            pump_status: Some(1),
            ..s
        });
        let f = detect(&samples, 5.0).expect("detect");
        assert!((f.detected_value.unwrap_or_default() - 13.0).abs() < 1e-9);
        assert_eq!(f.severity, Severity::Critical);
        assert_eq!(f.trend, TrendDirection::Increasing);
        assert!(f.recommendations.len() == 4, "{:?}", f.recommendations);
        assert!((f.confidence - 0.73).abs() < 1e-9, "confidence: {}", f.confidence);
    }

    #[test]
    fn test_infrequent_starts_trend_down() {
        // 3 starts over two hours = 1.5/h vs limit 10
        let samples = window(25, 5, |i, s| Sample {
            pump_status: Some(u8::from(i % 10 == 0)),
            ..s
        });
        let f = detect(&samples, 10.0).expect("detect");
        assert_eq!(f.trend, TrendDirection::Decreasing);
        assert_eq!(f.detailed_metrics["total_start_events"], 3.0);
        assert!((f.detailed_metrics["avg_interval_minutes"] - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_threshold_errors_when_data_is_sufficient() {
        let samples = window(5, 5, |_, s| Sample {
            pump_status: Some(1),
            ..s
        });
        assert_eq!(detect(&samples, 0.0), Err(DetectorError::InvalidThreshold(0.0)));
    }
}
