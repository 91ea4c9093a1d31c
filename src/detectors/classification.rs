//! Share of samples that carry a fault code or a raised alarm.

use std::collections::BTreeMap;

use super::DetectorError;
use crate::types::{AnalysisType, Finding, Sample, Severity, TrendDirection};

const INSUFFICIENT_CONFIDENCE: f64 = 0.3;
const CONFIDENCE: f64 = 0.8;
/// Anomaly rate (%) considered normal.
const EXPECTED_RATE: f64 = 5.0;

pub fn detect(samples: &[Sample]) -> Result<Finding, DetectorError> {
    if samples.is_empty() {
        return Ok(Finding::insufficient(
            AnalysisType::AnomalyClassification,
            INSUFFICIENT_CONFIDENCE,
            "No samples to classify",
            Some(EXPECTED_RATE),
        ));
    }

    let n = samples.len() as f64;
    let faults = samples.iter().filter(|s| s.fault().is_some()).count();
    let alarms = samples.iter().filter(|s| s.is_alarm()).count();
    let rate = (faults + alarms) as f64 / n * 100.0;

    let severity = if rate > 20.0 {
        Severity::Critical
    } else if rate > 10.0 {
        Severity::Error
    } else if rate > 5.0 {
        Severity::Warning
    } else {
        Severity::Info
    };

    let mut detailed_metrics = BTreeMap::new();
    detailed_metrics.insert("fault_count".to_string(), faults as f64);
    detailed_metrics.insert("alarm_count".to_string(), alarms as f64);
    detailed_metrics.insert("anomaly_rate".to_string(), rate);

    let mut recommendations = Vec::new();
    if faults > 0 {
        recommendations.push("Review recorded fault codes".to_string());
    }
    if alarms > 0 {
        recommendations.push("Investigate the source of raised alarms".to_string());
    }

    Ok(Finding {
        analysis_type: AnalysisType::AnomalyClassification,
        severity,
        confidence: CONFIDENCE,
        description: format!("{faults} faulted and {alarms} alarmed samples ({rate:.1}%)"),
        detected_value: Some(rate),
        expected_value: Some(EXPECTED_RATE),
        deviation_pct: Some((rate - EXPECTED_RATE) / EXPECTED_RATE * 100.0),
        trend: TrendDirection::Stable,
        detailed_metrics,
        recommendations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::window;

    #[test]
    fn test_rate_counts_faults_and_alarms() {
        let samples = window(20, 10, |i, s| Sample {
            fault_code: (i < 2).then(|| "E12".to_string()),
            alarm_level: Some(if i == 10 { 2 } else { 1 }),
            ..s
        });
        let f = detect(&samples).expect("detect");
        assert!((f.detected_value.unwrap_or_default() - 15.0).abs() < 1e-9);
        assert_eq!(f.severity, Severity::Error);
        assert_eq!(f.recommendations.len(), 2);
    }

    #[test]
    fn test_blank_fault_code_is_ignored() {
        let samples = window(4, 10, |_, s| Sample {
            fault_code: Some("  ".to_string()),
            ..s
        });
        let f = detect(&samples).expect("detect");
        assert_eq!(f.severity, Severity::Info);
        assert_eq!(f.detected_value, Some(0.0));
    }

    #[test]
    fn test_empty_window() {
        let f = detect(&[]).expect("detect");
        assert_eq!(f.confidence, 0.3);
    }
}
