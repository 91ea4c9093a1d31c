//! Maintenance Advisor
//!
//! Turns findings, the failure prediction, performance scores and the raw
//! operating history into a prioritised [`MaintenancePlan`].
//!
//! ## Buckets
//!
//! | Bucket     | Filled by                                                      |
//! |------------|----------------------------------------------------------------|
//! | urgent     | severity 4 findings, probability > 0.8, RUL < 7 d, peak vibration |
//! | scheduled  | severity 3 findings, probability > 0.6, RUL < 30 d, rapid degradation, low reliability |
//! | preventive | severity 2 findings, moderate degradation, low efficiency, history |
//! | monitoring | vibration watch items and baseline housekeeping (not costed)    |
//!
//! Every bucket is de-duplicated in first-seen order before costing.

use std::collections::HashSet;
use std::fmt::Write as _;

use chrono::{DateTime, Datelike, Duration, Utc};
use tracing::debug;

use crate::config::defaults::{
    PREVENTIVE_ACTION_COST, PREVENTIVE_OFFSET_DAYS, SCHEDULED_ACTION_COST,
    SCHEDULED_OFFSET_DAYS, URGENT_ACTION_COST, VIBRATION_STOP_MM_S,
};
use crate::types::{
    AnalysisType, DegradationTrend, Finding, MaintenancePlan, Metric, PerformanceReport,
    Prediction, Sample, Severity,
};

/// Peak vibration (mm/s) that calls for an immediate bearing check.
const PEAK_VIBRATION_MM_S: f64 = 4.5;
/// Mean vibration (mm/s) that calls for closer monitoring.
const ELEVATED_VIBRATION_MM_S: f64 = 3.0;
/// Distinct calendar months that justify a seasonal plan.
const SEASONAL_MONTHS: usize = 6;

#[derive(Debug, Default)]
struct Buckets {
    urgent: Vec<String>,
    scheduled: Vec<String>,
    preventive: Vec<String>,
    monitoring: Vec<String>,
}

fn push_all(bucket: &mut Vec<String>, items: &[&str]) {
    bucket.extend(items.iter().map(|s| (*s).to_string()));
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MaintenanceAdvisor;

impl MaintenanceAdvisor {
    pub fn new() -> Self {
        Self
    }

    pub fn advise(
        &self,
        samples: &[Sample],
        findings: &[Finding],
        prediction: &Prediction,
        performance: &PerformanceReport,
        now: DateTime<Utc>,
    ) -> MaintenancePlan {
        let mut b = Buckets::default();

        from_findings(findings, &mut b);
        from_prediction(prediction, &mut b);
        from_performance(performance, &mut b);
        from_history(samples, &mut b);

        for bucket in [&mut b.urgent, &mut b.scheduled, &mut b.preventive, &mut b.monitoring] {
            dedup_in_order(bucket);
        }

        let estimated_cost = b.urgent.len() as f64 * URGENT_ACTION_COST
            + b.scheduled.len() as f64 * SCHEDULED_ACTION_COST
            + b.preventive.len() as f64 * PREVENTIVE_ACTION_COST;

        let recommended_time = recommended_time(&b, prediction.remaining_useful_life_days, now);

        debug!(
            urgent = b.urgent.len(),
            scheduled = b.scheduled.len(),
            preventive = b.preventive.len(),
            estimated_cost,
            "Maintenance plan built"
        );

        MaintenancePlan {
            urgent: b.urgent,
            scheduled: b.scheduled,
            preventive: b.preventive,
            monitoring: b.monitoring,
            estimated_cost,
            recommended_time,
        }
    }
}

// ============================================================================
// Sources
// ============================================================================

fn from_findings(findings: &[Finding], b: &mut Buckets) {
    for f in findings {
        match f.severity {
            Severity::Critical => b.urgent.extend(urgent_actions(f)),
            Severity::Error => b.scheduled.extend(scheduled_actions(f.analysis_type)),
            Severity::Warning => b.preventive.extend(preventive_actions(f.analysis_type)),
            Severity::Info => {}
        }
        let target = if f.severity >= Severity::Error {
            &mut b.scheduled
        } else {
            &mut b.preventive
        };
        target.extend(f.recommendations.iter().cloned());
    }
}

fn urgent_actions(f: &Finding) -> Vec<String> {
    let deviation = f.deviation_pct.map_or(0.0, f64::abs);
    let actions: &[&str] = match f.analysis_type {
        AnalysisType::Vibration if f.detected_value.is_some_and(|v| v > VIBRATION_STOP_MM_S) => &[
            "Stop the pump immediately, vibration far beyond limits",
            "Inspect bearings, impeller and foundation bolts",
            "Call in a qualified maintenance technician",
        ],
        AnalysisType::StartupFrequency if deviation > 50.0 => &[
            "Start frequency is abnormal, inspect the control system now",
            "Check pipework and pressure set points",
        ],
        AnalysisType::Power if deviation > 30.0 => &[
            "Power draw severely abnormal, inspect motor and load",
            "Check supply voltage and current",
        ],
        AnalysisType::Vibration | AnalysisType::StartupFrequency | AnalysisType::Power => &[],
        _ => &["Severe anomaly, carry out a full inspection immediately"],
    };
    actions.iter().map(|s| (*s).to_string()).collect()
}

fn scheduled_actions(analysis_type: AnalysisType) -> Vec<String> {
    let actions: &[&str] = match analysis_type {
        AnalysisType::Vibration => &[
            "Schedule vibration analysis and dynamic balancing",
            "Check bearing lubrication",
        ],
        AnalysisType::Runtime => &[
            "Review pump operating parameters",
            "Analyse the cause of load changes",
        ],
        AnalysisType::EnergyTrend => &[
            "Carry out an energy audit",
            "Check impeller and casing efficiency",
        ],
        _ => &["Schedule a detailed inspection"],
    };
    actions.iter().map(|s| (*s).to_string()).collect()
}

fn preventive_actions(analysis_type: AnalysisType) -> Vec<String> {
    let actions: &[&str] = match analysis_type {
        AnalysisType::EnergyTrend => &[
            "Track the energy consumption trend",
            "Draw up an energy saving plan",
        ],
        _ => &["Increase routine monitoring and record keeping"],
    };
    actions.iter().map(|s| (*s).to_string()).collect()
}

fn from_prediction(p: &Prediction, b: &mut Buckets) {
    if p.failure_probability > 0.8 {
        push_all(
            &mut b.urgent,
            &[
                "Failure probability very high, stop for overhaul",
                "Request a full inspection by a specialist",
            ],
        );
    } else if p.failure_probability > 0.6 {
        push_all(
            &mut b.scheduled,
            &[
                "Failure probability high, schedule a detailed inspection",
                "Prepare the necessary spare parts",
            ],
        );
    }

    if p.remaining_useful_life_days < 7 {
        b.urgent
            .push("Less than 7 days of useful life left, replace or overhaul now".to_string());
    } else if p.remaining_useful_life_days < 30 {
        b.scheduled
            .push("Less than 30 days of useful life left, plan a replacement".to_string());
    }

    match p.degradation_trend {
        DegradationTrend::RapidDegradation => push_all(
            &mut b.scheduled,
            &[
                "Performance degrading rapidly, perform an in-depth inspection",
                "Analyse the degradation cause and plan targeted maintenance",
            ],
        ),
        DegradationTrend::ModerateDegradation => push_all(
            &mut b.preventive,
            &[
                "Performance degrading moderately, increase monitoring frequency",
                "Prepare a preventive maintenance plan",
            ],
        ),
        _ => {}
    }
}

fn from_performance(report: &PerformanceReport, b: &mut Buckets) {
    let s = &report.scores;
    let m = &report.metrics;

    if s.efficiency < 60.0 {
        push_all(
            &mut b.preventive,
            &[
                "Efficiency score low, optimise for energy saving",
                "Check impeller and casing wear",
                "Optimise operating parameters",
            ],
        );
    } else if s.efficiency < 80.0 {
        b.preventive
            .push("Efficiency score fair, watch energy consumption".to_string());
    }

    if s.reliability < 60.0 {
        push_all(
            &mut b.scheduled,
            &[
                "Reliability score low, schedule a full inspection",
                "Check the condition of key components",
            ],
        );
    } else if s.reliability < 80.0 {
        b.preventive
            .push("Reliability score fair, strengthen monitoring".to_string());
    }

    if s.maintenance < 50.0 {
        b.scheduled
            .push("Maintenance need is high, schedule preventive maintenance".to_string());
    }

    if m.max_vibration > PEAK_VIBRATION_MM_S {
        b.urgent
            .push("Vibration exceeds limits, check bearings and alignment now".to_string());
    } else if m.average_vibration > ELEVATED_VIBRATION_MM_S {
        push_all(
            &mut b.monitoring,
            &[
                "Vibration elevated, install a vibration monitor",
                "Run periodic vibration analysis",
            ],
        );
    }

    if m.average_power_kw > 0.0 {
        push_all(
            &mut b.monitoring,
            &["Monitor the power trend", "Establish an energy baseline"],
        );
    }

    push_all(
        &mut b.monitoring,
        &[
            "Keep an equipment health record",
            "Log operating parameters regularly",
            "Configure anomaly alert thresholds",
        ],
    );
}

fn from_history(samples: &[Sample], b: &mut Buckets) {
    if let (Some(first), Some(last)) = (samples.first(), samples.last()) {
        let days = (last.timestamp - first.timestamp).num_days();
        if days > 0 {
            let runtime_hours: f64 = samples
                .iter()
                .filter_map(|s| Metric::RuntimeMinutes.read(s))
                .sum::<f64>()
                / 60.0;
            let daily = runtime_hours / days as f64;
            if daily > 20.0 {
                b.preventive
                    .push("Heavy duty cycle, increase maintenance frequency".to_string());
            } else if daily < 2.0 {
                b.preventive
                    .push("Low utilisation, run the pump periodically".to_string());
            }
        }
    }

    if samples.iter().any(|s| s.maintenance_flag) {
        b.scheduled
            .push("Maintenance flag raised, follow up".to_string());
    }
    if samples.iter().any(|s| s.fault().is_some()) {
        b.scheduled.push(
            "Analyse historical fault patterns and plan targeted maintenance".to_string(),
        );
    }

    let months: HashSet<(i32, u32)> = samples
        .iter()
        .filter(|s| Metric::Power.read(s).is_some())
        .map(|s| (s.timestamp.year(), s.timestamp.month()))
        .collect();
    if months.len() >= SEASONAL_MONTHS {
        push_all(
            &mut b.preventive,
            &[
                "Establish a seasonal maintenance plan",
                "Adjust operating parameters with the seasons",
            ],
        );
    }
}

// ============================================================================
// Plan assembly
// ============================================================================

fn dedup_in_order(items: &mut Vec<String>) {
    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}

fn recommended_time(b: &Buckets, rul_days: u32, now: DateTime<Utc>) -> DateTime<Utc> {
    if !b.urgent.is_empty() {
        now
    } else if rul_days < 30 {
        now + Duration::days(i64::from(rul_days / 2))
    } else if !b.scheduled.is_empty() {
        now + Duration::days(SCHEDULED_OFFSET_DAYS)
    } else {
        now + Duration::days(PREVENTIVE_OFFSET_DAYS)
    }
}

/// Numbered plain-text plan for operators.
pub fn render(plan: &MaintenancePlan) -> String {
    let mut out = String::from("=== Maintenance Plan ===\n");
    for (title, items) in [
        ("Urgent", &plan.urgent),
        ("Scheduled", &plan.scheduled),
        ("Preventive", &plan.preventive),
        ("Monitoring", &plan.monitoring),
    ] {
        if items.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n[{title}]");
        for (i, item) in items.iter().enumerate() {
            let _ = writeln!(out, "{}. {item}", i + 1);
        }
    }
    let _ = writeln!(out, "\nEstimated cost: {:.2}", plan.estimated_cost);
    let _ = writeln!(
        out,
        "Recommended time: {}",
        plan.recommended_time.format("%Y-%m-%d %H:%M")
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::{t0, window};
    use crate::types::{Grade, PerformanceMetrics, PerformanceScores, TrendDirection};
    use std::collections::BTreeMap;

    fn prediction(p: f64, rul: u32, trend: DegradationTrend) -> Prediction {
        Prediction {
            component_probabilities: BTreeMap::new(),
            failure_probability: p,
            remaining_useful_life_days: rul,
            predicted_failure_time: t0(),
            degradation_trend: trend,
            forecast: BTreeMap::new(),
            confidence_intervals: BTreeMap::new(),
            confidence: 0.8,
        }
    }

    fn performance(efficiency: f64, reliability: f64, maintenance: f64) -> PerformanceReport {
        let scores = PerformanceScores {
            efficiency,
            reliability,
            maintenance,
        };
        PerformanceReport {
            scores,
            grade: Grade::from_score(scores.mean()),
            metrics: PerformanceMetrics::default(),
        }
    }

    fn finding(analysis_type: AnalysisType, severity: Severity, recs: &[&str]) -> Finding {
        Finding {
            analysis_type,
            severity,
            confidence: 0.9,
            description: String::new(),
            detected_value: None,
            expected_value: None,
            deviation_pct: None,
            trend: TrendDirection::Stable,
            detailed_metrics: BTreeMap::new(),
            recommendations: recs.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    #[test]
    fn test_quiet_device_gets_preventive_window() {
        let plan = MaintenanceAdvisor::new().advise(
            &[],
            &[],
            &prediction(0.05, 56, DegradationTrend::Stable),
            &performance(100.0, 100.0, 100.0),
            t0(),
        );
        assert!(plan.urgent.is_empty() && plan.scheduled.is_empty());
        assert!(plan.preventive.is_empty());
        assert_eq!(plan.estimated_cost, 0.0);
        assert_eq!(plan.monitoring.len(), 3);
        assert_eq!(plan.recommended_time, t0() + Duration::days(22));
    }

    #[test]
    fn test_findings_fill_buckets_by_severity() {
        let findings = [
            finding(AnalysisType::Runtime, Severity::Error, &["Check the load"]),
            finding(AnalysisType::EnergyTrend, Severity::Warning, &["Tune parameters"]),
            finding(AnalysisType::AnomalyClassification, Severity::Critical, &[]),
        ];
        let plan = MaintenanceAdvisor::new().advise(
            &[],
            &findings,
            &prediction(0.1, 56, DegradationTrend::Stable),
            &performance(100.0, 100.0, 100.0),
            t0(),
        );
        assert_eq!(plan.urgent.len(), 1);
        // two runtime templates + finding recommendation
        assert_eq!(plan.scheduled.len(), 3);
        assert_eq!(plan.scheduled[2], "Check the load");
        assert_eq!(plan.preventive.len(), 3);
        assert_eq!(plan.estimated_cost, 5_000.0 + 3.0 * 2_000.0 + 3.0 * 500.0);
        assert_eq!(plan.recommended_time, t0());
    }

    #[test]
    fn test_short_rul_halves_offset() {
        let plan = MaintenanceAdvisor::new().advise(
            &[],
            &[],
            &prediction(0.3, 14, DegradationTrend::Stable),
            &performance(100.0, 100.0, 100.0),
            t0(),
        );
        assert_eq!(plan.scheduled.len(), 1);
        assert_eq!(plan.recommended_time, t0() + Duration::days(7));
    }

    #[test]
    fn test_scheduled_only_uses_fixed_offset() {
        let plan = MaintenanceAdvisor::new().advise(
            &[],
            &[],
            &prediction(0.65, 56, DegradationTrend::RapidDegradation),
            &performance(100.0, 100.0, 40.0),
            t0(),
        );
        assert_eq!(plan.scheduled.len(), 5);
        assert_eq!(plan.recommended_time, t0() + Duration::days(10));
    }

    #[test]
    fn test_duplicates_are_removed_in_order() {
        let findings = [
            finding(AnalysisType::Power, Severity::Warning, &["Check meter", "Check meter"]),
            finding(AnalysisType::Vibration, Severity::Warning, &["Check meter"]),
        ];
        let plan = MaintenanceAdvisor::new().advise(
            &[],
            &findings,
            &prediction(0.1, 56, DegradationTrend::Stable),
            &performance(100.0, 100.0, 100.0),
            t0(),
        );
        assert_eq!(
            plan.preventive,
            vec![
                "Increase routine monitoring and record keeping".to_string(),
                "Check meter".to_string()
            ]
        );
    }

    #[test]
    fn test_history_rules() {
        // 3 days, 23 h/day runtime, one fault, one maintenance flag
        let samples = window(4, 24 * 60, |i, s| Sample {
            runtime_minutes: Some(if i == 0 { 0.0 } else { 23.0 * 60.0 }),
            fault_code: (i == 2).then(|| "E9".to_string()),
            maintenance_flag: i == 1,
            ..s
        });
        let plan = MaintenanceAdvisor::new().advise(
            &samples,
            &[],
            &prediction(0.1, 56, DegradationTrend::Stable),
            &performance(100.0, 100.0, 100.0),
            t0(),
        );
        assert_eq!(plan.preventive.len(), 1, "{:?}", plan.preventive);
        assert_eq!(plan.scheduled.len(), 2);
    }

    #[test]
    fn test_render_lists_sections() {
        let plan = MaintenanceAdvisor::new().advise(
            &[],
            &[],
            &prediction(0.9, 1, DegradationTrend::Stable),
            &performance(100.0, 100.0, 100.0),
            t0(),
        );
        let text = render(&plan);
        assert!(text.contains("[Urgent]"), "{text}");
        assert!(text.contains("1. Failure probability very high"));
        assert!(!text.contains("[Preventive]"));
    }
}
