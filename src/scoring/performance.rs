//! Efficiency, reliability and maintenance scores.
//!
//! Each score starts at 100 and loses the weight of every deduction rule
//! that fires, then is clamped to `[0, 100]`.

use std::fmt::Write as _;

use crate::config::defaults::{
    HOURS_PER_YEAR, MAINTENANCE_RUNTIME_HALF_YEAR_HOURS, RELIABILITY_VIBRATION_ELEVATED_MM_S,
    RELIABILITY_VIBRATION_HIGH_MM_S,
};
use crate::heuristics::{tally, WeightedRule};
use crate::stats::{self, Trend};
use crate::types::{
    Grade, Metric, PerformanceMetrics, PerformanceReport, PerformanceScores, Sample,
    TrendDirection,
};

const ENERGY_TREND_MIN: usize = 10;
const POWER_CREEP_MIN: usize = 20;

/// Window figures the deduction rules look at.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringFeatures {
    pub power_cv: f64,
    /// Only when pressure and flow have the same number of readings
    pub pressure_flow_r: Option<f64>,
    pub energy_trend: Trend,
    pub fault_rate: f64,
    pub alarm_rate: f64,
    pub vibration_mean: Option<f64>,
    pub vibration_std_dev: f64,
    pub maintenance_flagged: bool,
    pub runtime_hours: f64,
    /// Second-half vs first-half mean power (%)
    pub power_increase_pct: Option<f64>,
}

impl ScoringFeatures {
    pub fn extract(samples: &[Sample]) -> Self {
        let present = |metric: Metric| stats::present(&metric.series(samples));
        let n = samples.len().max(1) as f64;

        let powers = present(Metric::Power);
        let pressures = present(Metric::Pressure);
        let flows = present(Metric::FlowRate);
        let energy = present(Metric::Energy);
        let vibration = present(Metric::Vibration);

        let pressure_flow_r = (!pressures.is_empty() && pressures.len() == flows.len())
            .then(|| stats::pearson(&pressures, &flows).unwrap_or(0.0));

        let power_increase_pct = (powers.len() >= POWER_CREEP_MIN).then(|| {
            let (early, late) = powers.split_at(powers.len() / 2);
            let early = stats::mean(early);
            (stats::mean(late) - early) / early * 100.0
        });

        Self {
            power_cv: stats::coefficient_of_variation(&powers),
            pressure_flow_r,
            energy_trend: if energy.len() >= ENERGY_TREND_MIN {
                stats::analyze_trend(&energy)
            } else {
                Trend::STABLE
            },
            fault_rate: samples.iter().filter(|s| s.fault().is_some()).count() as f64 / n,
            alarm_rate: samples.iter().filter(|s| s.is_alarm()).count() as f64 / n,
            vibration_mean: (!vibration.is_empty()).then(|| stats::mean(&vibration)),
            vibration_std_dev: stats::std_dev(&vibration),
            maintenance_flagged: samples.iter().any(|s| s.maintenance_flag),
            runtime_hours: total_runtime_hours(samples),
            power_increase_pct: power_increase_pct.filter(|pct| pct.is_finite()),
        }
    }
}

type Deduction = WeightedRule<ScoringFeatures>;

fn efficiency_deductions() -> Vec<Deduction> {
    vec![
        Deduction::flat("power_volatile", 15.0, |f| f.power_cv > 0.2),
        Deduction::flat("power_variable", 8.0, |f| f.power_cv > 0.1 && f.power_cv <= 0.2),
        Deduction::flat("pressure_flow_mismatch", 10.0, |f| {
            f.pressure_flow_r.is_some_and(|r| r < 0.7)
        }),
        Deduction::flat("energy_rising", 20.0, |f| {
            f.energy_trend.is(TrendDirection::Increasing, 0.6)
        }),
    ]
}

fn reliability_deductions() -> Vec<Deduction> {
    vec![
        Deduction::scaled("fault_rate", 50.0, |f| f.fault_rate > 0.0, |f| f.fault_rate),
        Deduction::scaled("alarm_rate", 30.0, |f| f.alarm_rate > 0.0, |f| f.alarm_rate),
        Deduction::flat("vibration_high", 25.0, |f| {
            f.vibration_mean.is_some_and(|v| v > RELIABILITY_VIBRATION_HIGH_MM_S)
        }),
        Deduction::flat("vibration_elevated", 10.0, |f| {
            f.vibration_mean.is_some_and(|v| {
                v > RELIABILITY_VIBRATION_ELEVATED_MM_S && v <= RELIABILITY_VIBRATION_HIGH_MM_S
            })
        }),
        Deduction::flat("vibration_unstable", 15.0, |f| f.vibration_std_dev > 1.0),
    ]
}

fn maintenance_deductions() -> Vec<Deduction> {
    vec![
        Deduction::flat("maintenance_flag", 30.0, |f| f.maintenance_flagged),
        Deduction::flat("runtime_over_year", 20.0, |f| {
            f.runtime_hours > HOURS_PER_YEAR as f64
        }),
        Deduction::flat("runtime_over_half_year", 10.0, |f| {
            f.runtime_hours > MAINTENANCE_RUNTIME_HALF_YEAR_HOURS
                && f.runtime_hours <= HOURS_PER_YEAR as f64
        }),
        Deduction::flat("power_creep_high", 25.0, |f| {
            f.power_increase_pct.is_some_and(|pct| pct > 15.0)
        }),
        Deduction::flat("power_creep", 12.0, |f| {
            f.power_increase_pct.is_some_and(|pct| pct > 8.0 && pct <= 15.0)
        }),
    ]
}

#[derive(Debug)]
pub struct PerformanceScorer {
    efficiency: Vec<Deduction>,
    reliability: Vec<Deduction>,
    maintenance: Vec<Deduction>,
}

impl Default for PerformanceScorer {
    fn default() -> Self {
        Self {
            efficiency: efficiency_deductions(),
            reliability: reliability_deductions(),
            maintenance: maintenance_deductions(),
        }
    }
}

impl PerformanceScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scores, grade and raw figures for a window ordered by time.
    ///
    /// An empty window scores 0 across the board.
    pub fn evaluate(&self, samples: &[Sample]) -> PerformanceReport {
        if samples.is_empty() {
            return PerformanceReport {
                scores: PerformanceScores::default(),
                grade: Grade::Critical,
                metrics: PerformanceMetrics::default(),
            };
        }

        let features = ScoringFeatures::extract(samples);
        let scores = self.score(&features);

        PerformanceReport {
            scores,
            grade: Grade::from_score(scores.mean()),
            metrics: raw_metrics(samples, &features),
        }
    }

    pub fn score(&self, features: &ScoringFeatures) -> PerformanceScores {
        let apply = |rules: &[Deduction]| (100.0 - tally(rules, features).total).clamp(0.0, 100.0);
        PerformanceScores {
            efficiency: apply(self.efficiency.as_slice()),
            reliability: apply(self.reliability.as_slice()),
            maintenance: apply(self.maintenance.as_slice()),
        }
    }
}

fn total_runtime_hours(samples: &[Sample]) -> f64 {
    Metric::RuntimeMinutes.positive_values(samples).iter().sum::<f64>() / 60.0
}

fn raw_metrics(samples: &[Sample], features: &ScoringFeatures) -> PerformanceMetrics {
    let mean_positive = |metric: Metric| stats::mean(&metric.positive_values(samples));
    let vibration = Metric::Vibration.positive_values(samples);

    let pressure_flow_p_value = features.pressure_flow_r.map(|r| {
        let n = Metric::Pressure.series(samples).iter().flatten().count();
        stats::p_value_for_r(r, n)
    });

    PerformanceMetrics {
        startup_frequency: startup_frequency(samples),
        total_runtime_hours: features.runtime_hours,
        average_power_kw: mean_positive(Metric::Power),
        total_energy_kwh: Metric::Energy.positive_values(samples).iter().sum(),
        average_vibration: stats::mean(&vibration),
        max_vibration: stats::max(&vibration).unwrap_or(0.0),
        average_pressure_kpa: mean_positive(Metric::Pressure),
        average_flow_rate: mean_positive(Metric::FlowRate),
        pressure_flow_correlation: features.pressure_flow_r,
        pressure_flow_p_value,
    }
}

/// Starts per hour between the first and last sample.
fn startup_frequency(samples: &[Sample]) -> f64 {
    let starts = samples.iter().filter(|s| s.is_running()).count();
    let (Some(first), Some(last)) = (
        samples.iter().map(|s| s.timestamp).min(),
        samples.iter().map(|s| s.timestamp).max(),
    ) else {
        return 0.0;
    };
    let hours = (last - first).num_minutes() as f64 / 60.0;
    if starts == 0 || hours <= 0.0 {
        0.0
    } else {
        starts as f64 / hours
    }
}

/// Plain-text performance summary for operators.
pub fn render(report: &PerformanceReport) -> String {
    let m = &report.metrics;
    let s = &report.scores;
    let mut out = String::new();
    let _ = writeln!(out, "=== Pump Performance Report ===");
    let _ = writeln!(out, "Start frequency:   {:.2} /h", m.startup_frequency);
    let _ = writeln!(out, "Total runtime:     {:.1} h", m.total_runtime_hours);
    let _ = writeln!(out, "Average power:     {:.2} kW", m.average_power_kw);
    let _ = writeln!(out, "Total energy:      {:.2} kWh", m.total_energy_kwh);
    let _ = writeln!(
        out,
        "Vibration:         {:.2} mm/s avg, {:.2} mm/s max",
        m.average_vibration, m.max_vibration
    );
    let _ = writeln!(out, "Average pressure:  {:.1} kPa", m.average_pressure_kpa);
    let _ = writeln!(out, "Average flow:      {:.1} m3/h", m.average_flow_rate);
    if let (Some(r), Some(p)) = (m.pressure_flow_correlation, m.pressure_flow_p_value) {
        let _ = writeln!(out, "Pressure/flow r:   {r:.3} (p={p:.4})");
    }
    for (label, score) in [
        ("Efficiency", s.efficiency),
        ("Reliability", s.reliability),
        ("Maintenance", s.maintenance),
    ] {
        let _ = writeln!(out, "{label:<12}       {score:.1}/100 {}", Grade::from_score(score));
    }
    let _ = writeln!(out, "Overall:           {:.1}/100 {}", s.mean(), report.grade);
    out
}
