//! Window features consumed by the component rules.
//!
//! Everything the rules look at is computed once per window so that each
//! rule stays a cheap predicate. Gated features (trends and dispersions that
//! need a minimum number of readings) fall back to neutral values.

use crate::config::defaults::HOURS_PER_YEAR;
use crate::stats::{self, Trend};
use crate::types::{Metric, Sample, TrendDirection};

/// Readings needed before the vibration trend is trusted.
const VIBRATION_TREND_MIN: usize = 10;
/// Readings needed for pressure and flow dispersion/trends.
const HYDRAULIC_MIN: usize = 5;
/// Pressure readings needed for the power-rise/pressure-fall signature (exclusive).
const EFFICIENCY_SIGNATURE_MIN: usize = 10;
/// Readings needed for the seal pressure-fluctuation check.
const SEAL_PRESSURE_MIN: usize = 10;
/// Start events needed for the start-interval dispersion.
const START_INTERVAL_MIN: usize = 10;

/// Rated current when no current readings exist (A).
const FALLBACK_RATED_CURRENT: f64 = 10.0;
/// Rated current as a multiple of the median draw.
const RATED_CURRENT_FACTOR: f64 = 1.2;

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceFeatures {
    // Motor
    pub current_mean: Option<f64>,
    pub current_cv: f64,
    pub rated_current: f64,
    pub water_temp_max: Option<f64>,
    pub water_temp_mean: Option<f64>,

    // Bearing
    pub vibration_readings: usize,
    pub vibration_max: Option<f64>,
    pub vibration_std_dev: f64,
    pub vibration_trend: Trend,
    pub vibration_outlier_ratio: f64,

    // Impeller
    pub pressure_readings: usize,
    /// Only set with at least five readings
    pub pressure_cv: Option<f64>,
    pub pressure_trend: Trend,
    pub flow_trend: Trend,
    /// Power rising while pressure falls
    pub efficiency_loss_signature: bool,

    // Seal
    pub seal_pressure_cv: Option<f64>,
    pub runtime_hours: u64,

    // Control system
    pub start_interval_cv: Option<f64>,
    /// Share of fault codes that point at the control system
    pub control_fault_share: f64,
}

impl DeviceFeatures {
    pub fn extract(samples: &[Sample]) -> Self {
        let present = |metric: Metric| stats::present(&metric.series(samples));

        let currents = present(Metric::Current);
        let temps = present(Metric::WaterTemp);
        let vibration = present(Metric::Vibration);
        let pressures = present(Metric::Pressure);
        let flows = present(Metric::FlowRate);
        let powers = present(Metric::Power);

        let rated_current = if currents.is_empty() {
            FALLBACK_RATED_CURRENT
        } else {
            stats::median(&currents) * RATED_CURRENT_FACTOR
        };

        let vibration_outlier_ratio = if vibration.is_empty() {
            0.0
        } else {
            stats::detect_outliers(&vibration).len() as f64 / vibration.len() as f64
        };

        let hydraulic = pressures.len() >= HYDRAULIC_MIN;
        let pressure_trend = if hydraulic {
            stats::analyze_trend(&pressures)
        } else {
            Trend::STABLE
        };
        let flow_trend = if flows.len() >= HYDRAULIC_MIN {
            stats::analyze_trend(&flows)
        } else {
            Trend::STABLE
        };

        let efficiency_loss_signature = !powers.is_empty()
            && pressures.len() > EFFICIENCY_SIGNATURE_MIN
            && stats::analyze_trend(&powers).direction == TrendDirection::Increasing
            && stats::analyze_trend(&pressures).direction == TrendDirection::Decreasing;

        Self {
            current_mean: (!currents.is_empty()).then(|| stats::mean(&currents)),
            current_cv: stats::coefficient_of_variation(&currents),
            rated_current,
            water_temp_max: stats::max(&temps),
            water_temp_mean: (!temps.is_empty()).then(|| stats::mean(&temps)),

            vibration_readings: vibration.len(),
            vibration_max: stats::max(&vibration),
            vibration_std_dev: stats::std_dev(&vibration),
            vibration_trend: if vibration.len() >= VIBRATION_TREND_MIN {
                stats::analyze_trend(&vibration)
            } else {
                Trend::STABLE
            },
            vibration_outlier_ratio,

            pressure_readings: pressures.len(),
            pressure_cv: hydraulic.then(|| stats::coefficient_of_variation(&pressures)),
            pressure_trend,
            flow_trend,
            efficiency_loss_signature,

            seal_pressure_cv: (pressures.len() >= SEAL_PRESSURE_MIN)
                .then(|| stats::coefficient_of_variation(&pressures)),
            runtime_hours: runtime_hours(samples),

            start_interval_cv: start_interval_cv(samples),
            control_fault_share: control_fault_share(samples),
        }
    }

    /// Whole years of cumulative runtime.
    pub fn runtime_years(&self) -> u64 {
        self.runtime_hours / HOURS_PER_YEAR
    }
}

/// `Σ ⌊runtime minutes⌋ / 60`, in whole hours.
fn runtime_hours(samples: &[Sample]) -> u64 {
    let minutes: i64 = samples
        .iter()
        .filter_map(|s| Metric::RuntimeMinutes.read(s))
        .map(|m| m.trunc() as i64)
        .sum();
    u64::try_from(minutes / 60).unwrap_or(0)
}

/// Dispersion of whole-minute gaps between start events.
fn start_interval_cv(samples: &[Sample]) -> Option<f64> {
    let mut starts: Vec<_> = samples
        .iter()
        .filter(|s| s.is_running())
        .map(|s| s.timestamp)
        .collect();
    if starts.len() < START_INTERVAL_MIN {
        return None;
    }
    starts.sort();

    let intervals: Vec<f64> = starts
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).num_minutes() as f64)
        .collect();
    Some(stats::coefficient_of_variation(&intervals))
}

fn control_fault_share(samples: &[Sample]) -> f64 {
    let codes: Vec<&str> = samples.iter().filter_map(Sample::fault).collect();
    if codes.is_empty() {
        return 0.0;
    }
    // "CTRL" is covered by the "C" prefix
    let control = codes.iter().filter(|code| code.starts_with('C')).count();
    control as f64 / codes.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::window;

    #[test]
    fn test_runtime_hours_truncate() {
        // 3 × 59.9 min → 3 × 59 = 177 min → 2 h
        let samples = window(3, 60, |_, s| Sample {
            runtime_minutes: Some(59.9),
            ..s
        });
        assert_eq!(runtime_hours(&samples), 2);
    }

    #[test]
    fn test_control_fault_share() {
        let codes = ["CTRL-01", "C7", "E1", "  ", "M4"];
        let samples = window(codes.len(), 10, |i, s| Sample {
            fault_code: Some(codes[i].to_string()),
            ..s
        });
        assert!((control_fault_share(&samples) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_gated_trends_stay_stable_on_short_windows() {
        let samples = window(8, 10, |i, s| Sample {
            vibration_mm_s: Some(1.0 + i as f64),
            water_pressure_kpa: Some(300.0 - 10.0 * i as f64),
            ..s
        });
        let f = DeviceFeatures::extract(&samples);
        assert_eq!(f.vibration_trend, Trend::STABLE);
        assert_eq!(f.pressure_trend.direction, TrendDirection::Decreasing);
        assert!(f.seal_pressure_cv.is_none());
        assert!(!f.efficiency_loss_signature);
        assert!(f.start_interval_cv.is_none());
    }
}
