//! One-step-ahead forecasts and the efficiency degradation trend.

use std::collections::BTreeMap;

use crate::config::defaults::FORECAST_INTERVAL_FRACTION;
use crate::stats;
use crate::types::{DegradationTrend, Interval, Metric, Sample, TrendDirection};

/// Metrics forecast for every device.
pub const FORECAST_METRICS: [Metric; 3] = [Metric::Power, Metric::Vibration, Metric::Energy];

const MIN_REGRESSION_POINTS: usize = 3;
const MIN_EFFICIENCY_POINTS: usize = 5;

/// Linear extrapolation of the last `points` values to the next index.
///
/// With fewer than three values the mean is returned instead.
pub fn next_value(values: &[f64], points: usize) -> f64 {
    if values.len() < MIN_REGRESSION_POINTS {
        return stats::mean(values);
    }
    let k = points.clamp(MIN_REGRESSION_POINTS, values.len());
    let recent = &values[values.len() - k..];
    stats::index_regression(recent).predict(k as f64)
}

/// Fixed ±10% band around a forecast.
pub fn interval(forecast: f64) -> Interval {
    let half = forecast * FORECAST_INTERVAL_FRACTION;
    Interval {
        low: forecast - half,
        high: forecast + half,
    }
}

/// Forecasts and intervals keyed by [`Metric::key`].
pub fn forecast_metrics(
    samples: &[Sample],
    points: usize,
) -> (BTreeMap<String, f64>, BTreeMap<String, Interval>) {
    let mut forecast = BTreeMap::new();
    let mut intervals = BTreeMap::new();
    for metric in FORECAST_METRICS {
        let values = stats::present(&metric.series(samples));
        if values.is_empty() {
            continue;
        }
        let next = next_value(&values, points);
        forecast.insert(metric.key().to_string(), next);
        intervals.insert(metric.key().to_string(), interval(next));
    }
    (forecast, intervals)
}

/// Trend of the `pressure / power` ratio across the window.
pub fn degradation_trend(samples: &[Sample]) -> DegradationTrend {
    let efficiency: Vec<f64> = samples
        .iter()
        .filter_map(|s| {
            let pressure = Metric::Pressure.read(s).filter(|p| *p > 0.0)?;
            let power = Metric::Power.read(s).filter(|p| *p > 0.0)?;
            Some(pressure / power)
        })
        .collect();

    if efficiency.len() < MIN_EFFICIENCY_POINTS {
        return DegradationTrend::InsufficientData;
    }

    let trend = stats::analyze_trend(&efficiency);
    match trend.direction {
        TrendDirection::Decreasing if trend.strength > 0.8 => DegradationTrend::RapidDegradation,
        TrendDirection::Decreasing if trend.strength > 0.5 => DegradationTrend::ModerateDegradation,
        TrendDirection::Decreasing => DegradationTrend::SlowDegradation,
        TrendDirection::Increasing => DegradationTrend::Improving,
        _ => DegradationTrend::Stable,
    }
}
