//! Statistics Library
//!
//! Pure, stateless time-series primitives shared by the detectors, the fault
//! predictor and the performance scorer.
//!
//! ## Absent values
//!
//! Every function is generic over [`Observation`], so it accepts both plain
//! `&[f64]` readings and `&[Option<f64>]` series with gaps. Absent (and
//! non-finite) values are skipped; they never count as zero.
//!
//! ## Degenerate input
//!
//! Nothing here returns an error. Too little data yields neutral values
//! (0, empty vectors, a STABLE trend), and a regression whose denominator
//! vanishes yields a zero fit.

pub mod correlation;

pub use correlation::{pearson, p_value_for_r};

use statrs::statistics::{Data, Median, Statistics};

use crate::types::TrendDirection;

/// Denominator magnitude below which a regression is degenerate.
const DEGENERATE_DENOMINATOR: f64 = 1e-10;

/// Window half-width for local dispersion in change-point detection.
const CHANGE_POINT_HALF_WINDOW: usize = 5;

// ============================================================================
// Observations
// ============================================================================

/// A value that may be absent.
pub trait Observation: Copy {
    fn observed(self) -> Option<f64>;
}

impl Observation for f64 {
    fn observed(self) -> Option<f64> {
        self.is_finite().then_some(self)
    }
}

impl Observation for Option<f64> {
    fn observed(self) -> Option<f64> {
        self.filter(|v| v.is_finite())
    }
}

/// Present values in original order.
pub fn present<T: Observation>(data: &[T]) -> Vec<f64> {
    data.iter().filter_map(|v| v.observed()).collect()
}

// ============================================================================
// Descriptive statistics
// ============================================================================

pub fn mean<T: Observation>(data: &[T]) -> f64 {
    let values = present(data);
    if values.is_empty() {
        return 0.0;
    }
    values.iter().mean()
}

pub fn median<T: Observation>(data: &[T]) -> f64 {
    let values = present(data);
    if values.is_empty() {
        return 0.0;
    }
    Data::new(values).median()
}

/// Sample standard deviation (divisor `n-1`); 0 when fewer than two values.
pub fn std_dev<T: Observation>(data: &[T]) -> f64 {
    let values = present(data);
    if values.len() < 2 {
        return 0.0;
    }
    values.iter().std_dev()
}

/// `stddev / mean`, or 0 when the mean is zero.
pub fn coefficient_of_variation<T: Observation>(data: &[T]) -> f64 {
    let m = mean(data);
    if m == 0.0 {
        0.0
    } else {
        std_dev(data) / m
    }
}

pub fn max<T: Observation>(data: &[T]) -> Option<f64> {
    data.iter().filter_map(|v| v.observed()).reduce(f64::max)
}

pub fn min<T: Observation>(data: &[T]) -> Option<f64> {
    data.iter().filter_map(|v| v.observed()).reduce(f64::min)
}

/// Linear-interpolated percentile of already sorted data.
///
/// Rank index is `p/100 * (n-1)`; the result interpolates between the
/// floor and ceiling ranks. `p` is clamped to `[0, 100]`; a non-finite
/// `p` yields 0.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() || !p.is_finite() {
        return 0.0;
    }
    let p = p.clamp(0.0, 100.0);
    let index = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = index - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

// ============================================================================
// Smoothing & outliers
// ============================================================================

/// Trailing moving average.
///
/// The window shrinks at the start of the series and averages only the
/// present values inside it; a window with no present value yields `None`.
pub fn moving_average<T: Observation>(data: &[T], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return Vec::new();
    }
    (0..data.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let values = present(&data[start..=i]);
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        })
        .collect()
}

/// Indices (into `data`) of values outside the 1.5·IQR fences.
///
/// Needs at least four present values; absent values are never flagged.
pub fn detect_outliers<T: Observation>(data: &[T]) -> Vec<usize> {
    let mut sorted = present(data);
    if sorted.len() < 4 {
        return Vec::new();
    }
    sorted.sort_by(f64::total_cmp);

    let q1 = percentile(&sorted, 25.0);
    let q3 = percentile(&sorted, 75.0);
    let iqr = q3 - q1;
    let lower = q1 - 1.5 * iqr;
    let upper = q3 + 1.5 * iqr;

    data.iter()
        .enumerate()
        .filter_map(|(i, v)| v.observed().map(|v| (i, v)))
        .filter(|(_, v)| *v < lower || *v > upper)
        .map(|(i, _)| i)
        .collect()
}

// ============================================================================
// Regression & trend
// ============================================================================

/// Least-squares line `y = slope·x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Closed-form least squares over paired values.
///
/// Mismatched or empty input, or a vanishing denominator, yields the zero
/// fit. R² is 0 when the total sum of squares is 0.
pub fn linear_regression(x: &[f64], y: &[f64]) -> LinearFit {
    if x.len() != y.len() || x.is_empty() {
        return LinearFit::default();
    }

    let n = x.len() as f64;
    let sum_x: f64 = x.iter().sum();
    let sum_y: f64 = y.iter().sum();
    let sum_xy: f64 = x.iter().zip(y).map(|(a, b)| a * b).sum();
    let sum_x2: f64 = x.iter().map(|a| a * a).sum();

    let denominator = n * sum_x2 - sum_x * sum_x;
    if denominator.abs() < DEGENERATE_DENOMINATOR {
        return LinearFit::default();
    }

    let slope = (n * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / n;

    let mean_y = sum_y / n;
    let (total_ss, residual_ss) = x.iter().zip(y).fold((0.0, 0.0), |(tot, res), (xi, yi)| {
        let predicted = slope * xi + intercept;
        (tot + (yi - mean_y).powi(2), res + (yi - predicted).powi(2))
    });
    let r_squared = if total_ss > 0.0 {
        1.0 - residual_ss / total_ss
    } else {
        0.0
    };

    LinearFit {
        slope,
        intercept,
        r_squared,
    }
}

/// Fit of a series against its index `0..n-1`.
pub fn index_regression(values: &[f64]) -> LinearFit {
    let x: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
    linear_regression(&x, values)
}

/// Direction, slope and strength (|R²|) of a series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trend {
    pub direction: TrendDirection,
    pub slope: f64,
    pub strength: f64,
}

impl Trend {
    pub const STABLE: Trend = Trend {
        direction: TrendDirection::Stable,
        slope: 0.0,
        strength: 0.0,
    };

    /// Direction matches and the fit is stronger than `min_strength`.
    pub fn is(&self, direction: TrendDirection, min_strength: f64) -> bool {
        self.direction == direction && self.strength > min_strength
    }
}

/// Classify the trend of the present values against their index.
///
/// A slope below 0.01 (more than ten points) or 0.05 (otherwise) is STABLE.
pub fn analyze_trend<T: Observation>(data: &[T]) -> Trend {
    let values = present(data);
    if values.len() < 2 {
        return Trend::STABLE;
    }

    let fit = index_regression(&values);
    let threshold = if values.len() > 10 { 0.01 } else { 0.05 };
    let direction = if fit.slope.abs() < threshold {
        TrendDirection::Stable
    } else if fit.slope > 0.0 {
        TrendDirection::Increasing
    } else {
        TrendDirection::Decreasing
    };

    Trend {
        direction,
        slope: fit.slope,
        strength: fit.r_squared.abs(),
    }
}

/// Interior indices whose mean neighbour step exceeds `threshold` local
/// standard deviations.
///
/// The local window spans up to five points on each side (fewer near the
/// start). Points with an absent neighbour are skipped.
pub fn detect_change_points<T: Observation>(data: &[T], threshold: f64) -> Vec<usize> {
    if data.len() < 3 {
        return Vec::new();
    }

    let mut change_points = Vec::new();
    for i in 1..data.len() - 1 {
        let (Some(prev), Some(cur), Some(next)) = (
            data[i - 1].observed(),
            data[i].observed(),
            data[i + 1].observed(),
        ) else {
            continue;
        };

        let avg_step = ((cur - prev).abs() + (next - cur).abs()) / 2.0;

        let half = CHANGE_POINT_HALF_WINDOW.min(i);
        let end = (i + half).min(data.len() - 1);
        let window = present(&data[i - half..=end]);
        if window.len() <= 2 {
            continue;
        }

        let local_std = std_dev(&window);
        if local_std > 0.0 && avg_step / local_std > threshold {
            change_points.push(i);
        }
    }
    change_points
}
