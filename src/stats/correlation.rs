//! Pearson correlation with Student's t significance.
//!
//! Used by the performance scorer to check that delivered pressure still
//! tracks flow. The p-value comes from the statrs t-distribution.

use statrs::distribution::{ContinuousCDF, StudentsT};

/// Pearson correlation coefficient of two equal-length series.
///
/// Returns `None` when the lengths differ or fewer than two pairs exist,
/// and `Some(0.0)` when either series is constant.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }

    let n = x.len() as f64;
    let sum_x: f64 = x.iter().sum();
    let sum_y: f64 = y.iter().sum();
    let sum_xy: f64 = x.iter().zip(y).map(|(a, b)| a * b).sum();
    let sum_x2: f64 = x.iter().map(|a| a * a).sum();
    let sum_y2: f64 = y.iter().map(|a| a * a).sum();

    let numerator = n * sum_xy - sum_x * sum_y;
    let denominator = ((n * sum_x2 - sum_x.powi(2)) * (n * sum_y2 - sum_y.powi(2))).sqrt();

    if denominator == 0.0 || !denominator.is_finite() {
        Some(0.0)
    } else {
        Some((numerator / denominator).clamp(-1.0, 1.0))
    }
}

/// Two-tailed p-value of a correlation `r` over `n` pairs.
///
/// `t = r·sqrt(n-2) / sqrt(1-r²)` on `n-2` degrees of freedom.
pub fn p_value_for_r(r: f64, n: usize) -> f64 {
    if n < 3 {
        return 1.0;
    }
    if r.abs() >= 0.9999 {
        return 0.0;
    }

    let df = (n - 2) as f64;
    let t_stat = r * df.sqrt() / (1.0 - r * r).sqrt();

    match StudentsT::new(0.0, 1.0, df) {
        Ok(t_dist) => 2.0 * (1.0 - t_dist.cdf(t_stat.abs())),
        Err(_) => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_positive_correlation() {
        let x: Vec<f64> = (0..30).map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 * v - 1.0).collect();
        let r = pearson(&x, &y).expect("equal lengths");
        assert!((r - 1.0).abs() < 1e-9, "r: {r}");
        assert_eq!(p_value_for_r(r, x.len()), 0.0);
    }

    #[test]
    fn test_mismatched_lengths() {
        assert_eq!(pearson(&[1.0, 2.0], &[1.0]), None);
        assert_eq!(pearson(&[1.0, 2.0], &[5.0, 5.0]), Some(0.0));
    }

    #[test]
    fn test_weak_correlation_is_not_significant() {
        let p = p_value_for_r(0.1, 20);
        assert!(p > 0.05, "p: {p}");
        assert_eq!(p_value_for_r(0.5, 2), 1.0);
    }
}
