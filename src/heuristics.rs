//! Ordered `(predicate, weight)` rule lists.
//!
//! The fault predictor adds rule weights into component scores and the
//! performance scorer subtracts them from 100. Each rule is a named
//! predicate over a precomputed feature struct plus a weight, optionally
//! multiplied by a feature-derived scale.

use std::fmt;

pub struct WeightedRule<F> {
    pub name: &'static str,
    pub weight: f64,
    applies: fn(&F) -> bool,
    scale: Option<fn(&F) -> f64>,
}

impl<F> WeightedRule<F> {
    /// Contributes `weight` when `applies` holds.
    pub fn flat(name: &'static str, weight: f64, applies: fn(&F) -> bool) -> Self {
        Self {
            name,
            weight,
            applies,
            scale: None,
        }
    }

    /// Contributes `weight × scale(features)` when `applies` holds.
    pub fn scaled(
        name: &'static str,
        weight: f64,
        applies: fn(&F) -> bool,
        scale: fn(&F) -> f64,
    ) -> Self {
        Self {
            name,
            weight,
            applies,
            scale: Some(scale),
        }
    }

    pub fn contribution(&self, features: &F) -> f64 {
        if !(self.applies)(features) {
            return 0.0;
        }
        let factor = self.scale.map_or(1.0, |scale| scale(features));
        if factor.is_finite() {
            self.weight * factor
        } else {
            0.0
        }
    }
}

impl<F> fmt::Debug for WeightedRule<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeightedRule")
            .field("name", &self.name)
            .field("weight", &self.weight)
            .field("scaled", &self.scale.is_some())
            .finish()
    }
}

/// Sum of contributions and the names of the rules that fired.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RuleTally {
    pub total: f64,
    pub fired: Vec<&'static str>,
}

pub fn tally<F>(rules: &[WeightedRule<F>], features: &F) -> RuleTally {
    rules.iter().fold(RuleTally::default(), |mut acc, rule| {
        let contribution = rule.contribution(features);
        if contribution != 0.0 {
            acc.total += contribution;
            acc.fired.push(rule.name);
        }
        acc
    })
}
