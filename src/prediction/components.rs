//! Per-component failure heuristics.
//!
//! Each component owns an ordered rule list; its score is the sum of the
//! weights that fire, clamped to `[0, 1]`. The "else" branches of a tiered
//! check are encoded as mutually exclusive predicates so that at most one
//! tier contributes.

use std::collections::BTreeMap;

use super::features::DeviceFeatures;
use crate::config::defaults::HOURS_PER_YEAR;
use crate::heuristics::{tally, RuleTally, WeightedRule};
use crate::types::{Component, TrendDirection};

type Rule = WeightedRule<DeviceFeatures>;

/// Bearing score when no vibration readings exist.
const BEARING_WITHOUT_VIBRATION: f64 = 0.1;

fn motor_rules() -> Vec<Rule> {
    vec![
        Rule::flat("current_instability", 0.2, |f| {
            f.current_mean.is_some() && f.current_cv > 0.15
        }),
        Rule::flat("overcurrent", 0.3, |f| {
            f.current_mean.is_some_and(|mean| mean > f.rated_current * 1.1)
        }),
        Rule::flat("water_temp_peak", 0.3, |f| {
            f.water_temp_max.is_some_and(|t| t > 80.0)
        }),
        Rule::flat("water_temp_elevated", 0.15, |f| {
            f.water_temp_max.is_some_and(|t| t <= 80.0)
                && f.water_temp_mean.is_some_and(|t| t > 60.0)
        }),
    ]
}

fn bearing_rules() -> Vec<Rule> {
    vec![
        Rule::flat("vibration_severe", 0.4, |f| {
            f.vibration_max.is_some_and(|v| v > 7.0)
        }),
        Rule::flat("vibration_high", 0.2, |f| {
            f.vibration_max.is_some_and(|v| v > 4.5 && v <= 7.0)
        }),
        Rule::flat("vibration_unstable", 0.2, |f| f.vibration_std_dev > 1.5),
        Rule::flat("vibration_rising", 0.3, |f| {
            f.vibration_trend.is(TrendDirection::Increasing, 0.7)
        }),
        Rule::flat("vibration_outliers", 0.2, |f| f.vibration_outlier_ratio > 0.2),
    ]
}

fn impeller_rules() -> Vec<Rule> {
    vec![
        Rule::flat("pressure_unstable", 0.2, |f| {
            f.pressure_cv.is_some_and(|cv| cv > 0.2)
        }),
        Rule::flat("pressure_falling", 0.3, |f| {
            f.pressure_trend.is(TrendDirection::Decreasing, 0.6)
        }),
        Rule::flat("flow_falling", 0.25, |f| {
            f.flow_trend.is(TrendDirection::Decreasing, 0.5)
        }),
        Rule::flat("efficiency_loss", 0.2, |f| f.efficiency_loss_signature),
    ]
}

fn seal_rules() -> Vec<Rule> {
    vec![
        Rule::flat("water_temp_peak", 0.3, |f| {
            f.water_temp_max.is_some_and(|t| t > 85.0)
        }),
        Rule::flat("water_temp_elevated", 0.15, |f| {
            f.water_temp_max.is_some_and(|t| t <= 85.0)
                && f.water_temp_mean.is_some_and(|t| t > 70.0)
        }),
        Rule::flat("pressure_fluctuation", 0.2, |f| {
            f.seal_pressure_cv.is_some_and(|cv| cv > 0.25)
        }),
        Rule::scaled(
            "runtime_ageing",
            0.1,
            |f| f.runtime_hours > HOURS_PER_YEAR,
            |f| f.runtime_years() as f64,
        ),
    ]
}

fn control_system_rules() -> Vec<Rule> {
    vec![
        Rule::flat("irregular_starts", 0.2, |f| {
            f.start_interval_cv.is_some_and(|cv| cv > 0.5)
        }),
        Rule::scaled(
            "control_faults",
            0.3,
            |f| f.control_fault_share > 0.0,
            |f| f.control_fault_share,
        ),
    ]
}

/// Rule lists for all components, built once per predictor.
#[derive(Debug)]
pub struct ComponentRules {
    rules: BTreeMap<Component, Vec<Rule>>,
}

impl Default for ComponentRules {
    fn default() -> Self {
        let rules = Component::ALL
            .into_iter()
            .map(|component| {
                let list = match component {
                    Component::Motor => motor_rules(),
                    Component::Bearing => bearing_rules(),
                    Component::Impeller => impeller_rules(),
                    Component::Seal => seal_rules(),
                    Component::ControlSystem => control_system_rules(),
                };
                (component, list)
            })
            .collect();
        Self { rules }
    }
}

impl ComponentRules {
    /// Raw tally for one component, before clamping.
    pub fn tally(&self, component: Component, features: &DeviceFeatures) -> RuleTally {
        self.rules
            .get(&component)
            .map(|rules| tally(rules, features))
            .unwrap_or_default()
    }

    /// Clamped score for one component.
    pub fn score(&self, component: Component, features: &DeviceFeatures) -> f64 {
        if component == Component::Bearing && features.vibration_readings == 0 {
            return BEARING_WITHOUT_VIBRATION;
        }
        self.tally(component, features).total.clamp(0.0, 1.0)
    }

    pub fn scores(&self, features: &DeviceFeatures) -> BTreeMap<Component, f64> {
        Component::ALL
            .into_iter()
            .map(|c| (c, self.score(c, features)))
            .collect()
    }
}
