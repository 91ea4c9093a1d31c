//! Fault Predictor
//!
//! Deterministic heuristic failure outlook for a device window. Scores are
//! additive rule weights, not trained probabilities.
//!
//! ## Architecture
//!
//! ```text
//! samples ─► DeviceFeatures::extract ─► ComponentRules (5 components)
//!                                        │
//!                 ┌──────────────────────┼──────────────────────┐
//!                 ▼                      ▼                      ▼
//!        failure probability      remaining useful life    confidence
//!        (mean of components)     (max component bucket)
//! ```
//!
//! Remaining useful life is bucketed from the *maximum* component score,
//! while the predicted failure time offset is bucketed from the *mean*
//! failure probability applied to that RUL. The two bucketings use the same
//! cut points but different inputs and are kept separate on purpose; they
//! can disagree.

pub mod components;
pub mod features;
pub mod forecast;

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::defaults::CONFIDENCE_SATURATION_SAMPLES;
use crate::config::PredictionConfig;
use crate::types::{Component, DegradationTrend, Prediction, Sample};

pub use components::ComponentRules;
pub use features::DeviceFeatures;

/// Component score for a window too short to assess.
const LOW_CONFIDENCE_SCORE: f64 = 0.1;
const LOW_CONFIDENCE: f64 = 0.3;

#[derive(Debug, Default)]
pub struct FaultPredictor {
    config: PredictionConfig,
    rules: ComponentRules,
}

impl FaultPredictor {
    pub fn new(config: PredictionConfig) -> Self {
        Self {
            config,
            rules: ComponentRules::default(),
        }
    }

    pub fn predict(&self, samples: &[Sample], now: DateTime<Utc>) -> Prediction {
        let base_days = self.config.window_days;

        if samples.len() < self.config.min_training_samples {
            debug!(
                samples = samples.len(),
                required = self.config.min_training_samples,
                "Too few samples for fault prediction"
            );
            return Prediction {
                component_probabilities: Component::ALL
                    .into_iter()
                    .map(|c| (c, LOW_CONFIDENCE_SCORE))
                    .collect(),
                failure_probability: LOW_CONFIDENCE_SCORE,
                remaining_useful_life_days: base_days,
                predicted_failure_time: now + Duration::days(i64::from(base_days)),
                degradation_trend: DegradationTrend::InsufficientData,
                forecast: BTreeMap::new(),
                confidence_intervals: BTreeMap::new(),
                confidence: LOW_CONFIDENCE,
            };
        }

        let features = DeviceFeatures::extract(samples);
        let component_probabilities = self.rules.scores(&features);

        let failure_probability = component_probabilities.values().sum::<f64>()
            / component_probabilities.len() as f64;
        let max_component = component_probabilities.values().copied().fold(0.0, f64::max);

        let remaining_useful_life_days = remaining_useful_life(max_component, base_days);
        let offset_days = failure_offset_days(failure_probability, remaining_useful_life_days);

        let (forecast, confidence_intervals) =
            forecast::forecast_metrics(samples, self.config.forecast_points);

        let data_confidence = (samples.len() as f64 / CONFIDENCE_SATURATION_SAMPLES).min(1.0);
        let confidence = (data_confidence + (1.0 - max_component)) / 2.0;

        debug!(
            samples = samples.len(),
            failure_probability,
            max_component,
            rul_days = remaining_useful_life_days,
            "Fault prediction complete"
        );

        Prediction {
            component_probabilities,
            failure_probability,
            remaining_useful_life_days,
            predicted_failure_time: now + Duration::days(i64::from(offset_days)),
            degradation_trend: forecast::degradation_trend(samples),
            forecast,
            confidence_intervals,
            confidence,
        }
    }
}

/// RUL in days from the weakest component.
pub fn remaining_useful_life(max_component: f64, base_days: u32) -> u32 {
    if max_component > 0.8 {
        (base_days / 7).max(1)
    } else if max_component > 0.6 {
        (base_days / 3).max(3)
    } else if max_component > 0.4 {
        base_days
    } else if max_component > 0.2 {
        base_days * 2
    } else {
        base_days * 4
    }
}

/// Days until the predicted failure, from the mean probability and the RUL.
pub fn failure_offset_days(failure_probability: f64, rul_days: u32) -> u32 {
    if failure_probability > 0.8 {
        (rul_days / 7).max(1)
    } else if failure_probability > 0.6 {
        (rul_days / 3).max(3)
    } else {
        rul_days
    }
}
