//! Alert Rule Engine
//!
//! Evaluates one [`AlertRule`] against one [`MetricContext`]. Evaluation is
//! pure: no I/O, no state, safe to call from any thread.
//!
//! Every branch produces an [`EvaluationResult`]. Missing metrics and broken
//! rule conditions surface as `triggered = false` with an explanatory
//! message; a [`RuleError`] never leaves [`RuleEngine::evaluate`].

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use super::context::MetricContext;
use crate::config::defaults::{
    ANOMALY_MIN_CONFIDENCE, ANOMALY_RATE_THRESHOLD, DEGRADATION_THRESHOLD_PCT, EQUALITY_EPSILON,
    FAILURE_PROBABILITY_THRESHOLD, HEALTH_SCORE_THRESHOLD,
};
use crate::types::{AlertLevel, AlertRule, Comparison, EvaluationResult, RuleType};

const THRESHOLD_CONFIDENCE: f64 = 0.9;
const PERFORMANCE_CONFIDENCE: f64 = 0.8;
const FAULT_PREDICTION_CONFIDENCE: f64 = 0.7;
const HEALTH_CONFIDENCE: f64 = 0.85;
const CUSTOM_CONFIDENCE: f64 = 0.75;

/// Sub-score below which a component is named as a root cause.
const ROOT_CAUSE_SCORE: f64 = 70.0;
const ROOT_CAUSE_FAILURE_PROBABILITY: f64 = 0.5;

const CUSTOM_METRIC_PREFIX: &str = "metric_";

#[derive(Debug, Error, PartialEq)]
pub enum RuleError {
    #[error("metric '{0}' is not available")]
    MissingMetric(String),

    #[error("rule condition '{0}' is missing")]
    MissingCondition(&'static str),

    #[error("rule condition '{key}' is invalid: {reason}")]
    InvalidCondition { key: String, reason: String },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, rule: &AlertRule, ctx: &MetricContext) -> EvaluationResult {
        let outcome = match rule.rule_type {
            RuleType::Threshold => threshold(rule, ctx),
            RuleType::AnomalyDetection => anomaly(rule, ctx),
            RuleType::PerformanceDegradation => performance_degradation(rule, ctx),
            RuleType::FaultPrediction => fault_prediction(rule, ctx),
            RuleType::HealthScore => health_score(rule, ctx),
            RuleType::Custom => custom(rule, ctx),
        };

        match outcome {
            Ok(result) => {
                debug!(
                    rule_id = %rule.rule_id,
                    device_id = %ctx.device_id,
                    triggered = result.triggered,
                    "Rule evaluated"
                );
                result
            }
            Err(e @ RuleError::MissingMetric(_)) => {
                debug!(rule_id = %rule.rule_id, device_id = %ctx.device_id, error = %e, "Rule not evaluable");
                EvaluationResult::not_triggered(e.to_string())
            }
            Err(e) => {
                warn!(rule_id = %rule.rule_id, rule_type = %rule.rule_type, error = %e, "Rule misconfigured");
                EvaluationResult::not_triggered(format!("rule '{}' misconfigured: {e}", rule.name))
            }
        }
    }
}

// ============================================================================
// Rule types
// ============================================================================

fn threshold(rule: &AlertRule, ctx: &MetricContext) -> Result<EvaluationResult, RuleError> {
    let metric = text(&rule.conditions, "metric")?.ok_or(RuleError::MissingCondition("metric"))?;
    let comparison = text(&rule.conditions, "comparison")?
        .ok_or(RuleError::MissingCondition("comparison"))?
        .parse::<Comparison>()
        .map_err(|reason| RuleError::InvalidCondition {
            key: "comparison".to_string(),
            reason,
        })?;
    let limit = number(&rule.conditions, "threshold")?.ok_or(RuleError::MissingCondition("threshold"))?;
    let actual = metric_value(ctx, metric)?;

    if !comparison.holds(actual, limit, EQUALITY_EPSILON) {
        return Ok(EvaluationResult::not_triggered(format!("{metric} is within limits")));
    }

    Ok(EvaluationResult::triggered(
        format!("{metric} is {actual:.2}, {} {limit:.2}", comparison.symbol()),
        rule.level,
        THRESHOLD_CONFIDENCE,
    )
    .with_values(actual, limit))
}

fn anomaly(rule: &AlertRule, ctx: &MetricContext) -> Result<EvaluationResult, RuleError> {
    let rate = ctx.get("anomaly_rate");
    let confidence = ctx.get("confidence_score");
    if rate.is_none() && confidence.is_none() {
        return Err(RuleError::MissingMetric("anomaly_rate".to_string()));
    }

    let anomalous = rate.is_some_and(|r| r > ANOMALY_RATE_THRESHOLD)
        || confidence.is_some_and(|c| c < ANOMALY_MIN_CONFIDENCE);
    if !anomalous {
        return Ok(EvaluationResult::not_triggered("no anomaly detected"));
    }

    let rate = rate.unwrap_or(0.0);
    let confidence = confidence.unwrap_or(ANOMALY_MIN_CONFIDENCE);
    let mut result = EvaluationResult::triggered(
        format!(
            "Anomaly detected: anomaly rate {rate:.1}%, confidence {:.1}%",
            confidence * 100.0
        ),
        rule.level,
        confidence,
    )
    .with_values(rate, ANOMALY_RATE_THRESHOLD)
    .with_recommendation("Inspect the device and review recent telemetry in detail");

    if let Some(kind) = text(&rule.conditions, "anomaly_type")? {
        result.details.insert("anomaly_type".to_string(), kind.to_string());
    }
    Ok(result)
}

fn performance_degradation(
    rule: &AlertRule,
    ctx: &MetricContext,
) -> Result<EvaluationResult, RuleError> {
    let degradation = number(&rule.conditions, "degradation_threshold")?
        .unwrap_or(DEGRADATION_THRESHOLD_PCT);
    let floor = 100.0 - degradation;
    let performance = metric_value(ctx, "performance_score")?;

    if performance >= floor {
        return Ok(EvaluationResult::not_triggered("performance is normal"));
    }

    Ok(EvaluationResult::triggered(
        format!("Performance fell to {performance:.2}%, below {floor:.2}%"),
        rule.level,
        PERFORMANCE_CONFIDENCE,
    )
    .with_values(performance, floor))
}

fn fault_prediction(rule: &AlertRule, ctx: &MetricContext) -> Result<EvaluationResult, RuleError> {
    let limit = number(&rule.conditions, "failure_probability_threshold")?
        .unwrap_or(FAILURE_PROBABILITY_THRESHOLD);
    let probability = metric_value(ctx, "failure_probability")?;

    if probability < limit {
        return Ok(EvaluationResult::not_triggered(
            "failure probability is within the normal range",
        ));
    }

    Ok(EvaluationResult::triggered(
        format!(
            "Failure probability {:.2}% exceeds {:.2}%",
            probability * 100.0,
            limit * 100.0
        ),
        rule.level,
        FAULT_PREDICTION_CONFIDENCE,
    )
    .with_values(probability, limit))
}

fn health_score(rule: &AlertRule, ctx: &MetricContext) -> Result<EvaluationResult, RuleError> {
    let limit = number(&rule.conditions, "health_score_threshold")?.unwrap_or(HEALTH_SCORE_THRESHOLD);
    let score = metric_value(ctx, "health_score")?;

    if score >= limit {
        return Ok(EvaluationResult::not_triggered("health score is normal"));
    }

    let cause = root_cause(ctx);
    let mut result = EvaluationResult::triggered(
        format!("Health score {score:.2} is below {limit:.2}"),
        rule.level.max(health_severity(score)),
        HEALTH_CONFIDENCE,
    )
    .with_values(score, limit)
    .with_recommendation(format!("Likely cause: {cause}"));
    result.details.insert("root_cause".to_string(), cause);
    Ok(result)
}

fn custom(rule: &AlertRule, ctx: &MetricContext) -> Result<EvaluationResult, RuleError> {
    let mut checked = 0usize;
    let mut unmet = Vec::new();

    for (key, value) in &rule.conditions {
        let Some(metric) = key.strip_prefix(CUSTOM_METRIC_PREFIX) else {
            continue;
        };
        checked += 1;
        let expected = as_number(key, value)?;
        match ctx.get(metric) {
            Some(actual) if actual >= expected => {}
            Some(actual) => unmet.push(format!("{metric} {actual:.2} < {expected:.2}")),
            None => unmet.push(format!("{metric} unavailable (expected >= {expected:.2})")),
        }
    }

    if checked == 0 {
        return Err(RuleError::MissingCondition("metric_<name>"));
    }
    if !unmet.is_empty() {
        return Ok(EvaluationResult::not_triggered(format!(
            "custom conditions not met: {}",
            unmet.join("; ")
        )));
    }

    Ok(EvaluationResult::triggered(
        format!("All {checked} custom conditions met"),
        rule.level,
        CUSTOM_CONFIDENCE,
    ))
}

// ============================================================================
// Helpers
// ============================================================================

fn health_severity(score: f64) -> AlertLevel {
    if score < 30.0 {
        AlertLevel::Critical
    } else if score < 50.0 {
        AlertLevel::Warning
    } else {
        AlertLevel::Info
    }
}

fn root_cause(ctx: &MetricContext) -> String {
    let mut causes = Vec::new();
    for (metric, label) in [
        ("efficiency_score", "low efficiency"),
        ("reliability_score", "insufficient reliability"),
        ("maintenance_score", "poor maintenance condition"),
    ] {
        if ctx.get(metric).is_some_and(|v| v < ROOT_CAUSE_SCORE) {
            causes.push(label);
        }
    }
    if ctx
        .get("failure_probability")
        .is_some_and(|p| p > ROOT_CAUSE_FAILURE_PROBABILITY)
    {
        causes.push("high failure probability");
    }
    if causes.is_empty() {
        "overall performance decline".to_string()
    } else {
        causes.join("; ")
    }
}

fn metric_value(ctx: &MetricContext, name: &str) -> Result<f64, RuleError> {
    ctx.get(name)
        .ok_or_else(|| RuleError::MissingMetric(name.to_string()))
}

fn text<'a>(conditions: &'a Map<String, Value>, key: &str) -> Result<Option<&'a str>, RuleError> {
    match conditions.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(RuleError::InvalidCondition {
            key: key.to_string(),
            reason: format!("expected a string, got {other}"),
        }),
    }
}

fn number(conditions: &Map<String, Value>, key: &str) -> Result<Option<f64>, RuleError> {
    match conditions.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => as_number(key, value).map(Some),
    }
}

/// Numbers may be written as JSON numbers or numeric strings.
fn as_number(key: &str, value: &Value) -> Result<f64, RuleError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| RuleError::InvalidCondition {
            key: key.to_string(),
            reason: format!("expected a number, got {value}"),
        })
}
