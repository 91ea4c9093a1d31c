//! Overall Health Assessment
//!
//! Rolls findings, prediction and performance into one device-level health
//! score, a risk level and an overall confidence.
//!
//! # Scoring
//!
//! ```text
//! finding score = 100 − Σ (severity − 1) × 15 × confidence
//! health        = clamp((finding score + mean performance score) / 2, 0, 100)
//! ```
//!
//! A single critical finding at full confidence costs 45 points of the
//! finding score; informational findings cost nothing.

use crate::types::{Finding, PerformanceScores, Prediction, RiskLevel, Severity};

/// Points per severity step above Info, at full confidence.
const DEDUCTION_PER_SEVERITY_STEP: f64 = 15.0;

/// Confidence contribution assumed for the prediction stage.
const PREDICTION_CONFIDENCE: f64 = 0.7;

/// Mean finding confidence when there are no findings.
const DEFAULT_FINDING_CONFIDENCE: f64 = 0.5;

pub fn health_score(findings: &[Finding], scores: &PerformanceScores) -> f64 {
    let deductions: f64 = findings
        .iter()
        .map(|f| f64::from(f.severity.level() - 1) * DEDUCTION_PER_SEVERITY_STEP * f.confidence)
        .sum();
    let finding_score = 100.0 - deductions;
    ((finding_score + scores.mean()) / 2.0).clamp(0.0, 100.0)
}

/// Worst of the finding severities and the predicted failure probability.
pub fn risk_level(findings: &[Finding], prediction: &Prediction) -> RiskLevel {
    let worst = findings.iter().map(|f| f.severity).max().unwrap_or_default();
    let p = prediction.failure_probability;

    if worst >= Severity::Critical || p > 0.8 {
        RiskLevel::Critical
    } else if worst >= Severity::Error || p > 0.6 {
        RiskLevel::High
    } else if p > 0.3 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

pub fn overall_confidence(findings: &[Finding]) -> f64 {
    let mean = if findings.is_empty() {
        DEFAULT_FINDING_CONFIDENCE
    } else {
        findings.iter().map(|f| f.confidence).sum::<f64>() / findings.len() as f64
    };
    (mean + PREDICTION_CONFIDENCE) / 2.0
}
