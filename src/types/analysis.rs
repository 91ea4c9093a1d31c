//! Analysis result types: Finding, Prediction, PerformanceReport,
//! MaintenancePlan, AnalysisReport

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Findings
// ============================================================================

/// Which detector produced a [`Finding`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisType {
    StartupFrequency,
    Runtime,
    EnergyTrend,
    Vibration,
    Power,
    AnomalyClassification,
}

impl std::fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisType::StartupFrequency => write!(f, "STARTUP_FREQUENCY"),
            AnalysisType::Runtime => write!(f, "RUNTIME"),
            AnalysisType::EnergyTrend => write!(f, "ENERGY_TREND"),
            AnalysisType::Vibration => write!(f, "VIBRATION"),
            AnalysisType::Power => write!(f, "POWER"),
            AnalysisType::AnomalyClassification => write!(f, "ANOMALY_CLASSIFICATION"),
        }
    }
}

/// Finding severity, 1 (info) through 4 (critical).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Severity {
    #[default]
    Info = 1,
    Warning = 2,
    Error = 3,
    Critical = 4,
}

impl Severity {
    /// Shared mapping from absolute deviation percentage.
    ///
    /// Boundaries belong to the higher tier: 5.0 → Warning, 15.0 → Error,
    /// 30.0 → Critical.
    pub fn from_deviation_pct(deviation_pct: f64) -> Self {
        let d = deviation_pct.abs();
        if d < 5.0 {
            Severity::Info
        } else if d < 15.0 {
            Severity::Warning
        } else if d < 30.0 {
            Severity::Error
        } else {
            Severity::Critical
        }
    }

    pub fn level(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Direction of a fitted trend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    #[default]
    Stable,
    Fluctuating,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendDirection::Increasing => write!(f, "INCREASING"),
            TrendDirection::Decreasing => write!(f, "DECREASING"),
            TrendDirection::Stable => write!(f, "STABLE"),
            TrendDirection::Fluctuating => write!(f, "FLUCTUATING"),
        }
    }
}

/// One detector's verdict on a sample window. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub analysis_type: AnalysisType,
    pub severity: Severity,
    /// Always within [0, 1]
    pub confidence: f64,
    pub description: String,
    pub detected_value: Option<f64>,
    pub expected_value: Option<f64>,
    pub deviation_pct: Option<f64>,
    pub trend: TrendDirection,
    pub detailed_metrics: BTreeMap<String, f64>,
    pub recommendations: Vec<String>,
}

impl Finding {
    /// Informational result for a window that cannot support the analysis.
    pub fn insufficient(
        analysis_type: AnalysisType,
        confidence: f64,
        description: impl Into<String>,
        expected_value: Option<f64>,
    ) -> Self {
        Self {
            analysis_type,
            severity: Severity::Info,
            confidence: confidence.clamp(0.0, 1.0),
            description: description.into(),
            detected_value: None,
            expected_value,
            deviation_pct: None,
            trend: TrendDirection::Stable,
            detailed_metrics: BTreeMap::new(),
            recommendations: Vec::new(),
        }
    }
}

// ============================================================================
// Fault Prediction
// ============================================================================

/// Pump components scored by the fault predictor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Motor,
    Bearing,
    Impeller,
    Seal,
    ControlSystem,
}

impl Component {
    pub const ALL: [Component; 5] = [
        Component::Motor,
        Component::Bearing,
        Component::Impeller,
        Component::Seal,
        Component::ControlSystem,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Component::Motor => "motor",
            Component::Bearing => "bearing",
            Component::Impeller => "impeller",
            Component::Seal => "seal",
            Component::ControlSystem => "control_system",
        }
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Hydraulic efficiency trajectory of the window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DegradationTrend {
    RapidDegradation,
    ModerateDegradation,
    SlowDegradation,
    Improving,
    Stable,
    InsufficientData,
}

impl std::fmt::Display for DegradationTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DegradationTrend::RapidDegradation => write!(f, "RAPID_DEGRADATION"),
            DegradationTrend::ModerateDegradation => write!(f, "MODERATE_DEGRADATION"),
            DegradationTrend::SlowDegradation => write!(f, "SLOW_DEGRADATION"),
            DegradationTrend::Improving => write!(f, "IMPROVING"),
            DegradationTrend::Stable => write!(f, "STABLE"),
            DegradationTrend::InsufficientData => write!(f, "INSUFFICIENT_DATA"),
        }
    }
}

/// Closed interval around a forecast value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub low: f64,
    pub high: f64,
}

/// Heuristic failure outlook for one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub component_probabilities: BTreeMap<Component, f64>,
    /// Mean of the component probabilities
    pub failure_probability: f64,
    pub remaining_useful_life_days: u32,
    pub predicted_failure_time: DateTime<Utc>,
    pub degradation_trend: DegradationTrend,
    /// One-step-ahead forecasts keyed by metric
    pub forecast: BTreeMap<String, f64>,
    pub confidence_intervals: BTreeMap<String, Interval>,
    pub confidence: f64,
}

impl Prediction {
    pub fn max_component_probability(&self) -> f64 {
        self.component_probabilities
            .values()
            .copied()
            .fold(0.0, f64::max)
    }
}

// ============================================================================
// Performance
// ============================================================================

/// Three independently clamped 0-100 scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PerformanceScores {
    pub efficiency: f64,
    pub reliability: f64,
    /// 100 = no maintenance need
    pub maintenance: f64,
}

impl PerformanceScores {
    pub fn mean(&self) -> f64 {
        (self.efficiency + self.reliability + self.maintenance) / 3.0
    }
}

/// Letter-style grade for an overall score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Grade {
    Critical,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Grade::Excellent
        } else if score >= 80.0 {
            Grade::Good
        } else if score >= 70.0 {
            Grade::Fair
        } else if score >= 60.0 {
            Grade::Poor
        } else {
            Grade::Critical
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Grade::Excellent => write!(f, "EXCELLENT"),
            Grade::Good => write!(f, "GOOD"),
            Grade::Fair => write!(f, "FAIR"),
            Grade::Poor => write!(f, "POOR"),
            Grade::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Raw operating figures computed alongside the scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PerformanceMetrics {
    /// Pump starts per hour over the window
    pub startup_frequency: f64,
    pub total_runtime_hours: f64,
    pub average_power_kw: f64,
    pub total_energy_kwh: f64,
    pub average_vibration: f64,
    pub max_vibration: f64,
    pub average_pressure_kpa: f64,
    pub average_flow_rate: f64,
    /// Pearson r between pressure and flow, when computable
    pub pressure_flow_correlation: Option<f64>,
    /// Two-tailed p-value of that correlation
    pub pressure_flow_p_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub scores: PerformanceScores,
    pub grade: Grade,
    pub metrics: PerformanceMetrics,
}

// ============================================================================
// Maintenance Plan
// ============================================================================

/// Prioritised maintenance actions with a cost estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenancePlan {
    pub urgent: Vec<String>,
    pub scheduled: Vec<String>,
    pub preventive: Vec<String>,
    /// Watch items; not costed
    pub monitoring: Vec<String>,
    /// Currency-agnostic cost units
    pub estimated_cost: f64,
    pub recommended_time: DateTime<Utc>,
}

// ============================================================================
// Overall Report
// ============================================================================

/// Device-level risk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum RiskLevel {
    #[default]
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl RiskLevel {
    pub fn level(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
            RiskLevel::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Everything one analysis pass produced for a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub device_id: String,
    pub analyzed_at: DateTime<Utc>,
    pub sample_count: usize,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub findings: Vec<Finding>,
    pub prediction: Prediction,
    pub performance: PerformanceReport,
    pub plan: MaintenancePlan,
    pub health_score: f64,
    pub risk_level: RiskLevel,
    pub confidence: f64,
}

impl AnalysisReport {
    pub fn finding(&self, analysis_type: AnalysisType) -> Option<&Finding> {
        self.findings.iter().find(|f| f.analysis_type == analysis_type)
    }

    pub fn max_severity(&self) -> Severity {
        self.findings
            .iter()
            .map(|f| f.severity)
            .max()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_boundaries_belong_to_upper_tier() {
        let cases = [
            (4.999, Severity::Info),
            (5.0, Severity::Warning),
            (14.999, Severity::Warning),
            (15.0, Severity::Error),
            (29.999, Severity::Error),
            (30.0, Severity::Critical),
            (-31.0, Severity::Critical),
        ];
        for (deviation, expected) in cases {
            assert_eq!(
                Severity::from_deviation_pct(deviation),
                expected,
                "deviation {deviation}"
            );
        }
    }

    #[test]
    fn test_grade_cut_points() {
        assert_eq!(Grade::from_score(90.0), Grade::Excellent);
        assert_eq!(Grade::from_score(89.9), Grade::Good);
        assert_eq!(Grade::from_score(70.0), Grade::Fair);
        assert_eq!(Grade::from_score(60.0), Grade::Poor);
        assert_eq!(Grade::from_score(59.9), Grade::Critical);
    }

    #[test]
    fn test_insufficient_finding_is_informational() {
        let f = Finding::insufficient(AnalysisType::Power, 1.4, "not enough power readings", None);
        assert_eq!(f.severity, Severity::Info);
        assert_eq!(f.confidence, 1.0);
        assert!(f.recommendations.is_empty());
    }
}
