//! Alerting types: AlertRule, AlertRecord, AlertStatus, EvaluationResult

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::str::FromStr;

// ============================================================================
// Rules
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    Threshold,
    AnomalyDetection,
    PerformanceDegradation,
    FaultPrediction,
    HealthScore,
    Custom,
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleType::Threshold => write!(f, "THRESHOLD"),
            RuleType::AnomalyDetection => write!(f, "ANOMALY_DETECTION"),
            RuleType::PerformanceDegradation => write!(f, "PERFORMANCE_DEGRADATION"),
            RuleType::FaultPrediction => write!(f, "FAULT_PREDICTION"),
            RuleType::HealthScore => write!(f, "HEALTH_SCORE"),
            RuleType::Custom => write!(f, "CUSTOM"),
        }
    }
}

/// Alert severity carried by rules and records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertLevel {
    #[default]
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertLevel::Info => write!(f, "INFO"),
            AlertLevel::Warning => write!(f, "WARNING"),
            AlertLevel::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Comparison operator of a threshold rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Ne,
}

impl Comparison {
    /// Apply the operator; equality is tolerance-based.
    pub fn holds(self, actual: f64, threshold: f64, epsilon: f64) -> bool {
        match self {
            Comparison::Gt => actual > threshold,
            Comparison::Gte => actual >= threshold,
            Comparison::Lt => actual < threshold,
            Comparison::Lte => actual <= threshold,
            Comparison::Eq => (actual - threshold).abs() < epsilon,
            Comparison::Ne => (actual - threshold).abs() >= epsilon,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
        }
    }
}

impl FromStr for Comparison {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gt" | ">" => Ok(Comparison::Gt),
            "gte" | ">=" => Ok(Comparison::Gte),
            "lt" | "<" => Ok(Comparison::Lt),
            "lte" | "<=" => Ok(Comparison::Lte),
            "eq" | "==" | "=" => Ok(Comparison::Eq),
            "ne" | "!=" | "<>" => Ok(Comparison::Ne),
            other => Err(format!("unknown comparison operator '{other}'")),
        }
    }
}

/// Delivery methods configured on a rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationMethod {
    Email,
    Sms,
    Websocket,
    All,
}

/// Operator-maintained alert rule. Read-only to the engine.
///
/// `conditions` keys by rule type:
/// - THRESHOLD: `metric`, `comparison`, `threshold`
/// - ANOMALY_DETECTION: optional `anomaly_type`
/// - PERFORMANCE_DEGRADATION: optional `degradation_threshold`
/// - FAULT_PREDICTION: optional `failure_probability_threshold`
/// - HEALTH_SCORE: optional `health_score_threshold`
/// - CUSTOM: `metric_<name>` minimum values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub rule_id: String,
    pub name: String,
    pub rule_type: RuleType,
    /// `None` applies the rule to every device
    #[serde(default)]
    pub device_id: Option<String>,
    pub level: AlertLevel,
    #[serde(default)]
    pub conditions: Map<String, Value>,
    #[serde(default = "default_check_interval")]
    pub check_interval_minutes: u32,
    #[serde(default = "default_consecutive")]
    pub consecutive_trigger_count: u32,
    #[serde(default)]
    pub suppression_minutes: u32,
    #[serde(default)]
    pub notification_methods: Vec<NotificationMethod>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_check_interval() -> u32 {
    1
}
fn default_consecutive() -> u32 {
    1
}
fn default_active() -> bool {
    true
}

impl AlertRule {
    /// A rule with neutral admission settings; adjust with struct update.
    pub fn new(rule_id: impl Into<String>, name: impl Into<String>, rule_type: RuleType, level: AlertLevel) -> Self {
        Self {
            rule_id: rule_id.into(),
            name: name.into(),
            rule_type,
            device_id: None,
            level,
            conditions: Map::new(),
            check_interval_minutes: default_check_interval(),
            consecutive_trigger_count: default_consecutive(),
            suppression_minutes: 0,
            notification_methods: Vec::new(),
            active: true,
        }
    }

    pub fn with_condition(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.conditions.insert(key.to_string(), value.into());
        self
    }

    pub fn applies_to(&self, device_id: &str) -> bool {
        self.active && self.device_id.as_deref().map_or(true, |d| d == device_id)
    }
}

// ============================================================================
// Evaluation
// ============================================================================

/// Outcome of evaluating one rule against one metric context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub triggered: bool,
    pub message: String,
    pub triggered_value: Option<f64>,
    pub threshold_value: Option<f64>,
    pub severity: Option<AlertLevel>,
    pub confidence: f64,
    pub recommendation: Option<String>,
    pub details: BTreeMap<String, String>,
}

impl EvaluationResult {
    pub fn not_triggered(message: impl Into<String>) -> Self {
        Self {
            triggered: false,
            message: message.into(),
            triggered_value: None,
            threshold_value: None,
            severity: None,
            confidence: 0.0,
            recommendation: None,
            details: BTreeMap::new(),
        }
    }

    pub fn triggered(message: impl Into<String>, severity: AlertLevel, confidence: f64) -> Self {
        Self {
            triggered: true,
            message: message.into(),
            triggered_value: None,
            threshold_value: None,
            severity: Some(severity),
            confidence: confidence.clamp(0.0, 1.0),
            recommendation: None,
            details: BTreeMap::new(),
        }
    }

    pub fn with_values(mut self, triggered_value: f64, threshold_value: f64) -> Self {
        self.triggered_value = Some(triggered_value);
        self.threshold_value = Some(threshold_value);
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }
}

// ============================================================================
// Alert Records
// ============================================================================

/// Alert lifecycle state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
    Suppressed,
    FalsePositive,
}

impl AlertStatus {
    /// Allowed moves: ACTIVE → ACKNOWLEDGED, and ACTIVE/ACKNOWLEDGED →
    /// RESOLVED/FALSE_POSITIVE. Closed alerts never reopen.
    pub fn can_transition_to(self, next: AlertStatus) -> bool {
        matches!(
            (self, next),
            (AlertStatus::Active, AlertStatus::Acknowledged)
                | (
                    AlertStatus::Active | AlertStatus::Acknowledged,
                    AlertStatus::Resolved | AlertStatus::FalsePositive
                )
        )
    }

    pub fn is_open(self) -> bool {
        matches!(self, AlertStatus::Active | AlertStatus::Acknowledged)
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertStatus::Active => write!(f, "ACTIVE"),
            AlertStatus::Acknowledged => write!(f, "ACKNOWLEDGED"),
            AlertStatus::Resolved => write!(f, "RESOLVED"),
            AlertStatus::Suppressed => write!(f, "SUPPRESSED"),
            AlertStatus::FalsePositive => write!(f, "FALSE_POSITIVE"),
        }
    }
}

/// Who changed an alert's status, when, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub by: String,
    pub at: DateTime<Utc>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub alert_id: String,
    pub rule_id: String,
    pub rule_name: String,
    pub device_id: String,
    pub level: AlertLevel,
    pub title: String,
    pub body: String,
    pub triggered_value: Option<f64>,
    pub threshold_value: Option<f64>,
    pub confidence: f64,
    pub alert_time: DateTime<Utc>,
    pub status: AlertStatus,
    pub acknowledgement: Option<StatusChange>,
    pub resolution: Option<StatusChange>,
}

impl AlertRecord {
    pub fn is_confirmed(&self) -> bool {
        self.acknowledgement.is_some()
    }
}

/// Alert counts since a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AlertStatistics {
    pub total: usize,
    pub by_status: BTreeMap<AlertStatus, usize>,
    pub by_level: BTreeMap<AlertLevel, usize>,
}
