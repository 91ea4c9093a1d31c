//! pump-sentinel: Pump Telemetry Analytics and Alerting
//!
//! Analyses windows of water-pump telemetry, turns the result into alerts
//! through operator-defined rules, and delivers those alerts over pluggable
//! notification transports.
//!
//! ## Architecture
//!
//! - **Detectors**: one anomaly finding per metric (startups, runtime, energy,
//!   vibration, power, fault classification)
//! - **Prediction**: heuristic component failure probabilities and RUL
//! - **Scoring**: efficiency / reliability / maintenance scores, health score
//! - **Advisor**: prioritised maintenance plan with a cost estimate
//! - **Alerting**: rule evaluation, admission (suppression, duplicates,
//!   consecutive triggers) and the alert lifecycle
//! - **Notify**: recipient routing, delivery and retry with backoff
//! - **Pipeline**: analysis engine, device monitor and background scheduler

pub mod config;
pub mod types;
pub mod stats;
pub mod heuristics;
pub mod detectors;
pub mod prediction;
pub mod scoring;
pub mod advisor;
pub mod alerting;
pub mod notify;
pub mod storage;
pub mod pipeline;

// Re-export configuration
pub use config::EngineConfig;

// Re-export commonly used types
pub use types::{
    AlertLevel, AlertRecord, AlertRule, AlertStatus, AnalysisReport, AnalysisType, Finding,
    MaintenancePlan, NotificationTask, Prediction, RiskLevel, RuleType, Sample, Severity,
};

// Re-export the main components
pub use alerting::{AlertManager, MetricContext, RuleEngine};
pub use notify::{NotificationDispatcher, NotificationTransport};
pub use pipeline::{AnalysisEngine, DeviceMonitor, Scheduler};
