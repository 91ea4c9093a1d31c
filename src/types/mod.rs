//! Shared data structures for the pump analytics and alerting engine
//!
//! This module defines the core types that flow through the pipeline:
//! - Telemetry: Sample, Metric
//! - Analysis: Finding, Prediction, PerformanceReport, MaintenancePlan, AnalysisReport
//! - Alerting: AlertRule, EvaluationResult, AlertRecord
//! - Delivery: NotificationTask

mod sample;
mod analysis;
mod alert;
mod notification;

pub use sample::*;
pub use analysis::*;
pub use alert::*;
pub use notification::*;
