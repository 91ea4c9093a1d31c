//! Performance scoring and overall device health.

pub mod health;
pub mod performance;

pub use health::{health_score, overall_confidence, risk_level};
pub use performance::{render, PerformanceScorer, ScoringFeatures};
