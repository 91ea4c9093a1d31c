//! Alerting: metric contexts, rule evaluation and alert admission.
//!
//! ```text
//! AnalysisReport ─► MetricContext ─► RuleEngine::evaluate (per rule)
//!                                         │
//!                                         ▼
//!                               AlertManager::admit ─► AlertStore
//!                                         │
//!                                         ▼
//!                               NotificationDispatcher
//! ```

pub mod context;
pub mod manager;
pub mod rules;

pub use context::MetricContext;
pub use manager::{Admission, AlertError, AlertManager};
pub use rules::{RuleEngine, RuleError};
