//! Processing Pipeline Module
//!
//! ```text
//! SampleStore ─► DeviceMonitor ─► AnalysisEngine ─► AnalysisReport
//!                      │                                  │
//!                      │                        MetricContext
//!                      ▼                                  ▼
//!                 Scheduler                       AlertManager ─► NotificationDispatcher
//! ```

mod engine;
mod monitor;
mod scheduler;

pub use engine::AnalysisEngine;
pub use monitor::{CheckSummary, DeviceCheck, DeviceMonitor};
pub use scheduler::{Scheduler, SchedulerStats};
