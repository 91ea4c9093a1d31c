//! System-wide default constants.
//!
//! Centralises the thresholds and cut points used by the analytics and
//! alerting engine. Grouped by subsystem for easy discovery. Values that
//! operators may tune are mirrored in [`super::EngineConfig`].

// ============================================================================
// Anomaly Detection
// ============================================================================

/// Pump starts per hour above which start frequency is abnormal.
pub const STARTUP_FREQUENCY_PER_HOUR: f64 = 10.0;

/// Expected average runtime per cycle (minutes). 480 = 8 hours.
pub const RUNTIME_MINUTES: f64 = 480.0;

/// Tolerated deviation of mean power from its median baseline (%).
pub const POWER_DEVIATION_PCT: f64 = 20.0;

/// Vibration velocity limit (mm/s), ISO 10816 class II boundary.
pub const VIBRATION_MM_S: f64 = 4.5;

/// Tolerated energy growth rate (%) before the trend is flagged.
pub const ENERGY_INCREASE_PCT: f64 = 15.0;

/// Water temperature reference (°C).
pub const WATER_TEMP_C: f64 = 60.0;

/// Power deviation (%) above which mechanical/electrical checks are advised.
pub const POWER_RECOMMENDATION_DEVIATION_PCT: f64 = 15.0;

/// Energy growth (%) above which an immediate check is advised.
pub const ENERGY_URGENT_GROWTH_PCT: f64 = 20.0;

/// Peak vibration (mm/s) that warrants stopping the pump.
pub const VIBRATION_STOP_MM_S: f64 = 7.0;

// ============================================================================
// Fault Prediction
// ============================================================================

/// Minimum samples before component heuristics are trusted.
pub const MIN_TRAINING_SAMPLES: usize = 30;

/// Base prediction window (days) used for remaining-useful-life bucketing.
pub const PREDICTION_WINDOW_DAYS: u32 = 7;

/// Points used for one-step-ahead forecasts.
pub const FORECAST_POINTS: usize = 10;

/// Half-width of the forecast confidence interval (fraction of the forecast).
pub const FORECAST_INTERVAL_FRACTION: f64 = 0.10;

/// Sample count at which data-volume confidence saturates.
pub const CONFIDENCE_SATURATION_SAMPLES: f64 = 100.0;

/// Hours in a year of continuous operation.
pub const HOURS_PER_YEAR: u64 = 8_760;

// ============================================================================
// Performance Scoring
// ============================================================================

/// Mean vibration (mm/s) that costs the heavy reliability deduction.
pub const RELIABILITY_VIBRATION_HIGH_MM_S: f64 = 4.5;

/// Mean vibration (mm/s) that costs the light reliability deduction.
pub const RELIABILITY_VIBRATION_ELEVATED_MM_S: f64 = 3.0;

/// Cumulative runtime (hours) for the light maintenance deduction. 4 380 = half a year.
pub const MAINTENANCE_RUNTIME_HALF_YEAR_HOURS: f64 = 4_380.0;

// ============================================================================
// Maintenance Advisor
// ============================================================================

/// Cost units per urgent action.
pub const URGENT_ACTION_COST: f64 = 5_000.0;

/// Cost units per scheduled action.
pub const SCHEDULED_ACTION_COST: f64 = 2_000.0;

/// Cost units per preventive action.
pub const PREVENTIVE_ACTION_COST: f64 = 500.0;

/// Offset (days) when only scheduled work is pending; midpoint of 7..14.
pub const SCHEDULED_OFFSET_DAYS: i64 = 10;

/// Offset (days) when only preventive work is pending; midpoint of 15..30.
pub const PREVENTIVE_OFFSET_DAYS: i64 = 22;

// ============================================================================
// Alerting
// ============================================================================

/// Look-back for the duplicate-value check (minutes).
pub const DUPLICATE_WINDOW_MINUTES: i64 = 60;

/// Relative difference below which two triggered values are duplicates.
pub const DUPLICATE_VALUE_TOLERANCE: f64 = 0.05;

/// Tolerance used by the `eq` / `ne` comparison operators.
pub const EQUALITY_EPSILON: f64 = 1e-4;

/// Anomaly-rate (%) above which an anomaly rule triggers.
pub const ANOMALY_RATE_THRESHOLD: f64 = 20.0;

/// Analysis confidence below which an anomaly rule triggers.
pub const ANOMALY_MIN_CONFIDENCE: f64 = 0.5;

/// Default allowed performance drop (%) for degradation rules.
pub const DEGRADATION_THRESHOLD_PCT: f64 = 20.0;

/// Default failure probability for fault prediction rules.
pub const FAILURE_PROBABILITY_THRESHOLD: f64 = 0.7;

/// Default health score floor for health rules.
pub const HEALTH_SCORE_THRESHOLD: f64 = 60.0;

/// Closed alerts older than this are purged (days).
pub const ALERT_RETENTION_DAYS: i64 = 90;

// ============================================================================
// Notification
// ============================================================================

/// Delivery attempts per task before it is terminally failed.
pub const MAX_DELIVERY_ATTEMPTS: u32 = 3;

/// Delay between delivery attempts (minutes).
pub const RETRY_BACKOFF_MINUTES: i64 = 5;

/// Recipient used for push and in-app channels.
pub const SYSTEM_RECIPIENT: &str = "SYSTEM";

// ============================================================================
// Scheduler
// ============================================================================

/// How often every device is re-evaluated against its rules (seconds).
pub const RULE_CHECK_INTERVAL_SECS: u64 = 60;

/// How often failed notifications are swept for retry (seconds).
pub const RETRY_SWEEP_INTERVAL_SECS: u64 = 300;

/// How often the retention cleanup runs (seconds). 86 400 = 1 day.
pub const CLEANUP_INTERVAL_SECS: u64 = 86_400;

/// Sample look-back used for each scheduled analysis (hours).
pub const ANALYSIS_LOOKBACK_HOURS: i64 = 24;
