//! Engine configuration loaded from TOML.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::defaults;

/// Environment variable holding the path to a configuration file.
pub const CONFIG_ENV_VAR: &str = "PUMP_SENTINEL_CONFIG";

/// Configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "pump_sentinel.toml";

/// Root configuration for an engine deployment.
///
/// Load with `EngineConfig::load()` which searches:
/// 1. `$PUMP_SENTINEL_CONFIG` env var
/// 2. `./pump_sentinel.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Detector thresholds and per-device overrides
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Fault predictor tuning
    #[serde(default)]
    pub prediction: PredictionConfig,

    /// Alert admission and retention
    #[serde(default)]
    pub alerting: AlertingConfig,

    /// Notification routing and retry policy
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Background loop cadence
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl EngineConfig {
    /// Load configuration using the standard search order:
    /// 1. `$PUMP_SENTINEL_CONFIG` environment variable
    /// 2. `./pump_sentinel.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded engine config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded engine config from ./{}", CONFIG_FILE_NAME);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", CONFIG_FILE_NAME);
                }
            }
        }

        info!("No {} found, using built-in defaults", CONFIG_FILE_NAME);
        Self::default()
    }

    /// Load and validate a specific TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Write the configuration to disk.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))
    }

    /// Validate the configuration, collecting every violation.
    ///
    /// Checks:
    /// - Detector thresholds (including per-device overrides) are positive
    /// - Prediction window and sample minimums are non-zero
    /// - Duplicate tolerance lies in (0, 1)
    /// - At least one delivery attempt, non-negative backoff
    /// - Scheduler intervals are non-zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        self.detection
            .thresholds
            .collect_violations("detection.thresholds", &mut errors);
        for (device, overrides) in &self.detection.devices {
            overrides
                .apply(&self.detection.thresholds)
                .collect_violations(&format!("detection.devices.{device}"), &mut errors);
        }

        let p = &self.prediction;
        if p.window_days == 0 {
            errors.push("prediction.window_days must be > 0".to_string());
        }
        if p.min_training_samples == 0 {
            errors.push("prediction.min_training_samples must be > 0".to_string());
        }
        if p.forecast_points < 2 {
            errors.push(format!(
                "prediction.forecast_points must be >= 2 (got {})",
                p.forecast_points
            ));
        }

        let a = &self.alerting;
        if !(a.duplicate_tolerance > 0.0 && a.duplicate_tolerance < 1.0) {
            errors.push(format!(
                "alerting.duplicate_tolerance must be in (0, 1) (got {})",
                a.duplicate_tolerance
            ));
        }
        if a.duplicate_window_minutes < 0 {
            errors.push("alerting.duplicate_window_minutes must be >= 0".to_string());
        }
        if a.retention_days <= 0 {
            errors.push("alerting.retention_days must be > 0".to_string());
        }

        let n = &self.notification;
        if n.max_attempts == 0 {
            errors.push("notification.max_attempts must be > 0".to_string());
        }
        if n.retry_backoff_minutes < 0 {
            errors.push("notification.retry_backoff_minutes must be >= 0".to_string());
        }

        let s = &self.scheduler;
        for (name, value) in [
            ("rule_check_interval_secs", s.rule_check_interval_secs),
            ("retry_sweep_interval_secs", s.retry_sweep_interval_secs),
            ("cleanup_interval_secs", s.cleanup_interval_secs),
        ] {
            if value == 0 {
                errors.push(format!("scheduler.{name} must be > 0"));
            }
        }
        if s.lookback_hours <= 0 {
            errors.push("scheduler.lookback_hours must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(#[source] toml::ser::Error),

    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// Detection
// ============================================================================

/// Detector thresholds plus optional per-device overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// `[detection.thresholds]` table
    #[serde(default)]
    pub thresholds: DetectorThresholds,

    /// `[detection.devices."P-001"]` tables
    #[serde(default)]
    pub devices: BTreeMap<String, ThresholdOverrides>,
}

impl DetectionConfig {
    /// Effective thresholds for one device.
    pub fn thresholds_for(&self, device_id: &str) -> DetectorThresholds {
        self.devices
            .get(device_id)
            .map_or_else(|| self.thresholds.clone(), |o| o.apply(&self.thresholds))
    }
}

/// Per-metric thresholds consumed by the anomaly detectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorThresholds {
    pub startup_frequency_per_hour: f64,
    pub runtime_minutes: f64,
    pub power_deviation_pct: f64,
    pub vibration_mm_s: f64,
    pub energy_increase_pct: f64,
    pub water_temp_c: f64,
}

impl Default for DetectorThresholds {
    fn default() -> Self {
        Self {
            startup_frequency_per_hour: defaults::STARTUP_FREQUENCY_PER_HOUR,
            runtime_minutes: defaults::RUNTIME_MINUTES,
            power_deviation_pct: defaults::POWER_DEVIATION_PCT,
            vibration_mm_s: defaults::VIBRATION_MM_S,
            energy_increase_pct: defaults::ENERGY_INCREASE_PCT,
            water_temp_c: defaults::WATER_TEMP_C,
        }
    }
}

impl DetectorThresholds {
    fn collect_violations(&self, prefix: &str, errors: &mut Vec<String>) {
        for (name, value) in [
            ("startup_frequency_per_hour", self.startup_frequency_per_hour),
            ("runtime_minutes", self.runtime_minutes),
            ("power_deviation_pct", self.power_deviation_pct),
            ("vibration_mm_s", self.vibration_mm_s),
            ("energy_increase_pct", self.energy_increase_pct),
            ("water_temp_c", self.water_temp_c),
        ] {
            if !(value.is_finite() && value > 0.0) {
                errors.push(format!("{prefix}.{name} must be > 0 (got {value})"));
            }
        }
    }
}

/// Sparse override of [`DetectorThresholds`]; unset fields inherit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startup_frequency_per_hour: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_minutes: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_deviation_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vibration_mm_s: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy_increase_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub water_temp_c: Option<f64>,
}

impl ThresholdOverrides {
    pub fn apply(&self, base: &DetectorThresholds) -> DetectorThresholds {
        DetectorThresholds {
            startup_frequency_per_hour: self
                .startup_frequency_per_hour
                .unwrap_or(base.startup_frequency_per_hour),
            runtime_minutes: self.runtime_minutes.unwrap_or(base.runtime_minutes),
            power_deviation_pct: self.power_deviation_pct.unwrap_or(base.power_deviation_pct),
            vibration_mm_s: self.vibration_mm_s.unwrap_or(base.vibration_mm_s),
            energy_increase_pct: self.energy_increase_pct.unwrap_or(base.energy_increase_pct),
            water_temp_c: self.water_temp_c.unwrap_or(base.water_temp_c),
        }
    }
}

// ============================================================================
// Prediction
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Base window (days) for remaining-useful-life bucketing
    pub window_days: u32,
    /// Samples required before component heuristics run
    pub min_training_samples: usize,
    /// Trailing points used by the one-step forecast
    pub forecast_points: usize,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            window_days: defaults::PREDICTION_WINDOW_DAYS,
            min_training_samples: defaults::MIN_TRAINING_SAMPLES,
            forecast_points: defaults::FORECAST_POINTS,
        }
    }
}

// ============================================================================
// Alerting
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertingConfig {
    pub duplicate_window_minutes: i64,
    pub duplicate_tolerance: f64,
    /// Closed alerts older than this many days are purged
    pub retention_days: i64,
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            duplicate_window_minutes: defaults::DUPLICATE_WINDOW_MINUTES,
            duplicate_tolerance: defaults::DUPLICATE_VALUE_TOLERANCE,
            retention_days: defaults::ALERT_RETENTION_DAYS,
        }
    }
}

// ============================================================================
// Notification
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Delivery attempts before a task is terminally failed
    pub max_attempts: u32,
    pub retry_backoff_minutes: i64,
    pub admin_emails: Vec<String>,
    pub maintenance_emails: Vec<String>,
    pub monitoring_emails: Vec<String>,
    /// Phone numbers paged by SMS for WARNING and CRITICAL alerts
    pub on_call_phones: Vec<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::MAX_DELIVERY_ATTEMPTS,
            retry_backoff_minutes: defaults::RETRY_BACKOFF_MINUTES,
            admin_emails: vec!["admin@pump-station.local".to_string()],
            maintenance_emails: vec!["maintenance@pump-station.local".to_string()],
            monitoring_emails: vec!["monitoring@pump-station.local".to_string()],
            on_call_phones: Vec::new(),
        }
    }
}

// ============================================================================
// Scheduler
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub rule_check_interval_secs: u64,
    pub retry_sweep_interval_secs: u64,
    pub cleanup_interval_secs: u64,
    /// Sample history analysed on each rule check
    pub lookback_hours: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            rule_check_interval_secs: defaults::RULE_CHECK_INTERVAL_SECS,
            retry_sweep_interval_secs: defaults::RETRY_SWEEP_INTERVAL_SECS,
            cleanup_interval_secs: defaults::CLEANUP_INTERVAL_SECS,
            lookback_hours: defaults::ANALYSIS_LOOKBACK_HOURS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.detection.thresholds.vibration_mm_s, 4.5);
        assert_eq!(config.notification.max_attempts, 3);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let toml_str = r#"
            [detection.thresholds]
            vibration_mm_s = 6.0

            [scheduler]
            lookback_hours = 48
        "#;
        let config: EngineConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.detection.thresholds.vibration_mm_s, 6.0);
        assert_eq!(config.detection.thresholds.runtime_minutes, 480.0);
        assert_eq!(config.scheduler.lookback_hours, 48);
        assert_eq!(config.prediction.window_days, 7);
    }

    #[test]
    fn test_device_override_inherits_unset_fields() {
        let toml_str = r#"
            [detection.devices."P-002"]
            vibration_mm_s = 7.1
        "#;
        let config: EngineConfig = toml::from_str(toml_str).expect("parse");
        let p2 = config.detection.thresholds_for("P-002");
        assert_eq!(p2.vibration_mm_s, 7.1);
        assert_eq!(p2.startup_frequency_per_hour, 10.0);

        let other = config.detection.thresholds_for("P-999");
        assert_eq!(other, DetectorThresholds::default());
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut config = EngineConfig::default();
        config.detection.thresholds.vibration_mm_s = 0.0;
        config.alerting.duplicate_tolerance = 1.5;
        config.notification.max_attempts = 0;
        config.detection.devices.insert(
            "P-003".to_string(),
            ThresholdOverrides {
                runtime_minutes: Some(-5.0),
                ..Default::default()
            },
        );

        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert!(errors.iter().any(|e| e.contains("detection.thresholds.vibration_mm_s")), "{errors:?}");
                assert!(errors.iter().any(|e| e.contains("duplicate_tolerance")), "{errors:?}");
                assert!(errors.iter().any(|e| e.contains("max_attempts")), "{errors:?}");
                assert!(
                    errors.iter().any(|e| e.contains("detection.devices.P-003.runtime_minutes")),
                    "{errors:?}"
                );
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);

        let mut config = EngineConfig::default();
        config.prediction.window_days = 14;
        config.notification.on_call_phones = vec!["+10000000000".to_string()];
        config.save_to_file(&path).expect("save");

        let loaded = EngineConfig::load_from_file(&path).expect("load");
        assert_eq!(loaded.prediction.window_days, 14);
        assert_eq!(loaded.notification.on_call_phones.len(), 1);
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[detection.thresholds\nvibration_mm_s = ").expect("write");

        let err = EngineConfig::load_from_file(&path).expect_err("should fail");
        assert!(matches!(err, ConfigError::Parse(_, _)));
        assert!(err.to_string().contains("broken.toml"));
    }
}
