//! Telemetry sample types: Sample, Metric

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Telemetry Sample
// ============================================================================

/// One periodic telemetry reading from a pump.
///
/// Missing readings are `None` and are skipped by every statistic; they are
/// never treated as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    /// 1 = running, 0 = stopped
    #[serde(default)]
    pub pump_status: Option<u8>,
    /// Minutes of runtime in the current cycle
    #[serde(default)]
    pub runtime_minutes: Option<f64>,
    #[serde(default)]
    pub current_amperage: Option<f64>,
    #[serde(default)]
    pub voltage: Option<f64>,
    #[serde(default)]
    pub power_kw: Option<f64>,
    #[serde(default)]
    pub energy_kwh: Option<f64>,
    #[serde(default)]
    pub water_pressure_kpa: Option<f64>,
    #[serde(default)]
    pub flow_rate_m3h: Option<f64>,
    #[serde(default)]
    pub water_temp_c: Option<f64>,
    /// Vibration velocity (mm/s RMS)
    #[serde(default)]
    pub vibration_mm_s: Option<f64>,
    #[serde(default)]
    pub noise_db: Option<f64>,
    #[serde(default)]
    pub fault_code: Option<String>,
    /// 0 = none .. 3 = severe
    #[serde(default)]
    pub alarm_level: Option<u8>,
    #[serde(default)]
    pub maintenance_flag: bool,
}

impl Sample {
    /// An empty reading; fill fields with struct-update syntax.
    pub fn new(device_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp,
            pump_status: None,
            runtime_minutes: None,
            current_amperage: None,
            voltage: None,
            power_kw: None,
            energy_kwh: None,
            water_pressure_kpa: None,
            flow_rate_m3h: None,
            water_temp_c: None,
            vibration_mm_s: None,
            noise_db: None,
            fault_code: None,
            alarm_level: None,
            maintenance_flag: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.pump_status == Some(1)
    }

    /// Non-empty fault code, if any.
    pub fn fault(&self) -> Option<&str> {
        self.fault_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }

    /// Alarm above the informational level.
    pub fn is_alarm(&self) -> bool {
        self.alarm_level.is_some_and(|level| level > 1)
    }
}

// ============================================================================
// Metric accessors
// ============================================================================

/// Numeric telemetry channels of a [`Sample`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    RuntimeMinutes,
    Current,
    Voltage,
    Power,
    Energy,
    Pressure,
    FlowRate,
    WaterTemp,
    Vibration,
    Noise,
}

impl Metric {
    /// Read this metric from a sample; non-finite readings count as absent.
    pub fn read(self, sample: &Sample) -> Option<f64> {
        let value = match self {
            Self::RuntimeMinutes => sample.runtime_minutes,
            Self::Current => sample.current_amperage,
            Self::Voltage => sample.voltage,
            Self::Power => sample.power_kw,
            Self::Energy => sample.energy_kwh,
            Self::Pressure => sample.water_pressure_kpa,
            Self::FlowRate => sample.flow_rate_m3h,
            Self::WaterTemp => sample.water_temp_c,
            Self::Vibration => sample.vibration_mm_s,
            Self::Noise => sample.noise_db,
        };
        value.filter(|v| v.is_finite())
    }

    /// Raw series aligned with `samples`, absent readings kept as `None`.
    pub fn series(self, samples: &[Sample]) -> Vec<Option<f64>> {
        samples.iter().map(|s| self.read(s)).collect()
    }

    /// Present, strictly positive readings in sample order.
    pub fn positive_values(self, samples: &[Sample]) -> Vec<f64> {
        samples
            .iter()
            .filter_map(|s| self.read(s))
            .filter(|v| *v > 0.0)
            .collect()
    }

    /// Stable key used in forecasts and metric contexts.
    pub fn key(self) -> &'static str {
        match self {
            Self::RuntimeMinutes => "runtime_minutes",
            Self::Current => "current_amperage",
            Self::Voltage => "voltage",
            Self::Power => "power_kw",
            Self::Energy => "energy_kwh",
            Self::Pressure => "water_pressure_kpa",
            Self::FlowRate => "flow_rate_m3h",
            Self::WaterTemp => "water_temp_c",
            Self::Vibration => "vibration_mm_s",
            Self::Noise => "noise_db",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(minute: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + minute * 60, 0).expect("valid timestamp")
    }

    #[test]
    fn test_positive_values_skip_absent_and_zero() {
        let samples = vec![
            Sample { power_kw: Some(12.0), ..Sample::new("P1", ts(0)) },
            Sample { power_kw: None, ..Sample::new("P1", ts(1)) },
            Sample { power_kw: Some(0.0), ..Sample::new("P1", ts(2)) },
            Sample { power_kw: Some(f64::NAN), ..Sample::new("P1", ts(3)) },
            Sample { power_kw: Some(14.0), ..Sample::new("P1", ts(4)) },
        ];
        assert_eq!(Metric::Power.positive_values(&samples), vec![12.0, 14.0]);
        assert_eq!(Metric::Power.series(&samples).iter().filter(|v| v.is_none()).count(), 2);
    }

    #[test]
    fn test_fault_and_alarm_flags() {
        let blank = Sample { fault_code: Some("  ".to_string()), alarm_level: Some(1), ..Sample::new("P1", ts(0)) };
        assert_eq!(blank.fault(), None);
        assert!(!blank.is_alarm());

        let faulted = Sample { fault_code: Some("CTRL-07".to_string()), alarm_level: Some(2), ..Sample::new("P1", ts(0)) };
        assert_eq!(faulted.fault(), Some("CTRL-07"));
        assert!(faulted.is_alarm());
    }

    #[test]
    fn test_sample_deserializes_with_missing_fields() {
        let json = r#"{"device_id":"P1","timestamp":"2024-03-01T08:00:00Z","power_kw":11.5}"#;
        let sample: Sample = serde_json::from_str(json).expect("parse");
        assert_eq!(sample.power_kw, Some(11.5));
        assert_eq!(sample.vibration_mm_s, None);
        assert!(!sample.maintenance_flag);
    }
}
