//! System configuration parameters
//!
//! [`SystemConfig`] holds the controller's tunables and is loaded once at
//! startup through the [`ConfigPort`](crate::app::ports::ConfigPort).
//! [`AlertSettings`] is the operator-editable settings document (alert
//! thresholds) that the front end reads and writes at runtime.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    // --- Control ---
    /// Heater switches on below `target - heater_hysteresis_c`
    pub heater_hysteresis_c: f32,
    /// Humidifier switches on below `target - humidifier_hysteresis_pct`
    pub humidifier_hysteresis_pct: f32,
    /// Length of one cyclic ventilation window (minutes)
    pub fan_cycle_period_min: u32,
    /// Minutes at the start of each window during which the internal fan runs
    pub fan_cycle_on_min: u32,

    // --- Sensors ---
    /// Root of the 1-Wire sysfs bus holding the DS18B20 probes
    pub w1_devices_path: PathBuf,
    /// Humidity reported when the humidity sensor is unavailable (%RH)
    pub fallback_humidity_pct: f32,
    /// Secondary temperature reported when every probe reads 0 °C
    pub fallback_temperature_c: f32,

    // --- Journal / storage ---
    /// Maximum number of journal entries kept for the active batch
    pub event_log_capacity: usize,
    /// Directory holding the persisted JSON documents
    pub data_dir: PathBuf,

    // --- Outputs ---
    /// Relay board energises a channel on a LOW output
    pub relay_active_low: bool,

    // --- Timing ---
    /// Control loop interval (milliseconds)
    pub control_loop_interval_ms: u32,
    /// Telemetry report interval (seconds)
    pub telemetry_interval_secs: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Control
            heater_hysteresis_c: 0.5,
            humidifier_hysteresis_pct: 5.0,
            fan_cycle_period_min: 15,
            fan_cycle_on_min: 5, // 33% duty

            // Sensors
            w1_devices_path: PathBuf::from("/sys/bus/w1/devices"),
            fallback_humidity_pct: 50.0,
            fallback_temperature_c: 22.0,

            // Journal / storage
            event_log_capacity: 500,
            data_dir: PathBuf::from("data"),

            // Outputs
            relay_active_low: true,

            // Timing
            control_loop_interval_ms: 1000, // 1 Hz
            telemetry_interval_secs: 60,    // 1/min
        }
    }
}

impl SystemConfig {
    /// Range-check every field. Invalid values are rejected, not clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=10.0).contains(&self.heater_hysteresis_c) {
            return Err(ConfigError::ValidationFailed(
                "heater_hysteresis_c must be 0.0–10.0",
            ));
        }
        if !(0.0..=50.0).contains(&self.humidifier_hysteresis_pct) {
            return Err(ConfigError::ValidationFailed(
                "humidifier_hysteresis_pct must be 0.0–50.0",
            ));
        }
        if !(1..=1440).contains(&self.fan_cycle_period_min) {
            return Err(ConfigError::ValidationFailed(
                "fan_cycle_period_min must be 1–1440",
            ));
        }
        if self.fan_cycle_on_min > self.fan_cycle_period_min {
            return Err(ConfigError::ValidationFailed(
                "fan_cycle_on_min must not exceed fan_cycle_period_min",
            ));
        }
        if !(0.0..=100.0).contains(&self.fallback_humidity_pct) {
            return Err(ConfigError::ValidationFailed(
                "fallback_humidity_pct must be 0.0–100.0",
            ));
        }
        if !(1..=100_000).contains(&self.event_log_capacity) {
            return Err(ConfigError::ValidationFailed(
                "event_log_capacity must be 1–100000",
            ));
        }
        if !(100..=60_000).contains(&self.control_loop_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "control_loop_interval_ms must be 100–60000",
            ));
        }
        if !(5..=3600).contains(&self.telemetry_interval_secs) {
            return Err(ConfigError::ValidationFailed(
                "telemetry_interval_secs must be 5–3600",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Operator settings (alert thresholds)
// ---------------------------------------------------------------------------

/// Alert thresholds edited from the front end.
///
/// The document is otherwise opaque: keys the controller does not know
/// about are kept in `extra` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    /// Minutes the temperature may stay below target before alerting
    pub temp_alert_delay: u32,
    /// Allowed humidity deviation from target (%RH)
    pub humidity_tolerance: f32,
    /// Allowed excursion above the step target (°C)
    pub overheat_threshold: f32,
    /// Absolute chamber limit; the heater is cut above it (°C)
    pub max_temp: f32,
    /// Hours after a step starts during which deviation alerts are muted
    pub initial_phase_no_alert: f64,
    /// Reminders, in minutes before the end of the run
    pub end_alerts: Vec<u32>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            temp_alert_delay: 20,
            humidity_tolerance: 10.0,
            overheat_threshold: 10.0,
            max_temp: 60.0,
            initial_phase_no_alert: 2.0,
            end_alerts: vec![120, 60, 30],
            extra: serde_json::Map::new(),
        }
    }
}

impl AlertSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=100.0).contains(&self.humidity_tolerance) {
            return Err(ConfigError::ValidationFailed(
                "humidity_tolerance must be 0–100",
            ));
        }
        if !(0.0..=50.0).contains(&self.overheat_threshold) {
            return Err(ConfigError::ValidationFailed(
                "overheat_threshold must be 0–50",
            ));
        }
        if !(20.0..=90.0).contains(&self.max_temp) {
            return Err(ConfigError::ValidationFailed("max_temp must be 20–90"));
        }
        if !(0.0..=720.0).contains(&self.initial_phase_no_alert) {
            return Err(ConfigError::ValidationFailed(
                "initial_phase_no_alert must be 0–720 hours",
            ));
        }
        Ok(())
    }
}
