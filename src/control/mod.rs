//! Threshold control policy.
//!
//! [`ControlPolicy::compute`] is a pure function of the current reading, the
//! active step and the wall clock.  The actuator state is recomputed from
//! scratch every tick; nothing is latched between ticks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::batch::RunMode;
use crate::config::SystemConfig;
use crate::recipes::{Step, VentilationMode};
use crate::sensors::Reading;

/// Commanded output of every relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActuatorState {
    pub heater: bool,
    pub humidifier: bool,
    pub fan_internal: bool,
    pub fan_extract: bool,
}

impl ActuatorState {
    /// Actuator names accepted by the manual override.
    pub const NAMES: [&'static str; 4] = ["heater", "humidifier", "fan_internal", "fan_extract"];

    pub fn get(&self, name: &str) -> Option<bool> {
        match name {
            "heater" => Some(self.heater),
            "humidifier" => Some(self.humidifier),
            "fan_internal" => Some(self.fan_internal),
            "fan_extract" => Some(self.fan_extract),
            _ => None,
        }
    }

    /// Set one output by name.  Returns `false` for an unknown name.
    pub fn set(&mut self, name: &str, on: bool) -> bool {
        let slot = match name {
            "heater" => &mut self.heater,
            "humidifier" => &mut self.humidifier,
            "fan_internal" => &mut self.fan_internal,
            "fan_extract" => &mut self.fan_extract,
            _ => return false,
        };
        *slot = on;
        true
    }

    pub fn any_on(&self) -> bool {
        self.heater || self.humidifier || self.fan_internal || self.fan_extract
    }
}

/// Hysteresis bands and the cyclic ventilation window.
#[derive(Debug, Clone, Copy)]
pub struct ControlPolicy {
    heater_hysteresis_c: f32,
    humidifier_hysteresis_pct: f32,
    fan_cycle_period_min: i64,
    fan_cycle_on_min: i64,
}

impl ControlPolicy {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            heater_hysteresis_c: config.heater_hysteresis_c,
            humidifier_hysteresis_pct: config.humidifier_hysteresis_pct,
            fan_cycle_period_min: i64::from(config.fan_cycle_period_min.max(1)),
            fan_cycle_on_min: i64::from(config.fan_cycle_on_min),
        }
    }

    /// Compute the desired actuator state.  With no active step every
    /// output is off.
    pub fn compute(
        &self,
        reading: &Reading,
        active: Option<(&Step, RunMode)>,
        now: DateTime<Utc>,
    ) -> ActuatorState {
        let Some((step, mode)) = active else {
            return ActuatorState::default();
        };

        let heater = reading.average_temp() < step.target_temp_c - self.heater_hysteresis_c;
        let humidifier =
            reading.humidity < step.target_humidity_pct - self.humidifier_hysteresis_pct;

        let (fan_internal, fan_extract) = match step.ventilation {
            VentilationMode::Off => (false, false),
            VentilationMode::On => (true, mode == RunMode::Dehydrating),
            VentilationMode::Cyclic => (self.cycle_window_open(now), false),
        };

        ActuatorState {
            heater,
            humidifier,
            fan_internal,
            fan_extract,
        }
    }

    /// True during the first `fan_cycle_on_min` minutes of every
    /// `fan_cycle_period_min`-minute window, counted from the Unix epoch.
    fn cycle_window_open(&self, now: DateTime<Utc>) -> bool {
        let minutes = now.timestamp().div_euclid(60);
        minutes.rem_euclid(self.fan_cycle_period_min) < self.fan_cycle_on_min
    }
}
