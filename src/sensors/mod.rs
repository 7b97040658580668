//! Sensor subsystem: individual drivers and the aggregating [`SensorHub`].
//!
//! The hub owns the temperature probe bus and the (optional) humidity
//! sensor and produces one normalized [`Reading`] per tick.  Failures never
//! propagate: missing probes read 0 °C and a missing humidity sensor is
//! replaced by fallback values.

pub mod humidity;
pub mod temperature;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::SensorPort;
use crate::config::SystemConfig;
use crate::error::SensorError;

/// Number of chamber temperature probes the controller averages.
pub const PROBE_COUNT: usize = 3;

/// One normalized sample of every chamber sensor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Reading {
    /// Chamber probes (°C), always exactly three.
    #[serde(rename = "temperature")]
    pub temperatures: [f32; PROBE_COUNT],
    /// Relative humidity (%RH).
    pub humidity: f32,
    /// Temperature reported by the humidity sensor (°C).
    #[serde(rename = "temp_sht40")]
    pub secondary_temp: f32,
}

impl Reading {
    /// Mean of the three probes.  A disconnected probe reads 0 °C and is
    /// averaged in like any other.
    pub fn average_temp(&self) -> f32 {
        self.temperatures.iter().sum::<f32>() / PROBE_COUNT as f32
    }

    /// Number of probes reporting exactly 0 °C.
    pub fn dead_probes(&self) -> usize {
        self.temperatures.iter().filter(|t| **t == 0.0).count()
    }
}

/// Pad with 0 °C or truncate so that exactly [`PROBE_COUNT`] values remain.
pub fn normalize_probes(raw: &[f32]) -> [f32; PROBE_COUNT] {
    let mut out = [0.0; PROBE_COUNT];
    for (slot, value) in out.iter_mut().zip(raw) {
        *slot = *value;
    }
    out
}

// ---------------------------------------------------------------------------
// Driver traits
// ---------------------------------------------------------------------------

/// A bus of chamber temperature probes.
pub trait TemperatureProbes {
    /// Celsius readings in a stable probe order.  An unreadable probe keeps
    /// its slot and reports 0 °C rather than being skipped, so the other
    /// probes never shift position; the control average includes it and
    /// the alert monitor flags it.  An unreadable bus yields an empty list.
    fn read_celsius(&mut self) -> Vec<f32>;
}

/// Combined humidity + temperature sensor.
pub trait HumiditySensor {
    fn read(&mut self) -> Result<humidity::HumidityReading, SensorError>;
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

/// Aggregates all sensor drivers and produces a unified reading.
pub struct SensorHub {
    probes: Box<dyn TemperatureProbes + Send>,
    humidity: Option<Box<dyn HumiditySensor + Send>>,
    fallback_humidity_pct: f32,
    fallback_temperature_c: f32,
    /// True while the humidity path is serving fallback values.
    degraded: bool,
}

impl SensorHub {
    pub fn new(
        probes: Box<dyn TemperatureProbes + Send>,
        humidity: Option<Box<dyn HumiditySensor + Send>>,
        config: &SystemConfig,
    ) -> Self {
        Self {
            probes,
            humidity,
            fallback_humidity_pct: config.fallback_humidity_pct,
            fallback_temperature_c: config.fallback_temperature_c,
            degraded: false,
        }
    }

    /// Whether the last reading used fallback humidity values.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    fn fallback(&self, temperatures: &[f32; PROBE_COUNT]) -> (f32, f32) {
        let secondary = if temperatures.iter().any(|t| *t != 0.0) {
            temperatures.iter().sum::<f32>() / PROBE_COUNT as f32
        } else {
            self.fallback_temperature_c
        };
        (self.fallback_humidity_pct, secondary)
    }
}

impl SensorPort for SensorHub {
    /// Read every sensor and return a unified reading.
    ///
    /// Humidity failures are logged on the transition into and out of
    /// the degraded mode only, not on every tick.
    fn read_all(&mut self) -> Reading {
        let temperatures = normalize_probes(&self.probes.read_celsius());

        let measured = match self.humidity.as_mut() {
            Some(sensor) => sensor.read(),
            None => Err(SensorError::NotPresent),
        };

        let (humidity, secondary_temp) = match measured {
            Ok(m) => {
                if self.degraded {
                    info!("Humidity sensor recovered");
                    self.degraded = false;
                }
                (m.humidity_pct, m.temperature_c)
            }
            Err(e) => {
                if !self.degraded {
                    warn!("Humidity sensor unavailable ({e}), using fallback values");
                    self.degraded = true;
                }
                self.fallback(&temperatures)
            }
        };

        Reading {
            temperatures,
            humidity,
            secondary_temp,
        }
    }
}
