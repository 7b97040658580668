//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the [`SensorHub`] and the [`RelayBank`], exposing them through
//! [`SensorPort`] and [`ActuatorPort`].  This is the only module in the
//! system that touches actual hardware.  With [`SimulatedPin`]s and fixed
//! sensors it doubles as the `--dry-run` backend.
//!
//! [`SimulatedPin`]: super::gpio::SimulatedPin

use embedded_hal::digital::OutputPin;

use crate::app::ports::{ActuatorPort, SensorPort};
use crate::control::ActuatorState;
use crate::drivers::relay::RelayBank;
use crate::sensors::{Reading, SensorHub};

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<P> {
    sensor_hub: SensorHub,
    relays: RelayBank<P>,
}

impl<P: OutputPin> HardwareAdapter<P> {
    pub fn new(sensor_hub: SensorHub, relays: RelayBank<P>) -> Self {
        Self { sensor_hub, relays }
    }

    /// Last state written to the relays.
    pub fn actuators(&self) -> ActuatorState {
        self.relays.state()
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<P: OutputPin> SensorPort for HardwareAdapter<P> {
    fn read_all(&mut self) -> Reading {
        self.sensor_hub.read_all()
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl<P: OutputPin> ActuatorPort for HardwareAdapter<P> {
    fn apply(&mut self, state: &ActuatorState) {
        self.relays.apply(state);
    }

    fn all_off(&mut self) {
        self.relays.all_off();
    }
}
