//! Four-channel relay board driver.
//!
//! Channels follow [`ActuatorState::NAMES`] order: heater, humidifier,
//! internal fan, extraction fan.  Most opto-isolated relay boards energise
//! on a LOW input, so polarity is configurable.
//!
//! ## Safety contract
//!
//! The heater cutoff is enforced by the alert monitor before `apply` is
//! called; this driver is a dumb actuator.  A pin write failure is logged
//! and the commanded state still recorded, so the next tick retries.

use embedded_hal::digital::OutputPin;
use log::warn;

use crate::control::ActuatorState;

pub const CHANNELS: usize = 4;

pub struct RelayBank<P> {
    pins: [P; CHANNELS],
    active_low: bool,
    state: ActuatorState,
}

impl<P: OutputPin> RelayBank<P> {
    /// Take ownership of the pins and drive every relay off.
    pub fn new(pins: [P; CHANNELS], active_low: bool) -> Self {
        let mut bank = Self {
            pins,
            active_low,
            state: ActuatorState::default(),
        };
        bank.all_off();
        bank
    }

    pub fn apply(&mut self, state: &ActuatorState) {
        for (idx, name) in ActuatorState::NAMES.iter().enumerate() {
            let on = state.get(name).unwrap_or(false);
            self.drive(idx, on);
        }
        self.state = *state;
    }

    pub fn all_off(&mut self) {
        self.apply(&ActuatorState::default());
    }

    /// Last commanded state.
    pub fn state(&self) -> ActuatorState {
        self.state
    }

    fn drive(&mut self, idx: usize, on: bool) {
        let high = on != self.active_low;
        let pin = &mut self.pins[idx];
        let result = if high { pin.set_high() } else { pin.set_low() };
        if let Err(e) = result {
            warn!(
                "Relay {}: write failed ({:?})",
                ActuatorState::NAMES[idx],
                embedded_hal::digital::Error::kind(&e)
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::gpio::SimulatedPin;

    fn bank(active_low: bool) -> (RelayBank<SimulatedPin>, [SimulatedPin; CHANNELS]) {
        let pins: [SimulatedPin; CHANNELS] = Default::default();
        (RelayBank::new(pins.clone(), active_low), pins)
    }

    #[test]
    fn active_high_follows_state() {
        let (mut relays, pins) = bank(false);
        relays.apply(&ActuatorState {
            heater: true,
            fan_extract: true,
            ..ActuatorState::default()
        });
        let levels: Vec<bool> = pins.iter().map(SimulatedPin::is_high).collect();
        assert_eq!(levels, vec![true, false, false, true]);
        assert!(relays.state().heater);
    }

    #[test]
    fn active_low_inverts_and_starts_off() {
        let (mut relays, pins) = bank(true);
        assert!(pins.iter().all(SimulatedPin::is_high));

        relays.apply(&ActuatorState {
            humidifier: true,
            ..ActuatorState::default()
        });
        assert!(!pins[1].is_high());
        assert!(pins[0].is_high());

        relays.all_off();
        assert!(pins.iter().all(SimulatedPin::is_high));
        assert!(!relays.state().any_on());
    }
}
