//! Mock adapters for integration tests.
//!
//! Records every actuator call so tests can assert on the full command
//! history without touching real GPIO.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, TimeZone, Utc};
use fermenter::app::events::AppEvent;
use fermenter::app::ports::{ActuatorPort, EventSink, SensorPort};
use fermenter::control::ActuatorState;
use fermenter::sensors::Reading;

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ActuatorCall {
    Apply(ActuatorState),
    AllOff,
}

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    pub reading: Reading,
    pub calls: Vec<ActuatorCall>,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self {
            reading: reading(25.0, 60.0),
            calls: Vec::new(),
        }
    }

    pub fn set_reading(&mut self, temp: f32, humidity: f32) {
        self.reading = reading(temp, humidity);
    }

    /// Output state after the most recent call.
    pub fn outputs(&self) -> ActuatorState {
        match self.calls.last() {
            Some(ActuatorCall::Apply(state)) => *state,
            _ => ActuatorState::default(),
        }
    }

    pub fn all_off_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, ActuatorCall::AllOff))
            .count()
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorPort for MockHardware {
    fn read_all(&mut self) -> Reading {
        self.reading
    }
}

impl ActuatorPort for MockHardware {
    fn apply(&mut self, state: &ActuatorState) {
        self.calls.push(ActuatorCall::Apply(*state));
    }

    fn all_off(&mut self) {
        self.calls.push(ActuatorCall::AllOff);
    }
}

// ── Shared variant for the threaded control loop ──────────────

/// Clones share one [`MockHardware`], so a test can inspect what the
/// control loop thread did.
#[derive(Clone, Default)]
pub struct SharedHardware(pub Arc<Mutex<MockHardware>>);

#[allow(dead_code)]
impl SharedHardware {
    pub fn lock(&self) -> std::sync::MutexGuard<'_, MockHardware> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SensorPort for SharedHardware {
    fn read_all(&mut self) -> Reading {
        self.lock().read_all()
    }
}

impl ActuatorPort for SharedHardware {
    fn apply(&mut self, state: &ActuatorState) {
        self.lock().apply(state);
    }

    fn all_off(&mut self) {
        self.lock().all_off();
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Helpers ───────────────────────────────────────────────────

pub fn reading(temp: f32, humidity: f32) -> Reading {
    Reading {
        temperatures: [temp; 3],
        humidity,
        secondary_temp: temp,
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
}
