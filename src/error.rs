//! Unified error types for the chamber controller.
//!
//! Every operator-facing operation funnels into [`Error`], keeping the
//! command dispatch and the control loop's error handling uniform.
//! Sensor faults never reach this type: they are recovered locally with a
//! fallback reading, and alert conditions are tracked as a bitmask by the
//! alert monitor.

use core::fmt;

use crate::app::ports::{ConfigError, StorageError};

// ---------------------------------------------------------------------------
// Top-level controller error
// ---------------------------------------------------------------------------

/// Every fallible operator action in the controller funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Missing or malformed input (no steps, unknown recipe, rating > 5).
    InvalidInput(String),
    /// Unknown history id, custom recipe key or actuator name.
    NotFound(String),
    /// The request contradicts the current run state (already running,
    /// advancing past the last step).
    Conflict(&'static str),
    /// The operation needs an active batch and the chamber is idle.
    NoActiveBatch,
    /// A persistence write failed; the operation was not applied.
    Storage(StorageError),
    /// The control loop is no longer accepting commands.
    Unavailable,
}

impl Error {
    /// Short machine-readable tag for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::NoActiveBatch => "no_active_batch",
            Self::Storage(_) => "storage",
            Self::Unavailable => "unavailable",
        }
    }

    /// Status code an HTTP front end should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidInput(_) | Self::NoActiveBatch => 400,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Storage(_) => 500,
            Self::Unavailable => 503,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub(crate) fn not_found(what: &str, key: &str) -> Self {
        Self::NotFound(format!("{what} '{key}'"))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::Conflict(msg) => write!(f, "conflict: {msg}"),
            Self::NoActiveBatch => write!(f, "no active batch"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Unavailable => write!(f, "control loop unavailable"),
        }
    }
}

impl std::error::Error for Error {}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::ValidationFailed(msg) => Self::InvalidInput(msg.to_owned()),
            ConfigError::Corrupted => Self::InvalidInput("malformed settings".to_owned()),
            ConfigError::IoError => Self::Storage(StorageError::IoError),
        }
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The bus or device node could not be read.
    BusReadFailed,
    /// The device answered but the payload failed its CRC check.
    CrcMismatch,
    /// The device answered with something that could not be parsed.
    Malformed,
    /// No sensor is fitted.
    NotPresent,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BusReadFailed => write!(f, "bus read failed"),
            Self::CrcMismatch => write!(f, "CRC mismatch"),
            Self::Malformed => write!(f, "malformed reading"),
            Self::NotPresent => write!(f, "sensor not present"),
        }
    }
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// Alert conditions are accumulated in a bitfield by the alert monitor so
/// that several simultaneous alerts can be tracked and individually cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Alert {
    /// Chamber average above the absolute `max_temp` limit. Heater is cut.
    OverTemperature = 0b0000_0001,
    /// Chamber average too far above the step target.
    Overheat = 0b0000_0010,
    /// Chamber average stuck below the step target for too long.
    TemperatureLow = 0b0000_0100,
    /// Humidity outside the tolerance band around the step target.
    HumidityOutOfRange = 0b0000_1000,
    /// At least one probe reports exactly 0 °C (disconnected).
    ProbeFault = 0b0001_0000,
}

impl Alert {
    pub const ALL: [Alert; 5] = [
        Alert::OverTemperature,
        Alert::Overheat,
        Alert::TemperatureLow,
        Alert::HumidityOutOfRange,
        Alert::ProbeFault,
    ];

    /// Return the bitmask for this alert.
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OverTemperature => write!(f, "over temperature"),
            Self::Overheat => write!(f, "overheat"),
            Self::TemperatureLow => write!(f, "temperature low"),
            Self::HumidityOutOfRange => write!(f, "humidity out of range"),
            Self::ProbeFault => write!(f, "temperature probe fault"),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Controller-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
