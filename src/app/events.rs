//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them (log lines, a push channel to a UI).

use crate::batch::history::BatchStatus;
use crate::batch::{BatchId, RunMode};
use crate::control::ActuatorState;
use crate::error::Alert;
use crate::sensors::Reading;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Periodic telemetry snapshot.
    Telemetry(TelemetryData),

    /// The service has started (carries the initial mode).
    Started(RunMode),

    BatchStarted {
        id: BatchId,
        name: String,
        mode: RunMode,
    },

    /// The operator moved the batch to another step.
    StepAdvanced {
        id: BatchId,
        index: usize,
        name: String,
    },

    /// The current step has run its full duration.
    StepElapsed { id: BatchId, name: String },

    BatchStopped { id: BatchId, status: BatchStatus },

    AlertRaised(Alert),

    AlertCleared(Alert),
}

/// A point-in-time telemetry snapshot suitable for logging or transmission.
#[derive(Debug, Clone)]
pub struct TelemetryData {
    pub mode: RunMode,
    pub batch: Option<BatchId>,
    pub step_progress_pct: Option<f64>,
    pub reading: Reading,
    pub actuators: ActuatorState,
    pub alert_flags: u8,
}
