//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the `log` facade (stderr via `env_logger` in the binary).  A push
//! channel to a UI would implement the same trait.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                let [t1, t2, t3] = t.reading.temperatures;
                info!(
                    "TELEM | mode={:?} batch={} step={} | T={:.1}/{:.1}/{:.1}\u{00b0}C \
                     RH={:.1}% T2={:.1}\u{00b0}C | heat={} hum={} fan={} ext={} | \
                     alerts=0b{:08b}",
                    t.mode,
                    t.batch.as_ref().map_or("-", |id| id.as_str()),
                    t.step_progress_pct
                        .map_or_else(|| "-".to_owned(), |p| format!("{p:.1}%")),
                    t1,
                    t2,
                    t3,
                    t.reading.humidity,
                    t.reading.secondary_temp,
                    u8::from(t.actuators.heater),
                    u8::from(t.actuators.humidifier),
                    u8::from(t.actuators.fan_internal),
                    u8::from(t.actuators.fan_extract),
                    t.alert_flags,
                );
            }
            AppEvent::Started(mode) => {
                info!("START | mode={:?}", mode);
            }
            AppEvent::BatchStarted { id, name, mode } => {
                info!("BATCH | {} started: {} ({:?})", id, name, mode);
            }
            AppEvent::StepAdvanced { id, index, name } => {
                info!("BATCH | {} step {} -> {}", id, index + 1, name);
            }
            AppEvent::StepElapsed { id, name } => {
                info!("BATCH | {} step duration reached: {}", id, name);
            }
            AppEvent::BatchStopped { id, status } => {
                info!("BATCH | {} stopped ({:?})", id, status);
            }
            AppEvent::AlertRaised(alert) => {
                warn!("ALERT | raised: {}", alert);
            }
            AppEvent::AlertCleared(alert) => {
                info!("ALERT | cleared: {}", alert);
            }
        }
    }
}
