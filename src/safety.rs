//! Alert monitor.
//!
//! Runs **every tick after the control policy** and keeps an alert bitmask
//! (see [`Alert`]).  Each condition is re-evaluated from scratch; a bit is
//! set while its condition holds and cleared as soon as it does not.
//!
//! ## Alert lifecycle
//!
//! 1. A condition triggers an alert (e.g. chamber above `max_temp`).
//! 2. The monitor sets the bit and reports it as *raised* once.
//! 3. While [`Alert::OverTemperature`] is set, [`AlertMonitor::gate`]
//!    forces the heater off whatever the policy asked for.
//! 4. When the condition clears the bit is unset and reported as
//!    *cleared* once.
//!
//! End-of-run reminders are one-shot per batch: each threshold in
//! `end_alerts` fires the first time the remaining time drops to it.

use chrono::{DateTime, Duration, Utc};
use log::{error, info};

use crate::config::AlertSettings;
use crate::control::ActuatorState;
use crate::error::Alert;
use crate::recipes::Step;
use crate::sensors::Reading;

/// What the monitor needs to know about the running batch.
#[derive(Debug, Clone, Copy)]
pub struct RunView<'a> {
    pub step: &'a Step,
    pub step_elapsed_hours: f64,
    pub remaining_hours: f64,
}

/// Edges detected by one evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertReport {
    pub raised: Vec<Alert>,
    pub cleared: Vec<Alert>,
    /// End-of-run thresholds (minutes) crossed on this tick.
    pub reminders: Vec<u32>,
}

impl AlertReport {
    pub fn is_empty(&self) -> bool {
        self.raised.is_empty() && self.cleared.is_empty() && self.reminders.is_empty()
    }
}

pub struct AlertMonitor {
    heater_hysteresis_c: f32,
    /// Active alert bitmask.
    alerts: u8,
    /// Since when the chamber has been below the heater band.
    low_since: Option<DateTime<Utc>>,
    /// End-of-run thresholds already reported for this batch.
    reminders_sent: Vec<u32>,
}

impl AlertMonitor {
    pub fn new(heater_hysteresis_c: f32) -> Self {
        Self {
            heater_hysteresis_c,
            alerts: 0,
            low_since: None,
            reminders_sent: Vec::new(),
        }
    }

    /// Forget timers and reminders at the start of a batch.  Reminders for
    /// thresholds at or above the whole run length are considered sent.
    pub fn reset(&mut self, settings: &AlertSettings, total_duration_hours: f64) {
        self.low_since = None;
        let total_min = total_duration_hours * 60.0;
        self.reminders_sent = settings
            .end_alerts
            .iter()
            .copied()
            .filter(|m| f64::from(*m) >= total_min)
            .collect();
    }

    /// Evaluate every alert condition against the latest reading.
    pub fn evaluate(
        &mut self,
        reading: &Reading,
        run: Option<RunView<'_>>,
        settings: &AlertSettings,
        now: DateTime<Utc>,
    ) -> AlertReport {
        let mut report = AlertReport::default();
        let avg = reading.average_temp();

        // ── Absolute limit ────────────────────────────────────────
        self.eval_alert(Alert::OverTemperature, avg > settings.max_temp, &mut report);

        // ── Probe health ──────────────────────────────────────────
        self.eval_alert(Alert::ProbeFault, reading.dead_probes() > 0, &mut report);

        // ── Setpoint deviation (running only) ─────────────────────
        let Some(run) = run else {
            self.low_since = None;
            for alert in [Alert::Overheat, Alert::TemperatureLow, Alert::HumidityOutOfRange] {
                self.eval_alert(alert, false, &mut report);
            }
            return report;
        };

        let target = run.step.target_temp_c;
        let settled = run.step_elapsed_hours >= settings.initial_phase_no_alert;

        self.eval_alert(
            Alert::Overheat,
            avg > target + settings.overheat_threshold,
            &mut report,
        );

        if avg < target - self.heater_hysteresis_c {
            self.low_since.get_or_insert(now);
        } else {
            self.low_since = None;
        }
        let delay = Duration::minutes(i64::from(settings.temp_alert_delay));
        let low_too_long = self.low_since.is_some_and(|since| now - since >= delay);
        self.eval_alert(Alert::TemperatureLow, settled && low_too_long, &mut report);

        let humidity_off =
            (reading.humidity - run.step.target_humidity_pct).abs() > settings.humidity_tolerance;
        self.eval_alert(Alert::HumidityOutOfRange, settled && humidity_off, &mut report);

        // ── End-of-run reminders ──────────────────────────────────
        let remaining_min = run.remaining_hours * 60.0;
        for &threshold in &settings.end_alerts {
            if remaining_min <= f64::from(threshold) && !self.reminders_sent.contains(&threshold) {
                self.reminders_sent.push(threshold);
                info!("{threshold} min remaining");
                report.reminders.push(threshold);
            }
        }

        report
    }

    /// Apply the hard limits to the policy output.
    pub fn gate(&self, mut state: ActuatorState) -> ActuatorState {
        if self.has_alert(Alert::OverTemperature) {
            state.heater = false;
        }
        state
    }

    /// Current alert bitmask.
    pub fn alerts(&self) -> u8 {
        self.alerts
    }

    pub fn has_alerts(&self) -> bool {
        self.alerts != 0
    }

    pub fn has_alert(&self, alert: Alert) -> bool {
        self.alerts & alert.mask() != 0
    }

    /// Every active alert.
    pub fn active(&self) -> Vec<Alert> {
        Alert::ALL
            .into_iter()
            .filter(|a| self.has_alert(*a))
            .collect()
    }

    // ── Internal ──────────────────────────────────────────────────

    /// Set or clear an alert bit based on a boolean condition.
    fn eval_alert(&mut self, alert: Alert, condition: bool, report: &mut AlertReport) {
        if condition {
            if self.alerts & alert.mask() == 0 {
                error!("ALERT SET: {alert}");
                report.raised.push(alert);
            }
            self.alerts |= alert.mask();
        } else {
            if self.alerts & alert.mask() != 0 {
                info!("ALERT CLEARED: {alert}");
                report.cleared.push(alert);
            }
            self.alerts &= !alert.mask();
        }
    }
}
