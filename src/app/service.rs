//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the batch state machine, control policy, alert
//! monitor, sensor trace and the last reading/actuator state.  It exposes
//! a clean, hardware-agnostic API.  All I/O flows through port traits
//! injected at call sites, making the entire service testable with mock
//! adapters.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                 │          AppService           │
//! ActuatorPort ◀──│ Batch · Policy · Alerts · Trace│ ◀─▶ StoragePort
//!                 └──────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use serde_json::{json, Value};

use crate::batch::history::{HistoryQuery, HistoryRecord, HistoryStore, Outcome, RatingUpdate};
use crate::batch::journal::Event;
use crate::batch::{Batch, BatchStateMachine, Progress, RunMode, StartRequest};
use crate::config::{AlertSettings, SystemConfig};
use crate::control::{ActuatorState, ControlPolicy};
use crate::error::{Error, Result};
use crate::recipes::catalog::NewRecipe;
use crate::recipes::{validate_steps, Recipe, RecipeCatalog, Step, DEHYDRATE_KEY};
use crate::safety::{AlertMonitor, AlertReport, RunView};
use crate::sensors::Reading;
use crate::trace::{Granularity, SensorTrace, TraceSeries};

use super::commands::{AppCommand, StartBatch};
use super::events::{AppEvent, TelemetryData};
use super::ports::{load_document, save_document, ActuatorPort, EventSink, SensorPort, StoragePort};

/// Events returned in the state snapshot.
pub const SNAPSHOT_EVENTS: usize = 20;

pub const SETTINGS_NAMESPACE: &str = "settings";
pub const ALERTS_KEY: &str = "alerts";

const DEFAULT_MANUAL_CODE: &str = "X";
const DEFAULT_MANUAL_NAME: &str = "Manual";

// ───────────────────────────────────────────────────────────────
// Snapshot
// ───────────────────────────────────────────────────────────────

/// Active batch with its progress, flattened for display.
#[derive(Debug, Clone, Serialize)]
pub struct BatchView {
    #[serde(flatten)]
    pub batch: Batch,
    #[serde(flatten)]
    pub progress: Progress,
}

/// Everything the front end polls for.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub batch: Option<BatchView>,
    pub sensors: Reading,
    pub actuators: ActuatorState,
    pub mode: RunMode,
    pub events: Vec<Event>,
    pub alerts: Vec<String>,
    #[serde(with = "crate::timestamp")]
    pub timestamp: DateTime<Utc>,
}

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    config: SystemConfig,
    policy: ControlPolicy,
    catalog: RecipeCatalog,
    history: HistoryStore,
    batch: BatchStateMachine,
    monitor: AlertMonitor,
    settings: AlertSettings,
    trace: SensorTrace,
    reading: Reading,
    actuators: ActuatorState,
    tick_count: u64,
    /// Telemetry is emitted every this many ticks.
    telemetry_every: u64,
}

impl AppService {
    /// Construct the service from configuration.  Starts idle with
    /// default alert settings; call [`load_settings`](Self::load_settings)
    /// to pick up the persisted ones.
    pub fn new(config: SystemConfig) -> Self {
        let telemetry_every = (u64::from(config.telemetry_interval_secs) * 1000
            / u64::from(config.control_loop_interval_ms.max(1)))
        .max(1);

        Self {
            policy: ControlPolicy::new(&config),
            catalog: RecipeCatalog::new(),
            history: HistoryStore,
            batch: BatchStateMachine::new(config.event_log_capacity),
            monitor: AlertMonitor::new(config.heater_hysteresis_c),
            settings: AlertSettings::default(),
            trace: SensorTrace::new(),
            reading: Reading::default(),
            actuators: ActuatorState::default(),
            tick_count: 0,
            telemetry_every,
            config,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Load persisted alert settings; defaults when missing or unreadable.
    pub fn load_settings<S: StoragePort + ?Sized>(&mut self, store: &S) {
        let settings: AlertSettings =
            load_document(store, SETTINGS_NAMESPACE, ALERTS_KEY, AlertSettings::default());
        match settings.validate() {
            Ok(()) => self.settings = settings,
            Err(e) => warn!("Stored alert settings rejected ({e}), using defaults"),
        }
    }

    pub fn start(&mut self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Started(self.batch.mode()));
        info!("AppService started in {:?}", self.batch.mode());
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle:
    /// read sensors → progress → policy → alerts → actuators → trace.
    ///
    /// The `hw` parameter satisfies **both** [`SensorPort`] and
    /// [`ActuatorPort`], which avoids a double mutable borrow while
    /// keeping the port boundary explicit.
    pub fn tick(
        &mut self,
        now: DateTime<Utc>,
        hw: &mut (impl SensorPort + ActuatorPort),
        sink: &mut impl EventSink,
    ) {
        self.tick_count += 1;

        // 1. Read sensors via SensorPort (never fails, degrades instead)
        let reading = hw.read_all();
        self.reading = reading;

        // 2. Progress and the one-time step-elapsed notice
        if let Some(name) = self.batch.note_step_elapsed(now) {
            if let Some(batch) = self.batch.batch() {
                sink.emit(&AppEvent::StepElapsed {
                    id: batch.id.clone(),
                    name,
                });
            }
        }
        let progress = self.batch.progress(now);

        // 3. Control policy (pure)
        let desired = self.policy.compute(&reading, self.batch.active_step(), now);

        // 4. Alerts, which may veto the heater
        let run = self.batch.batch().zip(progress).map(|(batch, p)| RunView {
            step: &batch.current_step,
            step_elapsed_hours: p.step_elapsed_hours,
            remaining_hours: p.remaining_hours(batch.total_duration_hours),
        });
        let report = self.monitor.evaluate(&reading, run, &self.settings, now);
        self.publish_alerts(&report, now, sink);

        // 5. Apply actuator commands via ActuatorPort
        self.actuators = self.monitor.gate(desired);
        hw.apply(&self.actuators);

        // 6. Trace
        self.trace.record(&reading, now);

        if self.tick_count % self.telemetry_every == 0 {
            sink.emit(&AppEvent::Telemetry(self.build_telemetry(now)));
        }
    }

    fn publish_alerts(&mut self, report: &AlertReport, now: DateTime<Utc>, sink: &mut impl EventSink) {
        if report.is_empty() {
            return;
        }
        for alert in &report.raised {
            sink.emit(&AppEvent::AlertRaised(*alert));
            self.journal(format!("Alert: {alert}"), now);
        }
        for alert in &report.cleared {
            sink.emit(&AppEvent::AlertCleared(*alert));
            self.journal(format!("Alert cleared: {alert}"), now);
        }
        for minutes in &report.reminders {
            self.journal(format!("{minutes} min remaining"), now);
        }
    }

    /// Journal a system note when a batch is running; ignored when idle.
    fn journal(&mut self, text: String, now: DateTime<Utc>) {
        if self.batch.is_running() {
            let _ = self.batch.record_event(text, now);
        }
    }

    // ── Batch operations ──────────────────────────────────────

    /// Resolve a start request against the catalog and begin the batch.
    ///
    /// The batch id is allocated only once the request is known to be
    /// valid, so rejected starts never consume a number.
    pub fn start_batch<S: StoragePort + ?Sized>(
        &mut self,
        req: StartBatch,
        now: DateTime<Utc>,
        store: &mut S,
        sink: &mut impl EventSink,
    ) -> Result<Batch> {
        self.batch.ensure_idle()?;
        let request = self.resolve_start(req, &*store)?;
        validate_steps(&request.steps)?;

        let id = self.history.allocate_id(store, &request.recipe_code)?;
        let batch = self.batch.start(request, id, now)?.clone();
        let mode = self.batch.mode();
        self.monitor.reset(&self.settings, batch.total_duration_hours);

        sink.emit(&AppEvent::BatchStarted {
            id: batch.id.clone(),
            name: batch.name.clone(),
            mode,
        });
        Ok(batch)
    }

    fn resolve_start<S: StoragePort + ?Sized>(&self, req: StartBatch, store: &S) -> Result<StartRequest> {
        let explicit = req.steps.filter(|steps| !steps.is_empty());
        let (steps, code, recipe_name, dehydrating) = match (explicit, &req.preset) {
            // Explicit steps never consult the catalog.
            (Some(steps), preset) => (
                steps,
                req.code.unwrap_or_else(|| DEFAULT_MANUAL_CODE.to_owned()),
                req.name.clone().unwrap_or_else(|| DEFAULT_MANUAL_NAME.to_owned()),
                preset.as_deref() == Some(DEHYDRATE_KEY),
            ),
            (None, Some(key)) => {
                let recipe = self
                    .catalog
                    .resolve(store, key)
                    .map_err(|_| Error::invalid(format!("unknown recipe '{key}'")))?;
                let dehydrating = recipe.is_dehydration();
                let def = recipe.definition;
                (def.steps, def.code, def.name, dehydrating)
            }
            (None, None) => return Err(Error::invalid("no steps defined")),
        };
        let mode = if dehydrating {
            RunMode::Dehydrating
        } else {
            RunMode::Fermenting
        };

        Ok(StartRequest {
            name: req.name.unwrap_or_else(|| recipe_name.clone()),
            recipe_name,
            recipe_key: req.preset,
            recipe_code: code,
            steps,
            mode,
            ingredients: req.ingredients,
        })
    }

    /// Stop the running batch and append it to history.  Idempotent when
    /// idle.  If the history write fails the batch keeps running.
    pub fn stop_batch<S: StoragePort + ?Sized>(
        &mut self,
        outcome: Outcome,
        now: DateTime<Utc>,
        store: &mut S,
        sink: &mut impl EventSink,
    ) -> Result<Option<HistoryRecord>> {
        let history = self.history;
        let stopped = self.batch.stop(outcome, now, |record| history.append(store, record))?;
        if let Some(record) = &stopped {
            sink.emit(&AppEvent::BatchStopped {
                id: record.batch.id.clone(),
                status: record.status,
            });
        }
        Ok(stopped)
    }

    pub fn next_step(&mut self, now: DateTime<Utc>, sink: &mut impl EventSink) -> Result<Step> {
        let step = self.batch.advance_step(now)?;
        if let Some(batch) = self.batch.batch() {
            sink.emit(&AppEvent::StepAdvanced {
                id: batch.id.clone(),
                index: batch.current_step_index,
                name: step.name.clone(),
            });
        }
        Ok(step)
    }

    pub fn record_event(&mut self, text: &str, now: DateTime<Utc>) -> Result<Event> {
        self.batch.record_event(text, now)
    }

    /// Manually set (or toggle) one output.  The override holds until the
    /// next tick recomputes the actuator state.  The over-temperature
    /// heater cut still applies.
    pub fn set_actuator(&mut self, name: &str, state: Option<bool>, hw: &mut impl ActuatorPort) -> Result<bool> {
        let current = self
            .actuators
            .get(name)
            .ok_or_else(|| Error::not_found("actuator", name))?;
        self.actuators.set(name, state.unwrap_or(!current));
        self.actuators = self.monitor.gate(self.actuators);
        hw.apply(&self.actuators);
        let applied = self.actuators.get(name).unwrap_or(false);
        info!("Manual override: {name} -> {applied}");
        Ok(applied)
    }

    // ── Recipes & history ─────────────────────────────────────

    pub fn recipes<S: StoragePort + ?Sized>(&self, store: &S) -> BTreeMap<String, Recipe> {
        self.catalog.list_all(store)
    }

    pub fn create_recipe<S: StoragePort + ?Sized>(
        &self,
        store: &mut S,
        new: NewRecipe,
        now: DateTime<Utc>,
    ) -> Result<String> {
        self.catalog.create(store, new, now)
    }

    pub fn delete_recipe<S: StoragePort + ?Sized>(&self, store: &mut S, key: &str) -> Result<()> {
        self.catalog.delete(store, key)
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    // ── Settings ──────────────────────────────────────────────

    pub fn settings(&self) -> &AlertSettings {
        &self.settings
    }

    /// Validate and persist new alert settings.  Nothing changes if either
    /// step fails.
    pub fn update_settings<S: StoragePort + ?Sized>(&mut self, settings: AlertSettings, store: &mut S) -> Result<()> {
        settings.validate()?;
        save_document(store, SETTINGS_NAMESPACE, ALERTS_KEY, &settings)?;
        self.settings = settings;
        info!("Alert settings updated");
        Ok(())
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command and build its JSON reply.
    pub fn handle_command<S: StoragePort + ?Sized>(
        &mut self,
        cmd: AppCommand,
        now: DateTime<Utc>,
        hw: &mut impl ActuatorPort,
        store: &mut S,
        sink: &mut impl EventSink,
    ) -> Result<Value> {
        let ok = |extra: Value| {
            let mut body = json!({ "success": true });
            if let (Value::Object(body), Value::Object(extra)) = (&mut body, extra) {
                body.extend(extra);
            }
            body
        };

        Ok(match cmd {
            AppCommand::State => to_json(&self.snapshot(now))?,
            AppCommand::SensorHistory { interval } => {
                let granularity = Granularity::from_interval(&interval)
                    .ok_or_else(|| Error::invalid(format!("unknown interval '{interval}'")))?;
                to_json(&self.sensor_history(granularity))?
            }
            AppCommand::ListPresets => to_json(&self.recipes(&*store))?,
            AppCommand::CreatePreset(new) => {
                let key = self.create_recipe(store, new, now)?;
                ok(json!({ "key": key }))
            }
            AppCommand::DeletePreset { key } => {
                self.delete_recipe(store, &key)?;
                ok(json!({}))
            }
            AppCommand::ListHistory(query) => to_json(&self.list_history(&*store, &query))?,
            AppCommand::GetHistory { id } => to_json(&self.history.get(&*store, &id)?)?,
            AppCommand::DeleteHistory { id } => {
                self.history.delete(store, &id)?;
                ok(json!({}))
            }
            AppCommand::RateHistory { id, update } => {
                let record = self.rate_history(store, &id, update)?;
                ok(json!({ "record": to_json(&record)? }))
            }
            AppCommand::StartBatch(req) => {
                let batch = self.start_batch(req, now, store, sink)?;
                ok(json!({ "batch": to_json(&batch)? }))
            }
            AppCommand::StopBatch(outcome) => {
                let record = self.stop_batch(outcome, now, store, sink)?;
                ok(json!({ "record": to_json(&record)? }))
            }
            AppCommand::NextStep => {
                let step = self.next_step(now, sink)?;
                ok(json!({ "step": to_json(&step)? }))
            }
            AppCommand::RecordEvent { text } => {
                let event = self.record_event(&text, now)?;
                ok(json!({ "event": to_json(&event)? }))
            }
            AppCommand::SetActuator { name, state } => {
                let applied = self.set_actuator(&name, state, hw)?;
                ok(json!({ "state": applied }))
            }
            AppCommand::GetSettings => to_json(&self.settings)?,
            AppCommand::UpdateSettings(settings) => {
                self.update_settings(settings, store)?;
                ok(json!({}))
            }
        })
    }

    fn list_history<S: StoragePort + ?Sized>(&self, store: &S, query: &HistoryQuery) -> Vec<HistoryRecord> {
        self.history.list(store, query)
    }

    fn rate_history<S: StoragePort + ?Sized>(
        &self,
        store: &mut S,
        id: &str,
        update: RatingUpdate,
    ) -> Result<HistoryRecord> {
        self.history.rate(store, id, update)
    }

    // ── Queries ───────────────────────────────────────────────

    /// Full state for the front end.  Progress is rounded to 0.1.
    pub fn snapshot(&self, now: DateTime<Utc>) -> StateSnapshot {
        let batch = self
            .batch
            .batch()
            .zip(self.batch.progress(now))
            .map(|(batch, progress)| BatchView {
                batch: batch.clone(),
                progress: progress.rounded(),
            });
        StateSnapshot {
            batch,
            sensors: self.reading,
            actuators: self.actuators,
            mode: self.batch.mode(),
            events: self.batch.recent_events(SNAPSHOT_EVENTS),
            alerts: self.monitor.active().iter().map(ToString::to_string).collect(),
            timestamp: now,
        }
    }

    pub fn sensor_history(&self, granularity: Granularity) -> TraceSeries {
        self.trace.query(granularity)
    }

    /// Build a telemetry snapshot from the current state.
    pub fn build_telemetry(&self, now: DateTime<Utc>) -> TelemetryData {
        TelemetryData {
            mode: self.batch.mode(),
            batch: self.batch.batch().map(|b| b.id.clone()),
            step_progress_pct: self.batch.progress(now).map(|p| p.step_progress_pct),
            reading: self.reading,
            actuators: self.actuators,
            alert_flags: self.monitor.alerts(),
        }
    }

    pub fn mode(&self) -> RunMode {
        self.batch.mode()
    }

    pub fn batch(&self) -> Option<&Batch> {
        self.batch.batch()
    }

    pub fn reading(&self) -> Reading {
        self.reading
    }

    pub fn actuators(&self) -> ActuatorState {
        self.actuators
    }

    /// Current alert bitmask (0 = no alerts).
    pub fn alert_flags(&self) -> u8 {
        self.monitor.alerts()
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::invalid(format!("unserializable reply: {e}")))
}
