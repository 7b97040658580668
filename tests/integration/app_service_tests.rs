//! Integration tests for the AppService → batch → actuators pipeline.
//!
//! Commands enter as JSON, exactly as the binary receives them, and the
//! resulting actuator calls, events and persisted documents are checked
//! against mock adapters.

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};

use fermenter::adapters::store::MemoryStore;
use fermenter::app::commands::{render_reply, AppCommand};
use fermenter::app::events::AppEvent;
use fermenter::app::service::AppService;
use fermenter::batch::history::Outcome;
use fermenter::batch::RunMode;
use fermenter::config::SystemConfig;
use fermenter::error::{Error, Result};
use fermenter::recipes::catalog::NewRecipe;
use fermenter::recipes::{total_duration_hours, Step, VentilationMode};

use crate::mock_hw::{t0, ActuatorCall, MockHardware, RecordingSink};

struct Rig {
    app: AppService,
    hw: MockHardware,
    store: MemoryStore,
    sink: RecordingSink,
}

impl Rig {
    fn new() -> Self {
        let mut app = AppService::new(SystemConfig::default());
        let mut sink = RecordingSink::default();
        app.start(&mut sink);
        Self {
            app,
            hw: MockHardware::new(),
            store: MemoryStore::new(),
            sink,
        }
    }

    fn send(&mut self, raw: Value, now: DateTime<Utc>) -> Result<Value> {
        let cmd = AppCommand::from_json(&raw.to_string())?;
        self.app
            .handle_command(cmd, now, &mut self.hw, &mut self.store, &mut self.sink)
    }

    fn tick(&mut self, now: DateTime<Utc>) {
        self.app.tick(now, &mut self.hw, &mut self.sink);
    }

    fn event_texts(&self, now: DateTime<Utc>) -> Vec<String> {
        self.app
            .snapshot(now)
            .events
            .into_iter()
            .map(|e| e.text)
            .collect()
    }
}

fn hours(h: i64) -> Duration {
    Duration::hours(h)
}

// ── Full natto run ────────────────────────────────────────────

#[test]
fn natto_run_from_start_to_history() {
    let mut rig = Rig::new();

    let reply = rig
        .send(json!({"op": "start_batch", "preset": "natto"}), t0())
        .unwrap();
    assert_eq!(reply["success"], true);
    assert_eq!(reply["batch"]["id"], "#N-0001");
    assert_eq!(reply["batch"]["preset_code"], "N");
    assert_eq!(rig.app.mode(), RunMode::Fermenting);

    // Below target − 0.5 → heater on; humidity well below 85 − 5.
    rig.hw.set_reading(41.0, 70.0);
    rig.tick(t0());
    let out = rig.hw.outputs();
    assert!(out.heater);
    assert!(out.humidifier);
    assert!(!out.fan_internal && !out.fan_extract);

    // At target → heater off.
    rig.hw.set_reading(42.0, 85.0);
    rig.tick(t0() + Duration::minutes(30));
    assert!(!rig.hw.outputs().heater);
    assert!(!rig.hw.outputs().humidifier);

    // Duration reached: noticed once, never advanced automatically.
    rig.tick(t0() + hours(24));
    rig.tick(t0() + hours(25));
    let elapsed = rig
        .sink
        .count(|e| matches!(e, AppEvent::StepElapsed { .. }));
    assert_eq!(elapsed, 1);
    let state = rig.send(json!({"op": "state"}), t0() + hours(25)).unwrap();
    assert_eq!(state["batch"]["current_step_index"], 0);
    assert_eq!(state["batch"]["step_progress"], 100.0);
    assert_eq!(state["mode"], "fermenting");

    // Single-step recipe: advancing is refused.
    let err = rig.send(json!({"op": "next_step"}), t0() + hours(25)).unwrap_err();
    assert_eq!(err, Error::Conflict("last step reached"));

    rig.send(json!({"op": "record_event", "text": "Strings look great"}), t0() + hours(25))
        .unwrap();
    let texts = rig.event_texts(t0() + hours(25));
    assert_eq!(texts[0], "Strings look great");
    assert!(texts.contains(&"Step duration reached: Fermentation".to_owned()));
    assert_eq!(texts.last().map(String::as_str), Some("Started Natto"));

    let reply = rig
        .send(
            json!({"op": "stop_batch", "status": "completed", "rating": 4, "notes": "sticky"}),
            t0() + hours(26),
        )
        .unwrap();
    assert_eq!(reply["record"]["rating"], 4);
    assert_eq!(rig.app.mode(), RunMode::Idle);

    let history = rig.send(json!({"op": "list_history"}), t0() + hours(26)).unwrap();
    let records = history.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["id"], "#N-0001");
    assert_eq!(records[0]["status"], "completed");
    assert_eq!(records[0]["events"][0]["text"], "Strings look great");

    // Numbering continues from history.
    let reply = rig
        .send(json!({"op": "start_batch", "preset": "natto"}), t0() + hours(27))
        .unwrap();
    assert_eq!(reply["batch"]["id"], "#N-0002");
}

// ── Lifecycle guards ──────────────────────────────────────────

#[test]
fn second_start_conflicts_and_keeps_first_batch() {
    let mut rig = Rig::new();
    rig.send(json!({"op": "start_batch", "preset": "yogurt"}), t0())
        .unwrap();
    let err = rig
        .send(json!({"op": "start_batch", "preset": "natto"}), t0())
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    assert_eq!(render_reply(&Err(err))["status"], 409);
    assert_eq!(rig.app.batch().unwrap().name, "Yogurt");
}

#[test]
fn stop_is_idempotent_when_idle() {
    let mut rig = Rig::new();
    let reply = rig.send(json!({"op": "stop_batch"}), t0()).unwrap();
    assert_eq!(reply, json!({"success": true, "record": null}));
    assert!(rig.sink.count(|e| matches!(e, AppEvent::BatchStopped { .. })) == 0);
}

#[test]
fn idle_operations_report_no_active_batch() {
    let mut rig = Rig::new();
    assert_eq!(
        rig.send(json!({"op": "next_step"}), t0()).unwrap_err(),
        Error::NoActiveBatch
    );
    assert_eq!(
        rig.send(json!({"op": "record_event", "text": "hi"}), t0()).unwrap_err(),
        Error::NoActiveBatch
    );
}

#[test]
fn empty_or_invalid_steps_are_rejected() {
    let mut rig = Rig::new();
    let err = rig
        .send(json!({"op": "start_batch", "steps": []}), t0())
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let err = rig
        .send(
            json!({"op": "start_batch", "steps": [
                {"name": "Bad", "temp": 30, "humidity": 70, "duration": 0}
            ]}),
            t0(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(rig.app.mode(), RunMode::Idle);
}

// ── Control loop behaviour ────────────────────────────────────

#[test]
fn idle_tick_turns_everything_off() {
    let mut rig = Rig::new();
    rig.hw.set_reading(5.0, 10.0);
    rig.tick(t0());
    assert_eq!(
        rig.hw.calls.last(),
        Some(&ActuatorCall::Apply(Default::default()))
    );
}

#[test]
fn multi_step_advance_changes_setpoint() {
    let mut rig = Rig::new();
    rig.send(json!({"op": "start_batch", "preset": "tempeh"}), t0())
        .unwrap();
    rig.hw.set_reading(31.0, 85.0);
    rig.tick(t0());
    assert!(rig.hw.outputs().heater);

    let reply = rig.send(json!({"op": "next_step"}), t0() + hours(2)).unwrap();
    assert_eq!(reply["step"]["name"], "Incubation");
    rig.send(json!({"op": "next_step"}), t0() + hours(3)).unwrap();

    // Maturation targets 30 °C: 31 °C no longer needs heat.
    rig.tick(t0() + hours(3));
    assert!(!rig.hw.outputs().heater);
    let state = rig.send(json!({"op": "state"}), t0() + hours(3)).unwrap();
    assert_eq!(state["batch"]["current_step"]["name"], "Maturation");
    assert_eq!(state["batch"]["elapsed_hours"], 0.0);
}

#[test]
fn dehydrate_runs_both_fans() {
    let mut rig = Rig::new();
    rig.send(json!({"op": "start_batch", "preset": "dehydrate"}), t0())
        .unwrap();
    assert_eq!(rig.app.mode(), RunMode::Dehydrating);
    rig.hw.set_reading(45.0, 20.0);
    rig.tick(t0());
    let out = rig.hw.outputs();
    assert!(out.fan_internal && out.fan_extract);
}

#[test]
fn over_temperature_cuts_heater_and_journals_alert() {
    let mut rig = Rig::new();
    rig.send(
        json!({"op": "update_settings", "max_temp": 35.0}),
        t0(),
    )
    .unwrap();
    rig.send(json!({"op": "start_batch", "preset": "yogurt"}), t0())
        .unwrap();

    rig.hw.set_reading(36.0, 70.0);
    rig.tick(t0());
    assert!(!rig.hw.outputs().heater, "heater must be cut above max_temp");
    assert!(rig.sink.count(|e| matches!(e, AppEvent::AlertRaised(_))) >= 1);

    // Manual override cannot defeat the cutoff.
    let reply = rig
        .send(json!({"op": "set_actuator", "name": "heater", "state": true}), t0())
        .unwrap();
    assert_eq!(reply["state"], false);

    let state = rig.send(json!({"op": "state"}), t0()).unwrap();
    assert!(state["alerts"]
        .as_array()
        .unwrap()
        .contains(&json!("over temperature")));
    assert!(rig
        .event_texts(t0())
        .contains(&"Alert: over temperature".to_owned()));
}

#[test]
fn manual_override_toggles_until_next_tick() {
    let mut rig = Rig::new();
    let reply = rig
        .send(json!({"op": "set_actuator", "name": "fan_extract"}), t0())
        .unwrap();
    assert_eq!(reply["state"], true);
    assert!(rig.hw.outputs().fan_extract);

    rig.tick(t0());
    assert!(!rig.hw.outputs().fan_extract);

    let err = rig
        .send(json!({"op": "set_actuator", "name": "pump"}), t0())
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn sensor_history_follows_ticks() {
    let mut rig = Rig::new();
    for i in 0..90 {
        rig.hw.set_reading(20.0 + i as f32 * 0.1, 50.0);
        rig.tick(t0() + Duration::seconds(i));
    }
    let series = rig.send(json!({"op": "sensor_history"}), t0()).unwrap();
    assert_eq!(series["timestamps"].as_array().unwrap().len(), 60);
    assert_eq!(series["temp1"].as_array().unwrap().len(), 60);

    let coarse = rig
        .send(json!({"op": "sensor_history", "interval": "15m"}), t0())
        .unwrap();
    assert_eq!(coarse["humidity"].as_array().unwrap().len(), 6);

    let err = rig
        .send(json!({"op": "sensor_history", "interval": "2d"}), t0())
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

// ── Recipes → batch → history ─────────────────────────────────

#[test]
fn custom_recipe_through_history_lifecycle() {
    let mut rig = Rig::new();
    let reply = rig
        .send(
            json!({
                "op": "create_preset",
                "name": "Garlic honey",
                "code": "GH",
                "parent": "lacto",
                "steps": [
                    {"name": "Warm", "temp": 24, "humidity": 60, "duration": 2, "ventilation": "cyclic"},
                    {"name": "Rest", "temp": 20, "humidity": 60, "duration": 10}
                ]
            }),
            t0(),
        )
        .unwrap();
    let key = reply["key"].as_str().unwrap().to_owned();
    assert!(key.starts_with("custom_"));

    let presets = rig.send(json!({"op": "list_presets"}), t0()).unwrap();
    assert_eq!(presets[&key]["system"], false);
    assert_eq!(presets[&key]["parent"], "lacto");
    assert_eq!(presets["natto"]["system"], true);

    let reply = rig
        .send(json!({"op": "start_batch", "preset": key}), t0())
        .unwrap();
    assert_eq!(reply["batch"]["id"], "#GH-0001");
    assert_eq!(reply["batch"]["total_duration"], 12.0);

    rig.send(json!({"op": "stop_batch", "status": "aborted"}), t0() + hours(1))
        .unwrap();

    let filtered = rig
        .send(json!({"op": "list_history", "type": "GH"}), t0())
        .unwrap();
    assert_eq!(filtered.as_array().unwrap().len(), 1);
    let none = rig
        .send(json!({"op": "list_history", "status": "completed"}), t0())
        .unwrap();
    assert!(none.as_array().unwrap().is_empty());

    let rated = rig
        .send(json!({"op": "rate_history", "id": "#GH-0001", "rating": 5}), t0())
        .unwrap();
    assert_eq!(rated["record"]["rating"], 5);
    assert_eq!(rated["record"]["status"], "aborted");

    let err = rig
        .send(json!({"op": "rate_history", "id": "#GH-0001", "rating": 9}), t0())
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    rig.send(json!({"op": "delete_history", "id": "#GH-0001"}), t0())
        .unwrap();
    let err = rig
        .send(json!({"op": "get_history", "id": "#GH-0001"}), t0())
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    // Numbering never reuses a deleted id.
    rig.send(json!({"op": "start_batch", "preset": key}), t0() + hours(2))
        .unwrap();
    assert_eq!(rig.app.batch().unwrap().id.as_str(), "#GH-0002");

    rig.send(json!({"op": "delete_preset", "key": key}), t0()).unwrap();
    let err = rig
        .send(json!({"op": "delete_preset", "key": "natto"}), t0())
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

/// Run `key` to completion and check the stored record against the recipe
/// it was started from.
fn assert_history_matches_recipe(rig: &mut Rig, key: &str, start: DateTime<Utc>) {
    let recipe = rig.app.recipes(&rig.store)[key].clone();
    rig.send(json!({"op": "start_batch", "preset": key}), start)
        .unwrap();
    let id = rig.app.batch().unwrap().id.clone();
    let stopped = rig
        .app
        .stop_batch(Outcome::default(), start + hours(1), &mut rig.store, &mut rig.sink)
        .unwrap()
        .unwrap();

    let stored = rig.app.history().get(&rig.store, id.as_str()).unwrap();
    assert_eq!(stored, stopped);
    assert_eq!(stored.batch.steps, recipe.definition.steps);
    assert_eq!(stored.batch.recipe_code, recipe.definition.code);
    assert_eq!(stored.batch.recipe_key.as_deref(), Some(key));
    assert!(
        (stored.batch.total_duration_hours - total_duration_hours(&recipe.definition.steps)).abs()
            < f64::EPSILON
    );
}

#[test]
fn history_records_carry_the_recipe_definition() {
    let mut rig = Rig::new();
    assert_history_matches_recipe(&mut rig, "tempeh", t0());

    let key = rig
        .app
        .create_recipe(
            &mut rig.store,
            NewRecipe {
                name: Some("Koji rice".into()),
                code: Some("KR".into()),
                steps: vec![
                    Step {
                        name: "Inoculate".into(),
                        target_temp_c: 30.0,
                        target_humidity_pct: 90.0,
                        duration_hours: 18.0,
                        ventilation: VentilationMode::Off,
                    },
                    Step {
                        name: "Cure".into(),
                        target_temp_c: 28.0,
                        target_humidity_pct: 80.0,
                        duration_hours: 24.5,
                        ventilation: VentilationMode::Cyclic,
                    },
                ],
                ..NewRecipe::default()
            },
            t0(),
        )
        .unwrap();
    assert_history_matches_recipe(&mut rig, &key, t0() + hours(2));
}

#[test]
fn settings_round_trip_preserves_unknown_keys() {
    let mut rig = Rig::new();
    rig.send(
        json!({"op": "update_settings", "humidity_tolerance": 7.5, "theme": "dark"}),
        t0(),
    )
    .unwrap();
    let settings = rig.send(json!({"op": "get_settings"}), t0()).unwrap();
    assert_eq!(settings["humidity_tolerance"], 7.5);
    assert_eq!(settings["theme"], "dark");
    assert_eq!(settings["max_temp"], 60.0);
}
