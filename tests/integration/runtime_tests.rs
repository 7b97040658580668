//! Integration tests for the threaded control loop.
//!
//! The loop is the single writer of service state: concurrent requests
//! are serialized, and dropping every handle shuts the outputs off.

use std::sync::{Arc, Barrier};
use std::thread;

use chrono::Duration;
use serde_json::json;

use fermenter::adapters::log_sink::LogEventSink;
use fermenter::adapters::store::MemoryStore;
use fermenter::adapters::time::ManualClock;
use fermenter::app::commands::{AppCommand, StartBatch};
use fermenter::app::runtime::ControlLoop;
use fermenter::app::service::AppService;
use fermenter::config::SystemConfig;
use fermenter::error::Error;

use crate::mock_hw::{t0, ActuatorCall, SharedHardware};

fn fast_config() -> SystemConfig {
    SystemConfig {
        control_loop_interval_ms: 100,
        ..SystemConfig::default()
    }
}

fn start_natto() -> AppCommand {
    AppCommand::StartBatch(StartBatch {
        preset: Some("natto".into()),
        ..StartBatch::default()
    })
}

#[test]
fn concurrent_starts_yield_exactly_one_batch() {
    let hw = SharedHardware::default();
    let clock = ManualClock::new(t0());
    let (handle, join) = ControlLoop::new(
        AppService::new(fast_config()),
        hw.clone(),
        MemoryStore::new(),
        LogEventSink::new(),
        clock,
    )
    .spawn()
    .unwrap();

    const CLIENTS: usize = 8;
    let barrier = Arc::new(Barrier::new(CLIENTS));
    let workers: Vec<_> = (0..CLIENTS)
        .map(|_| {
            let handle = handle.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                handle.request(start_natto())
            })
        })
        .collect();
    let results: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();

    let started = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(Error::Conflict(_))))
        .count();
    assert_eq!(started, 1);
    assert_eq!(conflicts, CLIENTS - 1);

    let state = handle.request(AppCommand::State).unwrap();
    assert_eq!(state["batch"]["id"], "#N-0001");

    drop(handle);
    join.join().unwrap();
}

#[test]
fn dropping_handles_switches_outputs_off() {
    let hw = SharedHardware::default();
    hw.lock().set_reading(30.0, 60.0);
    let clock = ManualClock::new(t0());
    let (handle, join) = ControlLoop::new(
        AppService::new(fast_config()),
        hw.clone(),
        MemoryStore::new(),
        LogEventSink::new(),
        clock.clone(),
    )
    .spawn()
    .unwrap();

    handle.request(start_natto()).unwrap();
    let reply = handle
        .request(AppCommand::SetActuator {
            name: "heater".into(),
            state: Some(true),
        })
        .unwrap();
    assert_eq!(reply, json!({"success": true, "state": true}));

    clock.advance(Duration::minutes(1));
    drop(handle);
    join.join().unwrap();

    let hw = hw.lock();
    assert_eq!(hw.calls.last(), Some(&ActuatorCall::AllOff));
    assert_eq!(hw.all_off_count(), 1);
}

#[test]
fn cloned_handle_keeps_loop_alive() {
    let (handle, join) = ControlLoop::new(
        AppService::new(fast_config()),
        SharedHardware::default(),
        MemoryStore::new(),
        LogEventSink::new(),
        ManualClock::new(t0()),
    )
    .spawn()
    .unwrap();

    let stale = handle.clone();
    drop(handle);
    // The loop still sees `stale`, so it answers.
    assert!(stale.request(AppCommand::GetSettings).is_ok());
    drop(stale);
    join.join().unwrap();
}
