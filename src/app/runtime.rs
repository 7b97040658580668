//! Single-writer control loop.
//!
//! [`ControlLoop`] owns the [`AppService`] and every adapter on one thread.
//! It ticks at the configured interval and, between ticks, executes
//! commands received from [`ControllerHandle`]s one at a time.  Since no
//! other thread ever touches the service, two requests can never
//! interleave (two concurrent starts: one wins, the other gets
//! `Conflict`).
//!
//! ```text
//!  ControllerHandle ──┐
//!  ControllerHandle ──┼──▶ mpsc ──▶ ControlLoop ─ tick ─▶ hw
//!  ControllerHandle ──┘        ◀── reply ─┘
//! ```
//!
//! When the last handle is dropped the loop switches every output off and
//! returns.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::info;
use serde_json::Value;

use crate::error::{Error, Result};

use super::commands::AppCommand;
use super::ports::{ActuatorPort, ClockPort, EventSink, SensorPort, StoragePort};
use super::service::AppService;

struct Request {
    cmd: AppCommand,
    reply: Sender<Result<Value>>,
}

/// Cloneable entry point for everything outside the control loop.
#[derive(Clone)]
pub struct ControllerHandle {
    tx: Sender<Request>,
}

impl ControllerHandle {
    /// Submit a command and wait for the loop to execute it.
    pub fn request(&self, cmd: AppCommand) -> Result<Value> {
        let (reply, rx) = mpsc::channel();
        self.tx
            .send(Request { cmd, reply })
            .map_err(|_| Error::Unavailable)?;
        rx.recv().map_err(|_| Error::Unavailable)?
    }
}

pub struct ControlLoop<H, S, K, C> {
    service: AppService,
    hw: H,
    store: S,
    sink: K,
    clock: C,
    interval: Duration,
}

impl<H, S, K, C> ControlLoop<H, S, K, C>
where
    H: SensorPort + ActuatorPort + Send + 'static,
    S: StoragePort + Send + 'static,
    K: EventSink + Send + 'static,
    C: ClockPort + Send + 'static,
{
    pub fn new(service: AppService, hw: H, store: S, sink: K, clock: C) -> Self {
        let interval = Duration::from_millis(u64::from(service.config().control_loop_interval_ms));
        Self {
            service,
            hw,
            store,
            sink,
            clock,
            interval,
        }
    }

    /// Start the loop on its own thread.
    pub fn spawn(self) -> std::io::Result<(ControllerHandle, JoinHandle<()>)> {
        let (tx, rx) = mpsc::channel();
        let join = thread::Builder::new()
            .name("control-loop".into())
            .spawn(move || self.run(&rx))?;
        Ok((ControllerHandle { tx }, join))
    }

    /// Run until every handle is gone.  Blocks the calling thread.
    fn run(mut self, rx: &Receiver<Request>) {
        self.service.start(&mut self.sink);
        let mut next_tick = Instant::now();

        loop {
            let now = Instant::now();
            if now >= next_tick {
                self.service
                    .tick(self.clock.now(), &mut self.hw, &mut self.sink);
                next_tick += self.interval;
                // Never try to catch up on missed ticks.
                if next_tick < now {
                    next_tick = now + self.interval;
                }
                continue;
            }

            match rx.recv_timeout(next_tick - now) {
                Ok(req) => {
                    let reply = self.service.handle_command(
                        req.cmd,
                        self.clock.now(),
                        &mut self.hw,
                        &mut self.store,
                        &mut self.sink,
                    );
                    // The requester may have given up waiting.
                    let _ = req.reply.send(reply);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        self.hw.all_off();
        info!(
            "Control loop stopped after {} ticks, outputs off",
            self.service.tick_count()
        );
    }
}
