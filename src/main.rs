//! Fermenter: main entry point
//!
//! Hexagonal architecture with a single-writer control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter   LogEventSink   FileStore     SystemClock    │
//! │  (Sensor+Actuator) (EventSink)    (Storage)     (Clock)        │
//! │  JsonConfigFile    stdin JSON-lines command surface            │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Batch state machine · Control policy · Alerts         │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  ControlLoop (own thread, owns AppService + adapters)          │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use embedded_hal::digital::OutputPin;
use log::{info, warn};

use fermenter::adapters::config_file::JsonConfigFile;
use fermenter::adapters::gpio::{SimulatedPin, SysfsPin};
use fermenter::adapters::hardware::HardwareAdapter;
use fermenter::adapters::log_sink::LogEventSink;
use fermenter::adapters::store::{FileStore, MemoryStore};
use fermenter::adapters::time::SystemClock;
use fermenter::app::commands::{render_reply, AppCommand};
use fermenter::app::ports::{ConfigPort, StoragePort};
use fermenter::app::runtime::ControlLoop;
use fermenter::app::service::AppService;
use fermenter::config::SystemConfig;
use fermenter::drivers::relay::{RelayBank, CHANNELS};
use fermenter::pins;
use fermenter::sensors::humidity::HwmonSht4x;
use fermenter::sensors::temperature::W1Bus;
use fermenter::sensors::{HumiditySensor, SensorHub};

#[derive(Debug, Parser)]
#[command(version, about = "Fermentation and dehydration chamber controller")]
struct Args {
    /// JSON configuration file (defaults are used when absent)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the data directory for history, presets and settings
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Simulate the relays and keep documents in memory
    #[arg(long)]
    dry_run: bool,
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    info!("╔══════════════════════════════════════╗");
    info!("║  Fermenter v{:<25}║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 1. Configuration ──────────────────────────────────────
    let mut config = match &args.config {
        Some(path) => JsonConfigFile::new(path).load().unwrap_or_else(|e| {
            warn!("Config load failed ({}), using defaults", e);
            SystemConfig::default()
        }),
        None => SystemConfig::default(),
    };
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }

    // ── 2. Sensors (read-only, also used in dry-run) ──────────
    let humidity = HwmonSht4x::discover(Path::new(pins::HWMON_SYSFS_ROOT), pins::SHT4X_HWMON_NAME)
        .map(|s| Box::new(s) as Box<dyn HumiditySensor + Send>);
    if humidity.is_none() {
        warn!("No SHT4x found under {}", pins::HWMON_SYSFS_ROOT);
    }
    let hub = SensorHub::new(
        Box::new(W1Bus::new(&config.w1_devices_path)),
        humidity,
        &config,
    );

    // ── 3. Outputs + storage, then run ────────────────────────
    if args.dry_run {
        info!("Dry run: relays simulated, documents kept in memory");
        let relays: [SimulatedPin; CHANNELS] = Default::default();
        serve(config, hub, relays, MemoryStore::new())
    } else {
        let root = Path::new(pins::GPIO_SYSFS_ROOT);
        let mut opened = Vec::with_capacity(CHANNELS);
        for line in pins::RELAY_GPIOS {
            opened.push(SysfsPin::open(root, line)?);
        }
        let relays: [SysfsPin; CHANNELS] = opened
            .try_into()
            .map_err(|_| anyhow!("expected {} relay pins", CHANNELS))?;
        let store = FileStore::open(&config.data_dir)
            .with_context(|| format!("opening data directory {}", config.data_dir.display()))?;
        serve(config, hub, relays, store)
    }
}

/// Spawn the control loop and answer JSON-lines commands from stdin until
/// EOF.  Closing stdin stops the loop and switches every output off.
fn serve<P, S>(config: SystemConfig, hub: SensorHub, relays: [P; CHANNELS], store: S) -> Result<()>
where
    P: OutputPin + Send + 'static,
    S: StoragePort + Send + 'static,
{
    let mut service = AppService::new(config.clone());
    service.load_settings(&store);

    let hw = HardwareAdapter::new(hub, RelayBank::new(relays, config.relay_active_low));
    let (handle, join) = ControlLoop::new(service, hw, store, LogEventSink::new(), SystemClock)
        .spawn()
        .context("spawning control loop")?;
    info!("Ready: one JSON command per line on stdin");

    let stdout = io::stdout();
    for line in io::stdin().lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let reply = AppCommand::from_json(line).and_then(|cmd| handle.request(cmd));
        let mut out = stdout.lock();
        writeln!(out, "{}", render_reply(&reply))?;
        out.flush()?;
    }

    drop(handle);
    join.join().map_err(|_| anyhow!("control loop panicked"))?;
    info!("Shutdown complete");
    Ok(())
}
