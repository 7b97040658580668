//! GPIO output adapters implementing [`embedded_hal::digital::OutputPin`].
//!
//! - [`SysfsPin`]: Linux `/sys/class/gpio` line, exported and configured as
//!   an output on open.
//! - [`SimulatedPin`]: level kept in memory for `--dry-run` and tests.
//!   Clones share the level so a test can observe what a driver wrote.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::digital::{self, ErrorKind, ErrorType, OutputPin};
use log::debug;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct GpioError {
    line: u32,
    source: io::Error,
}

impl fmt::Display for GpioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GPIO {}: {}", self.line, self.source)
    }
}

impl std::error::Error for GpioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl digital::Error for GpioError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

// ---------------------------------------------------------------------------
// sysfs
// ---------------------------------------------------------------------------

pub struct SysfsPin {
    line: u32,
    value_path: PathBuf,
}

impl SysfsPin {
    /// Export `line` under `root` (normally `/sys/class/gpio`) if needed and
    /// set it as an output driven low.
    pub fn open(root: &Path, line: u32) -> Result<Self, GpioError> {
        let err = |source| GpioError { line, source };
        let dir = root.join(format!("gpio{line}"));
        if !dir.exists() {
            fs::write(root.join("export"), line.to_string()).map_err(err)?;
        }
        // "low" sets direction and initial level in one write.
        fs::write(dir.join("direction"), "low").map_err(err)?;
        debug!("GPIO {} exported as output", line);
        Ok(Self {
            line,
            value_path: dir.join("value"),
        })
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    fn write_level(&mut self, high: bool) -> Result<(), GpioError> {
        fs::write(&self.value_path, if high { "1" } else { "0" }).map_err(|source| GpioError {
            line: self.line,
            source,
        })
    }
}

impl ErrorType for SysfsPin {
    type Error = GpioError;
}

impl OutputPin for SysfsPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write_level(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write_level(true)
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct SimulatedPin {
    high: Arc<AtomicBool>,
}

impl SimulatedPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_high(&self) -> bool {
        self.high.load(Ordering::Relaxed)
    }
}

impl ErrorType for SimulatedPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for SimulatedPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high.store(true, Ordering::Relaxed);
        Ok(())
    }
}
