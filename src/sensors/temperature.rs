//! DS18B20 chamber probes on the Linux 1-Wire bus.
//!
//! The `w1-gpio` + `w1-therm` kernel modules expose every probe as
//! `/sys/bus/w1/devices/28-<serial>/w1_slave`:
//!
//! ```text
//! 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
//! 72 01 4b 46 7f ff 0e 10 57 t=23125
//! ```
//!
//! The first line ends in `YES` when the scratchpad CRC matched; the second
//! carries the temperature in millidegrees Celsius.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::TemperatureProbes;
use crate::error::SensorError;

/// DS18B20 family code prefix in the sysfs device name.
const DS18B20_PREFIX: &str = "28-";
const SLAVE_FILE: &str = "w1_slave";

/// Parse the contents of a `w1_slave` file into degrees Celsius.
pub fn parse_w1_slave(contents: &str) -> Result<f32, SensorError> {
    let mut lines = contents.lines();
    let status = lines.next().ok_or(SensorError::Malformed)?;
    if !status.trim_end().ends_with("YES") {
        return Err(SensorError::CrcMismatch);
    }
    let data = lines.next().ok_or(SensorError::Malformed)?;
    let pos = data.find("t=").ok_or(SensorError::Malformed)?;
    let milli: i32 = data[pos + 2..]
        .trim()
        .parse()
        .map_err(|_| SensorError::Malformed)?;
    Ok(milli as f32 / 1000.0)
}

/// Every DS18B20 found under a sysfs 1-Wire devices directory.
pub struct W1Bus {
    root: PathBuf,
    /// The devices directory could not be listed on the last read.
    bus_down: bool,
}

impl W1Bus {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            bus_down: false,
        }
    }

    /// Probe device directories, sorted by serial so channel order is stable.
    fn devices(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut devices: Vec<PathBuf> = fs::read_dir(&self.root)?
            .filter_map(Result::ok)
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with(DS18B20_PREFIX))
            })
            .map(|entry| entry.path())
            .collect();
        devices.sort();
        Ok(devices)
    }

    fn read_probe(device: &Path) -> Result<f32, SensorError> {
        let contents =
            fs::read_to_string(device.join(SLAVE_FILE)).map_err(|_| SensorError::BusReadFailed)?;
        parse_w1_slave(&contents)
    }
}

impl TemperatureProbes for W1Bus {
    fn read_celsius(&mut self) -> Vec<f32> {
        let devices = match self.devices() {
            Ok(d) => d,
            Err(e) => {
                if !self.bus_down {
                    warn!("1-Wire bus {} unreadable: {}", self.root.display(), e);
                    self.bus_down = true;
                }
                return Vec::new();
            }
        };
        if self.bus_down {
            info!("1-Wire bus {} readable again", self.root.display());
            self.bus_down = false;
        }

        devices
            .iter()
            .map(|device| {
                Self::read_probe(device).unwrap_or_else(|e| {
                    debug!("DS18B20 {}: {}", device.display(), e);
                    0.0
                })
            })
            .collect()
    }
}
