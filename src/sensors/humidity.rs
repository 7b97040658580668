//! Sensirion SHT40 humidity/temperature sensor over I2C.
//!
//! One high-precision measurement: write `0xFD`, wait ≥ 8.3 ms, read six
//! bytes `T_msb T_lsb T_crc RH_msb RH_lsb RH_crc`.  Each word is protected
//! by a CRC-8 (polynomial 0x31, init 0xFF).
//!
//! Boards where the kernel `sht4x` driver owns the bus are read through
//! hwmon sysfs instead ([`HwmonSht4x`]).

use std::fs;
use std::path::{Path, PathBuf};

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use super::HumiditySensor;
use crate::error::SensorError;

/// Default 7-bit address of the SHT40-AD1B variant.
pub const SHT40_ADDRESS: u8 = 0x44;

const CMD_MEASURE_HIGH_PRECISION: u8 = 0xFD;
const MEASURE_DELAY_MS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HumidityReading {
    pub humidity_pct: f32,
    pub temperature_c: f32,
}

/// Sensirion CRC-8 over a data word.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0xFF;
    for byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            };
        }
    }
    crc
}

pub struct Sht40<I, D> {
    i2c: I,
    delay: D,
    address: u8,
}

impl<I: I2c, D: DelayNs> Sht40<I, D> {
    pub fn new(i2c: I, delay: D) -> Self {
        Self::with_address(i2c, delay, SHT40_ADDRESS)
    }

    pub fn with_address(i2c: I, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
        }
    }

    /// Trigger a high-precision measurement and decode it.
    pub fn measure(&mut self) -> Result<HumidityReading, SensorError> {
        self.i2c
            .write(self.address, &[CMD_MEASURE_HIGH_PRECISION])
            .map_err(|_| SensorError::BusReadFailed)?;
        self.delay.delay_ms(MEASURE_DELAY_MS);

        let mut buf = [0u8; 6];
        self.i2c
            .read(self.address, &mut buf)
            .map_err(|_| SensorError::BusReadFailed)?;

        if crc8(&buf[0..2]) != buf[2] || crc8(&buf[3..5]) != buf[5] {
            return Err(SensorError::CrcMismatch);
        }

        let t_raw = f32::from(u16::from_be_bytes([buf[0], buf[1]]));
        let rh_raw = f32::from(u16::from_be_bytes([buf[3], buf[4]]));

        Ok(HumidityReading {
            temperature_c: -45.0 + 175.0 * t_raw / 65535.0,
            // The transfer function can leave 0–100 at the extremes.
            humidity_pct: (-6.0 + 125.0 * rh_raw / 65535.0).clamp(0.0, 100.0),
        })
    }

    /// Release the bus and delay provider.
    pub fn release(self) -> (I, D) {
        (self.i2c, self.delay)
    }
}

impl<I: I2c, D: DelayNs> HumiditySensor for Sht40<I, D> {
    fn read(&mut self) -> Result<HumidityReading, SensorError> {
        self.measure()
    }
}

// ---------------------------------------------------------------------------
// Kernel hwmon backend
// ---------------------------------------------------------------------------

/// SHT4x exposed by the kernel hwmon driver.  Values are in milli-units:
/// `temp1_input` in m°C, `humidity1_input` in m%RH.
pub struct HwmonSht4x {
    dir: PathBuf,
}

impl HwmonSht4x {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Find the hwmon directory whose `name` is `driver` under `class_root`
    /// (normally `/sys/class/hwmon`).
    pub fn discover(class_root: &Path, driver: &str) -> Option<Self> {
        let mut dirs: Vec<PathBuf> = fs::read_dir(class_root)
            .ok()?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect();
        dirs.sort();
        dirs.into_iter()
            .find(|d| {
                fs::read_to_string(d.join("name")).is_ok_and(|n| n.trim() == driver)
            })
            .map(Self::new)
    }

    fn read_milli(&self, file: &str) -> Result<f32, SensorError> {
        let raw = fs::read_to_string(self.dir.join(file))
            .map_err(|_| SensorError::BusReadFailed)?;
        let milli: i64 = raw.trim().parse().map_err(|_| SensorError::Malformed)?;
        Ok(milli as f32 / 1000.0)
    }
}

impl HumiditySensor for HwmonSht4x {
    fn read(&mut self) -> Result<HumidityReading, SensorError> {
        Ok(HumidityReading {
            temperature_c: self.read_milli("temp1_input")?,
            humidity_pct: self.read_milli("humidity1_input")?.clamp(0.0, 100.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};

    struct MockI2c {
        response: [u8; 6],
        written: Vec<u8>,
        fail: bool,
    }

    impl ErrorType for MockI2c {
        type Error = ErrorKind;
    }

    impl I2c for MockI2c {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            assert_eq!(address, SHT40_ADDRESS);
            if self.fail {
                return Err(ErrorKind::Bus);
            }
            for op in operations {
                match op {
                    Operation::Write(bytes) => self.written.extend_from_slice(bytes),
                    Operation::Read(buf) => buf.copy_from_slice(&self.response[..buf.len()]),
                }
            }
            Ok(())
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    fn frame(t_raw: u16, rh_raw: u16) -> [u8; 6] {
        let t = t_raw.to_be_bytes();
        let rh = rh_raw.to_be_bytes();
        [t[0], t[1], crc8(&t), rh[0], rh[1], crc8(&rh)]
    }

    fn sensor(response: [u8; 6], fail: bool) -> Sht40<MockI2c, NoDelay> {
        Sht40::new(
            MockI2c {
                response,
                written: Vec::new(),
                fail,
            },
            NoDelay,
        )
    }

    #[test]
    fn crc_matches_datasheet_vector() {
        assert_eq!(crc8(&[0xBE, 0xEF]), 0x92);
    }

    #[test]
    fn decodes_measurement() {
        // 0x6666 → 25.0 °C, 0x72B0 → ~50 %RH
        let mut sht = sensor(frame(0x6666, 0x72B0), false);
        let m = sht.measure().unwrap();
        assert!((m.temperature_c - 25.0).abs() < 0.01);
        assert!((m.humidity_pct - 50.0).abs() < 0.01);
        let (i2c, _) = sht.release();
        assert_eq!(i2c.written, vec![CMD_MEASURE_HIGH_PRECISION]);
    }

    #[test]
    fn clamps_humidity_extremes() {
        let mut sht = sensor(frame(0x6666, 0xFFFF), false);
        assert!((sht.measure().unwrap().humidity_pct - 100.0).abs() < f32::EPSILON);
        let mut sht = sensor(frame(0x6666, 0x0000), false);
        assert!(sht.measure().unwrap().humidity_pct.abs() < f32::EPSILON);
    }

    #[test]
    fn rejects_corrupted_frame() {
        let mut bad = frame(0x6666, 0x72B0);
        bad[5] ^= 0xFF;
        assert_eq!(sensor(bad, false).measure(), Err(SensorError::CrcMismatch));
    }

    #[test]
    fn bus_error_is_reported() {
        assert_eq!(
            sensor([0; 6], true).measure(),
            Err(SensorError::BusReadFailed)
        );
    }

    #[test]
    fn hwmon_discovery_and_read() {
        let root = tempfile::tempdir().unwrap();
        let other = root.path().join("hwmon0");
        let sht = root.path().join("hwmon1");
        fs::create_dir_all(&other).unwrap();
        fs::create_dir_all(&sht).unwrap();
        fs::write(other.join("name"), "cpu_thermal\n").unwrap();
        fs::write(sht.join("name"), "sht4x\n").unwrap();
        fs::write(sht.join("temp1_input"), "24350\n").unwrap();
        fs::write(sht.join("humidity1_input"), "61200\n").unwrap();

        let mut sensor = HwmonSht4x::discover(root.path(), "sht4x").unwrap();
        let m = sensor.read().unwrap();
        assert!((m.temperature_c - 24.35).abs() < 1e-3);
        assert!((m.humidity_pct - 61.2).abs() < 1e-3);
    }

    #[test]
    fn hwmon_missing_or_garbled() {
        let root = tempfile::tempdir().unwrap();
        assert!(HwmonSht4x::discover(root.path(), "sht4x").is_none());

        fs::write(root.path().join("temp1_input"), "hot").unwrap();
        let mut sensor = HwmonSht4x::new(root.path());
        assert_eq!(sensor.read(), Err(SensorError::Malformed));
        fs::remove_file(root.path().join("temp1_input")).unwrap();
        assert_eq!(sensor.read(), Err(SensorError::BusReadFailed));
    }
}
