//! Pin and bus assignments for the chamber controller board.
//!
//! Single source of truth: every adapter references this module rather than
//! hard-coding GPIO numbers or sysfs paths.  Numbers are BCM GPIO lines on a
//! Raspberry-Pi style header.

// ---------------------------------------------------------------------------
// Relay board (4 channels, opto-isolated)
// ---------------------------------------------------------------------------

/// Heater mat / ceramic heater relay.
pub const HEATER_GPIO: u32 = 17;
/// Ultrasonic humidifier relay.
pub const HUMIDIFIER_GPIO: u32 = 27;
/// Internal circulation fan relay.
pub const FAN_INTERNAL_GPIO: u32 = 22;
/// Extraction fan relay.
pub const FAN_EXTRACT_GPIO: u32 = 23;

/// Relay lines in [`ActuatorState::NAMES`](crate::control::ActuatorState::NAMES) order.
pub const RELAY_GPIOS: [u32; 4] = [HEATER_GPIO, HUMIDIFIER_GPIO, FAN_INTERNAL_GPIO, FAN_EXTRACT_GPIO];

/// Linux sysfs GPIO class directory.
pub const GPIO_SYSFS_ROOT: &str = "/sys/class/gpio";

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

// DS18B20 probes share the w1-gpio line (GPIO 4); their sysfs root is
// `SystemConfig::w1_devices_path`.  The SHT40 sits on I2C bus 1.

/// hwmon class directory searched for the kernel `sht4x` driver.
pub const HWMON_SYSFS_ROOT: &str = "/sys/class/hwmon";
/// hwmon `name` reported by the kernel SHT4x driver.
pub const SHT4X_HWMON_NAME: &str = "sht4x";
