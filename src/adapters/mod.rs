//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements         | Connects to                    |
//! |---------------|--------------------|--------------------------------|
//! | `config_file` | ConfigPort         | JSON file (`--config`)         |
//! | `gpio`        | OutputPin          | Linux sysfs GPIO / simulation  |
//! | `hardware`    | SensorPort         | 1-Wire probes, SHT40           |
//! |               | ActuatorPort       | Relay board                    |
//! | `log_sink`    | EventSink          | `log` facade                   |
//! | `store`       | StoragePort        | JSON files / in-memory map     |
//! | `time`        | ClockPort          | System clock / manual clock    |

pub mod config_file;
pub mod gpio;
pub mod hardware;
pub mod log_sink;
pub mod store;
pub mod time;
