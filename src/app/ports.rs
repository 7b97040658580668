//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (sensors, relays, event sinks, storage, clock) implement
//! these traits.  The [`AppService`](super::service::AppService) consumes
//! them via generics, so the domain core never touches hardware or the
//! filesystem directly.

use chrono::{DateTime, Utc};

use crate::config::SystemConfig;
use crate::control::ActuatorState;
use crate::sensors::Reading;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the domain calls this once per tick.
///
/// Implementations never fail: an unavailable sensor degrades to the
/// fallback values so the control loop keeps running.
pub trait SensorPort {
    fn read_all(&mut self) -> Reading;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the domain calls this to command the relays.
pub trait ActuatorPort {
    /// Drive every output to match `state`.
    fn apply(&mut self, state: &ActuatorState);

    /// De-energise every output for a safe shutdown.
    fn all_off(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Wall-clock source.  Batch timing and the cyclic fan phase are both
/// derived from absolute time.
pub trait ClockPort {
    fn now(&self) -> DateTime<Utc>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration.  Returns [`SystemConfig::default()`] if none is stored.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port
// ───────────────────────────────────────────────────────────────

/// Persistent document storage (history, presets, settings).
///
/// - Documents are addressed by `(namespace, key)` and always read and
///   written whole.
/// - Write operations MUST be atomic: a failed write leaves the previous
///   document intact ("last successful write wins").
pub trait StoragePort {
    /// Read a whole document.
    fn read(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Replace a whole document atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a document.  Returns `Ok(())` even if it didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a document exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested document does not exist.
    NotFound,
    /// Document exists but could not be decoded.
    Corrupted,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "document not found"),
            Self::Corrupted => write!(f, "document corrupted"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for StorageError {}

// ───────────────────────────────────────────────────────────────
// JSON document helpers
// ───────────────────────────────────────────────────────────────

/// Load a JSON document, falling back to `default` when it is missing or
/// unreadable.  Load failures are logged, never surfaced.
pub fn load_document<T, S>(store: &S, namespace: &str, key: &str, default: T) -> T
where
    T: serde::de::DeserializeOwned,
    S: StoragePort + ?Sized,
{
    match store.read(namespace, key) {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!("{namespace}/{key}: corrupted document ({e}), using defaults");
                default
            }
        },
        Err(StorageError::NotFound) => default,
        Err(e) => {
            log::warn!("{namespace}/{key}: load failed ({e}), using defaults");
            default
        }
    }
}

/// Load a JSON document that is about to be modified and written back.
///
/// A missing document yields `default`; a present one that cannot be read
/// or decoded is an error, so the caller never overwrites stored data with
/// an empty default.
pub fn load_document_for_update<T, S>(
    store: &S,
    namespace: &str,
    key: &str,
    default: T,
) -> Result<T, StorageError>
where
    T: serde::de::DeserializeOwned,
    S: StoragePort + ?Sized,
{
    match store.read(namespace, key) {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
            log::error!("{namespace}/{key}: corrupted document ({e}), refusing to overwrite");
            StorageError::Corrupted
        }),
        Err(StorageError::NotFound) => Ok(default),
        Err(e) => Err(e),
    }
}

/// Serialize and persist a JSON document.  Save failures are surfaced.
pub fn save_document<T, S>(
    store: &mut S,
    namespace: &str,
    key: &str,
    doc: &T,
) -> Result<(), StorageError>
where
    T: serde::Serialize + ?Sized,
    S: StoragePort + ?Sized,
{
    let bytes = serde_json::to_vec_pretty(doc).map_err(|_| StorageError::Corrupted)?;
    store.write(namespace, key, &bytes)
}
