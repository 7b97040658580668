//! Inbound commands to the application service.
//!
//! One variant per operator action.  Commands arrive as JSON objects
//! tagged by `op` (e.g. `{"op":"next_step"}`), which keeps an HTTP front
//! end a thin route → command mapping:
//!
//! | Route                                  | `op`              |
//! |----------------------------------------|-------------------|
//! | `GET /api/state`                       | `state`           |
//! | `GET /api/sensors/history`             | `sensor_history`  |
//! | `GET /api/presets`                     | `list_presets`    |
//! | `POST /api/presets/custom`             | `create_preset`   |
//! | `DELETE /api/presets/custom/{key}`     | `delete_preset`   |
//! | `GET /api/history`                     | `list_history`    |
//! | `GET /api/history/{id}`                | `get_history`     |
//! | `DELETE /api/history/{id}`             | `delete_history`  |
//! | `POST /api/history/{id}/rating`        | `rate_history`    |
//! | `POST /api/batch/start`                | `start_batch`     |
//! | `POST /api/batch/stop`                 | `stop_batch`      |
//! | `POST /api/batch/next-step`            | `next_step`       |
//! | `POST /api/batch/event`                | `record_event`    |
//! | `POST /api/actuator/{name}`            | `set_actuator`    |
//! | `GET /api/settings`                    | `get_settings`    |
//! | `POST /api/settings`                   | `update_settings` |

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::batch::history::{HistoryQuery, Outcome, RatingUpdate};
use crate::config::AlertSettings;
use crate::error::{Error, Result};
use crate::recipes::catalog::NewRecipe;
use crate::recipes::Step;

fn default_interval() -> String {
    "1m".to_owned()
}

/// Body of a batch start request.
///
/// Explicit `steps` win; otherwise `preset` is resolved through the
/// recipe catalog.  `name` always overrides the recipe's display name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartBatch {
    #[serde(default)]
    pub steps: Option<Vec<Step>>,
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<Value>,
}

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AppCommand {
    /// Sensors, actuators, mode, active batch with progress, recent events.
    State,

    /// Downsampled sensor trace for charting (`1m`, `15m` or `1h`).
    SensorHistory {
        #[serde(default = "default_interval")]
        interval: String,
    },

    ListPresets,
    CreatePreset(NewRecipe),
    DeletePreset {
        key: String,
    },

    ListHistory(HistoryQuery),
    GetHistory {
        id: String,
    },
    DeleteHistory {
        id: String,
    },
    RateHistory {
        id: String,
        #[serde(flatten)]
        update: RatingUpdate,
    },

    StartBatch(StartBatch),
    StopBatch(Outcome),
    /// Operator-initiated step advance.
    NextStep,
    RecordEvent {
        text: String,
    },

    /// Set (or toggle, when `state` is absent) one actuator until the next tick.
    SetActuator {
        name: String,
        #[serde(default)]
        state: Option<bool>,
    },

    GetSettings,
    UpdateSettings(AlertSettings),
}

impl AppCommand {
    /// Decode one JSON command.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::invalid(format!("bad command: {e}")))
    }
}

/// Render a command outcome as the JSON reply body.
///
/// Failures become `{"error", "kind", "status"}` so a front end can map
/// them straight onto HTTP status codes.
pub fn render_reply(result: &Result<Value>) -> Value {
    match result {
        Ok(body) => body.clone(),
        Err(e) => json!({
            "error": e.to_string(),
            "kind": e.kind(),
            "status": e.http_status(),
        }),
    }
}
