//! Batch lifecycle.
//!
//! ```text
//!   ┌──────┐  start   ┌──────────────────────────────┐
//!   │ Idle │ ───────▶ │ Running(fermenting|dehydrating)│ ◀─┐ advance_step
//!   └──────┘ ◀─────── └──────────────────────────────┘ ──┘
//!               stop
//! ```
//!
//! At most one batch exists.  Steps never advance on their own: reaching
//! the end of a step's duration only journals a notice.

pub mod history;
pub mod journal;

use core::fmt;

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::recipes::{total_duration_hours, validate_steps, Step};

use history::{HistoryRecord, Outcome};
use journal::{Event, EventLog};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Idle,
    Fermenting,
    Dehydrating,
}

/// `#<CODE>-<NNNN>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(String);

impl BatchId {
    pub fn new(code: &str, number: u32) -> Self {
        Self(format!("#{code}-{number:04}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BatchId {
    fn from(raw: &str) -> Self {
        Self(raw.to_owned())
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A running batch, serialized with the persisted field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "preset", default)]
    pub recipe_key: Option<String>,
    #[serde(rename = "preset_code", default)]
    pub recipe_code: String,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub current_step_index: usize,
    /// Copy of `steps[current_step_index]`.
    #[serde(default)]
    pub current_step: Step,
    #[serde(default, with = "crate::timestamp")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "step_started_at", default, with = "crate::timestamp")]
    pub current_step_started_at: DateTime<Utc>,
    #[serde(rename = "total_duration", default)]
    pub total_duration_hours: f64,
    /// Free-form ingredient entries supplied by the front end.
    #[serde(default)]
    pub ingredients: Vec<serde_json::Value>,
}

/// Progress of the active batch.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Progress {
    #[serde(rename = "elapsed_hours")]
    pub step_elapsed_hours: f64,
    #[serde(rename = "step_progress")]
    pub step_progress_pct: f64,
    #[serde(rename = "total_elapsed")]
    pub total_elapsed_hours: f64,
    #[serde(rename = "total_progress")]
    pub total_progress_pct: f64,
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

impl Progress {
    /// Every field rounded to one decimal, for display.
    pub fn rounded(self) -> Self {
        Self {
            step_elapsed_hours: round1(self.step_elapsed_hours),
            step_progress_pct: round1(self.step_progress_pct),
            total_elapsed_hours: round1(self.total_elapsed_hours),
            total_progress_pct: round1(self.total_progress_pct),
        }
    }

    pub fn remaining_hours(&self, total_duration_hours: f64) -> f64 {
        (total_duration_hours - self.total_elapsed_hours).max(0.0)
    }
}

fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    ((to - from).num_milliseconds() as f64 / 3_600_000.0).max(0.0)
}

fn percent(elapsed: f64, duration: f64) -> f64 {
    if duration > 0.0 {
        (elapsed / duration * 100.0).clamp(0.0, 100.0)
    } else {
        100.0
    }
}

/// A fully resolved start request.
#[derive(Debug, Clone, PartialEq)]
pub struct StartRequest {
    /// Display name of the batch.
    pub name: String,
    /// Name of the recipe the steps came from, used in the start event.
    pub recipe_name: String,
    pub recipe_key: Option<String>,
    pub recipe_code: String,
    pub steps: Vec<Step>,
    pub mode: RunMode,
    pub ingredients: Vec<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

struct ActiveRun {
    batch: Batch,
    mode: RunMode,
    journal: EventLog,
    /// The current step's end-of-duration notice has been journaled.
    step_elapsed_noted: bool,
}

pub struct BatchStateMachine {
    active: Option<ActiveRun>,
    journal_capacity: usize,
}

impl BatchStateMachine {
    pub fn new(journal_capacity: usize) -> Self {
        Self {
            active: None,
            journal_capacity,
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    pub fn mode(&self) -> RunMode {
        self.active.as_ref().map_or(RunMode::Idle, |run| run.mode)
    }

    pub fn batch(&self) -> Option<&Batch> {
        self.active.as_ref().map(|run| &run.batch)
    }

    /// Current step and run mode, the input to the control policy.
    pub fn active_step(&self) -> Option<(&Step, RunMode)> {
        self.active
            .as_ref()
            .map(|run| (&run.batch.current_step, run.mode))
    }

    /// Up to `n` newest journal events; empty when idle.
    pub fn recent_events(&self, n: usize) -> Vec<Event> {
        self.active
            .as_ref()
            .map(|run| run.journal.recent(n))
            .unwrap_or_default()
    }

    pub fn ensure_idle(&self) -> Result<()> {
        if self.active.is_some() {
            return Err(Error::Conflict("a batch is already running"));
        }
        Ok(())
    }

    fn run_mut(&mut self) -> Result<&mut ActiveRun> {
        self.active.as_mut().ok_or(Error::NoActiveBatch)
    }

    /// Begin a batch.  Never replaces a running one.
    pub fn start(&mut self, req: StartRequest, id: BatchId, now: DateTime<Utc>) -> Result<&Batch> {
        self.ensure_idle()?;
        validate_steps(&req.steps)?;
        if req.mode == RunMode::Idle {
            return Err(Error::invalid("a batch cannot run in idle mode"));
        }

        let total_duration_hours = total_duration_hours(&req.steps);
        let current_step = req.steps[0].clone();
        let mut journal = EventLog::new(self.journal_capacity);
        journal.push(Event::new(format!("Started {}", req.recipe_name), now));

        info!("Batch {} started: {} ({:?})", id, req.name, req.mode);
        let run = self.active.insert(ActiveRun {
            batch: Batch {
                id,
                name: req.name,
                recipe_key: req.recipe_key,
                recipe_code: req.recipe_code,
                steps: req.steps,
                current_step_index: 0,
                current_step,
                started_at: now,
                current_step_started_at: now,
                total_duration_hours,
                ingredients: req.ingredients,
            },
            mode: req.mode,
            journal,
            step_elapsed_noted: false,
        });
        Ok(&run.batch)
    }

    /// Elapsed time and completion of the current step and of the whole
    /// batch.  `None` when idle.
    pub fn progress(&self, now: DateTime<Utc>) -> Option<Progress> {
        let batch = &self.active.as_ref()?.batch;
        let step_elapsed_hours = hours_between(batch.current_step_started_at, now);
        let total_elapsed_hours = hours_between(batch.started_at, now);
        Some(Progress {
            step_elapsed_hours,
            step_progress_pct: percent(step_elapsed_hours, batch.current_step.duration_hours),
            total_elapsed_hours,
            total_progress_pct: percent(total_elapsed_hours, batch.total_duration_hours),
        })
    }

    /// Journal a one-time notice when the current step has run its full
    /// duration.  Returns the step name the first time only.
    pub fn note_step_elapsed(&mut self, now: DateTime<Utc>) -> Option<String> {
        let done = self.progress(now)?.step_progress_pct >= 100.0;
        let run = self.active.as_mut()?;
        if !done || run.step_elapsed_noted {
            return None;
        }
        run.step_elapsed_noted = true;
        let name = run.batch.current_step.name.clone();
        run.journal
            .push(Event::new(format!("Step duration reached: {name}"), now));
        info!("Batch {}: step '{}' duration reached", run.batch.id, name);
        Some(name)
    }

    /// Move to the next step.  Operator initiated only.
    pub fn advance_step(&mut self, now: DateTime<Utc>) -> Result<Step> {
        let run = self.run_mut()?;
        let next = run.batch.current_step_index + 1;
        let Some(step) = run.batch.steps.get(next).cloned() else {
            return Err(Error::Conflict("last step reached"));
        };

        run.batch.current_step_index = next;
        run.batch.current_step = step.clone();
        run.batch.current_step_started_at = now;
        run.step_elapsed_noted = false;
        run.journal
            .push(Event::new(format!("Advanced to step: {}", step.name), now));
        info!("Batch {}: advanced to step {} '{}'", run.batch.id, next + 1, step.name);
        Ok(step)
    }

    /// Terminate the running batch.
    ///
    /// The history record is handed to `persist`; the batch is cleared only
    /// if that succeeds.  Stopping while idle is a successful no-op.
    pub fn stop<F>(&mut self, outcome: Outcome, now: DateTime<Utc>, persist: F) -> Result<Option<HistoryRecord>>
    where
        F: FnOnce(&HistoryRecord) -> Result<()>,
    {
        outcome.validate()?;
        let Some(run) = self.active.as_ref() else {
            return Ok(None);
        };

        let record = HistoryRecord {
            batch: run.batch.clone(),
            ended_at: now,
            events: run.journal.to_vec(),
            status: outcome.status,
            rating: outcome.rating,
            notes: outcome.notes,
        };
        persist(&record)?;

        self.active = None;
        info!("Batch {} stopped ({:?})", record.batch.id, record.status);
        Ok(Some(record))
    }

    /// Prepend an annotation to the journal.
    pub fn record_event(&mut self, text: impl Into<String>, now: DateTime<Utc>) -> Result<Event> {
        let run = self.run_mut()?;
        let event = Event::new(text, now);
        run.journal.push(event.clone());
        Ok(event)
    }
}
