//! Recipes: ordered lists of setpoint steps.
//!
//! System recipes are compiled in; user recipes live in the store and are
//! merged over them on every read (see [`catalog::RecipeCatalog`]).

pub mod catalog;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{Error, Result};

pub use catalog::RecipeCatalog;

/// Key of the recipe whose runs are dehydration runs.
pub const DEHYDRATE_KEY: &str = "dehydrate";

/// How the fans behave during a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VentilationMode {
    #[default]
    Off,
    On,
    /// Internal fan for a fixed window of every cycle.
    Cyclic,
}

/// One segment of a recipe with constant setpoints.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "temp")]
    pub target_temp_c: f32,
    #[serde(rename = "humidity")]
    pub target_humidity_pct: f32,
    #[serde(rename = "duration")]
    pub duration_hours: f64,
    #[serde(default)]
    pub ventilation: VentilationMode,
}

impl Step {
    pub fn validate(&self) -> Result<()> {
        if !self.duration_hours.is_finite() || self.duration_hours <= 0.0 {
            return Err(Error::invalid(format!(
                "step '{}' must have a positive duration",
                self.name
            )));
        }
        if !self.target_temp_c.is_finite() || !self.target_humidity_pct.is_finite() {
            return Err(Error::invalid(format!(
                "step '{}' has a non-numeric setpoint",
                self.name
            )));
        }
        Ok(())
    }
}

/// Sum of the step durations.
pub fn total_duration_hours(steps: &[Step]) -> f64 {
    steps.iter().map(|s| s.duration_hours).sum()
}

/// Reject an empty step list or any invalid step.
pub fn validate_steps(steps: &[Step]) -> Result<()> {
    if steps.is_empty() {
        return Err(Error::invalid("no steps defined"));
    }
    steps.iter().try_for_each(Step::validate)
}

/// Display fields and steps shared by system and user recipes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeDefinition {
    pub name: String,
    pub icon: String,
    /// Short code used as the batch id prefix.
    pub code: String,
    pub steps: Vec<Step>,
}

/// Where a recipe comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum RecipeOrigin {
    System,
    User {
        /// Recipe this one was derived from, if any.
        parent: Option<String>,
        created_at: Option<DateTime<Utc>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub key: String,
    pub definition: RecipeDefinition,
    pub origin: RecipeOrigin,
}

impl Recipe {
    pub fn is_system_defined(&self) -> bool {
        matches!(self.origin, RecipeOrigin::System)
    }

    pub fn parent(&self) -> Option<&str> {
        match &self.origin {
            RecipeOrigin::User { parent, .. } => parent.as_deref(),
            RecipeOrigin::System => None,
        }
    }

    /// Runs of the dehydrate recipe, or of a recipe derived from it,
    /// ventilate through the extract fan.
    pub fn is_dehydration(&self) -> bool {
        self.key == DEHYDRATE_KEY || self.parent() == Some(DEHYDRATE_KEY)
    }
}

/// Wire form: `{name, icon, code, steps, system, parent?, created_at?}`.
#[derive(Serialize)]
struct RecipeView<'a> {
    #[serde(flatten)]
    definition: &'a RecipeDefinition,
    system: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
}

impl Serialize for Recipe {
    fn serialize<S: Serializer>(&self, s: S) -> core::result::Result<S::Ok, S::Error> {
        let created_at = match &self.origin {
            RecipeOrigin::User { created_at, .. } => created_at.as_ref().map(crate::timestamp::format),
            RecipeOrigin::System => None,
        };
        RecipeView {
            definition: &self.definition,
            system: self.is_system_defined(),
            parent: self.parent(),
            created_at,
        }
        .serialize(s)
    }
}
