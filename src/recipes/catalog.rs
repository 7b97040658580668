//! Recipe catalog: compiled-in system recipes merged with user recipes.
//!
//! User recipes are one JSON document (`presets/custom`) mapping key →
//! recipe.  The merge happens on every read, so edits made to the document
//! take effect without a restart.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use super::{validate_steps, Recipe, RecipeDefinition, RecipeOrigin, Step, VentilationMode};
use crate::app::ports::{load_document, load_document_for_update, save_document, StoragePort};
use crate::error::{Error, Result};

pub const PRESETS_NAMESPACE: &str = "presets";
pub const CUSTOM_KEY: &str = "custom";

const DEFAULT_NAME: &str = "Untitled";
const DEFAULT_ICON: &str = "⚙️";
const DEFAULT_CODE: &str = "CU";

// ---------------------------------------------------------------------------
// Persisted and request shapes
// ---------------------------------------------------------------------------

fn default_name() -> String {
    DEFAULT_NAME.to_owned()
}

fn default_icon() -> String {
    DEFAULT_ICON.to_owned()
}

fn default_code() -> String {
    DEFAULT_CODE.to_owned()
}

/// One entry of the user recipe document.  A stored `system` flag is
/// ignored on read and never written.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecipe {
    #[serde(default = "default_name")]
    name: String,
    #[serde(default = "default_icon")]
    icon: String,
    #[serde(default = "default_code")]
    code: String,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    steps: Vec<Step>,
    #[serde(default, with = "crate::timestamp::option")]
    created_at: Option<DateTime<Utc>>,
}

impl StoredRecipe {
    fn into_recipe(self, key: String) -> Recipe {
        Recipe {
            key,
            definition: RecipeDefinition {
                name: self.name,
                icon: self.icon,
                code: self.code,
                steps: self.steps,
            },
            origin: RecipeOrigin::User {
                parent: self.parent,
                created_at: self.created_at,
            },
        }
    }
}

/// Request to create (or replace) a user recipe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewRecipe {
    /// Explicit key.  Generated as `custom_<unix secs>` when absent.
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

type UserRecipes = BTreeMap<String, StoredRecipe>;

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

pub struct RecipeCatalog {
    system: BTreeMap<String, Recipe>,
}

impl Default for RecipeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl RecipeCatalog {
    pub fn new() -> Self {
        let system = system_recipes()
            .into_iter()
            .map(|r| (r.key.clone(), r))
            .collect();
        Self { system }
    }

    /// The immutable built-in recipes.
    pub fn system(&self) -> impl Iterator<Item = &Recipe> {
        self.system.values()
    }

    fn load_user<S: StoragePort + ?Sized>(store: &S) -> UserRecipes {
        load_document(store, PRESETS_NAMESPACE, CUSTOM_KEY, UserRecipes::new())
    }

    fn load_user_for_update<S: StoragePort + ?Sized>(store: &S) -> Result<UserRecipes> {
        Ok(load_document_for_update(
            store,
            PRESETS_NAMESPACE,
            CUSTOM_KEY,
            UserRecipes::new(),
        )?)
    }

    /// System recipes overlaid with user recipes.  A user recipe with the
    /// key of a system one replaces it.
    pub fn list_all<S: StoragePort + ?Sized>(&self, store: &S) -> BTreeMap<String, Recipe> {
        let mut all = self.system.clone();
        for (key, stored) in Self::load_user(store) {
            all.insert(key.clone(), stored.into_recipe(key));
        }
        all
    }

    pub fn resolve<S: StoragePort + ?Sized>(&self, store: &S, key: &str) -> Result<Recipe> {
        if let Some(stored) = Self::load_user(store).remove(key) {
            return Ok(stored.into_recipe(key.to_owned()));
        }
        self.system
            .get(key)
            .cloned()
            .ok_or_else(|| Error::not_found("recipe", key))
    }

    /// Validate and persist a user recipe.  Returns its key.
    ///
    /// An explicit key replaces any user recipe stored under it; a
    /// generated key never collides with an existing one.
    pub fn create<S: StoragePort + ?Sized>(
        &self,
        store: &mut S,
        new: NewRecipe,
        now: DateTime<Utc>,
    ) -> Result<String> {
        validate_steps(&new.steps)?;

        let mut user = Self::load_user_for_update(&*store)?;
        let key = match new.key.filter(|k| !k.trim().is_empty()) {
            Some(key) => key,
            None => self.unique_key(&user, &format!("custom_{}", now.timestamp())),
        };

        user.insert(
            key.clone(),
            StoredRecipe {
                name: new.name.unwrap_or_else(default_name),
                icon: new.icon.unwrap_or_else(default_icon),
                code: new.code.unwrap_or_else(default_code),
                parent: new.parent,
                steps: new.steps,
                created_at: Some(now),
            },
        );
        save_document(store, PRESETS_NAMESPACE, CUSTOM_KEY, &user)?;
        info!("Recipe '{key}' saved");
        Ok(key)
    }

    /// Remove a user recipe.  System recipes cannot be deleted.
    pub fn delete<S: StoragePort + ?Sized>(&self, store: &mut S, key: &str) -> Result<()> {
        let mut user = Self::load_user_for_update(&*store)?;
        if user.remove(key).is_none() {
            return Err(Error::not_found("custom recipe", key));
        }
        save_document(store, PRESETS_NAMESPACE, CUSTOM_KEY, &user)?;
        info!("Recipe '{key}' deleted");
        Ok(())
    }

    fn unique_key(&self, user: &UserRecipes, base: &str) -> String {
        let taken = |k: &str| user.contains_key(k) || self.system.contains_key(k);
        if !taken(base) {
            return base.to_owned();
        }
        (2u32..)
            .map(|n| format!("{base}_{n}"))
            .find(|k| !taken(k))
            .unwrap_or_else(|| base.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Built-in recipes
// ---------------------------------------------------------------------------

type StepRow = (&'static str, f32, f32, f64, VentilationMode);

fn system_recipe(
    key: &str,
    name: &str,
    icon: &str,
    code: &str,
    steps: &[StepRow],
) -> Recipe {
    Recipe {
        key: key.to_owned(),
        definition: RecipeDefinition {
            name: name.to_owned(),
            icon: icon.to_owned(),
            code: code.to_owned(),
            steps: steps
                .iter()
                .map(|&(name, temp, humidity, duration, ventilation)| Step {
                    name: name.to_owned(),
                    target_temp_c: temp,
                    target_humidity_pct: humidity,
                    duration_hours: duration,
                    ventilation,
                })
                .collect(),
        },
        origin: RecipeOrigin::System,
    }
}

fn system_recipes() -> Vec<Recipe> {
    use VentilationMode::{Cyclic, Off, On};

    vec![
        system_recipe("natto", "Natto", "🫘", "N", &[("Fermentation", 42.0, 85.0, 24.0, Off)]),
        system_recipe(
            "tempeh",
            "Tempeh",
            "🟫",
            "T",
            &[
                ("Preheat", 32.0, 85.0, 2.0, Off),
                ("Incubation", 32.0, 85.0, 24.0, Off),
                ("Maturation", 30.0, 80.0, 10.0, Cyclic),
            ],
        ),
        system_recipe(
            "koji_rice",
            "Koji Rice",
            "🍚",
            "KR",
            &[
                ("Germination", 30.0, 85.0, 12.0, Off),
                ("Growth", 32.0, 80.0, 24.0, Cyclic),
                ("Sporulation", 28.0, 75.0, 12.0, On),
            ],
        ),
        system_recipe("kombucha", "Kombucha", "🧪", "KB", &[("Fermentation", 26.0, 60.0, 168.0, Off)]),
        system_recipe("yogurt", "Yogurt", "🥛", "Y", &[("Fermentation", 43.0, 70.0, 8.0, Off)]),
        system_recipe("kimchi", "Kimchi", "🌶️", "KI", &[("Active fermentation", 20.0, 70.0, 48.0, Off)]),
        system_recipe("lacto", "Lacto-ferment", "🥒", "LF", &[("Fermentation", 22.0, 70.0, 72.0, Off)]),
        system_recipe("miso", "Miso", "🥣", "MI", &[("Fermentation", 28.0, 75.0, 720.0, Off)]),
        system_recipe("vinegar", "Vinegar", "🍯", "V", &[("Acetification", 28.0, 60.0, 336.0, Cyclic)]),
        system_recipe(super::DEHYDRATE_KEY, "Dehydrate", "💨", "DH", &[("Drying", 45.0, 20.0, 12.0, On)]),
        system_recipe("manual", "Manual", "⚙️", "X", &[("Step 1", 30.0, 70.0, 24.0, Off)]),
    ]
}
