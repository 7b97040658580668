//! History of terminated batches.
//!
//! Two documents in the `history` namespace:
//!
//! | key        | content                                   |
//! |------------|-------------------------------------------|
//! | `records`  | every [`HistoryRecord`], newest first     |
//! | `counters` | last batch number issued per recipe code  |
//!
//! Both are read and written whole.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Deserializer, Serialize};

use super::journal::Event;
use super::{Batch, BatchId};
use crate::app::ports::{load_document, load_document_for_update, save_document, StoragePort};
use crate::error::{Error, Result};

pub const HISTORY_NAMESPACE: &str = "history";
pub const RECORDS_KEY: &str = "records";
pub const COUNTERS_KEY: &str = "counters";

/// Highest rating an operator can give a batch.
pub const MAX_RATING: u8 = 5;

/// How a batch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    #[default]
    Completed,
    Aborted,
    Failed,
}

/// Operator verdict supplied when a batch is stopped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    #[serde(default)]
    pub status: BatchStatus,
    #[serde(default)]
    pub rating: u8,
    #[serde(default)]
    pub notes: String,
}

impl Outcome {
    pub fn validate(&self) -> Result<()> {
        check_rating(self.rating)
    }
}

fn check_rating(rating: u8) -> Result<()> {
    if rating > MAX_RATING {
        return Err(Error::invalid(format!(
            "rating must be 0–{MAX_RATING}, got {rating}"
        )));
    }
    Ok(())
}

/// A terminated batch as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    #[serde(flatten)]
    pub batch: Batch,
    #[serde(default, with = "crate::timestamp")]
    pub ended_at: DateTime<Utc>,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub status: BatchStatus,
    #[serde(default, deserialize_with = "nullable_rating")]
    pub rating: u8,
    #[serde(default)]
    pub notes: String,
}

/// Older records may carry `"rating": null`; read it as unrated.
fn nullable_rating<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u8, D::Error> {
    Ok(Option::<u8>::deserialize(deserializer)?.unwrap_or(0))
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Newest start first.
    #[default]
    Date,
    Name,
    /// By recipe code.
    Type,
    /// Best rated first.
    Rating,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub sort: SortKey,
    /// Only records with this recipe code.
    #[serde(default, rename = "type")]
    pub recipe_code: Option<String>,
    #[serde(default)]
    pub status: Option<BatchStatus>,
}

/// Post-hoc edit of a record.  Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingUpdate {
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub status: Option<BatchStatus>,
    #[serde(default)]
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

type Counters = BTreeMap<String, u32>;

/// Operations over the persisted history documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct HistoryStore;

impl HistoryStore {
    pub fn records<S: StoragePort + ?Sized>(&self, store: &S) -> Vec<HistoryRecord> {
        load_document(store, HISTORY_NAMESPACE, RECORDS_KEY, Vec::new())
    }

    /// Records about to be rewritten.  Fails rather than dropping entries
    /// that no longer decode.
    fn records_for_update<S: StoragePort + ?Sized>(&self, store: &S) -> Result<Vec<HistoryRecord>> {
        Ok(load_document_for_update(store, HISTORY_NAMESPACE, RECORDS_KEY, Vec::new())?)
    }

    /// Issue the next id for `code` and persist the counter.
    ///
    /// The counter never falls behind the number of stored records with
    /// that code, so a history written without counters keeps its
    /// numbering.
    pub fn allocate_id<S: StoragePort + ?Sized>(&self, store: &mut S, code: &str) -> Result<BatchId> {
        let recorded = self
            .records_for_update(&*store)?
            .iter()
            .filter(|r| r.batch.recipe_code == code)
            .count() as u32;
        let mut counters: Counters =
            load_document_for_update(&*store, HISTORY_NAMESPACE, COUNTERS_KEY, Counters::new())?;
        let last = counters.get(code).copied().unwrap_or(0).max(recorded);
        let next = last + 1;
        counters.insert(code.to_owned(), next);
        save_document(store, HISTORY_NAMESPACE, COUNTERS_KEY, &counters)?;
        Ok(BatchId::new(code, next))
    }

    /// Insert a record at the front of the history.
    pub fn append<S: StoragePort + ?Sized>(&self, store: &mut S, record: &HistoryRecord) -> Result<()> {
        let mut records = self.records_for_update(&*store)?;
        records.insert(0, record.clone());
        save_document(store, HISTORY_NAMESPACE, RECORDS_KEY, &records)?;
        info!("History: recorded {} ({:?})", record.batch.id, record.status);
        Ok(())
    }

    pub fn list<S: StoragePort + ?Sized>(&self, store: &S, query: &HistoryQuery) -> Vec<HistoryRecord> {
        let mut records: Vec<HistoryRecord> = self
            .records(store)
            .into_iter()
            .filter(|r| {
                query
                    .recipe_code
                    .as_ref()
                    .is_none_or(|code| &r.batch.recipe_code == code)
            })
            .filter(|r| query.status.is_none_or(|s| r.status == s))
            .collect();

        match query.sort {
            SortKey::Date => records.sort_by(|a, b| b.batch.started_at.cmp(&a.batch.started_at)),
            SortKey::Name => records.sort_by(|a, b| a.batch.name.cmp(&b.batch.name)),
            SortKey::Type => records.sort_by(|a, b| a.batch.recipe_code.cmp(&b.batch.recipe_code)),
            SortKey::Rating => records.sort_by(|a, b| b.rating.cmp(&a.rating)),
        }
        records
    }

    pub fn get<S: StoragePort + ?Sized>(&self, store: &S, id: &str) -> Result<HistoryRecord> {
        self.records(store)
            .into_iter()
            .find(|r| r.batch.id.as_str() == id)
            .ok_or_else(|| Error::not_found("history record", id))
    }

    pub fn delete<S: StoragePort + ?Sized>(&self, store: &mut S, id: &str) -> Result<()> {
        let mut records = self.records_for_update(&*store)?;
        let before = records.len();
        records.retain(|r| r.batch.id.as_str() != id);
        if records.len() == before {
            return Err(Error::not_found("history record", id));
        }
        save_document(store, HISTORY_NAMESPACE, RECORDS_KEY, &records)?;
        info!("History: deleted {id}");
        Ok(())
    }

    /// Edit rating, status or notes of a stored record.
    pub fn rate<S: StoragePort + ?Sized>(
        &self,
        store: &mut S,
        id: &str,
        update: RatingUpdate,
    ) -> Result<HistoryRecord> {
        if let Some(rating) = update.rating {
            check_rating(rating)?;
        }
        let mut records = self.records_for_update(&*store)?;
        let record = records
            .iter_mut()
            .find(|r| r.batch.id.as_str() == id)
            .ok_or_else(|| Error::not_found("history record", id))?;

        if let Some(rating) = update.rating {
            record.rating = rating;
        }
        if let Some(status) = update.status {
            record.status = status;
        }
        if let Some(notes) = update.notes {
            record.notes = notes;
        }
        let updated = record.clone();
        save_document(store, HISTORY_NAMESPACE, RECORDS_KEY, &records)?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::store::MemoryStore;
    use crate::app::ports::StorageError;
    use crate::recipes::{Step, VentilationMode};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap()
    }

    fn record(id: &str, code: &str, name: &str, start_offset_h: i64, rating: u8) -> HistoryRecord {
        let started = t0() + Duration::hours(start_offset_h);
        let step = Step {
            name: "F".into(),
            target_temp_c: 30.0,
            target_humidity_pct: 70.0,
            duration_hours: 1.0,
            ventilation: VentilationMode::Off,
        };
        HistoryRecord {
            batch: Batch {
                id: BatchId::from(id),
                name: name.into(),
                recipe_key: None,
                recipe_code: code.into(),
                current_step: step.clone(),
                steps: vec![step],
                current_step_index: 0,
                started_at: started,
                current_step_started_at: started,
                total_duration_hours: 1.0,
                ingredients: Vec::new(),
            },
            ended_at: started + Duration::hours(1),
            events: Vec::new(),
            status: BatchStatus::Completed,
            rating,
            notes: String::new(),
        }
    }

    fn seeded() -> MemoryStore {
        let mut store = MemoryStore::new();
        let history = HistoryStore;
        history.append(&mut store, &record("#N-0001", "N", "Beans", 0, 3)).unwrap();
        history.append(&mut store, &record("#T-0001", "T", "Apple tempeh", 5, 5)).unwrap();
        history.append(&mut store, &record("#N-0002", "N", "Chickpeas", 2, 1)).unwrap();
        store
    }

    #[test]
    fn ids_continue_from_existing_history() {
        let mut store = seeded();
        let history = HistoryStore;
        assert_eq!(history.allocate_id(&mut store, "N").unwrap().as_str(), "#N-0003");
        assert_eq!(history.allocate_id(&mut store, "N").unwrap().as_str(), "#N-0004");
        assert_eq!(history.allocate_id(&mut store, "KB").unwrap().as_str(), "#KB-0001");
    }

    #[test]
    fn deleting_a_record_does_not_reuse_its_id() {
        let mut store = seeded();
        let history = HistoryStore;
        assert_eq!(history.allocate_id(&mut store, "N").unwrap().as_str(), "#N-0003");
        history.delete(&mut store, "#N-0002").unwrap();
        assert_eq!(history.allocate_id(&mut store, "N").unwrap().as_str(), "#N-0004");
    }

    #[test]
    fn list_sorts_and_filters() {
        let store = seeded();
        let history = HistoryStore;

        let by_date = history.list(&store, &HistoryQuery::default());
        let ids: Vec<_> = by_date.iter().map(|r| r.batch.id.as_str()).collect();
        assert_eq!(ids, ["#T-0001", "#N-0002", "#N-0001"]);

        let by_rating = history.list(
            &store,
            &HistoryQuery {
                sort: SortKey::Rating,
                ..HistoryQuery::default()
            },
        );
        assert_eq!(by_rating[0].rating, 5);

        let natto_only = history.list(
            &store,
            &HistoryQuery {
                sort: SortKey::Name,
                recipe_code: Some("N".into()),
                status: None,
            },
        );
        let names: Vec<_> = natto_only.iter().map(|r| r.batch.name.as_str()).collect();
        assert_eq!(names, ["Beans", "Chickpeas"]);
    }

    #[test]
    fn rate_edits_in_place() {
        let mut store = seeded();
        let history = HistoryStore;
        let updated = history
            .rate(
                &mut store,
                "#N-0001",
                RatingUpdate {
                    rating: Some(4),
                    status: Some(BatchStatus::Failed),
                    notes: None,
                },
            )
            .unwrap();
        assert_eq!(updated.rating, 4);
        assert_eq!(updated.status, BatchStatus::Failed);
        let failed = history.list(
            &store,
            &HistoryQuery {
                status: Some(BatchStatus::Failed),
                ..HistoryQuery::default()
            },
        );
        assert_eq!(failed.len(), 1);
    }

    #[test]
    fn rate_rejects_out_of_range_and_unknown_ids() {
        let mut store = seeded();
        let history = HistoryStore;
        let bad = RatingUpdate {
            rating: Some(6),
            ..RatingUpdate::default()
        };
        assert!(matches!(
            history.rate(&mut store, "#N-0001", bad),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            history.rate(&mut store, "#Z-9999", RatingUpdate::default()),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            history.delete(&mut store, "#Z-9999"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn reads_records_with_naive_timestamps_and_missing_fields() {
        let mut store = MemoryStore::new();
        store
            .write(
                HISTORY_NAMESPACE,
                RECORDS_KEY,
                br##"[{"id":"#N-0001","name":"Natto","preset":"natto","preset_code":"N",
                      "steps":[{"name":"F","temp":42,"humidity":85,"duration":24,"ventilation":"off"}],
                      "current_step_index":0,
                      "current_step":{"name":"F","temp":42,"humidity":85,"duration":24,"ventilation":"off"},
                      "started_at":"2024-01-01T08:00:00.123456",
                      "step_started_at":"2024-01-01T08:00:00.123456",
                      "total_duration":24,"ingredients":["soy"],
                      "ended_at":"2024-01-02T08:00:00",
                      "events":[{"time":"2024-01-01T08:00:00","text":"Started Natto"}]}]"##,
            )
            .unwrap();
        let r = HistoryStore.get(&store, "#N-0001").unwrap();
        assert_eq!(r.status, BatchStatus::Completed);
        assert_eq!(r.rating, 0);
        assert_eq!(r.batch.recipe_key.as_deref(), Some("natto"));
        assert_eq!(r.events.len(), 1);
    }

    #[test]
    fn null_rating_reads_as_unrated() {
        let mut store = seeded();
        let mut raw: serde_json::Value =
            serde_json::from_slice(&store.read(HISTORY_NAMESPACE, RECORDS_KEY).unwrap()).unwrap();
        raw[2]["rating"] = serde_json::Value::Null;
        store
            .write(HISTORY_NAMESPACE, RECORDS_KEY, &serde_json::to_vec(&raw).unwrap())
            .unwrap();

        assert_eq!(HistoryStore.records(&store).len(), 3);
        HistoryStore
            .append(&mut store, &record("#N-0003", "N", "Lentils", 8, 2))
            .unwrap();
        assert_eq!(HistoryStore.records(&store).len(), 4);
    }

    #[test]
    fn undecodable_history_is_never_overwritten() {
        let mut store = seeded();
        let mut raw: serde_json::Value =
            serde_json::from_slice(&store.read(HISTORY_NAMESPACE, RECORDS_KEY).unwrap()).unwrap();
        raw[2]["status"] = "exploded".into();
        let stored = serde_json::to_vec(&raw).unwrap();
        store.write(HISTORY_NAMESPACE, RECORDS_KEY, &stored).unwrap();

        let history = HistoryStore;
        let corrupted = |r: Result<_>| matches!(r, Err(Error::Storage(StorageError::Corrupted)));
        assert!(corrupted(history.append(&mut store, &record("#N-0003", "N", "Lentils", 8, 2))));
        assert!(corrupted(history.delete(&mut store, "#N-0001")));
        assert!(corrupted(
            history.rate(&mut store, "#N-0001", RatingUpdate::default()).map(|_| ())
        ));
        assert!(corrupted(history.allocate_id(&mut store, "N").map(|_| ())));
        assert_eq!(store.read(HISTORY_NAMESPACE, RECORDS_KEY).unwrap(), stored);
    }
}
