//! Domain-private detailed records, one document per user and day.

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::entity::{MealPlan, ScheduledWorkout, WaterLog};
use crate::error::Result;
use crate::ledger::{dated_key, Domain};
use crate::storage::{DocumentStore, Filter, OrderBy};

pub const MEAL_PLANS: &str = "meal_plans";
pub const WORKOUTS: &str = "workouts";
pub const WATER_LOGS: &str = "water_logs";

/// A rich per-day payload owned by exactly one domain.
pub trait DetailedRecord: Serialize + DeserializeOwned + Clone {
    const COLLECTION: &'static str;
    const DOMAIN: Domain;

    /// The ledger tags this record implies for its domain.
    fn desired_tags(&self) -> Vec<String>;

    /// Recompute fields derived from the rest of the record. Runs on every
    /// save.
    fn refresh_derived(&mut self) {}
}

impl DetailedRecord for MealPlan {
    const COLLECTION: &'static str = MEAL_PLANS;
    const DOMAIN: Domain = Domain::Meal;

    fn desired_tags(&self) -> Vec<String> {
        self.filled_slots().map(Domain::meal_tag).collect()
    }

    fn refresh_derived(&mut self) {
        self.recompute_totals();
    }
}

impl DetailedRecord for ScheduledWorkout {
    const COLLECTION: &'static str = WORKOUTS;
    const DOMAIN: Domain = Domain::Gym;

    fn desired_tags(&self) -> Vec<String> {
        if self.exercises.is_empty() {
            Vec::new()
        } else {
            vec![Domain::gym_tag().to_string()]
        }
    }
}

impl DetailedRecord for WaterLog {
    const COLLECTION: &'static str = WATER_LOGS;
    const DOMAIN: Domain = Domain::Water;

    fn desired_tags(&self) -> Vec<String> {
        if self.goal_met() {
            vec![Domain::water_tag().to_string()]
        } else {
            Vec::new()
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RecordDocument<R> {
    user_id: String,
    date: NaiveDate,
    record: R,
}

/// Full-document reads and writes of one record type.
pub struct DetailedRecordStore<R> {
    store: Arc<dyn DocumentStore>,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for DetailedRecordStore<R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _record: PhantomData,
        }
    }
}

impl<R: DetailedRecord> DetailedRecordStore<R> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _record: PhantomData,
        }
    }

    /// Replace the record for a day. Derived fields are recomputed on the
    /// stored copy; the caller's record is left as passed.
    pub fn save(&self, user_id: &str, date: NaiveDate, record: &R) -> Result<()> {
        let key = dated_key(user_id, date)?;
        let mut record = record.clone();
        record.refresh_derived();
        let doc = serde_json::to_value(RecordDocument {
            user_id: user_id.to_string(),
            date,
            record,
        })?;
        self.store.set(R::COLLECTION, &key, doc)?;
        info!(collection = R::COLLECTION, %key, "detailed record saved");
        Ok(())
    }

    /// The record for a day, `None` if it was never saved.
    pub fn load(&self, user_id: &str, date: NaiveDate) -> Result<Option<R>> {
        let key = dated_key(user_id, date)?;
        debug!(collection = R::COLLECTION, %key, "loading detailed record");
        match self.store.get(R::COLLECTION, &key)? {
            Some(doc) => {
                let parsed: RecordDocument<R> = serde_json::from_value(doc.value)?;
                Ok(Some(parsed.record))
            }
            None => Ok(None),
        }
    }

    /// Saved records of a user for `from..=to`, oldest first.
    pub fn range(&self, user_id: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<(NaiveDate, R)>> {
        let filters = [
            Filter::eq("user_id", user_id),
            Filter::gte("date", from.to_string()),
            Filter::lte("date", to.to_string()),
        ];
        self.store
            .query(R::COLLECTION, &filters, Some(&OrderBy::asc("date")))?
            .into_iter()
            .map(|(_, doc)| {
                let parsed: RecordDocument<R> = serde_json::from_value(doc.value)?;
                Ok((parsed.date, parsed.record))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Exercise, Macros, PlannedFood};
    use crate::storage::LoroStore;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_desired_tags_per_domain() {
        let mut plan = MealPlan::new();
        plan.add_food("6 PM", PlannedFood::new("Rice", 1.0, "cup", Macros::default()));
        plan.add_food("8am", PlannedFood::new("Eggs", 2.0, "pc", Macros::default()));
        assert_eq!(plan.desired_tags(), vec!["meal-6-pm", "meal-8am"]);

        let mut workout = ScheduledWorkout::new("push", date("2025-03-04"));
        assert!(workout.desired_tags().is_empty());
        workout.exercises.push(Exercise::new("Dips", 0.0, 3, 10));
        assert_eq!(workout.desired_tags(), vec!["gym-workout"]);

        assert_eq!(WaterLog::new(8, 8).desired_tags(), vec!["water"]);
        assert!(WaterLog::new(2, 8).desired_tags().is_empty());
    }

    #[test]
    fn test_meal_totals_are_derived_on_save() {
        let records: DetailedRecordStore<MealPlan> =
            DetailedRecordStore::new(Arc::new(LoroStore::in_memory()));
        let day = date("2025-03-04");

        // Totals absent in the input, as when a plan is read from JSON
        let plan: MealPlan = serde_json::from_str(
            r#"{
                "slots": {"6pm": [{"name": "Rice", "quantity": 1.0, "unit": "cup",
                    "macros": {"calories": 200.0, "protein_g": 4.0, "carbs_g": 44.0, "fat_g": 0.5}}]},
                "external": [{"name": "Latte", "quantity": 1.0, "unit": "cup",
                    "macros": {"calories": 120.0, "protein_g": 6.0, "carbs_g": 10.0, "fat_g": 5.0}}]
            }"#,
        )
        .unwrap();
        assert_eq!(plan.totals, Macros::default());

        records.save("ana", day, &plan).unwrap();
        let stored = records.load("ana", day).unwrap().unwrap();
        assert_eq!(stored.totals.calories, 320.0);
        assert_eq!(stored.totals.protein_g, 10.0);
        assert_eq!(stored.totals.carbs_g, 54.0);
        assert_eq!(stored.totals.fat_g, 5.5);

        // Stale totals supplied by the caller are overwritten too
        let mut stale = plan.clone();
        stale.totals.calories = 9999.0;
        records.save("ana", day, &stale).unwrap();
        assert_eq!(records.load("ana", day).unwrap().unwrap().totals.calories, 320.0);
    }

    #[test]
    fn test_save_replaces_whole_record() {
        let records: DetailedRecordStore<ScheduledWorkout> =
            DetailedRecordStore::new(Arc::new(LoroStore::in_memory()));
        let day = date("2025-03-04");

        let mut workout = ScheduledWorkout::new("push", day);
        workout.exercises.push(Exercise::new("Bench", 60.0, 3, 8));
        workout.exercises.push(Exercise::new("Dips", 0.0, 3, 10));
        records.save("ana", day, &workout).unwrap();

        workout.exercises.truncate(1);
        records.save("ana", day, &workout).unwrap();

        let loaded = records.load("ana", day).unwrap().unwrap();
        assert_eq!(loaded, workout);
        assert!(records.load("ana", date("2025-03-05")).unwrap().is_none());
    }

    #[test]
    fn test_range_returns_dates() {
        let records: DetailedRecordStore<WaterLog> =
            DetailedRecordStore::new(Arc::new(LoroStore::in_memory()));
        records.save("ana", date("2025-03-02"), &WaterLog::new(3, 8)).unwrap();
        records.save("ana", date("2025-03-01"), &WaterLog::new(8, 8)).unwrap();
        records.save("bob", date("2025-03-01"), &WaterLog::new(1, 8)).unwrap();

        let logs = records.range("ana", date("2025-03-01"), date("2025-03-07")).unwrap();
        assert_eq!(
            logs,
            vec![
                (date("2025-03-01"), WaterLog::new(8, 8)),
                (date("2025-03-02"), WaterLog::new(3, 8)),
            ]
        );
    }
}
