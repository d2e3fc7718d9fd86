//! Save flows that keep detailed records and the ledger consistent.
//!
//! A save persists the detailed record first and only then merges the
//! record's tags into the ledger. If the record write fails the ledger is
//! never touched, so the calendar cannot show an activity whose details do
//! not exist.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::config::Config;
use crate::entity::{MealPlan, ScheduledWorkout, WaterLog};
use crate::error::Result;
use crate::ledger::merge::check_ownership;
use crate::ledger::{DomainWriteAdapter, LedgerStore, TaskLedger};
use crate::records::{DetailedRecord, DetailedRecordStore};
use crate::storage::DocumentStore;

/// One domain's record store paired with its ledger adapter.
pub struct DomainService<R> {
    records: DetailedRecordStore<R>,
    adapter: DomainWriteAdapter,
}

impl<R: DetailedRecord> DomainService<R> {
    pub fn new(store: Arc<dyn DocumentStore>, ledger: LedgerStore) -> Self {
        Self {
            records: DetailedRecordStore::new(store),
            adapter: DomainWriteAdapter::new(R::DOMAIN, ledger),
        }
    }

    /// Persist `record`, then make its tags the domain's ledger
    /// contribution for the day.
    ///
    /// The record is borrowed so the caller's editing state survives a
    /// failed save.
    pub fn save(&self, user_id: &str, date: NaiveDate, record: &R) -> Result<TaskLedger> {
        let desired = record.desired_tags();
        check_ownership(R::DOMAIN, &desired)?;

        if let Err(e) = self.records.save(user_id, date, record) {
            warn!(domain = %R::DOMAIN, user_id, %date, error = %e, "record save failed, ledger untouched");
            return Err(e);
        }

        let ledger = self.adapter.replace_owned_set(user_id, date, &desired)?;
        info!(domain = %R::DOMAIN, user_id, %date, "day saved");
        Ok(ledger)
    }

    pub fn load(&self, user_id: &str, date: NaiveDate) -> Result<Option<R>> {
        self.records.load(user_id, date)
    }

    pub fn records(&self) -> &DetailedRecordStore<R> {
        &self.records
    }

    pub fn adapter(&self) -> &DomainWriteAdapter {
        &self.adapter
    }
}

/// Entry point wiring every domain to one store.
pub struct ScheduleSync {
    pub ledger: LedgerStore,
    pub meals: DomainService<MealPlan>,
    pub workouts: DomainService<ScheduledWorkout>,
    pub water: DomainService<WaterLog>,
    water_goal: u32,
}

impl ScheduleSync {
    pub fn new(store: Arc<dyn DocumentStore>, config: &Config) -> Self {
        let ledger = LedgerStore::new(Arc::clone(&store), config.merge_max_attempts);
        Self {
            meals: DomainService::new(Arc::clone(&store), ledger.clone()),
            workouts: DomainService::new(Arc::clone(&store), ledger.clone()),
            water: DomainService::new(store, ledger.clone()),
            ledger,
            water_goal: config.water_goal,
        }
    }

    /// Record `glasses` for the day against the configured goal.
    pub fn log_water(&self, user_id: &str, date: NaiveDate, glasses: u32) -> Result<TaskLedger> {
        self.water
            .save(user_id, date, &WaterLog::new(glasses, self.water_goal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Exercise, Macros, PlannedFood};
    use crate::error::LedgerError;
    use crate::storage::{
        ChangeCallback, Filter, LoroStore, OrderBy, SubscriptionId, Versioned, WriteOp,
    };
    use serde_json::{Map, Value};

    /// Delegates to an in-memory store but rejects writes to one collection.
    struct RejectingStore {
        inner: LoroStore,
        reject: &'static str,
    }

    impl RejectingStore {
        fn check(&self, collection: &str) -> Result<()> {
            if collection == self.reject {
                return Err(LedgerError::WriteFailure(format!("{} unavailable", collection)));
            }
            Ok(())
        }
    }

    impl DocumentStore for RejectingStore {
        fn get(&self, collection: &str, key: &str) -> Result<Option<Versioned<Value>>> {
            self.inner.get(collection, key)
        }

        fn set(&self, collection: &str, key: &str, doc: Value) -> Result<()> {
            self.check(collection)?;
            self.inner.set(collection, key, doc)
        }

        fn update(&self, collection: &str, key: &str, fields: Map<String, Value>) -> Result<()> {
            self.check(collection)?;
            self.inner.update(collection, key, fields)
        }

        fn delete(&self, collection: &str, key: &str) -> Result<bool> {
            self.check(collection)?;
            self.inner.delete(collection, key)
        }

        fn query(
            &self,
            collection: &str,
            filters: &[Filter],
            order: Option<&OrderBy>,
        ) -> Result<Vec<(String, Versioned<Value>)>> {
            self.inner.query(collection, filters, order)
        }

        fn commit(&self, ops: Vec<WriteOp>) -> Result<()> {
            for op in &ops {
                self.check(&op.collection)?;
            }
            self.inner.commit(ops)
        }

        fn subscribe(
            &self,
            collection: &str,
            filters: Vec<Filter>,
            callback: ChangeCallback,
        ) -> Result<SubscriptionId> {
            self.inner.subscribe(collection, filters, callback)
        }

        fn unsubscribe(&self, id: &str) -> bool {
            self.inner.unsubscribe(id)
        }

        fn version_hash(&self) -> String {
            self.inner.version_hash()
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn workout_with_exercises(day: NaiveDate) -> ScheduledWorkout {
        let mut workout = ScheduledWorkout::new("legs", day);
        workout.exercises.push(Exercise::new("Squat", 100.0, 5, 5));
        workout
    }

    #[test]
    fn test_save_writes_record_then_ledger() {
        let sync = ScheduleSync::new(Arc::new(LoroStore::in_memory()), &Config::default());
        let day = date("2025-03-04");

        let mut plan = MealPlan::new();
        plan.add_food("6pm", PlannedFood::new("Salmon", 150.0, "g", Macros::default()));
        sync.meals.save("ana", day, &plan).unwrap();
        sync.workouts.save("ana", day, &workout_with_exercises(day)).unwrap();
        sync.log_water("ana", day, 8).unwrap();

        let ledger = sync.ledger.load("ana", day).unwrap();
        assert_eq!(ledger.tasks, vec!["meal-6pm", "gym-workout", "water"]);
        assert_eq!(sync.meals.load("ana", day).unwrap(), Some(plan));
    }

    #[test]
    fn test_emptied_workout_clears_only_gym_tag() {
        let sync = ScheduleSync::new(Arc::new(LoroStore::in_memory()), &Config::default());
        let day = date("2025-03-04");
        sync.meals.adapter().add_task("ana", "meal-6pm", day).unwrap();

        let mut workout = workout_with_exercises(day);
        sync.workouts.save("ana", day, &workout).unwrap();
        workout.exercises.clear();
        let ledger = sync.workouts.save("ana", day, &workout).unwrap();

        assert_eq!(ledger.tasks, vec!["meal-6pm"]);
    }

    #[test]
    fn test_failed_record_write_leaves_ledger_untouched() {
        let store = Arc::new(RejectingStore {
            inner: LoroStore::in_memory(),
            reject: crate::records::WORKOUTS,
        });
        let sync = ScheduleSync::new(store, &Config::default());
        let day = date("2025-03-04");
        let workout = workout_with_exercises(day);

        let result = sync.workouts.save("ana", day, &workout);

        assert!(matches!(result, Err(LedgerError::WriteFailure(_))));
        assert!(!sync.ledger.load("ana", day).unwrap().contains("gym-workout"));
        // The caller still holds its unsaved workout
        assert_eq!(workout.exercises.len(), 1);
    }

    #[test]
    fn test_failed_ledger_write_is_surfaced() {
        let store = Arc::new(RejectingStore {
            inner: LoroStore::in_memory(),
            reject: crate::ledger::LEDGER_COLLECTION,
        });
        let sync = ScheduleSync::new(store, &Config::default());
        let day = date("2025-03-04");

        let result = sync.log_water("ana", day, 10);

        assert!(result.unwrap_err().is_retryable());
        assert!(sync.ledger.load("ana", day).unwrap().tasks.is_empty());
    }

    #[test]
    fn test_water_below_goal_removes_tag() {
        let sync = ScheduleSync::new(Arc::new(LoroStore::in_memory()), &Config::default());
        let day = date("2025-03-04");

        sync.log_water("ana", day, 8).unwrap();
        let ledger = sync.log_water("ana", day, 5).unwrap();

        assert!(!ledger.contains("water"));
        assert_eq!(sync.water.load("ana", day).unwrap(), Some(WaterLog::new(5, 8)));
    }
}
