//! The per-day task ledger read by the calendar and analytics.
//!
//! A ledger document holds the ordered tag list for one user and date.
//! Every domain writes into the same document, so all writes go through
//! [`LedgerStore::merge`], which replaces only the writing domain's tags
//! inside an optimistic transaction.

mod adapter;
pub mod merge;
mod ownership;

pub use adapter::DomainWriteAdapter;
pub use ownership::Domain;

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LedgerError, Result};
use crate::storage::{run_transaction, DocumentStore, Filter, OrderBy};

pub const LEDGER_COLLECTION: &str = "ledger";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskLedger {
    pub user_id: String,
    pub date: NaiveDate,
    pub tasks: Vec<String>,
}

impl TaskLedger {
    pub fn empty(user_id: &str, date: NaiveDate) -> Self {
        Self {
            user_id: user_id.to_string(),
            date,
            tasks: Vec::new(),
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tasks.iter().any(|t| t == tag)
    }

    /// Tags owned by `domain`, in ledger order.
    pub fn owned_by(&self, domain: Domain) -> Vec<String> {
        merge::owned_by(domain, &self.tasks)
    }
}

/// Key for documents addressed by user and day.
pub fn dated_key(user_id: &str, date: NaiveDate) -> Result<String> {
    if user_id.is_empty() || user_id.contains(':') {
        return Err(LedgerError::InvalidInput(format!(
            "user id '{}' must be non-empty and contain no ':'",
            user_id
        )));
    }
    Ok(format!("{}:{}", user_id, date.format("%Y-%m-%d")))
}

/// Reads and merge-writes ledger documents.
#[derive(Clone)]
pub struct LedgerStore {
    store: Arc<dyn DocumentStore>,
    max_attempts: u32,
}

impl LedgerStore {
    pub fn new(store: Arc<dyn DocumentStore>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts,
        }
    }

    /// The ledger for a day; a day never written is an empty ledger.
    pub fn load(&self, user_id: &str, date: NaiveDate) -> Result<TaskLedger> {
        let key = dated_key(user_id, date)?;
        match self.store.get(LEDGER_COLLECTION, &key)? {
            Some(doc) => Ok(serde_json::from_value(doc.value)?),
            None => Ok(TaskLedger::empty(user_id, date)),
        }
    }

    /// Stored ledgers for `from..=to`, oldest first. Days never written
    /// are omitted.
    pub fn range(&self, user_id: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<TaskLedger>> {
        let filters = [
            Filter::eq("user_id", user_id),
            Filter::gte("date", from.to_string()),
            Filter::lte("date", to.to_string()),
        ];
        self.store
            .query(LEDGER_COLLECTION, &filters, Some(&OrderBy::asc("date")))?
            .into_iter()
            .map(|(_, doc)| Ok(serde_json::from_value(doc.value)?))
            .collect()
    }

    /// Every stored ledger of a user, oldest first.
    pub fn all_for_user(&self, user_id: &str) -> Result<Vec<TaskLedger>> {
        self.store
            .query(
                LEDGER_COLLECTION,
                &[Filter::eq("user_id", user_id)],
                Some(&OrderBy::asc("date")),
            )?
            .into_iter()
            .map(|(_, doc)| Ok(serde_json::from_value(doc.value)?))
            .collect()
    }

    /// Every stored ledger of every user.
    pub fn all(&self) -> Result<Vec<TaskLedger>> {
        self.store
            .query(LEDGER_COLLECTION, &[], Some(&OrderBy::asc("date")))?
            .into_iter()
            .map(|(_, doc)| Ok(serde_json::from_value(doc.value)?))
            .collect()
    }

    pub fn version_hash(&self) -> String {
        self.store.version_hash()
    }

    /// Replace `domain`'s tags for a day with `desired(current_owned)`.
    ///
    /// The read, the partition and the write run as one transaction, so a
    /// concurrent write by another domain to the same day is re-read and
    /// preserved instead of being overwritten.
    pub fn merge<F>(&self, domain: Domain, user_id: &str, date: NaiveDate, desired: F) -> Result<TaskLedger>
    where
        F: Fn(&[String]) -> Vec<String>,
    {
        let key = dated_key(user_id, date)?;

        run_transaction(self.store.as_ref(), self.max_attempts, |txn| {
            let current = match txn.get(LEDGER_COLLECTION, &key)? {
                Some(doc) => serde_json::from_value::<TaskLedger>(doc)?.tasks,
                None => Vec::new(),
            };
            let wanted = desired(&merge::owned_by(domain, &current));
            let tasks = merge::merge_owned(domain, &current, &wanted)?;

            let ledger = TaskLedger {
                user_id: user_id.to_string(),
                date,
                tasks,
            };
            if ledger.tasks != current {
                txn.set(LEDGER_COLLECTION, &key, serde_json::to_value(&ledger)?);
            }
            debug!(%domain, %key, tasks = ?ledger.tasks, "ledger merged");
            Ok(ledger)
        })
    }
}
