use chrono::NaiveDate;
use tracing::info;

use super::merge::check_ownership;
use super::{Domain, LedgerStore, TaskLedger};
use crate::error::Result;

/// A domain's write access to the ledger.
///
/// Every entry point validates that the tags belong to the adapter's
/// domain before touching the store, then merges through
/// [`LedgerStore::merge`].
#[derive(Clone)]
pub struct DomainWriteAdapter {
    domain: Domain,
    ledger: LedgerStore,
}

impl DomainWriteAdapter {
    pub fn new(domain: Domain, ledger: LedgerStore) -> Self {
        Self { domain, ledger }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// Add one owned tag, keeping the domain's other tags.
    pub fn add_task(&self, user_id: &str, tag: &str, date: NaiveDate) -> Result<TaskLedger> {
        check_ownership(self.domain, &[tag.to_string()])?;
        let ledger = self.ledger.merge(self.domain, user_id, date, |owned| {
            let mut desired = owned.to_vec();
            if !desired.iter().any(|t| t == tag) {
                desired.push(tag.to_string());
            }
            desired
        })?;
        info!(domain = %self.domain, user_id, %date, tag, "task added");
        Ok(ledger)
    }

    /// Remove one owned tag, keeping the domain's other tags.
    pub fn remove_task(&self, user_id: &str, tag: &str, date: NaiveDate) -> Result<TaskLedger> {
        check_ownership(self.domain, &[tag.to_string()])?;
        let ledger = self.ledger.merge(self.domain, user_id, date, |owned| {
            owned.iter().filter(|t| *t != tag).cloned().collect()
        })?;
        info!(domain = %self.domain, user_id, %date, tag, "task removed");
        Ok(ledger)
    }

    /// Make `tags` the domain's complete contribution for the day.
    pub fn replace_owned_set(&self, user_id: &str, date: NaiveDate, tags: &[String]) -> Result<TaskLedger> {
        check_ownership(self.domain, tags)?;
        let ledger = self
            .ledger
            .merge(self.domain, user_id, date, |_| tags.to_vec())?;
        info!(domain = %self.domain, user_id, %date, tags = ?tags, "owned tags replaced");
        Ok(ledger)
    }
}
