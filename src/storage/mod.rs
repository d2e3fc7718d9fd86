//! Document store abstraction shared by the ledger, the detailed records
//! and the template store.
//!
//! Documents are JSON values grouped into named collections. Every stored
//! document carries a version that increments on each write, which is what
//! [`run_transaction`] uses to detect that a document changed between a read
//! and the write that depends on it.

mod loro_store;
mod subscriptions;

pub use loro_store::{LoroStore, DATA_DIR};
pub use subscriptions::{ChangeCallback, DocumentChange, SubscriptionId, SubscriptionState};

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{LedgerError, Result};

/// A document together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gte,
    Lte,
}

/// Field predicate for [`DocumentStore::query`] and subscriptions.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn gte(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: FilterOp::Gte,
            value: value.into(),
        }
    }

    pub fn lte(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: FilterOp::Lte,
            value: value.into(),
        }
    }

    pub fn matches(&self, doc: &Value) -> bool {
        let Some(actual) = doc.get(&self.field) else {
            return false;
        };
        match self.op {
            FilterOp::Eq => actual == &self.value,
            FilterOp::Gte => matches!(
                compare_values(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOp::Lte => matches!(
                compare_values(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            descending: false,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            descending: true,
        }
    }
}

/// Condition a document must satisfy for a committed write to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    Any,
    Absent,
    Version(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteAction {
    Put(Value),
    Delete,
    /// Only verify the precondition.
    Check,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteOp {
    pub collection: String,
    pub key: String,
    pub precondition: Precondition,
    pub action: WriteAction,
}

/// The external datastore: keyed JSON documents grouped into collections.
///
/// Single-document calls are atomic. [`DocumentStore::commit`] applies a
/// batch atomically: either every precondition holds and every write lands,
/// or nothing changes and [`LedgerError::StaleWrite`] names the first
/// document whose precondition failed.
pub trait DocumentStore: Send + Sync {
    fn get(&self, collection: &str, key: &str) -> Result<Option<Versioned<Value>>>;

    /// Full overwrite.
    fn set(&self, collection: &str, key: &str, doc: Value) -> Result<()>;

    /// Shallow field patch of an existing object document.
    fn update(&self, collection: &str, key: &str, fields: Map<String, Value>) -> Result<()>;

    fn delete(&self, collection: &str, key: &str) -> Result<bool>;

    fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        order: Option<&OrderBy>,
    ) -> Result<Vec<(String, Versioned<Value>)>>;

    fn commit(&self, ops: Vec<WriteOp>) -> Result<()>;

    fn subscribe(
        &self,
        collection: &str,
        filters: Vec<Filter>,
        callback: ChangeCallback,
    ) -> Result<SubscriptionId>;

    fn unsubscribe(&self, id: &str) -> bool;

    /// Identifies the current state of the whole store.
    fn version_hash(&self) -> String;
}

/// Buffered reads and writes of one [`run_transaction`] attempt.
pub struct Transaction<'a, S: ?Sized> {
    store: &'a S,
    reads: HashMap<(String, String), Precondition>,
    writes: Vec<(String, String, WriteAction)>,
}

impl<'a, S: DocumentStore + ?Sized> Transaction<'a, S> {
    fn new(store: &'a S) -> Self {
        Self {
            store,
            reads: HashMap::new(),
            writes: Vec::new(),
        }
    }

    /// Read a document, remembering its version for the commit.
    pub fn get(&mut self, collection: &str, key: &str) -> Result<Option<Value>> {
        if let Some((_, _, action)) = self
            .writes
            .iter()
            .rev()
            .find(|(c, k, _)| c == collection && k == key)
        {
            return Ok(match action {
                WriteAction::Put(doc) => Some(doc.clone()),
                _ => None,
            });
        }

        let found = self.store.get(collection, key)?;
        let precondition = match &found {
            Some(doc) => Precondition::Version(doc.version),
            None => Precondition::Absent,
        };
        self.reads
            .entry((collection.to_string(), key.to_string()))
            .or_insert(precondition);
        Ok(found.map(|doc| doc.value))
    }

    pub fn set(&mut self, collection: &str, key: &str, doc: Value) {
        self.writes
            .push((collection.to_string(), key.to_string(), WriteAction::Put(doc)));
    }

    pub fn delete(&mut self, collection: &str, key: &str) {
        self.writes
            .push((collection.to_string(), key.to_string(), WriteAction::Delete));
    }

    fn into_ops(mut self) -> Vec<WriteOp> {
        let mut ops = Vec::new();
        let mut written: Vec<(String, String)> = Vec::new();

        for (collection, key, action) in self.writes.into_iter().rev() {
            if written.iter().any(|(c, k)| c == &collection && k == &key) {
                continue;
            }
            let precondition = self
                .reads
                .remove(&(collection.clone(), key.clone()))
                .unwrap_or(Precondition::Any);
            written.push((collection.clone(), key.clone()));
            ops.push(WriteOp {
                collection,
                key,
                precondition,
                action,
            });
        }
        ops.reverse();

        for ((collection, key), precondition) in self.reads {
            ops.push(WriteOp {
                collection,
                key,
                precondition,
                action: WriteAction::Check,
            });
        }
        ops
    }
}

/// Run `body` as an optimistic transaction.
///
/// Every document read through the transaction must still be at the same
/// version when the buffered writes commit. When another writer got there
/// first the body runs again against fresh reads, up to `max_attempts`
/// times, after which [`LedgerError::ConflictRetry`] is returned.
pub fn run_transaction<S, T, F>(store: &S, max_attempts: u32, mut body: F) -> Result<T>
where
    S: DocumentStore + ?Sized,
    F: FnMut(&mut Transaction<'_, S>) -> Result<T>,
{
    let attempts = max_attempts.max(1);
    let mut last_conflict = (String::new(), String::new());

    for attempt in 1..=attempts {
        let mut txn = Transaction::new(store);
        let output = body(&mut txn)?;
        let ops = txn.into_ops();

        match store.commit(ops) {
            Ok(()) => {
                debug!(attempt, "transaction committed");
                return Ok(output);
            }
            Err(LedgerError::StaleWrite { collection, key }) => {
                warn!(attempt, %collection, %key, "transaction conflict, retrying");
                last_conflict = (collection, key);
            }
            Err(e) => return Err(e),
        }
    }

    Err(LedgerError::ConflictRetry {
        collection: last_conflict.0,
        key: last_conflict.1,
        attempts,
    })
}

/// Ordering used by filters and `query` sorting. Values of different JSON
/// kinds are incomparable.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}
