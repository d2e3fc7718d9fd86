use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use loro::{LoroDoc, LoroValue, ValueOrContainer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error};

use super::{
    compare_values, ChangeCallback, DocumentChange, DocumentStore, Filter, OrderBy,
    Precondition, SubscriptionId, SubscriptionState, Versioned, WriteAction, WriteOp,
};
use crate::error::{LedgerError, Result};

pub const DATA_DIR: &str = ".dayledger";
const LORO_DB: &str = "loro.db";

/// On-disk shape of one document inside a collection map.
#[derive(Serialize, Deserialize)]
struct StoredDocument {
    version: u64,
    body: Value,
}

/// Document store backed by a single Loro document.
///
/// Each collection is a root `LoroMap` whose entries hold the JSON encoded
/// [`StoredDocument`]. When opened from disk every successful write is
/// exported as a snapshot to `.dayledger/loro.db`; a failed export rolls the
/// in-memory document back to the last durable snapshot.
pub struct LoroStore {
    doc: Mutex<LoroDoc>,
    path: Option<PathBuf>,
    subscriptions: Mutex<SubscriptionState>,
}

impl LoroStore {
    /// Initialize a new dayledger project
    pub fn init(root: &Path) -> Result<Self> {
        let data_dir = root.join(DATA_DIR);

        if data_dir.exists() {
            return Err(LedgerError::AlreadyInitialized);
        }

        fs::create_dir_all(&data_dir)?;

        let store = Self {
            doc: Mutex::new(LoroDoc::new()),
            path: Some(data_dir.join(LORO_DB)),
            subscriptions: Mutex::new(SubscriptionState::new()),
        };
        store.save()?;

        Ok(store)
    }

    /// Open an existing dayledger project
    pub fn open(root: &Path) -> Result<Self> {
        let path = root.join(DATA_DIR).join(LORO_DB);

        if !path.exists() {
            return Err(LedgerError::NotInitialized);
        }

        let doc = load_doc(&path)?;
        Ok(Self {
            doc: Mutex::new(doc),
            path: Some(path),
            subscriptions: Mutex::new(SubscriptionState::new()),
        })
    }

    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            doc: Mutex::new(LoroDoc::new()),
            path: None,
            subscriptions: Mutex::new(SubscriptionState::new()),
        }
    }

    /// The `.dayledger` directory, if this store is file backed.
    pub fn data_dir(&self) -> Option<&Path> {
        self.path.as_deref().and_then(Path::parent)
    }

    /// Write the current document to disk
    pub fn save(&self) -> Result<()> {
        let mut doc = self.lock_doc();
        self.persist(&mut doc)
    }

    fn lock_doc(&self) -> MutexGuard<'_, LoroDoc> {
        self.doc.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_subscriptions(&self) -> MutexGuard<'_, SubscriptionState> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, doc: &mut LoroDoc) -> Result<()> {
        doc.commit();
        let Some(path) = &self.path else {
            return Ok(());
        };

        let bytes = doc.export(loro::ExportMode::Snapshot)?;
        let tmp = path.with_extension("db.tmp");
        if let Err(e) = fs::write(&tmp, bytes).and_then(|_| fs::rename(&tmp, path)) {
            error!(path = %path.display(), error = %e, "snapshot write failed, reloading");
            *doc = load_doc(path)?;
            return Err(LedgerError::WriteFailure(format!(
                "could not write {}: {}",
                path.display(),
                e
            )));
        }
        Ok(())
    }

    fn notify(&self, changes: Vec<DocumentChange>) {
        for change in changes {
            // Collected first so callbacks may call back into the store
            let callbacks = self.lock_subscriptions().callbacks_for(&change);
            for callback in callbacks {
                callback(&change);
            }
        }
    }
}

impl DocumentStore for LoroStore {
    fn get(&self, collection: &str, key: &str) -> Result<Option<Versioned<Value>>> {
        let doc = self.lock_doc();
        Ok(read_entry(&doc, collection, key)?.map(|stored| Versioned {
            version: stored.version,
            value: stored.body,
        }))
    }

    fn set(&self, collection: &str, key: &str, doc: Value) -> Result<()> {
        self.commit(vec![WriteOp {
            collection: collection.to_string(),
            key: key.to_string(),
            precondition: Precondition::Any,
            action: WriteAction::Put(doc),
        }])
    }

    fn update(&self, collection: &str, key: &str, fields: Map<String, Value>) -> Result<()> {
        let change = {
            let mut doc = self.lock_doc();
            let mut stored = read_entry(&doc, collection, key)?
                .ok_or_else(|| LedgerError::NotFound(format!("{}/{}", collection, key)))?;

            let Value::Object(body) = &mut stored.body else {
                return Err(LedgerError::InvalidInput(format!(
                    "{}/{} is not an object document",
                    collection, key
                )));
            };
            for (field, value) in fields {
                body.insert(field, value);
            }
            stored.version += 1;

            write_entry(&doc, collection, key, &stored)?;
            self.persist(&mut doc)?;
            debug!(collection, key, version = stored.version, "document patched");

            DocumentChange {
                collection: collection.to_string(),
                key: key.to_string(),
                document: Some(Versioned {
                    version: stored.version,
                    value: stored.body,
                }),
            }
        };
        self.notify(vec![change]);
        Ok(())
    }

    fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        {
            let mut doc = self.lock_doc();
            if read_entry(&doc, collection, key)?.is_none() {
                return Ok(false);
            }
            doc.get_map(collection).delete(key)?;
            self.persist(&mut doc)?;
        }
        self.notify(vec![DocumentChange {
            collection: collection.to_string(),
            key: key.to_string(),
            document: None,
        }]);
        Ok(true)
    }

    fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        order: Option<&OrderBy>,
    ) -> Result<Vec<(String, Versioned<Value>)>> {
        let deep = self.lock_doc().get_map(collection).get_deep_value();
        let mut results = Vec::new();

        if let LoroValue::Map(map) = deep {
            for (key, entry) in map.iter() {
                let LoroValue::String(s) = entry else {
                    continue;
                };
                let stored: StoredDocument = serde_json::from_str(&s.to_string())?;
                if filters.iter().all(|f| f.matches(&stored.body)) {
                    results.push((
                        key.to_string(),
                        Versioned {
                            version: stored.version,
                            value: stored.body,
                        },
                    ));
                }
            }
        }

        results.sort_by(|(ka, a), (kb, b)| {
            let primary = order
                .map(|o| {
                    let ord = match (a.value.get(&o.field), b.value.get(&o.field)) {
                        (Some(x), Some(y)) => compare_values(x, y).unwrap_or(std::cmp::Ordering::Equal),
                        (Some(_), None) => std::cmp::Ordering::Less,
                        (None, Some(_)) => std::cmp::Ordering::Greater,
                        (None, None) => std::cmp::Ordering::Equal,
                    };
                    if o.descending {
                        ord.reverse()
                    } else {
                        ord
                    }
                })
                .unwrap_or(std::cmp::Ordering::Equal);
            primary.then_with(|| ka.cmp(kb))
        });

        Ok(results)
    }

    fn commit(&self, ops: Vec<WriteOp>) -> Result<()> {
        let changes = {
            let mut doc = self.lock_doc();

            for op in &ops {
                let current = read_entry(&doc, &op.collection, &op.key)?;
                let holds = match (op.precondition, &current) {
                    (Precondition::Any, _) => true,
                    (Precondition::Absent, None) => true,
                    (Precondition::Version(expected), Some(stored)) => stored.version == expected,
                    _ => false,
                };
                if !holds {
                    return Err(LedgerError::StaleWrite {
                        collection: op.collection.clone(),
                        key: op.key.clone(),
                    });
                }
            }

            let mut changes = Vec::new();
            for op in ops {
                match op.action {
                    WriteAction::Check => {}
                    WriteAction::Put(body) => {
                        let version = read_entry(&doc, &op.collection, &op.key)?
                            .map_or(1, |stored| stored.version + 1);
                        let stored = StoredDocument { version, body };
                        write_entry(&doc, &op.collection, &op.key, &stored)?;
                        changes.push(DocumentChange {
                            collection: op.collection,
                            key: op.key,
                            document: Some(Versioned {
                                version,
                                value: stored.body,
                            }),
                        });
                    }
                    WriteAction::Delete => {
                        if read_entry(&doc, &op.collection, &op.key)?.is_some() {
                            doc.get_map(op.collection.as_str()).delete(&op.key)?;
                            changes.push(DocumentChange {
                                collection: op.collection,
                                key: op.key,
                                document: None,
                            });
                        }
                    }
                }
            }

            if !changes.is_empty() {
                self.persist(&mut doc)?;
            }
            changes
        };

        self.notify(changes);
        Ok(())
    }

    fn subscribe(
        &self,
        collection: &str,
        filters: Vec<Filter>,
        callback: ChangeCallback,
    ) -> Result<SubscriptionId> {
        Ok(self
            .lock_subscriptions()
            .subscribe(collection, filters, callback))
    }

    fn unsubscribe(&self, id: &str) -> bool {
        self.lock_subscriptions().unsubscribe(id)
    }

    fn version_hash(&self) -> String {
        // The oplog version vector changes on every committed write
        let vv = self.lock_doc().oplog_vv();
        format!("{:?}", vv)
    }
}

fn load_doc(path: &Path) -> Result<LoroDoc> {
    let bytes = fs::read(path)?;
    let doc = LoroDoc::new();
    doc.import(&bytes)?;
    Ok(doc)
}

fn read_entry(doc: &LoroDoc, collection: &str, key: &str) -> Result<Option<StoredDocument>> {
    match doc.get_map(collection).get(key) {
        Some(ValueOrContainer::Value(LoroValue::String(s))) => {
            Ok(Some(serde_json::from_str(&s.to_string())?))
        }
        Some(_) => Err(LedgerError::Storage(format!(
            "unexpected entry shape at {}/{}",
            collection, key
        ))),
        None => Ok(None),
    }
}

fn write_entry(doc: &LoroDoc, collection: &str, key: &str, stored: &StoredDocument) -> Result<()> {
    let encoded = serde_json::to_string(stored)?;
    doc.get_map(collection).insert(key, encoded)?;
    Ok(())
}
