use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::{Filter, Versioned};

/// Subscription identifier type.
pub type SubscriptionId = String;

/// Callback invoked after a matching document changes.
pub type ChangeCallback = Arc<dyn Fn(&DocumentChange) + Send + Sync>;

/// A committed change. `document` is `None` when the document was deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange {
    pub collection: String,
    pub key: String,
    pub document: Option<Versioned<Value>>,
}

struct Subscriber {
    id: SubscriptionId,
    filters: Vec<Filter>,
    callback: ChangeCallback,
}

/// Manages live-query subscriptions per collection.
#[derive(Default)]
pub struct SubscriptionState {
    by_collection: HashMap<String, Vec<Subscriber>>,
    next_id: u64,
}

impl SubscriptionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &mut self,
        collection: &str,
        filters: Vec<Filter>,
        callback: ChangeCallback,
    ) -> SubscriptionId {
        let id = format!("sub_{}", self.next_id);
        self.next_id += 1;
        self.by_collection
            .entry(collection.to_string())
            .or_default()
            .push(Subscriber {
                id: id.clone(),
                filters,
                callback,
            });
        id
    }

    /// Remove a subscription by ID.
    pub fn unsubscribe(&mut self, id: &str) -> bool {
        for subs in self.by_collection.values_mut() {
            if let Some(pos) = subs.iter().position(|s| s.id == id) {
                subs.remove(pos);
                return true;
            }
        }
        false
    }

    /// Callbacks interested in `change`.
    ///
    /// A deletion is delivered to every subscriber of the collection since
    /// there is no document left to filter on.
    pub fn callbacks_for(&self, change: &DocumentChange) -> Vec<ChangeCallback> {
        let Some(subs) = self.by_collection.get(&change.collection) else {
            return Vec::new();
        };
        subs.iter()
            .filter(|s| match &change.document {
                Some(doc) => s.filters.iter().all(|f| f.matches(&doc.value)),
                None => true,
            })
            .map(|s| Arc::clone(&s.callback))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_collection.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop() -> ChangeCallback {
        Arc::new(|_| {})
    }

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let mut state = SubscriptionState::new();
        let a = state.subscribe("foods", vec![], noop());
        let b = state.subscribe("foods", vec![], noop());
        assert_ne!(a, b);
        assert_eq!(state.len(), 2);

        assert!(state.unsubscribe(&a));
        assert!(!state.unsubscribe(&a));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_callbacks_respect_filters() {
        let mut state = SubscriptionState::new();
        state.subscribe("foods", vec![Filter::eq("category", "fruit")], noop());
        state.subscribe("foods", vec![], noop());
        state.subscribe("other", vec![], noop());

        let change = DocumentChange {
            collection: "foods".to_string(),
            key: "banana".to_string(),
            document: Some(Versioned {
                version: 1,
                value: json!({"category": "grain"}),
            }),
        };
        assert_eq!(state.callbacks_for(&change).len(), 1);

        let deleted = DocumentChange {
            document: None,
            ..change
        };
        assert_eq!(state.callbacks_for(&deleted).len(), 2);
    }
}
