//! Transient undo for row deletion in list editors.
//!
//! Only the most recent deletion can be undone, and only until its window
//! runs out. Nothing here is persisted; the edited list itself is saved
//! separately by the owning domain.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{LedgerError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum UndoState<T> {
    Idle,
    PendingUndo {
        item: T,
        index: usize,
        deadline: Instant,
    },
}

/// Undo state machine over a caller-owned list.
#[derive(Debug, Clone)]
pub struct EditBuffer<T> {
    state: UndoState<T>,
    window: Duration,
}

impl<T> EditBuffer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            state: UndoState::Idle,
            window,
        }
    }

    pub fn state(&self) -> &UndoState<T> {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, UndoState::PendingUndo { .. })
    }

    /// The pending item and the index it was removed from.
    pub fn pending(&self) -> Option<(&T, usize)> {
        match &self.state {
            UndoState::PendingUndo { item, index, .. } => Some((item, *index)),
            UndoState::Idle => None,
        }
    }

    /// Remove `list[index]` right away and hold it for undo.
    ///
    /// A deletion that was still pending becomes permanent; it is returned
    /// so the caller can tell.
    pub fn delete(&mut self, list: &mut Vec<T>, index: usize, now: Instant) -> Result<Option<T>> {
        if index >= list.len() {
            return Err(LedgerError::InvalidInput(format!(
                "index {} out of bounds for {} rows",
                index,
                list.len()
            )));
        }

        let item = list.remove(index);
        let previous = std::mem::replace(
            &mut self.state,
            UndoState::PendingUndo {
                item,
                index,
                deadline: now + self.window,
            },
        );
        debug!(index, "row deleted, undo pending");

        Ok(match previous {
            UndoState::PendingUndo { item, .. } => Some(item),
            UndoState::Idle => None,
        })
    }

    /// Put the pending item back at its original index.
    ///
    /// Returns `false` when there is nothing to undo or the window has
    /// passed, in which case the list is left as it is.
    pub fn undo(&mut self, list: &mut Vec<T>, now: Instant) -> bool {
        self.expire(now);
        match std::mem::replace(&mut self.state, UndoState::Idle) {
            UndoState::PendingUndo { item, index, .. } => {
                // Rows deleted permanently since may have shortened the list
                let at = index.min(list.len());
                list.insert(at, item);
                debug!(index = at, "row restored");
                true
            }
            UndoState::Idle => false,
        }
    }

    /// Make any pending deletion permanent right away.
    pub fn clear(&mut self) {
        if self.is_pending() {
            debug!("pending deletion committed");
        }
        self.state = UndoState::Idle;
    }

    /// Make the pending deletion permanent once its deadline has passed.
    pub fn expire(&mut self, now: Instant) -> bool {
        let due = matches!(self.state, UndoState::PendingUndo { deadline, .. } if now >= deadline);
        if due {
            self.state = UndoState::Idle;
            debug!("undo window expired");
        }
        due
    }
}

struct Shared<T> {
    items: Vec<T>,
    buffer: EditBuffer<T>,
}

/// A live list whose deletions expire on a tokio timer.
///
/// Must be used from within a tokio runtime.
pub struct TimedEditList<T> {
    shared: Arc<Mutex<Shared<T>>>,
    timer: Option<JoinHandle<()>>,
    window: Duration,
}

impl<T: Clone + Send + 'static> TimedEditList<T> {
    pub fn new(items: Vec<T>, window: Duration) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                items,
                buffer: EditBuffer::new(window),
            })),
            timer: None,
            window,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared<T>> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn items(&self) -> Vec<T> {
        self.lock().items.clone()
    }

    pub fn is_pending(&self) -> bool {
        self.lock().buffer.is_pending()
    }

    pub fn push(&mut self, item: T) {
        self.lock().items.push(item);
    }

    pub fn delete(&mut self, index: usize) -> Result<()> {
        {
            let mut guard = self.lock();
            let Shared { items, buffer } = &mut *guard;
            buffer.delete(items, index, Instant::now())?;
        }

        if let Some(old) = self.timer.take() {
            old.abort();
        }
        let shared = Arc::clone(&self.shared);
        let window = self.window;
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            shared
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .buffer
                .expire(Instant::now());
        }));
        Ok(())
    }

    pub fn undo(&mut self) -> bool {
        let restored = {
            let mut guard = self.lock();
            let Shared { items, buffer } = &mut *guard;
            buffer.undo(items, Instant::now())
        };
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        restored
    }

    /// The list as it should be saved.
    pub fn into_items(self) -> Vec<T> {
        if let Some(timer) = &self.timer {
            timer.abort();
        }
        self.items()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(5);

    fn rows() -> Vec<&'static str> {
        vec!["a", "b", "c", "d", "e"]
    }

    #[test]
    fn test_undo_restores_original_position() {
        let now = Instant::now();
        let mut list = rows();
        let mut buffer = EditBuffer::new(WINDOW);

        buffer.delete(&mut list, 2, now).unwrap();
        assert_eq!(list, vec!["a", "b", "d", "e"]);
        assert_eq!(buffer.pending(), Some((&"c", 2)));

        assert!(buffer.undo(&mut list, now + Duration::from_secs(1)));
        assert_eq!(list, rows());
        assert_eq!(buffer.state(), &UndoState::Idle);
    }

    #[test]
    fn test_undo_after_edits_to_other_rows() {
        let now = Instant::now();
        let mut list = rows();
        let mut buffer = EditBuffer::new(WINDOW);

        buffer.delete(&mut list, 1, now).unwrap();
        list[2] = "D";
        list.push("f");

        assert!(buffer.undo(&mut list, now));
        assert_eq!(list, vec!["a", "b", "c", "D", "e", "f"]);
    }

    #[test]
    fn test_undo_after_expiry_is_noop() {
        let now = Instant::now();
        let mut list = rows();
        let mut buffer = EditBuffer::new(WINDOW);

        buffer.delete(&mut list, 0, now).unwrap();
        assert!(!buffer.undo(&mut list, now + WINDOW));
        assert_eq!(list, vec!["b", "c", "d", "e"]);
        assert!(!buffer.is_pending());
        assert!(!buffer.undo(&mut list, now));
    }

    #[test]
    fn test_second_delete_replaces_pending() {
        let now = Instant::now();
        let mut list = rows();
        let mut buffer = EditBuffer::new(WINDOW);

        assert_eq!(buffer.delete(&mut list, 4, now).unwrap(), None);
        assert_eq!(buffer.delete(&mut list, 0, now).unwrap(), Some("e"));

        assert!(buffer.undo(&mut list, now));
        assert_eq!(list, vec!["a", "b", "c", "d"]);
        // Only one deletion was undoable
        assert!(!buffer.undo(&mut list, now));
    }

    #[test]
    fn test_restore_index_clamps_to_length() {
        let now = Instant::now();
        let mut list = rows();
        let mut buffer = EditBuffer::new(WINDOW);

        buffer.delete(&mut list, 4, now).unwrap();
        list.truncate(2);

        assert!(buffer.undo(&mut list, now));
        assert_eq!(list, vec!["a", "b", "e"]);
    }

    #[test]
    fn test_delete_out_of_bounds() {
        let mut list = rows();
        let mut buffer = EditBuffer::new(WINDOW);
        let result = buffer.delete(&mut list, 5, Instant::now());
        assert!(matches!(result, Err(LedgerError::InvalidInput(_))));
        assert_eq!(list.len(), 5);
        assert!(!buffer.is_pending());
    }

    #[test]
    fn test_expire_only_after_deadline() {
        let now = Instant::now();
        let mut list = rows();
        let mut buffer = EditBuffer::new(WINDOW);
        buffer.delete(&mut list, 0, now).unwrap();

        assert!(!buffer.expire(now + Duration::from_secs(4)));
        assert!(buffer.is_pending());
        assert!(buffer.expire(now + WINDOW));
        assert!(!buffer.is_pending());
    }

    #[test]
    fn test_clear_commits_pending_deletion() {
        let now = Instant::now();
        let mut list = rows();
        let mut buffer = EditBuffer::new(WINDOW);
        buffer.delete(&mut list, 1, now).unwrap();

        buffer.clear();
        assert!(!buffer.is_pending());
        assert!(!buffer.undo(&mut list, now));
        assert_eq!(list, vec!["a", "c", "d", "e"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_makes_deletion_permanent() {
        let mut list = TimedEditList::new(rows(), WINDOW);

        list.delete(2).unwrap();
        assert!(list.is_pending());

        tokio::time::sleep(WINDOW + Duration::from_millis(1)).await;
        assert!(!list.is_pending());
        assert!(!list.undo());
        assert_eq!(list.items(), vec!["a", "b", "d", "e"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_undo_within_window() {
        let mut list = TimedEditList::new(rows(), WINDOW);

        list.delete(2).unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(list.undo());
        assert_eq!(list.items(), rows());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_delete_restarts_window() {
        let mut list = TimedEditList::new(rows(), WINDOW);

        list.delete(0).unwrap();
        tokio::time::sleep(Duration::from_secs(4)).await;
        list.delete(0).unwrap();
        tokio::time::sleep(Duration::from_secs(4)).await;

        // The first timer was aborted and cannot clear the second deletion
        assert!(list.is_pending());
        assert!(list.undo());
        list.push("f");
        assert_eq!(list.into_items(), vec!["b", "c", "d", "e", "f"]);
    }
}
