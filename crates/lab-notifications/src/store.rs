//! The notification store.
//!
//! [`NotificationStore`] owns the ordered collection of live notifications
//! and the change signal. It is an explicitly constructed handle: the
//! application root creates one, clones it into the components that need
//! it, and long-lived async collaborators keep a [`WeakNotificationStore`]
//! so a late delivery after teardown becomes a no-op.
//!
//! Every mutating call updates the record collection first and only then
//! emits, with the internal lock released, so handlers always observe the
//! post-mutation state and may call back into the store.

use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use log::debug;

use crate::notification::{
    AutoClose, Notification, NotificationId, NotificationOptions, NotificationType,
    NotificationUpdate,
};
use crate::signal::{self, ChangeHandler, ChangeKind, NotificationChange, Subscribers, Subscription};

#[derive(Default)]
struct StoreState {
    /// Live records in insertion order.
    records: Vec<Notification>,
    subscribers: Subscribers,
    disposed: bool,
}

struct Inner {
    state: Mutex<StoreState>,
}

/// Shared handle to a notification store.
#[derive(Clone)]
pub struct NotificationStore {
    inner: Arc<Inner>,
}

/// Non-owning handle to a notification store.
#[derive(Clone)]
pub struct WeakNotificationStore {
    inner: Weak<Inner>,
}

impl WeakNotificationStore {
    /// Get a strong handle if the store is still alive and not disposed.
    pub fn upgrade(&self) -> Option<NotificationStore> {
        self.inner
            .upgrade()
            .map(|inner| NotificationStore { inner })
            .filter(|store| !store.is_disposed())
    }
}

/// Messages shown by [`NotificationStore::promise`].
#[derive(Debug, Clone)]
pub struct PromiseMessages {
    pub pending: String,
    pub success: String,
    pub error: String,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(StoreState::default()),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // Handlers never run under the lock, so a poisoned lock only means a
        // panic inside a store method itself; the records are still coherent.
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn downgrade(&self) -> WeakNotificationStore {
        WeakNotificationStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Add a notification and return its new id.
    ///
    /// On a disposed store nothing is recorded or emitted; the returned id
    /// is never live.
    pub fn notify(
        &self,
        message: impl Into<String>,
        kind: NotificationType,
        options: NotificationOptions,
    ) -> NotificationId {
        let id = NotificationId::new();
        let record = Notification::new(id.clone(), message.into(), kind, options);
        {
            let mut state = self.lock();
            if state.disposed {
                debug!("[store] Ignoring notify on disposed store");
                return id;
            }
            state.records.push(record.clone());
        }
        self.emit(ChangeKind::Added, record);
        id
    }

    pub fn info(&self, message: impl Into<String>, options: NotificationOptions) -> NotificationId {
        self.notify(message, NotificationType::Info, options)
    }

    pub fn success(
        &self,
        message: impl Into<String>,
        options: NotificationOptions,
    ) -> NotificationId {
        self.notify(message, NotificationType::Success, options)
    }

    pub fn warning(
        &self,
        message: impl Into<String>,
        options: NotificationOptions,
    ) -> NotificationId {
        self.notify(message, NotificationType::Warning, options)
    }

    pub fn error(&self, message: impl Into<String>, options: NotificationOptions) -> NotificationId {
        self.notify(message, NotificationType::Error, options)
    }

    /// Update the record `id`, creating it when it does not exist.
    ///
    /// An existing record emits [`ChangeKind::Updated`]; a created one
    /// emits [`ChangeKind::Added`] with the caller's id, an empty message
    /// unless given, and the default type unless given.
    pub fn update(&self, id: impl Into<NotificationId>, patch: NotificationUpdate) -> NotificationId {
        let id = id.into();
        let (kind, record) = {
            let mut state = self.lock();
            if state.disposed {
                debug!("[store] Ignoring update of {} on disposed store", id);
                return id;
            }
            match state.records.iter_mut().find(|n| n.id == id) {
                Some(existing) => {
                    patch.apply_to(existing);
                    (ChangeKind::Updated, existing.clone())
                }
                None => {
                    let created = patch.into_notification(id.clone());
                    state.records.push(created.clone());
                    (ChangeKind::Added, created)
                }
            }
        };
        self.emit(kind, record);
        id
    }

    /// Update the record `id` only if it is live. Returns `None` otherwise.
    pub fn update_existing(
        &self,
        id: &NotificationId,
        patch: NotificationUpdate,
    ) -> Option<NotificationId> {
        let record = {
            let mut state = self.lock();
            if state.disposed {
                return None;
            }
            let existing = state.records.iter_mut().find(|n| &n.id == id)?;
            patch.apply_to(existing);
            existing.clone()
        };
        self.emit(ChangeKind::Updated, record);
        Some(id.clone())
    }

    /// Remove the record `id`. Returns whether a record was removed; an
    /// unknown id emits nothing.
    pub fn dismiss(&self, id: &NotificationId) -> bool {
        let removed = {
            let mut state = self.lock();
            match state.records.iter().position(|n| &n.id == id) {
                Some(index) => state.records.remove(index),
                None => return false,
            }
        };
        self.emit(ChangeKind::Removed, removed);
        true
    }

    /// Remove every record, emitting one removal per record in insertion
    /// order. Returns the number of records removed.
    pub fn dismiss_all(&self) -> usize {
        let removed = std::mem::take(&mut self.lock().records);
        let count = removed.len();
        for record in removed {
            self.emit(ChangeKind::Removed, record);
        }
        count
    }

    /// Number of live records.
    pub fn count(&self) -> usize {
        self.lock().records.len()
    }

    /// Snapshot of the live records in insertion order.
    pub fn notifications(&self) -> Vec<Notification> {
        self.lock().records.clone()
    }

    pub fn get(&self, id: &NotificationId) -> Option<Notification> {
        self.lock().records.iter().find(|n| &n.id == id).cloned()
    }

    pub fn contains(&self, id: &NotificationId) -> bool {
        self.lock().records.iter().any(|n| &n.id == id)
    }

    /// Connect a handler to the change signal.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&NotificationStore, &NotificationChange) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handler: ChangeHandler = Arc::new(handler);
        self.lock().subscribers.connect(handler)
    }

    /// Disconnect a handler. Returns whether it was still connected.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.lock().subscribers.disconnect(subscription)
    }

    /// Track a fallible future with an in-progress notification that turns
    /// into a success or error notification once the future resolves.
    pub async fn promise<F, T, E>(&self, future: F, messages: PromiseMessages) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        let id = self.notify(
            messages.pending,
            NotificationType::InProgress,
            NotificationOptions::new().with_auto_close(AutoClose::Never),
        );
        let result = future.await;
        let patch = match &result {
            Ok(_) => NotificationUpdate::new()
                .with_message(messages.success)
                .with_kind(NotificationType::Success),
            Err(e) => {
                debug!("[store] Tracked task for {} failed: {}", id, e);
                NotificationUpdate::new()
                    .with_message(messages.error)
                    .with_kind(NotificationType::Error)
            }
        };
        self.update_existing(&id, patch.with_options(NotificationOptions::default()));
        result
    }

    /// Drop all records and handlers without emitting. Every later mutation
    /// is a no-op.
    pub fn dispose(&self) {
        let mut state = self.lock();
        if state.disposed {
            return;
        }
        state.disposed = true;
        state.records.clear();
        state.subscribers.clear();
        debug!("[store] Disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    fn emit(&self, kind: ChangeKind, notification: Notification) {
        let handlers = self.lock().subscribers.snapshot();
        if handlers.is_empty() {
            return;
        }
        let change = NotificationChange { kind, notification };
        for (subscription, handler) in &handlers {
            // A handler disconnected by an earlier one in this round is skipped.
            if !self.lock().subscribers.is_connected(subscription) {
                continue;
            }
            signal::deliver_one(*subscription, handler, self, &change);
        }
    }
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NotificationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("NotificationStore")
            .field("count", &state.records.len())
            .field("subscribers", &state.subscribers.len())
            .field("disposed", &state.disposed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::Action;

    type Log = Arc<Mutex<Vec<(ChangeKind, String)>>>;

    fn record_changes(store: &NotificationStore) -> Log {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        store.subscribe(move |_, change| {
            sink.lock()
                .unwrap()
                .push((change.kind, change.notification.id.to_string()));
            Ok(())
        });
        log
    }

    #[test]
    fn test_notify_then_dismiss() {
        let store = NotificationStore::new();
        let log = record_changes(&store);

        let id = store.notify("Build complete", NotificationType::Default, NotificationOptions::new());
        assert_eq!(store.count(), 1);

        assert!(store.dismiss(&id));
        assert_eq!(store.count(), 0);

        let log = log.lock().unwrap();
        assert_eq!(
            *log,
            vec![
                (ChangeKind::Added, id.to_string()),
                (ChangeKind::Removed, id.to_string())
            ]
        );
    }

    #[test]
    fn test_count_tracks_live_ids() {
        let store = NotificationStore::new();
        let ids: Vec<_> = (0..5)
            .map(|i| store.info(format!("n{i}"), NotificationOptions::new()))
            .collect();
        assert_eq!(store.count(), 5);
        store.dismiss(&ids[1]);
        store.dismiss(&ids[3]);
        assert_eq!(store.count(), 3);
        let remaining: Vec<_> = store.notifications().into_iter().map(|n| n.message).collect();
        assert_eq!(remaining, vec!["n0", "n2", "n4"]);
    }

    #[test]
    fn test_dismiss_is_idempotent() {
        let store = NotificationStore::new();
        let log = record_changes(&store);
        let id = store.warning("careful", NotificationOptions::new());

        assert!(store.dismiss(&id));
        assert!(!store.dismiss(&id));
        assert!(!store.dismiss(&NotificationId::from("never-existed")));

        let removed = log
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == ChangeKind::Removed)
            .count();
        assert_eq!(removed, 1);
    }

    #[test]
    fn test_dismiss_all_emits_in_insertion_order() {
        let store = NotificationStore::new();
        let a = store.info("a", NotificationOptions::new());
        let b = store.info("b", NotificationOptions::new());
        let c = store.info("c", NotificationOptions::new());
        let log = record_changes(&store);

        assert_eq!(store.dismiss_all(), 3);
        assert_eq!(store.count(), 0);
        let log = log.lock().unwrap();
        assert_eq!(
            *log,
            vec![
                (ChangeKind::Removed, a.to_string()),
                (ChangeKind::Removed, b.to_string()),
                (ChangeKind::Removed, c.to_string()),
            ]
        );
    }

    #[test]
    fn test_update_existing_keeps_id_and_position() {
        let store = NotificationStore::new();
        let first = store.info("first", NotificationOptions::new());
        let second = store.notify(
            "second",
            NotificationType::InProgress,
            NotificationOptions::new().with_auto_close(AutoClose::Never),
        );
        let log = record_changes(&store);

        let returned = store.update(
            second.clone(),
            NotificationUpdate::new().with_message("second, done"),
        );
        assert_eq!(returned, second);

        let records = store.notifications();
        assert_eq!(records[0].id, first);
        assert_eq!(records[1].id, second);
        assert_eq!(records[1].message, "second, done");
        // Fields absent from the patch are untouched
        assert_eq!(records[1].kind, NotificationType::InProgress);
        assert_eq!(records[1].options.auto_close, Some(AutoClose::Never));
        assert_eq!(*log.lock().unwrap(), vec![(ChangeKind::Updated, second.to_string())]);
    }

    #[test]
    fn test_update_replaces_actions() {
        let store = NotificationStore::new();
        let id = store.info(
            "with actions",
            NotificationOptions::new()
                .with_action(Action::new("One", |_| {}))
                .with_action(Action::new("Two", |_| {})),
        );
        store.update(
            id.clone(),
            NotificationUpdate::new()
                .with_options(NotificationOptions::new().with_action(Action::new("Three", |_| {}))),
        );
        let record = store.get(&id).unwrap();
        let labels: Vec<_> = record.options.actions.iter().map(|a| a.label.as_str()).collect();
        assert_eq!(labels, vec!["Three"]);
    }

    #[test]
    fn test_update_unknown_id_creates() {
        let store = NotificationStore::new();
        let log = record_changes(&store);
        let id = store.update(
            "custom-id",
            NotificationUpdate::new()
                .with_message("created by update")
                .with_kind(NotificationType::Success),
        );
        assert_eq!(id.as_str(), "custom-id");
        assert_eq!(store.count(), 1);
        let record = store.get(&id).unwrap();
        assert_eq!(record.kind, NotificationType::Success);
        assert_eq!(*log.lock().unwrap(), vec![(ChangeKind::Added, "custom-id".to_string())]);
    }

    #[test]
    fn test_update_existing_ignores_unknown_id() {
        let store = NotificationStore::new();
        let log = record_changes(&store);
        let result = store.update_existing(
            &NotificationId::from("ghost"),
            NotificationUpdate::new().with_message("boo"),
        );
        assert!(result.is_none());
        assert_eq!(store.count(), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_failing_handler_does_not_block_others() {
        let store = NotificationStore::new();
        store.subscribe(|_, _| anyhow::bail!("view exploded"));
        store.subscribe(|_, _| panic!("view panicked"));
        let log = record_changes(&store);

        let id = store.info("still delivered", NotificationOptions::new());

        assert_eq!(store.count(), 1);
        assert_eq!(*log.lock().unwrap(), vec![(ChangeKind::Added, id.to_string())]);
    }

    #[test]
    fn test_handlers_see_post_mutation_state() {
        let store = NotificationStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        store.subscribe(move |sender, change| {
            sink.lock().unwrap().push((change.kind, sender.count()));
            Ok(())
        });
        let id = store.info("x", NotificationOptions::new());
        store.dismiss(&id);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(ChangeKind::Added, 1), (ChangeKind::Removed, 0)]
        );
    }

    #[test]
    fn test_handler_can_reenter_store() {
        let store = NotificationStore::new();
        // Dismiss every error as soon as it is added
        store.subscribe(|sender, change| {
            if change.kind == ChangeKind::Added && change.notification.kind == NotificationType::Error {
                sender.dismiss(&change.notification.id);
            }
            Ok(())
        });
        store.error("boom", NotificationOptions::new());
        store.info("fine", NotificationOptions::new());
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let store = NotificationStore::new();
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let subscription = store.subscribe(move |_, change| {
            sink.lock()
                .unwrap()
                .push((change.kind, change.notification.id.to_string()));
            Ok(())
        });
        store.info("one", NotificationOptions::new());
        assert!(store.unsubscribe(&subscription));
        assert!(!store.unsubscribe(&subscription));
        store.info("two", NotificationOptions::new());
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_dispose_turns_mutations_into_noops() {
        let store = NotificationStore::new();
        let log = record_changes(&store);
        store.info("before", NotificationOptions::new());
        let weak = store.downgrade();

        store.dispose();
        assert!(store.is_disposed());
        assert_eq!(store.count(), 0);
        assert!(weak.upgrade().is_none());

        let id = store.info("after", NotificationOptions::new());
        store.update("late", NotificationUpdate::new().with_message("late"));
        assert!(!store.contains(&id));
        assert_eq!(store.count(), 0);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_weak_handle_dies_with_store() {
        let store = NotificationStore::new();
        let weak = store.downgrade();
        assert!(weak.upgrade().is_some());
        drop(store);
        assert!(weak.upgrade().is_none());
    }

    #[tokio::test]
    async fn test_promise_success_and_error() {
        let store = NotificationStore::new();
        let messages = PromiseMessages {
            pending: "Saving".into(),
            success: "Saved".into(),
            error: "Save failed".into(),
        };

        let ok: Result<u32, String> = store.promise(async { Ok(7) }, messages.clone()).await;
        assert_eq!(ok, Ok(7));
        let err: Result<u32, String> = store
            .promise(async { Err("disk full".to_string()) }, messages)
            .await;
        assert!(err.is_err());

        let records = store.notifications();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, NotificationType::Success);
        assert_eq!(records[0].message, "Saved");
        assert_eq!(records[0].options.auto_close, None);
        assert_eq!(records[1].kind, NotificationType::Error);
        assert_eq!(records[1].message, "Save failed");
    }
}
