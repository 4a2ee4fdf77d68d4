//! Status badge: live count plus an attention highlight.
//!
//! The badge turns to [`BadgeState::Attention`] when a notification arrives
//! that the user would otherwise miss: the list is closed and the record will
//! not pop up as a toast (do-not-disturb, or a silent auto-close). Opening
//! the list, or the count dropping to zero, returns it to
//! [`BadgeState::Idle`].
//!
//! The list's open state is read from the shared [`ListVisibility`], so the
//! badge follows the list however it was opened.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::center::{count_label, ListVisibility};
use crate::signal::{ChangeKind, NotificationChange, Subscription};
use crate::store::NotificationStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeState {
    #[default]
    Idle,
    Attention,
}

/// What a front end needs to draw the badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BadgeSnapshot {
    pub count: usize,
    pub state: BadgeState,
    pub list_opened: bool,
}

#[derive(Default)]
struct BadgeModel {
    snapshot: BadgeSnapshot,
    do_not_disturb: bool,
}

type StateListener = Arc<dyn Fn(&BadgeSnapshot) + Send + Sync>;

pub struct StatusBadge {
    model: Mutex<BadgeModel>,
    visibility: ListVisibility,
    listeners: Mutex<Vec<StateListener>>,
}

impl StatusBadge {
    /// Create a badge following the list `visibility`.
    pub fn new(visibility: ListVisibility) -> Arc<Self> {
        let badge = Arc::new(Self {
            model: Mutex::new(BadgeModel::default()),
            visibility: visibility.clone(),
            listeners: Mutex::new(Vec::new()),
        });
        let weak = Arc::downgrade(&badge);
        visibility.on_change(move |open| {
            if let Some(badge) = weak.upgrade() {
                badge.list_visibility_changed(open);
            }
        });
        badge
    }

    fn model(&self) -> MutexGuard<'_, BadgeModel> {
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Connect to `store`, picking up its current count.
    pub fn attach(self: &Arc<Self>, store: &NotificationStore) -> Subscription {
        self.model().snapshot.count = store.count();
        let badge = Arc::clone(self);
        store.subscribe(move |sender, change| {
            badge.handle_change(sender.count(), change);
            Ok(())
        })
    }

    /// Apply one store change given the store's count after it.
    pub fn handle_change(&self, count: usize, change: &NotificationChange) {
        let list_open = self.visibility.is_open();
        self.mutate(|model| {
            model.snapshot.count = count;
            let no_toast = model.do_not_disturb || change.notification.is_silent();
            if !list_open && change.kind != ChangeKind::Removed && no_toast {
                model.snapshot.state = BadgeState::Attention;
            }
            if count == 0 {
                model.snapshot.state = BadgeState::Idle;
            }
        });
    }

    /// Opening the list clears attention.
    fn list_visibility_changed(&self, open: bool) {
        self.mutate(|model| {
            if open {
                model.snapshot.state = BadgeState::Idle;
            }
        });
    }

    pub fn set_do_not_disturb(&self, enabled: bool) {
        self.model().do_not_disturb = enabled;
    }

    pub fn snapshot(&self) -> BadgeSnapshot {
        BadgeSnapshot {
            list_opened: self.visibility.is_open(),
            ..self.model().snapshot
        }
    }

    pub fn count(&self) -> usize {
        self.snapshot().count
    }

    pub fn state(&self) -> BadgeState {
        self.snapshot().state
    }

    /// Tooltip text.
    pub fn title(&self) -> String {
        count_label(self.count())
    }

    /// Register a callback run after every state change.
    pub fn on_state_changed(&self, listener: impl Fn(&BadgeSnapshot) + Send + Sync + 'static) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    fn mutate(&self, f: impl FnOnce(&mut BadgeModel)) {
        {
            let mut model = self.model();
            f(&mut model);
        }
        let snapshot = self.snapshot();
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener(&snapshot);
        }
    }
}
