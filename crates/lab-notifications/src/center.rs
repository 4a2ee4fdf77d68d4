//! Notification center: the persistent list of live notifications.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};

use crate::notification::{NotificationId, NotificationType};
use crate::store::NotificationStore;
use crate::toast::{ToastButton, ToastConfig};

type VisibilityListener = Arc<dyn Fn(bool) + Send + Sync>;

#[derive(Default)]
struct VisibilityInner {
    open: AtomicBool,
    listeners: Mutex<Vec<VisibilityListener>>,
}

/// Shared open/closed flag of the notification list.
///
/// Read by the toast surface and the status badge, written by whoever
/// toggles the list. Listeners run after every actual change.
#[derive(Clone, Default)]
pub struct ListVisibility(Arc<VisibilityInner>);

impl ListVisibility {
    pub fn is_open(&self) -> bool {
        self.0.open.load(Ordering::SeqCst)
    }

    pub fn set_open(&self, open: bool) {
        if self.0.open.swap(open, Ordering::SeqCst) == open {
            return;
        }
        let listeners = self
            .0
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener(open);
        }
    }

    /// Run `listener` with the new state whenever the list opens or closes.
    pub fn on_change(&self, listener: impl Fn(bool) + Send + Sync + 'static) {
        self.0
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }
}

impl fmt::Debug for ListVisibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ListVisibility").field(&self.is_open()).finish()
    }
}

/// Pluralised count shown in the list header and the badge tooltip.
pub fn count_label(count: usize) -> String {
    match count {
        0 => "No notifications".to_string(),
        1 => "1 notification".to_string(),
        n => format!("{n} notifications"),
    }
}

/// One row of the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CenterEntry {
    pub id: NotificationId,
    pub kind: NotificationType,
    pub lines: Vec<String>,
    pub buttons: Vec<ToastButton>,
    pub created_at: DateTime<Utc>,
}

/// List surface over a store.
pub struct NotificationCenter {
    store: NotificationStore,
    visibility: ListVisibility,
    config: ToastConfig,
}

impl NotificationCenter {
    pub fn new(store: NotificationStore, visibility: ListVisibility, config: ToastConfig) -> Self {
        Self {
            store,
            visibility,
            config,
        }
    }

    pub fn is_open(&self) -> bool {
        self.visibility.is_open()
    }

    pub fn open(&self) {
        self.visibility.set_open(true);
    }

    pub fn close(&self) {
        self.visibility.set_open(false);
    }

    pub fn visibility(&self) -> &ListVisibility {
        &self.visibility
    }

    pub fn header(&self) -> String {
        count_label(self.store.count())
    }

    /// Live notifications in insertion order.
    pub fn entries(&self) -> Vec<CenterEntry> {
        self.store
            .notifications()
            .iter()
            .map(|n| {
                let toast = self.config.toast_for(n);
                CenterEntry {
                    id: toast.id,
                    kind: toast.kind,
                    lines: toast.lines,
                    buttons: toast.buttons,
                    created_at: n.created_at,
                }
            })
            .collect()
    }

    pub fn dismiss(&self, id: &NotificationId) -> bool {
        self.store.dismiss(id)
    }

    /// The "dismiss all" toolbar button.
    pub fn dismiss_all(&self) -> usize {
        self.store.dismiss_all()
    }

    /// Click the action at `index` on entry `id`; dismisses the entry unless
    /// the callback prevented default handling.
    pub fn activate_action(&self, id: &NotificationId, index: usize) -> bool {
        let Some(action) = self
            .store
            .get(id)
            .and_then(|n| n.options.actions.get(index).cloned())
        else {
            return false;
        };
        if !action.invoke(id).is_default_prevented() {
            self.store.dismiss(id);
        }
        true
    }
}
