//! Change signal emitted by the notification store.
//!
//! Every mutation of the store is broadcast as a [`NotificationChange`] to
//! the connected handlers, synchronously and in subscription order. Each
//! handler runs behind its own error boundary: a handler that returns an
//! error or panics is logged and skipped, the remaining handlers still see
//! the change.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use log::error;
use serde::Serialize;

use crate::notification::Notification;
use crate::store::NotificationStore;

/// Kind of store mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Updated,
    Removed,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Added => write!(f, "added"),
            ChangeKind::Updated => write!(f, "updated"),
            ChangeKind::Removed => write!(f, "removed"),
        }
    }
}

/// A single change broadcast by the store.
///
/// `notification` is the record after the mutation, or the departing record
/// for [`ChangeKind::Removed`].
#[derive(Debug, Clone)]
pub struct NotificationChange {
    pub kind: ChangeKind,
    pub notification: Notification,
}

/// Handler connected to the change signal. The store passes itself as the
/// sender so handlers can read the current state or call back into it.
pub type ChangeHandler =
    Arc<dyn Fn(&NotificationStore, &NotificationChange) -> anyhow::Result<()> + Send + Sync>;

/// Handle identifying a connected handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

/// Connected handlers in subscription order.
#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: u64,
    handlers: Vec<(Subscription, ChangeHandler)>,
}

impl Subscribers {
    pub(crate) fn connect(&mut self, handler: ChangeHandler) -> Subscription {
        let subscription = Subscription(self.next_id);
        self.next_id += 1;
        self.handlers.push((subscription, handler));
        subscription
    }

    pub(crate) fn disconnect(&mut self, subscription: &Subscription) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(s, _)| s != subscription);
        self.handlers.len() != before
    }

    pub(crate) fn is_connected(&self, subscription: &Subscription) -> bool {
        self.handlers.iter().any(|(s, _)| s == subscription)
    }

    pub(crate) fn snapshot(&self) -> Vec<(Subscription, ChangeHandler)> {
        self.handlers.clone()
    }

    pub(crate) fn clear(&mut self) {
        self.handlers.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.handlers.len()
    }
}

/// Invoke one handler inside an error boundary.
///
/// Returns `false` if the handler failed; the failure has been logged.
pub(crate) fn deliver_one(
    subscription: Subscription,
    handler: &ChangeHandler,
    store: &NotificationStore,
    change: &NotificationChange,
) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| handler(store, change))) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            error!(
                "[store] Handler {:?} failed on {} of {}: {:#}",
                subscription, change.kind, change.notification.id, e
            );
            false
        }
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(
                "[store] Handler {:?} panicked on {} of {}: {}",
                subscription, change.kind, change.notification.id, reason
            );
            false
        }
    }
}
