//! Wiring of the three surfaces around one store.
//!
//! [`NotificationUi`] is what a front end activates at startup: it connects
//! the status badge and the toast surface to the store, owns the
//! notification list, and implements the "display notifications" toggle.

use std::sync::Arc;

use log::debug;

use crate::center::{ListVisibility, NotificationCenter};
use crate::signal::Subscription;
use crate::status::StatusBadge;
use crate::store::NotificationStore;
use crate::toast::{ToastConfig, ToastRenderer, ToastSurface};

pub struct NotificationUi {
    store: NotificationStore,
    toasts: Arc<ToastSurface>,
    center: NotificationCenter,
    badge: Arc<StatusBadge>,
    subscriptions: Vec<Subscription>,
}

impl NotificationUi {
    pub fn new(
        store: NotificationStore,
        renderer: Arc<dyn ToastRenderer>,
        config: ToastConfig,
    ) -> Self {
        let visibility = ListVisibility::default();
        let badge = StatusBadge::new(visibility.clone());
        let toasts = ToastSurface::new(config.clone(), renderer, visibility.clone());
        let center = NotificationCenter::new(store.clone(), visibility, config);

        let subscriptions = vec![badge.attach(&store), toasts.attach(&store)];

        Self {
            store,
            toasts,
            center,
            badge,
            subscriptions,
        }
    }

    pub fn store(&self) -> &NotificationStore {
        &self.store
    }

    pub fn toasts(&self) -> &Arc<ToastSurface> {
        &self.toasts
    }

    pub fn center(&self) -> &NotificationCenter {
        &self.center
    }

    pub fn badge(&self) -> &Arc<StatusBadge> {
        &self.badge
    }

    /// Toggle the notification list. Opening it closes every toast and
    /// clears the badge's attention. Returns whether the list is now open.
    pub fn display_notifications(&self) -> bool {
        let open = !self.center.is_open();
        if open {
            self.center.open();
        } else {
            self.center.close();
        }
        debug!("[ui] Notification list {}", if open { "opened" } else { "closed" });
        open
    }

    pub fn set_do_not_disturb(&self, enabled: bool) {
        self.toasts.set_do_not_disturb(enabled);
        self.badge.set_do_not_disturb(enabled);
    }
}

impl Drop for NotificationUi {
    fn drop(&mut self) {
        for subscription in &self.subscriptions {
            self.store.unsubscribe(subscription);
        }
    }
}
