//! Toast surface: ephemeral pop-ups for notifications.
//!
//! [`ToastSurface`] listens to the store and decides which notifications pop
//! up, when an open toast is replaced in place, and when it is closed. The
//! actual drawing is delegated to a [`ToastRenderer`], so the same rules
//! drive a terminal front end or a GUI.
//!
//! Rules, per change:
//! - `removed` always force-closes the toast;
//! - otherwise nothing happens while do-not-disturb is on or the
//!   notification list is open (the list already shows everything);
//! - silent notifications (non-positive auto-close) never pop up;
//! - `added` opens a toast, `updated` replaces an open toast or re-opens a
//!   closed one.
//!
//! Auto-close deadlines are tracked here; closing a toast never removes the
//! record from the store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use log::debug;

use crate::center::ListVisibility;
use crate::notification::{
    shorten_message, AutoClose, DisplayType, Notification, NotificationId, NotificationOptions,
    NotificationType, MAX_MESSAGE_LENGTH,
};
use crate::signal::{ChangeKind, NotificationChange, Subscription};
use crate::store::NotificationStore;

/// Presentation defaults, resolved once per change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToastConfig {
    /// Auto-close applied when a notification has neither an explicit
    /// auto-close nor actions.
    pub default_auto_close_ms: i64,
    pub max_message_length: usize,
}

impl Default for ToastConfig {
    fn default() -> Self {
        Self {
            default_auto_close_ms: 5000,
            max_message_length: MAX_MESSAGE_LENGTH,
        }
    }
}

impl ToastConfig {
    /// Effective auto-close for a set of options.
    ///
    /// An explicit value wins; notifications with actions stay open until the
    /// user reacts; everything else uses the default.
    pub fn resolve_auto_close(&self, options: &NotificationOptions) -> AutoClose {
        match options.auto_close {
            Some(auto_close) => auto_close,
            None if !options.actions.is_empty() => AutoClose::Never,
            None => AutoClose::After(self.default_auto_close_ms),
        }
    }

    /// Shortened message split into display lines.
    pub fn message_lines(&self, message: &str) -> Vec<String> {
        shorten_message(message, self.max_message_length)
            .split('\n')
            .map(str::to_string)
            .collect()
    }

    /// Build the renderable view of a notification.
    pub fn toast_for(&self, notification: &Notification) -> Toast {
        Toast {
            id: notification.id.clone(),
            kind: notification.kind,
            lines: self.message_lines(&notification.message),
            is_loading: notification.kind == NotificationType::InProgress,
            auto_close: self.resolve_auto_close(&notification.options),
            buttons: notification
                .options
                .actions
                .iter()
                .map(|action| ToastButton {
                    label: action.label.clone(),
                    title: action.title().to_string(),
                    display_type: action.display_type,
                })
                .collect(),
        }
    }
}

/// A button as shown on a toast or list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToastButton {
    pub label: String,
    pub title: String,
    pub display_type: DisplayType,
}

/// Renderable view of a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: NotificationId,
    pub kind: NotificationType,
    pub lines: Vec<String>,
    /// Spinner instead of a type icon.
    pub is_loading: bool,
    pub auto_close: AutoClose,
    pub buttons: Vec<ToastButton>,
}

/// Draws toasts. Implemented by the front end.
pub trait ToastRenderer: Send + Sync {
    fn show(&self, toast: &Toast);
    fn replace(&self, toast: &Toast);
    fn close(&self, id: &NotificationId);
    fn close_all(&self) {}
}

struct ActiveToast {
    deadline: Option<Instant>,
}

/// Toast presentation state driven by the store's change signal.
pub struct ToastSurface {
    config: ToastConfig,
    renderer: Arc<dyn ToastRenderer>,
    visibility: ListVisibility,
    do_not_disturb: AtomicBool,
    active: Mutex<HashMap<NotificationId, ActiveToast>>,
}

impl ToastSurface {
    /// Create a surface. Opening the list through `visibility` closes every
    /// toast.
    pub fn new(
        config: ToastConfig,
        renderer: Arc<dyn ToastRenderer>,
        visibility: ListVisibility,
    ) -> Arc<Self> {
        let surface = Arc::new(Self {
            config,
            renderer,
            visibility: visibility.clone(),
            do_not_disturb: AtomicBool::new(false),
            active: Mutex::new(HashMap::new()),
        });
        let weak = Arc::downgrade(&surface);
        visibility.on_change(move |open| {
            if let Some(surface) = weak.upgrade().filter(|_| open) {
                surface.close_all();
            }
        });
        surface
    }

    fn active(&self) -> MutexGuard<'_, HashMap<NotificationId, ActiveToast>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Connect the surface to `store`.
    pub fn attach(self: &Arc<Self>, store: &NotificationStore) -> Subscription {
        let surface = Arc::clone(self);
        store.subscribe(move |_, change| {
            surface.handle_change(change);
            Ok(())
        })
    }

    pub fn config(&self) -> &ToastConfig {
        &self.config
    }

    pub fn set_do_not_disturb(&self, enabled: bool) {
        self.do_not_disturb.store(enabled, Ordering::Relaxed);
    }

    pub fn do_not_disturb(&self) -> bool {
        self.do_not_disturb.load(Ordering::Relaxed)
    }

    /// Apply one store change.
    pub fn handle_change(&self, change: &NotificationChange) {
        let notification = &change.notification;
        if change.kind == ChangeKind::Removed {
            self.close(&notification.id);
            return;
        }
        if self.do_not_disturb() || self.visibility.is_open() || notification.is_silent() {
            return;
        }
        match change.kind {
            ChangeKind::Added => self.open(notification),
            ChangeKind::Updated => {
                if self.is_active(&notification.id) {
                    let toast = self.config.toast_for(notification);
                    self.track(&toast);
                    self.renderer.replace(&toast);
                } else {
                    self.open(notification);
                }
            }
            ChangeKind::Removed => {}
        }
    }

    fn open(&self, notification: &Notification) {
        let toast = self.config.toast_for(notification);
        self.track(&toast);
        self.renderer.show(&toast);
    }

    fn track(&self, toast: &Toast) {
        let deadline = toast.auto_close.duration().map(|d| Instant::now() + d);
        self.active()
            .insert(toast.id.clone(), ActiveToast { deadline });
    }

    fn close(&self, id: &NotificationId) -> bool {
        if self.active().remove(id).is_some() {
            self.renderer.close(id);
            true
        } else {
            false
        }
    }

    pub fn is_active(&self, id: &NotificationId) -> bool {
        self.active().contains_key(id)
    }

    /// Ids of the toasts currently on screen, sorted.
    pub fn active_ids(&self) -> Vec<NotificationId> {
        let mut ids: Vec<_> = self.active().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// The toast's own close button: hides the pop-up, keeps the record.
    pub fn hide(&self, id: &NotificationId) -> bool {
        self.close(id)
    }

    /// Click the action at `index` on the toast `id`.
    ///
    /// Unless the callback prevented default handling, the toast closes and
    /// the notification is dismissed from the store. Returns whether an
    /// action was found.
    pub fn activate_action(&self, store: &NotificationStore, id: &NotificationId, index: usize) -> bool {
        let Some(action) = store
            .get(id)
            .and_then(|n| n.options.actions.get(index).cloned())
        else {
            return false;
        };
        let event = action.invoke(id);
        if !event.is_default_prevented() {
            self.close(id);
            store.dismiss(id);
        }
        true
    }

    /// Close every toast whose auto-close deadline is at or before `now`.
    pub fn close_expired(&self, now: Instant) -> Vec<NotificationId> {
        let expired: Vec<NotificationId> = {
            let mut active = self.active();
            let ids: Vec<_> = active
                .iter()
                .filter(|(_, t)| t.deadline.is_some_and(|d| d <= now))
                .map(|(id, _)| id.clone())
                .collect();
            for id in &ids {
                active.remove(id);
            }
            ids
        };
        for id in &expired {
            debug!("[toast] Auto-closing {}", id);
            self.renderer.close(id);
        }
        expired
    }

    /// Close every open toast.
    pub fn close_all(&self) {
        let had_any = {
            let mut active = self.active();
            let had_any = !active.is_empty();
            active.clear();
            had_any
        };
        if had_any {
            self.renderer.close_all();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::notification::{Action, NotificationUpdate};
    use std::time::Duration;

    /// Renderer recording every call for assertions.
    #[derive(Default)]
    pub(crate) struct RecordingRenderer {
        pub(crate) calls: Mutex<Vec<String>>,
    }

    impl RecordingRenderer {
        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ToastRenderer for RecordingRenderer {
        fn show(&self, toast: &Toast) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("show {} {}", toast.id, toast.lines.join("|")));
        }

        fn replace(&self, toast: &Toast) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("replace {} {}", toast.id, toast.lines.join("|")));
        }

        fn close(&self, id: &NotificationId) {
            self.calls.lock().unwrap().push(format!("close {}", id));
        }

        fn close_all(&self) {
            self.calls.lock().unwrap().push("close_all".to_string());
        }
    }

    fn setup() -> (NotificationStore, Arc<ToastSurface>, Arc<RecordingRenderer>, ListVisibility) {
        let store = NotificationStore::new();
        let renderer = Arc::new(RecordingRenderer::default());
        let visibility = ListVisibility::default();
        let surface = ToastSurface::new(ToastConfig::default(), renderer.clone(), visibility.clone());
        surface.attach(&store);
        (store, surface, renderer, visibility)
    }

    #[test]
    fn test_resolve_auto_close() {
        let config = ToastConfig::default();
        assert_eq!(
            config.resolve_auto_close(&NotificationOptions::new()),
            AutoClose::After(5000)
        );
        assert_eq!(
            config.resolve_auto_close(&NotificationOptions::new().with_action(Action::new("Ok", |_| {}))),
            AutoClose::Never
        );
        assert_eq!(
            config.resolve_auto_close(
                &NotificationOptions::new()
                    .with_action(Action::new("Ok", |_| {}))
                    .with_auto_close(AutoClose::After(100))
            ),
            AutoClose::After(100)
        );
    }

    #[test]
    fn test_toast_view_truncates_and_splits() {
        let config = ToastConfig {
            max_message_length: 8,
            ..Default::default()
        };
        assert_eq!(config.message_lines("line1\nline2 is long"), vec!["line1", "li…"]);

        let store = NotificationStore::new();
        let id = store.notify(
            "working",
            NotificationType::InProgress,
            NotificationOptions::new().with_action(Action::new("Stop", |_| {}).with_caption("Stop it")),
        );
        let toast = config.toast_for(&store.get(&id).unwrap());
        assert!(toast.is_loading);
        assert_eq!(toast.buttons[0].title, "Stop it");
        assert_eq!(toast.auto_close, AutoClose::Never);
    }

    #[test]
    fn test_added_updated_removed() {
        let (store, surface, renderer, _) = setup();
        let id = store.info("hello", NotificationOptions::new());
        assert!(surface.is_active(&id));

        store.update(id.clone(), NotificationUpdate::new().with_message("hello again"));
        store.dismiss(&id);
        assert!(!surface.is_active(&id));

        assert_eq!(
            renderer.calls(),
            vec![
                format!("show {id} hello"),
                format!("replace {id} hello again"),
                format!("close {id}"),
            ]
        );
    }

    #[test]
    fn test_update_reopens_hidden_toast() {
        let (store, surface, renderer, _) = setup();
        let id = store.info("first", NotificationOptions::new());
        assert!(surface.hide(&id));
        assert!(store.contains(&id));

        store.update(id.clone(), NotificationUpdate::new().with_message("second"));
        assert!(surface.is_active(&id));
        assert_eq!(renderer.calls().last().unwrap(), &format!("show {id} second"));
    }

    #[test]
    fn test_silent_notifications_do_not_pop_up() {
        let (store, surface, renderer, _) = setup();
        let id = store.info(
            "quiet",
            NotificationOptions::new().with_auto_close(AutoClose::After(0)),
        );
        assert!(!surface.is_active(&id));
        assert!(renderer.calls().is_empty());
    }

    #[test]
    fn test_do_not_disturb_and_open_list_suppress_toasts() {
        let (store, surface, renderer, visibility) = setup();
        surface.set_do_not_disturb(true);
        store.info("shh", NotificationOptions::new());
        surface.set_do_not_disturb(false);

        visibility.set_open(true);
        store.info("list is open", NotificationOptions::new());
        visibility.set_open(false);

        assert!(renderer.calls().is_empty());
        assert!(surface.active_ids().is_empty());
    }

    #[test]
    fn test_opening_list_closes_toasts() {
        let (store, surface, renderer, visibility) = setup();
        let id = store.info("visible", NotificationOptions::new());
        assert!(surface.is_active(&id));

        visibility.set_open(true);
        assert!(surface.active_ids().is_empty());
        assert_eq!(renderer.calls().last().map(String::as_str), Some("close_all"));
    }

    #[test]
    fn test_removed_closes_toast_during_do_not_disturb() {
        let (store, surface, _, _) = setup();
        let id = store.info("visible", NotificationOptions::new());
        surface.set_do_not_disturb(true);
        store.dismiss(&id);
        assert!(!surface.is_active(&id));
    }

    #[test]
    fn test_action_dismisses_unless_prevented() {
        let (store, surface, _, _) = setup();
        let id = store.info(
            "pick",
            NotificationOptions::new()
                .with_action(Action::new("Keep", |event| event.prevent_default()))
                .with_action(Action::new("Close", |_| {})),
        );

        assert!(surface.activate_action(&store, &id, 0));
        assert!(store.contains(&id));
        assert!(surface.is_active(&id));

        assert!(surface.activate_action(&store, &id, 1));
        assert!(!store.contains(&id));
        assert!(!surface.is_active(&id));

        assert!(!surface.activate_action(&store, &id, 0));
    }

    #[test]
    fn test_close_expired_keeps_records() {
        let (store, surface, _, _) = setup();
        let quick = store.info(
            "quick",
            NotificationOptions::new().with_auto_close(AutoClose::After(10)),
        );
        let sticky = store.info(
            "sticky",
            NotificationOptions::new().with_auto_close(AutoClose::Never),
        );

        let later = Instant::now() + Duration::from_secs(60);
        assert_eq!(surface.close_expired(later), vec![quick.clone()]);
        assert!(surface.is_active(&sticky));
        assert!(store.contains(&quick));
    }

    #[test]
    fn test_close_all() {
        let (store, surface, renderer, _) = setup();
        store.info("a", NotificationOptions::new());
        store.info("b", NotificationOptions::new());
        surface.close_all();
        surface.close_all();
        assert!(surface.active_ids().is_empty());
        assert_eq!(renderer.calls().iter().filter(|c| *c == "close_all").count(), 1);
        assert_eq!(store.count(), 2);
    }
}
