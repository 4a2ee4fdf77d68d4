//! Notification records and the option types attached to them.
//!
//! A [`Notification`] is a single user-facing alert: a stable id, a message,
//! a [`NotificationType`] and a bag of [`NotificationOptions`]. Records live
//! in a [`NotificationStore`](crate::store::NotificationStore); everything in
//! this module is plain data plus the callbacks behind action buttons.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of characters shown for a message on compact surfaces.
pub const MAX_MESSAGE_LENGTH: usize = 140;

/// Opaque notification identifier, unique within a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(String);

impl NotificationId {
    /// Allocate a fresh random id.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for NotificationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NotificationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NotificationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for NotificationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Severity or kind of a notification.
///
/// Unknown names coming from JSON fall back to [`NotificationType::Default`]
/// so a newer feed never breaks an older client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", from = "String")]
pub enum NotificationType {
    #[default]
    Default,
    InProgress,
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Default => "default",
            NotificationType::InProgress => "in-progress",
            NotificationType::Info => "info",
            NotificationType::Success => "success",
            NotificationType::Warning => "warning",
            NotificationType::Error => "error",
        }
    }
}

impl From<&str> for NotificationType {
    fn from(value: &str) -> Self {
        match value {
            "in-progress" => NotificationType::InProgress,
            "info" => NotificationType::Info,
            "success" => NotificationType::Success,
            "warning" => NotificationType::Warning,
            "error" => NotificationType::Error,
            _ => NotificationType::Default,
        }
    }
}

impl From<String> for NotificationType {
    fn from(value: String) -> Self {
        NotificationType::from(value.as_str())
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visual emphasis of an action button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum DisplayType {
    #[default]
    Default,
    Accent,
    Warn,
    Link,
}

impl From<String> for DisplayType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "accent" => DisplayType::Accent,
            "warn" => DisplayType::Warn,
            "link" => DisplayType::Link,
            _ => DisplayType::Default,
        }
    }
}

/// Auto-close policy of a notification.
///
/// Serialized as `false` for [`AutoClose::Never`] and as a number of
/// milliseconds otherwise. Fractional milliseconds are rounded on input. A non-positive duration marks the notification
/// as silent: surfaces never pop it up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AutoCloseRepr", into = "AutoCloseRepr")]
pub enum AutoClose {
    Never,
    After(i64),
}

impl AutoClose {
    /// Whether the notification should never be shown as a toast.
    pub fn is_silent(&self) -> bool {
        matches!(self, AutoClose::After(ms) if *ms <= 0)
    }

    /// Time the toast stays on screen, `None` if it never closes by itself.
    pub fn duration(&self) -> Option<Duration> {
        match self {
            AutoClose::After(ms) if *ms > 0 => Some(Duration::from_millis(*ms as u64)),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum AutoCloseRepr {
    Flag(bool),
    Millis(i64),
    Fractional(f64),
}

impl TryFrom<AutoCloseRepr> for AutoClose {
    type Error = String;

    fn try_from(value: AutoCloseRepr) -> Result<Self, Self::Error> {
        match value {
            AutoCloseRepr::Flag(false) => Ok(AutoClose::Never),
            AutoCloseRepr::Flag(true) => {
                Err("autoClose must be a number of milliseconds or false".to_string())
            }
            AutoCloseRepr::Millis(ms) => Ok(AutoClose::After(ms)),
            AutoCloseRepr::Fractional(ms) => Ok(AutoClose::After(ms.round() as i64)),
        }
    }
}

impl From<AutoClose> for AutoCloseRepr {
    fn from(value: AutoClose) -> Self {
        match value {
            AutoClose::Never => AutoCloseRepr::Flag(false),
            AutoClose::After(ms) => AutoCloseRepr::Millis(ms),
        }
    }
}

/// Event handed to an action callback when its button is clicked.
#[derive(Debug, Clone)]
pub struct ActionEvent {
    notification_id: NotificationId,
    default_prevented: bool,
}

impl ActionEvent {
    pub fn new(notification_id: NotificationId) -> Self {
        Self {
            notification_id,
            default_prevented: false,
        }
    }

    /// Id of the notification owning the clicked action.
    pub fn notification_id(&self) -> &NotificationId {
        &self.notification_id
    }

    /// Keep the notification open after the callback returns.
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }
}

/// Callback run when an action button is clicked.
pub type ActionCallback = Arc<dyn Fn(&mut ActionEvent) + Send + Sync>;

/// A button attached to a notification.
#[derive(Clone)]
pub struct Action {
    pub label: String,
    /// Tooltip; surfaces fall back to the label.
    pub caption: Option<String>,
    pub display_type: DisplayType,
    callback: ActionCallback,
}

impl Action {
    pub fn new(
        label: impl Into<String>,
        callback: impl Fn(&mut ActionEvent) + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            caption: None,
            display_type: DisplayType::Default,
            callback: Arc::new(callback),
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn with_display_type(mut self, display_type: DisplayType) -> Self {
        self.display_type = display_type;
        self
    }

    /// Text shown when hovering the button.
    pub fn title(&self) -> &str {
        self.caption.as_deref().unwrap_or(&self.label)
    }

    /// Run the callback for the notification `id` and return the event so
    /// the caller can check whether default handling was prevented.
    pub fn invoke(&self, id: &NotificationId) -> ActionEvent {
        let mut event = ActionEvent::new(id.clone());
        (self.callback)(&mut event);
        event
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("label", &self.label)
            .field("caption", &self.caption)
            .field("display_type", &self.display_type)
            .finish_non_exhaustive()
    }
}

/// Options of a notification.
#[derive(Debug, Clone, Default)]
pub struct NotificationOptions {
    /// `None` lets the rendering surface apply its default.
    pub auto_close: Option<AutoClose>,
    pub actions: Vec<Action>,
    /// Opaque payload attached by the creator.
    pub data: Option<serde_json::Value>,
}

impl NotificationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auto_close(mut self, auto_close: AutoClose) -> Self {
        self.auto_close = Some(auto_close);
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// A live notification record.
#[derive(Debug, Clone)]
pub struct Notification {
    pub id: NotificationId,
    pub message: String,
    pub kind: NotificationType,
    pub options: NotificationOptions,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Notification {
    pub(crate) fn new(
        id: NotificationId,
        message: String,
        kind: NotificationType,
        options: NotificationOptions,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            message,
            kind,
            options,
            created_at: now,
            modified_at: now,
        }
    }

    /// Whether the record asked to never be shown as a toast.
    pub fn is_silent(&self) -> bool {
        self.options
            .auto_close
            .map(|a| a.is_silent())
            .unwrap_or(false)
    }

    /// String tags stored under `data.tags`.
    pub fn tags(&self) -> Vec<&str> {
        self.options
            .data
            .as_ref()
            .and_then(|d| d.get("tags"))
            .and_then(|t| t.as_array())
            .map(|tags| tags.iter().filter_map(|t| t.as_str()).collect())
            .unwrap_or_default()
    }

    /// Announcement id stored under `data.id`, if any.
    pub fn announcement_id(&self) -> Option<&str> {
        self.options
            .data
            .as_ref()
            .and_then(|d| d.get("id"))
            .and_then(|id| id.as_str())
            .filter(|id| !id.is_empty())
    }
}

/// Partial update applied by [`NotificationStore::update`](crate::store::NotificationStore::update).
///
/// Only the fields that are `Some` change. `options` replaces the whole
/// option set, actions included.
#[derive(Debug, Clone, Default)]
pub struct NotificationUpdate {
    pub message: Option<String>,
    pub kind: Option<NotificationType>,
    pub options: Option<NotificationOptions>,
}

impl NotificationUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_kind(mut self, kind: NotificationType) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_options(mut self, options: NotificationOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub(crate) fn apply_to(self, record: &mut Notification) {
        if let Some(message) = self.message {
            record.message = message;
        }
        if let Some(kind) = self.kind {
            record.kind = kind;
        }
        if let Some(options) = self.options {
            record.options = options;
        }
        record.modified_at = Utc::now();
    }

    pub(crate) fn into_notification(self, id: NotificationId) -> Notification {
        Notification::new(
            id,
            self.message.unwrap_or_default(),
            self.kind.unwrap_or_default(),
            self.options.unwrap_or_default(),
        )
    }
}

/// Truncate `message` to `max_chars` characters, appending an ellipsis.
pub fn shorten_message(message: &str, max_chars: usize) -> String {
    match message.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &message[..cut]),
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_fresh_ids_are_unique() {
        let a = NotificationId::new();
        let b = NotificationId::new();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_notification_type_serde() {
        assert_eq!(
            serde_json::to_string(&NotificationType::InProgress).unwrap(),
            "\"in-progress\""
        );
        let parsed: NotificationType = serde_json::from_str("\"warning\"").unwrap();
        assert_eq!(parsed, NotificationType::Warning);
        let unknown: NotificationType = serde_json::from_str("\"shiny\"").unwrap();
        assert_eq!(unknown, NotificationType::Default);
    }

    #[test]
    fn test_auto_close_serde() {
        let never: AutoClose = serde_json::from_str("false").unwrap();
        assert_eq!(never, AutoClose::Never);
        let after: AutoClose = serde_json::from_str("5000").unwrap();
        assert_eq!(after, AutoClose::After(5000));
        assert!(serde_json::from_str::<AutoClose>("true").is_err());
        let float: AutoClose = serde_json::from_str("5000.0").unwrap();
        assert_eq!(float, AutoClose::After(5000));
        assert_eq!(serde_json::to_string(&float).unwrap(), "5000");
        let half: AutoClose = serde_json::from_str("249.6").unwrap();
        assert_eq!(half, AutoClose::After(250));
        assert_eq!(serde_json::to_string(&AutoClose::Never).unwrap(), "false");
    }

    #[test]
    fn test_auto_close_silent() {
        assert!(AutoClose::After(0).is_silent());
        assert!(AutoClose::After(-1).is_silent());
        assert!(!AutoClose::After(1).is_silent());
        assert!(!AutoClose::Never.is_silent());
        assert_eq!(AutoClose::After(0).duration(), None);
        assert_eq!(
            AutoClose::After(250).duration(),
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_action_invoke_and_prevent_default() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let action = Action::new("Open", move |event| {
            counter.fetch_add(1, Ordering::SeqCst);
            event.prevent_default();
        })
        .with_caption("https://jupyter.org");

        let event = action.invoke(&NotificationId::from("n1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(event.is_default_prevented());
        assert_eq!(event.notification_id().as_str(), "n1");
        assert_eq!(action.title(), "https://jupyter.org");
    }

    #[test]
    fn test_tags_and_announcement_id() {
        let options = NotificationOptions::new().with_data(serde_json::json!({
            "id": "news-42",
            "tags": ["news", 3, "extra"]
        }));
        let record = Notification::new(
            NotificationId::from("n1"),
            "hello".into(),
            NotificationType::Info,
            options,
        );
        assert_eq!(record.tags(), vec!["news", "extra"]);
        assert_eq!(record.announcement_id(), Some("news-42"));

        let bare = Notification::new(
            NotificationId::from("n2"),
            "hi".into(),
            NotificationType::Default,
            NotificationOptions::default(),
        );
        assert!(bare.tags().is_empty());
        assert_eq!(bare.announcement_id(), None);
    }

    #[test]
    fn test_update_replaces_options_wholesale() {
        let mut record = Notification::new(
            NotificationId::from("n1"),
            "old".into(),
            NotificationType::Info,
            NotificationOptions::new()
                .with_auto_close(AutoClose::Never)
                .with_action(Action::new("A", |_| {}))
                .with_data(serde_json::json!({"keep": false})),
        );

        NotificationUpdate::new()
            .with_options(NotificationOptions::new().with_action(Action::new("B", |_| {})))
            .apply_to(&mut record);

        assert_eq!(record.message, "old");
        assert_eq!(record.kind, NotificationType::Info);
        assert_eq!(record.options.auto_close, None);
        assert!(record.options.data.is_none());
        assert_eq!(record.options.actions.len(), 1);
        assert_eq!(record.options.actions[0].label, "B");
    }

    #[test]
    fn test_shorten_message() {
        assert_eq!(shorten_message("short", 10), "short");
        assert_eq!(shorten_message("abcdef", 3), "abc…");
        assert_eq!(shorten_message("héllo wörld", 5), "héllo…");
        let long = "x".repeat(MAX_MESSAGE_LENGTH + 10);
        assert_eq!(
            shorten_message(&long, MAX_MESSAGE_LENGTH).chars().count(),
            MAX_MESSAGE_LENGTH + 1
        );
    }
}
