//! lab-notifications - Notification store and headless surfaces for the lab shell.
//!
//! The [`NotificationStore`] holds the live notifications of one running
//! application and broadcasts every change on its signal. Presentation
//! surfaces subscribe to that signal independently:
//!
//! - [`ToastSurface`]: ephemeral pop-ups, drawn by a [`ToastRenderer`];
//! - [`NotificationCenter`]: the persistent list with "dismiss all";
//! - [`StatusBadge`]: live count plus an attention highlight.
//!
//! [`NotificationUi`] wires the three together and [`NotificationCommands`]
//! exposes the store through JSON-argument commands.

pub mod center;
pub mod commands;
pub mod notification;
pub mod signal;
pub mod status;
pub mod store;
pub mod toast;
pub mod ui;

pub use center::{count_label, CenterEntry, ListVisibility, NotificationCenter};
pub use commands::{CommandError, CommandExecutor, NotificationCommands};
pub use notification::{
    shorten_message, Action, ActionEvent, AutoClose, DisplayType, Notification, NotificationId,
    NotificationOptions, NotificationType, NotificationUpdate, MAX_MESSAGE_LENGTH,
};
pub use signal::{ChangeKind, NotificationChange, Subscription};
pub use status::{BadgeSnapshot, BadgeState, StatusBadge};
pub use store::{NotificationStore, PromiseMessages, WeakNotificationStore};
pub use toast::{Toast, ToastButton, ToastConfig, ToastRenderer, ToastSurface};
pub use ui::NotificationUi;
