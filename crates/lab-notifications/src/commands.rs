//! Notification commands callable with JSON arguments.
//!
//! These mirror the application's command palette entries:
//!
//! | id                                | arguments                                   |
//! |-----------------------------------|---------------------------------------------|
//! | `apputils:notify`                 | `{message, type?, options?}`                |
//! | `apputils:update-notification`    | `{id, message?, type?, autoClose?, actions?, data?}` |
//! | `apputils:dismiss-notification`   | `{id?}`                                     |
//! | `apputils:display-notifications`  | none                                        |
//!
//! Actions given as JSON name another command (`commandId` + `args`); clicking
//! them runs that command through the injected [`CommandExecutor`]. Failures
//! are logged and never reach the notification.

use std::sync::Arc;

use log::error;
use serde::Deserialize;
use serde_json::Value;

use crate::notification::{
    Action, AutoClose, DisplayType, NotificationId, NotificationOptions, NotificationType,
    NotificationUpdate,
};
use crate::store::NotificationStore;

pub const NOTIFY: &str = "apputils:notify";
pub const UPDATE: &str = "apputils:update-notification";
pub const DISMISS: &str = "apputils:dismiss-notification";
pub const DISPLAY: &str = "apputils:display-notifications";

/// Runs application commands on behalf of notification actions.
pub trait CommandExecutor: Send + Sync {
    fn execute(&self, command_id: &str, args: Option<&Value>) -> anyhow::Result<()>;
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid arguments for {command}: {source}")]
    InvalidArguments {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Command {0} is not available")]
    NotAvailable(String),
}

/// An action described as a command invocation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandAction {
    pub label: String,
    pub command_id: String,
    #[serde(default)]
    pub args: Option<Value>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub display_type: DisplayType,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOptions {
    #[serde(default)]
    pub auto_close: Option<AutoClose>,
    #[serde(default)]
    pub actions: Option<Vec<CommandAction>>,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyArgs {
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: NotificationType,
    #[serde(default)]
    pub options: CommandOptions,
}

/// Update arguments carry the options flat, next to the id.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateArgs {
    pub id: NotificationId,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: NotificationType,
    #[serde(flatten)]
    pub options: CommandOptions,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DismissArgs {
    #[serde(default)]
    pub id: Option<NotificationId>,
}

type DisplayHook = Arc<dyn Fn() + Send + Sync>;

/// Command handlers bound to a store.
pub struct NotificationCommands {
    store: NotificationStore,
    executor: Arc<dyn CommandExecutor>,
    display: Option<DisplayHook>,
}

impl NotificationCommands {
    pub fn new(store: NotificationStore, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            store,
            executor,
            display: None,
        }
    }

    /// Wire `apputils:display-notifications` to a front end toggle.
    pub fn with_display(mut self, display: impl Fn() + Send + Sync + 'static) -> Self {
        self.display = Some(Arc::new(display));
        self
    }

    pub fn ids() -> [&'static str; 4] {
        [NOTIFY, UPDATE, DISMISS, DISPLAY]
    }

    /// Palette label of a command.
    pub fn label(command_id: &str) -> Option<&'static str> {
        match command_id {
            NOTIFY => Some("Emit a notification"),
            UPDATE => Some("Update a notification"),
            DISMISS => Some("Dismiss a notification"),
            DISPLAY => Some("Show Notifications"),
            _ => None,
        }
    }

    /// Execute a command. `notify` and `update` return the notification id
    /// as a JSON string; the others return `null`.
    pub fn execute(&self, command_id: &str, args: Value) -> Result<Value, CommandError> {
        let parse_error = |source| CommandError::InvalidArguments {
            command: command_id.to_string(),
            source,
        };
        match command_id {
            NOTIFY => {
                let args: NotifyArgs = serde_json::from_value(args).map_err(parse_error)?;
                Ok(Value::String(self.notify(args).to_string()))
            }
            UPDATE => {
                let args: UpdateArgs = serde_json::from_value(args).map_err(parse_error)?;
                Ok(Value::String(self.update(args).to_string()))
            }
            DISMISS => {
                let args: DismissArgs = if args.is_null() {
                    DismissArgs::default()
                } else {
                    serde_json::from_value(args).map_err(parse_error)?
                };
                self.dismiss(args);
                Ok(Value::Null)
            }
            DISPLAY => match &self.display {
                Some(display) => {
                    display();
                    Ok(Value::Null)
                }
                None => Err(CommandError::NotAvailable(DISPLAY.to_string())),
            },
            other => Err(CommandError::UnknownCommand(other.to_string())),
        }
    }

    pub fn notify(&self, args: NotifyArgs) -> NotificationId {
        let options = self.build_options(args.options);
        self.store.notify(args.message, args.kind, options)
    }

    pub fn update(&self, args: UpdateArgs) -> NotificationId {
        let mut patch = NotificationUpdate::new()
            .with_kind(args.kind)
            .with_options(self.build_options(args.options));
        patch.message = args.message;
        self.store.update(args.id, patch)
    }

    /// Dismiss one notification, or all of them when no id is given.
    pub fn dismiss(&self, args: DismissArgs) {
        match args.id {
            Some(id) => {
                self.store.dismiss(&id);
            }
            None => {
                self.store.dismiss_all();
            }
        }
    }

    fn build_options(&self, options: CommandOptions) -> NotificationOptions {
        let actions = options
            .actions
            .unwrap_or_default()
            .into_iter()
            .map(|described| self.command_action(described))
            .collect();
        NotificationOptions {
            auto_close: options.auto_close,
            actions,
            data: options.data,
        }
    }

    fn command_action(&self, described: CommandAction) -> Action {
        let executor = Arc::clone(&self.executor);
        let command_id = described.command_id;
        let args = described.args;
        let mut action = Action::new(described.label, move |_| {
            if let Err(e) = executor.execute(&command_id, args.as_ref()) {
                error!("[commands] Failed to execute '{}': {:#}", command_id, e);
            }
        })
        .with_display_type(described.display_type);
        action.caption = described.caption;
        action
    }
}
