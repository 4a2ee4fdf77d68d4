//! lab-announcements - Official news and update announcements.
//!
//! Fetches the news and update feeds from the lab server and delivers them
//! into a [`NotificationStore`](lab_notifications::NotificationStore), while
//! remembering per announcement whether it was already seen or dismissed so
//! that nothing is shown again once the user hid it.
//!
//! State lives in two JSON files in the user's config directory:
//! - `settings.json`: whether to fetch news, check for updates, do-not-disturb
//! - `announcements.json`: `{ "<announcement id>": {"seen": bool, "dismissed": bool} }`

use std::path::{Path, PathBuf};

pub mod bridge;
pub mod config_section;
pub mod feed;
pub mod settings;

pub use bridge::{AnnouncementBridge, BridgeError, LinkOpener, LogLinkOpener};
pub use config_section::{
    AnnouncementState, ConfigError, ConfigSection, JsonConfigSection, MemoryConfigSection,
    StateMap, StatePatch,
};
pub use feed::{
    AnnouncementSource, FeedError, FeedNotification, FeedOptions, HttpAnnouncementSource,
    NewsResponse, UpdateResponse,
};
pub use settings::{FetchNews, NotificationSettings, SettingsError, SettingsFile};

/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV: &str = "LAB_ANNOUNCEMENTS_CONFIG_DIR";

/// Directory holding settings and announcement state.
///
/// `$LAB_ANNOUNCEMENTS_CONFIG_DIR` if set, otherwise:
/// - macOS: ~/Library/Application Support/lab-announcements
/// - Linux: ~/.config/lab-announcements
/// - Windows: C:\Users\<User>\AppData\Roaming\lab-announcements
pub fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lab-announcements")
}

/// Path of the settings file.
pub fn settings_path() -> PathBuf {
    settings_path_in(&config_dir())
}

/// Settings file inside an explicit config directory.
pub fn settings_path_in(dir: &Path) -> PathBuf {
    dir.join("settings.json")
}

/// Path of the persisted announcement state.
pub fn announcements_state_path() -> PathBuf {
    announcements_state_path_in(&config_dir())
}

pub fn announcements_state_path_in(dir: &Path) -> PathBuf {
    dir.join("announcements.json")
}
