//! User settings for notifications and announcements.
//!
//! Stored as JSON with the same keys as the lab's notification settings:
//!
//! ```json
//! { "fetchNews": "none", "checkForUpdates": true, "doNotDisturbMode": false }
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

/// Whether to fetch official news. `None` means the user was never asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchNews {
    True,
    False,
    #[default]
    None,
}

impl std::fmt::Display for FetchNews {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchNews::True => write!(f, "true"),
            FetchNews::False => write!(f, "false"),
            FetchNews::None => write!(f, "none"),
        }
    }
}

impl FromStr for FetchNews {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "true" => Ok(FetchNews::True),
            "false" => Ok(FetchNews::False),
            "none" => Ok(FetchNews::None),
            other => Err(format!(
                "invalid fetchNews value '{other}' (expected true, false or none)"
            )),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Notification and announcement settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    #[serde(default)]
    pub fetch_news: FetchNews,

    #[serde(default = "default_true")]
    pub check_for_updates: bool,

    /// Silence all toasts.
    #[serde(default)]
    pub do_not_disturb_mode: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            fetch_news: FetchNews::None,
            check_for_updates: true,
            do_not_disturb_mode: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to write settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize settings: {0}")]
    Json(#[from] serde_json::Error),
}

/// Settings cached in memory and written through to disk on every change.
#[derive(Debug)]
pub struct SettingsFile {
    path: Option<PathBuf>,
    current: Mutex<NotificationSettings>,
}

impl SettingsFile {
    /// Load settings from `path`, returning defaults if the file doesn't
    /// exist or can't be parsed.
    pub fn load(path: PathBuf) -> Self {
        let settings = if path.exists() {
            std::fs::read_to_string(&path)
                .ok()
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default()
        } else {
            NotificationSettings::default()
        };
        Self {
            path: Some(path),
            current: Mutex::new(settings),
        }
    }

    /// Settings that are never written to disk.
    pub fn in_memory(settings: NotificationSettings) -> Self {
        Self {
            path: None,
            current: Mutex::new(settings),
        }
    }

    fn current(&self) -> MutexGuard<'_, NotificationSettings> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self) -> NotificationSettings {
        self.current().clone()
    }

    pub fn set_fetch_news(&self, value: FetchNews) -> Result<(), SettingsError> {
        self.modify(|s| s.fetch_news = value)
    }

    pub fn set_check_for_updates(&self, value: bool) -> Result<(), SettingsError> {
        self.modify(|s| s.check_for_updates = value)
    }

    pub fn set_do_not_disturb_mode(&self, value: bool) -> Result<(), SettingsError> {
        self.modify(|s| s.do_not_disturb_mode = value)
    }

    /// Apply `f` and persist. The in-memory value changes even if the
    /// write fails, so the running session honours the choice.
    fn modify(&self, f: impl FnOnce(&mut NotificationSettings)) -> Result<(), SettingsError> {
        let snapshot = {
            let mut current = self.current();
            f(&mut current);
            current.clone()
        };
        match &self.path {
            Some(path) => save_settings(path, &snapshot),
            None => Ok(()),
        }
    }
}

/// Save settings to disk.
pub fn save_settings(path: &Path, settings: &NotificationSettings) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(settings)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = NotificationSettings::default();
        assert_eq!(settings.fetch_news, FetchNews::None);
        assert!(settings.check_for_updates);
        assert!(!settings.do_not_disturb_mode);
    }

    #[test]
    fn test_settings_serde_uses_camel_case() {
        let settings = NotificationSettings {
            fetch_news: FetchNews::True,
            check_for_updates: false,
            do_not_disturb_mode: true,
        };
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"fetchNews": "true", "checkForUpdates": false, "doNotDisturbMode": true})
        );
    }

    #[test]
    fn test_deserialize_missing_keys() {
        let parsed: NotificationSettings = serde_json::from_str(r#"{"fetchNews": "false"}"#).unwrap();
        assert_eq!(parsed.fetch_news, FetchNews::False);
        assert!(parsed.check_for_updates);
        assert!(!parsed.do_not_disturb_mode);
    }

    #[test]
    fn test_fetch_news_from_str() {
        assert_eq!("true".parse::<FetchNews>(), Ok(FetchNews::True));
        assert_eq!("none".parse::<FetchNews>(), Ok(FetchNews::None));
        assert!("maybe".parse::<FetchNews>().is_err());
        assert_eq!(FetchNews::False.to_string(), "false");
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let file = SettingsFile::load(tmp.path().join("settings.json"));
        assert_eq!(file.get(), NotificationSettings::default());
    }

    #[test]
    fn test_load_corrupt_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        let file = SettingsFile::load(path);
        assert_eq!(file.get(), NotificationSettings::default());
    }

    #[test]
    fn test_set_persists() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("settings.json");

        let file = SettingsFile::load(path.clone());
        file.set_fetch_news(FetchNews::True).unwrap();
        file.set_check_for_updates(false).unwrap();

        let reloaded = SettingsFile::load(path);
        assert_eq!(reloaded.get().fetch_news, FetchNews::True);
        assert!(!reloaded.get().check_for_updates);
    }

    #[test]
    fn test_in_memory_never_writes() {
        let file = SettingsFile::in_memory(NotificationSettings::default());
        file.set_do_not_disturb_mode(true).unwrap();
        assert!(file.get().do_not_disturb_mode);
        assert!(file.path().is_none());
    }
}
