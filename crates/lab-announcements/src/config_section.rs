//! Persisted seen/dismissed flags per announcement id.
//!
//! The section is a single JSON object keyed by announcement id:
//!
//! ```json
//! { "jupyterlab-4.2": { "seen": true, "dismissed": false } }
//! ```
//!
//! Rows are merged field by field and never deleted.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Seen/dismissed flags for one announcement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncementState {
    #[serde(default)]
    pub seen: bool,
    #[serde(default)]
    pub dismissed: bool,
}

/// Partial update of an [`AnnouncementState`]. `None` fields are left as is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seen: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dismissed: Option<bool>,
}

impl StatePatch {
    pub fn seen() -> Self {
        Self {
            seen: Some(true),
            dismissed: None,
        }
    }

    /// Dismissing also marks the announcement as seen.
    pub fn dismissed() -> Self {
        Self {
            seen: Some(true),
            dismissed: Some(true),
        }
    }

    pub fn reset() -> Self {
        Self {
            seen: Some(false),
            dismissed: Some(false),
        }
    }

    pub fn apply(&self, state: &mut AnnouncementState) {
        if let Some(seen) = self.seen {
            state.seen = seen;
        }
        if let Some(dismissed) = self.dismissed {
            state.dismissed = dismissed;
        }
    }
}

pub type StateMap = BTreeMap<String, AnnouncementState>;

/// Patch map holding a single row.
pub fn single(id: impl Into<String>, patch: StatePatch) -> HashMap<String, StatePatch> {
    HashMap::from([(id.into(), patch)])
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config section unavailable: {0}")]
    Unavailable(String),
}

/// Key-value store for announcement state.
#[async_trait]
pub trait ConfigSection: Send + Sync {
    /// Every stored row.
    async fn data(&self) -> Result<StateMap, ConfigError>;

    /// Merge `patches` into the stored rows and return the new content.
    async fn update(&self, patches: HashMap<String, StatePatch>) -> Result<StateMap, ConfigError>;

    /// State of one announcement; unknown ids are neither seen nor dismissed.
    async fn get(&self, id: &str) -> Result<AnnouncementState, ConfigError> {
        Ok(self.data().await?.get(id).copied().unwrap_or_default())
    }
}

fn merge(data: &mut StateMap, patches: HashMap<String, StatePatch>) {
    for (id, patch) in patches {
        patch.apply(data.entry(id).or_default());
    }
}

/// Section backed by a JSON file, cached in memory.
pub struct JsonConfigSection {
    path: PathBuf,
    data: Mutex<StateMap>,
}

impl JsonConfigSection {
    /// Open the section at `path`. A missing file is an empty section; an
    /// unreadable one is logged and treated as empty.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<StateMap>(&bytes) {
                Ok(data) => data,
                Err(e) => {
                    warn!(
                        "[announcements] Ignoring invalid state file {:?}: {}",
                        path, e
                    );
                    StateMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StateMap::new(),
            Err(e) => {
                warn!("[announcements] Failed to read state file {:?}: {}", path, e);
                StateMap::new()
            }
        };
        debug!(
            "[announcements] Loaded {} announcement states from {:?}",
            data.len(),
            path
        );
        Self {
            path,
            data: Mutex::new(data),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write via a temp file and rename so readers never see a partial file.
    async fn write(&self, data: &StateMap) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(data)?;
        let tmp_path = self
            .path
            .with_extension(format!("tmp.{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp_path, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigSection for JsonConfigSection {
    async fn data(&self) -> Result<StateMap, ConfigError> {
        Ok(self.data.lock().await.clone())
    }

    async fn update(&self, patches: HashMap<String, StatePatch>) -> Result<StateMap, ConfigError> {
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        merge(&mut next, patches);
        self.write(&next).await?;
        *data = next.clone();
        Ok(next)
    }
}

/// In-memory section for ephemeral sessions and tests.
#[derive(Default)]
pub struct MemoryConfigSection {
    data: Mutex<StateMap>,
    failing: AtomicBool,
}

impl MemoryConfigSection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: StateMap) -> Self {
        Self {
            data: Mutex::new(data),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every call fail with [`ConfigError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ConfigError::Unavailable("memory section set to fail".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigSection for MemoryConfigSection {
    async fn data(&self) -> Result<StateMap, ConfigError> {
        self.check()?;
        Ok(self.data.lock().await.clone())
    }

    async fn update(&self, patches: HashMap<String, StatePatch>) -> Result<StateMap, ConfigError> {
        self.check()?;
        let mut data = self.data.lock().await;
        merge(&mut data, patches);
        Ok(data.clone())
    }
}
