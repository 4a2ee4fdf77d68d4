//! Delivery of feed announcements into the notification store.
//!
//! The bridge decides per announcement whether to show it, based on the
//! persisted [`AnnouncementState`]:
//!
//! | stored state        | delivery                                     |
//! |---------------------|----------------------------------------------|
//! | dismissed           | suppressed                                   |
//! | not seen            | shown for 5 s, `seen` persisted              |
//! | seen, not dismissed | shown with the feed's own auto-close         |
//!
//! It also listens to the store: removing a notification tagged `news` or
//! `update` persists it as dismissed, so it never comes back.
//!
//! Persistence writes are fire-and-forget tasks on the runtime captured at
//! construction. Their failures are logged and never reach the user;
//! [`AnnouncementBridge::flush`] waits for the outstanding ones.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lab_notifications::{
    Action, AutoClose, ChangeKind, DisplayType, NotificationId, NotificationOptions,
    NotificationStore, NotificationType, Subscription, WeakNotificationStore,
};
use log::{debug, error, info, warn};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config_section::{single, AnnouncementState, ConfigSection, StatePatch};
use crate::feed::{AnnouncementSource, FeedNotification, UpdateResponse};
use crate::settings::{FetchNews, SettingsFile};

pub const NEWS_TAG: &str = "news";
pub const UPDATE_TAG: &str = "update";

/// Auto-close applied the first time an announcement is shown.
pub const UNSEEN_AUTO_CLOSE_MS: i64 = 5000;

pub const PRIVACY_POLICY_URL: &str =
    "https://jupyterlab.readthedocs.io/en/stable/privacy_policies.html";

pub const OPT_IN_MESSAGE: &str = "Would you like to get notified about official Jupyter news?";

/// Opens external links for link actions.
pub trait LinkOpener: Send + Sync {
    fn open(&self, url: &str);
}

/// Opener that only logs the URL, for headless front ends.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogLinkOpener;

impl LinkOpener for LogLinkOpener {
    fn open(&self, url: &str) {
        info!("[announcements] Open {}", url);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Announcements need a tokio runtime: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    News,
    Update,
}

impl Channel {
    fn tag(self) -> &'static str {
        match self {
            Channel::News => NEWS_TAG,
            Channel::Update => UPDATE_TAG,
        }
    }
}

struct Shared {
    store: WeakNotificationStore,
    config: Arc<dyn ConfigSection>,
    source: Arc<dyn AnnouncementSource>,
    settings: Arc<SettingsFile>,
    opener: Arc<dyn LinkOpener>,
    runtime: Handle,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

/// Feeds announcements into a store and remembers what the user saw.
#[derive(Clone)]
pub struct AnnouncementBridge {
    shared: Arc<Shared>,
}

impl AnnouncementBridge {
    /// Create a bridge for `store`. Must be called within a tokio runtime.
    pub fn new(
        store: &NotificationStore,
        config: Arc<dyn ConfigSection>,
        source: Arc<dyn AnnouncementSource>,
        settings: Arc<SettingsFile>,
        opener: Arc<dyn LinkOpener>,
    ) -> Result<Self, BridgeError> {
        let runtime = Handle::try_current()?;
        Ok(Self {
            shared: Arc::new(Shared {
                store: store.downgrade(),
                config,
                source,
                settings,
                opener,
                runtime,
                pending: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn settings(&self) -> &Arc<SettingsFile> {
        &self.shared.settings
    }

    /// Listen for dismissals, then either ask the user about news (first
    /// run) or fetch right away.
    ///
    /// Returns `None` if the store is already gone.
    pub async fn start(&self) -> Option<Subscription> {
        let store = self.shared.store.upgrade()?;
        let subscription = self.listen_for_dismissals(&store);
        if self.shared.settings.get().fetch_news == FetchNews::None {
            self.prompt_for_news(&store);
        } else {
            self.fetch().await;
        }
        Some(subscription)
    }

    /// Persist announcements removed from the store as dismissed.
    pub fn listen_for_dismissals(&self, store: &NotificationStore) -> Subscription {
        let bridge = self.clone();
        store.subscribe(move |_, change| {
            if change.kind != ChangeKind::Removed {
                return Ok(());
            }
            let notification = &change.notification;
            let tagged = notification
                .tags()
                .iter()
                .any(|t| *t == NEWS_TAG || *t == UPDATE_TAG);
            if let (true, Some(id)) = (tagged, notification.announcement_id()) {
                debug!("[announcements] Announcement {} dismissed", id);
                bridge.persist(id, StatePatch::dismissed());
            }
            Ok(())
        })
    }

    /// Ask once whether to fetch news. The answer is stored in the settings.
    pub fn prompt_for_news(&self, store: &NotificationStore) -> NotificationId {
        let opener = Arc::clone(&self.shared.opener);
        let privacy = Action::new("Open privacy policy", move |event| {
            event.prevent_default();
            opener.open(PRIVACY_POLICY_URL);
        })
        .with_caption(PRIVACY_POLICY_URL)
        .with_display_type(DisplayType::Link);

        let bridge = self.clone();
        let yes = Action::new("Yes", move |event| {
            bridge.dismiss(event.notification_id());
            if let Err(e) = bridge.shared.settings.set_fetch_news(FetchNews::True) {
                error!("[announcements] Failed to save setting 'fetchNews': {}", e);
            }
            let fetcher = bridge.clone();
            bridge.track(async move { fetcher.fetch().await });
        });

        let bridge = self.clone();
        let no = Action::new("No", move |event| {
            bridge.dismiss(event.notification_id());
            if let Err(e) = bridge.shared.settings.set_fetch_news(FetchNews::False) {
                error!("[announcements] Failed to save setting 'fetchNews': {}", e);
            }
        });

        store.notify(
            OPT_IN_MESSAGE,
            NotificationType::Default,
            NotificationOptions::new()
                .with_auto_close(AutoClose::Never)
                .with_action(privacy)
                .with_action(yes)
                .with_action(no),
        )
    }

    /// Fetch news and the update check according to the current settings,
    /// delivering what isn't dismissed. Returns the delivered ids.
    pub async fn fetch(&self) -> Vec<NotificationId> {
        let settings = self.shared.settings.get();
        let mut delivered = Vec::new();

        if settings.fetch_news == FetchNews::True {
            match self.shared.source.fetch_news().await {
                Ok(response) => {
                    for item in response.news {
                        delivered.extend(self.deliver(item, Channel::News).await);
                    }
                }
                Err(e) => info!("[announcements] Failed to get the announcements: {}", e),
            }
        }

        if settings.check_for_updates {
            match self.shared.source.fetch_update().await {
                Ok(UpdateResponse {
                    notification: Some(item),
                }) => delivered.extend(self.deliver(item, Channel::Update).await),
                Ok(_) => debug!("[announcements] No update available"),
                Err(e) => info!("[announcements] Failed to check for updates: {}", e),
            }
        }

        delivered
    }

    /// Wait for every outstanding persistence write and spawned fetch.
    pub async fn flush(&self) {
        loop {
            let handles = std::mem::take(&mut *self.pending());
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!("[announcements] Background task failed: {}", e);
                }
            }
        }
    }

    async fn deliver(&self, item: FeedNotification, channel: Channel) -> Option<NotificationId> {
        let announcement_id = item.announcement_id().map(str::to_string);
        let state = match &announcement_id {
            Some(id) => self.state_of(id).await,
            None => {
                debug!("[announcements] Announcement without id: {}", item.message);
                AnnouncementState::default()
            }
        };

        if state.dismissed {
            debug!(
                "[announcements] Skipping dismissed announcement {}",
                announcement_id.as_deref().unwrap_or_default()
            );
            return None;
        }

        let Some(store) = self.shared.store.upgrade() else {
            debug!("[announcements] Store is gone, dropping announcement");
            return None;
        };

        let mut options = NotificationOptions::new().with_data(item.tagged_data(channel.tag()));
        options.auto_close = item.options.auto_close;
        options.actions = self.actions_for(&item, announcement_id.clone(), channel);

        if !state.seen {
            options.auto_close = Some(AutoClose::After(UNSEEN_AUTO_CLOSE_MS));
            if let Some(id) = &announcement_id {
                self.persist(id, StatePatch::seen());
            }
        }

        Some(store.notify(item.message, item.kind, options))
    }

    /// Stored state, or "never seen" if it can't be read.
    async fn state_of(&self, id: &str) -> AnnouncementState {
        match self.shared.config.get(id).await {
            Ok(state) => state,
            Err(e) => {
                warn!("[announcements] Failed to read state of {}: {}", id, e);
                AnnouncementState::default()
            }
        }
    }

    fn actions_for(
        &self,
        item: &FeedNotification,
        announcement_id: Option<String>,
        channel: Channel,
    ) -> Vec<Action> {
        let mut actions = Vec::with_capacity(2);
        match channel {
            Channel::News => {
                let bridge = self.clone();
                actions.push(
                    Action::new("Hide", move |_| {
                        if let Some(id) = &announcement_id {
                            bridge.persist(id, StatePatch::dismissed());
                        }
                    })
                    .with_caption("Never show this notification again."),
                );
            }
            Channel::Update => {
                let bridge = self.clone();
                actions.push(
                    Action::new("Ignore all updates", move |event| {
                        match bridge.shared.settings.set_check_for_updates(false) {
                            Ok(()) => bridge.dismiss(event.notification_id()),
                            Err(e) => error!(
                                "[announcements] Failed to set the checkForUpdates setting: {}",
                                e
                            ),
                        }
                    })
                    .with_caption("Do not prompt me if a new JupyterLab version is available."),
                );
            }
        }

        if let Some((label, url)) = item.link() {
            let opener = Arc::clone(&self.shared.opener);
            let target = url.to_string();
            let display_type = match channel {
                Channel::News => DisplayType::Link,
                Channel::Update => DisplayType::Accent,
            };
            actions.push(
                Action::new(label, move |_| opener.open(&target))
                    .with_caption(url)
                    .with_display_type(display_type),
            );
        }
        actions
    }

    fn dismiss(&self, id: &NotificationId) {
        if let Some(store) = self.shared.store.upgrade() {
            store.dismiss(id);
        }
    }

    fn persist(&self, id: &str, patch: StatePatch) {
        let config = Arc::clone(&self.shared.config);
        let patches = single(id, patch);
        self.track(async move {
            if let Err(e) = config.update(patches).await {
                error!(
                    "[announcements] Failed to update the announcements config: {}",
                    e
                );
            }
        });
    }

    fn track<F, T>(&self, task: F)
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let handle = self.shared.runtime.spawn(async move {
            task.await;
        });
        let mut pending = self.pending();
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    fn pending(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.shared
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
