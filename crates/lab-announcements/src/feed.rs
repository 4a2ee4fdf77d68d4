//! Remote news and update feed.
//!
//! The lab server exposes two endpoints:
//!
//! - `GET /lab/api/news` → `{"news": [<notification>, ...]}`
//! - `GET /lab/api/update` → `{"notification": <notification> | null}`
//!
//! Each notification carries its announcement id and tags in
//! `options.data`, and optionally a `[label, url]` pair in `link`.
//! Malformed news items are skipped one by one instead of failing the feed.

use async_trait::async_trait;
use lab_notifications::{AutoClose, NotificationType};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const NEWS_ENDPOINT: &str = "lab/api/news";
pub const UPDATE_ENDPOINT: &str = "lab/api/update";

/// One announcement as sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedNotification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<Vec<String>>,
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: NotificationType,
    #[serde(default)]
    pub options: FeedOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_close: Option<AutoClose>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: Map<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

impl FeedNotification {
    /// Stable announcement id from `options.data.id`.
    pub fn announcement_id(&self) -> Option<&str> {
        self.options
            .data
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    /// `(label, url)` when the item carries a well-formed link.
    pub fn link(&self) -> Option<(&str, &str)> {
        match self.link.as_deref() {
            Some([label, url]) => Some((label.as_str(), url.as_str())),
            _ => None,
        }
    }

    /// Notification data with `tag` added to `tags` if missing.
    pub fn tagged_data(&self, tag: &str) -> Value {
        let mut data = self.options.data.clone();
        let tags = data
            .entry("tags")
            .or_insert_with(|| Value::Array(Vec::new()));
        match tags {
            Value::Array(list) => {
                if !list.iter().any(|t| t.as_str() == Some(tag)) {
                    list.push(Value::String(tag.to_string()));
                }
            }
            other => *other = Value::Array(vec![Value::String(tag.to_string())]),
        }
        Value::Object(data)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsResponse {
    #[serde(default, deserialize_with = "skip_malformed")]
    pub news: Vec<FeedNotification>,
}

fn skip_malformed<'de, D>(deserializer: D) -> Result<Vec<FeedNotification>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("[announcements] Skipping malformed announcement: {}", e);
                None
            }
        })
        .collect())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateResponse {
    #[serde(default)]
    pub notification: Option<FeedNotification>,
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Response { status: u16, message: String },

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Where announcements come from.
#[async_trait]
pub trait AnnouncementSource: Send + Sync {
    async fn fetch_news(&self) -> Result<NewsResponse, FeedError>;
    async fn fetch_update(&self) -> Result<UpdateResponse, FeedError>;
}

/// Feed served by a lab server over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAnnouncementSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAnnouncementSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FeedError> {
        let url = self.endpoint(path);
        debug!("[announcements] GET {}", url);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            let message = serde_json::from_slice::<Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string());
            return Err(FeedError::Response {
                status: status.as_u16(),
                message,
            });
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl AnnouncementSource for HttpAnnouncementSource {
    async fn fetch_news(&self) -> Result<NewsResponse, FeedError> {
        self.get_json(NEWS_ENDPOINT).await
    }

    async fn fetch_update(&self) -> Result<UpdateResponse, FeedError> {
        self.get_json(UPDATE_ENDPOINT).await
    }
}
