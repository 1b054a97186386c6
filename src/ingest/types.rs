// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};

/// One announcement as read from the exchange feed.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String, // may embed "Scrip Code: ..." and "Category: ..."
    pub published_at: Option<DateTime<Utc>>,
    pub document_url: Option<String>, // attached filing (PDF), if any
}

impl FeedItem {
    /// Blank title or link means the feed entry is unusable.
    pub fn is_malformed(&self) -> bool {
        self.title.trim().is_empty() || self.link.trim().is_empty()
    }
}

#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    /// Items in feed order (newest first, as the exchange publishes them).
    async fn fetch_items(&self) -> Result<Vec<FeedItem>>;
    fn name(&self) -> &'static str;
}
