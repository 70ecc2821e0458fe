// src/ingest/types.rs
use anyhow::Result;

use crate::config::FeedSource;

/// One feed item, immutable once it lands in the store.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub description: String,
    /// Full item body; falls back to the description when the feed carries none.
    pub content: String,
    pub link: String,
    pub published_at: u64, // unix seconds
    pub feed: String,      // owning source name
}

#[async_trait::async_trait]
pub trait SourceClient: Send + Sync {
    async fn fetch(&self, source: &FeedSource) -> Result<Vec<Article>>;
    fn name(&self) -> &'static str;
}
