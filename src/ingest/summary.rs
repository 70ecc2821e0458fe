// src/ingest/summary.rs
use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::ingest::cache::CacheFile;
use crate::ingest::now_unix;

/// A generated per-feed summary, kept alongside the articles it was built from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedSummary {
    pub feed: String,
    pub summary: String,
    pub generated_at: u64, // unix seconds
    pub article_count: usize,
}

#[derive(Debug)]
pub struct SummaryStore {
    inner: Mutex<HashMap<String, FeedSummary>>,
    cache: CacheFile,
}

impl SummaryStore {
    /// Restore previously generated summaries from the cache file.
    pub fn open(cache: CacheFile) -> Self {
        let initial: HashMap<String, FeedSummary> = cache.load();
        Self {
            inner: Mutex::new(initial),
            cache,
        }
    }

    pub fn get(&self, feed: &str) -> Option<FeedSummary> {
        self.inner
            .lock()
            .expect("summary store lock poisoned")
            .get(feed)
            .cloned()
    }

    /// Insert or overwrite the summary for `feed` and mirror the map to disk.
    /// A failed save is logged, never surfaced.
    pub fn set(&self, feed: &str, summary: String, article_count: usize) {
        let entry = FeedSummary {
            feed: feed.to_string(),
            summary,
            generated_at: now_unix(),
            article_count,
        };
        let image = {
            let mut map = self.inner.lock().expect("summary store lock poisoned");
            map.insert(feed.to_string(), entry);
            map.clone()
        };
        if let Err(e) = self.cache.save(&image) {
            tracing::warn!(error = ?e, "failed to save summary cache");
        }
    }
}
