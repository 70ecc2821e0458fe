// src/ingest/mod.rs
pub mod cache;
pub mod providers;
pub mod store;
pub mod summary;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::{Config, FeedSource};
use crate::ingest::cache::CacheFile;
use crate::ingest::providers::RssClient;
use crate::ingest::store::ArticleStore;
use crate::ingest::summary::{FeedSummary, SummaryStore};
use crate::ingest::types::{Article, SourceClient};

pub(crate) fn now_unix() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Normalize feed-provided text for display: decode HTML entities, strip tags,
/// collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();

    out.trim().to_string()
}

/// Fetches the configured feeds, merges the results into the article store and
/// mirrors them to the on-disk cache.
pub struct FeedManager {
    sources: Vec<FeedSource>,
    client: Arc<dyn SourceClient>,
    store: ArticleStore,
    summaries: SummaryStore,
    article_cache: CacheFile,
}

impl FeedManager {
    /// Build a manager over `cache_dir`, restoring cached articles and
    /// summaries before any network activity happens.
    pub fn new(
        sources: Vec<FeedSource>,
        client: Arc<dyn SourceClient>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        let cache_dir = cache_dir.into();
        let article_cache = CacheFile::new(cache_dir.join("feed_cache.json"));
        let store = ArticleStore::with_articles(article_cache.load());
        let summaries = SummaryStore::open(CacheFile::new(cache_dir.join("summaries.json")));
        Self {
            sources,
            client,
            store,
            summaries,
            article_cache,
        }
    }

    /// Production wiring: HTTP RSS client plus `~/.cache/tidings`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = RssClient::new(Duration::from_secs(config.fetch_timeout_secs))?;
        Ok(Self::new(
            config.feeds.clone(),
            Arc::new(client),
            default_cache_dir()?,
        ))
    }

    /// Fetch every source with a non-empty url in parallel and install the
    /// merged result. Sources keep their configuration order in the merged set.
    ///
    /// Partial failures keep the successful sources' articles; the first
    /// failure (in source order) becomes the returned error. Callers are
    /// expected to serialize refreshes — there is no internal queueing.
    pub async fn refresh(&self) -> Result<()> {
        let mut tasks = Vec::new();
        for source in &self.sources {
            // Aggregate pseudo-entries ("All") have no url and nothing to fetch.
            if source.url.is_empty() {
                continue;
            }
            let client = Arc::clone(&self.client);
            let source = source.clone();
            tasks.push((
                source.name.clone(),
                tokio::spawn(async move { client.fetch(&source).await }),
            ));
        }

        let mut merged: Vec<Article> = Vec::new();
        let mut first_err: Option<anyhow::Error> = None;
        for (name, task) in tasks {
            let outcome = match task.await {
                Ok(result) => result,
                Err(e) => Err(anyhow::Error::new(e).context("fetch task aborted")),
            };
            match outcome {
                Ok(mut articles) => {
                    tracing::debug!(source = %name, count = articles.len(), "fetched feed");
                    merged.append(&mut articles);
                }
                Err(e) => {
                    let e = e.context(format!("fetching {name}"));
                    tracing::warn!(source = %name, error = ?e, "feed fetch failed");
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
            }
        }

        self.store.replace(merged);
        if let Err(e) = self.article_cache.save(&self.store.snapshot()) {
            tracing::warn!(error = ?e, "failed to save feed cache");
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Point-in-time copy of the current article set.
    pub fn articles(&self) -> Vec<Article> {
        self.store.snapshot()
    }

    pub fn store(&self) -> &ArticleStore {
        &self.store
    }

    pub fn summary(&self, feed: &str) -> Option<FeedSummary> {
        self.summaries.get(feed)
    }

    pub fn set_summary(&self, feed: &str, summary: String, article_count: usize) {
        self.summaries.set(feed, summary, article_count);
    }
}

fn default_cache_dir() -> Result<PathBuf> {
    let base = dirs::cache_dir().context("resolving user cache directory")?;
    Ok(base.join("tidings"))
}
