// src/ingest/providers/rss.rs
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

use crate::config::FeedSource;
use crate::ingest::types::{Article, SourceClient};
use crate::ingest::{normalize_text, now_unix};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    #[serde(rename = "encoded")]
    content: Option<String>,
}

fn parse_rfc2822_to_unix(ts: &str) -> Option<u64> {
    OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
        .and_then(|x| u64::try_from(x).ok())
}

/// HTTP RSS 2.0 source. One shared client carries the caller-supplied
/// per-request timeout.
pub struct RssClient {
    http: reqwest::Client,
}

impl RssClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building http client")?;
        Ok(Self { http })
    }

    /// Parse one RSS document into articles owned by `feed_name`.
    /// Items with neither a title nor any text are dropped.
    pub fn articles_from_str(xml: &str, feed_name: &str) -> Result<Vec<Article>> {
        let rss: Rss = from_str(xml).with_context(|| format!("parsing rss xml for {feed_name}"))?;
        let now = now_unix();

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let title = it.title.as_deref().unwrap_or_default().trim().to_string();
            let description = normalize_text(it.description.as_deref().unwrap_or_default());
            let content = match it.content {
                Some(body) if !body.trim().is_empty() => body,
                _ => description.clone(),
            };
            if title.is_empty() && content.is_empty() {
                continue;
            }
            out.push(Article {
                title,
                description,
                content,
                link: it.link.unwrap_or_default(),
                published_at: it
                    .pub_date
                    .as_deref()
                    .and_then(parse_rfc2822_to_unix)
                    .unwrap_or(now),
                feed: feed_name.to_string(),
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl SourceClient for RssClient {
    async fn fetch(&self, source: &FeedSource) -> Result<Vec<Article>> {
        let response = self
            .http
            .get(&source.url)
            .send()
            .await
            .with_context(|| format!("requesting {}", source.url))?;
        let response = response
            .error_for_status()
            .with_context(|| format!("fetching {}", source.url))?;
        let body = response.text().await.context("reading rss body")?;
        Self::articles_from_str(&body, &source.name)
    }

    fn name(&self) -> &'static str {
        "rss"
    }
}
