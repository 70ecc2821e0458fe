// src/llm/mod.rs
pub mod ollama;
pub mod session;

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::ingest::types::Article;

pub use ollama::OllamaClient;
pub use session::{AnswerChunk, SessionHandle, SessionManager};

/// Configuration for the generation backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub enabled: bool,
    pub url: String,
    pub model: String,
    /// Cap on how many articles a summary prompt may include.
    pub max_articles: usize,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "http://localhost:11434".to_string(),
            model: "qwen3:32b".to_string(),
            max_articles: 100,
            timeout_secs: 30,
        }
    }
}

/// Outcomes the generation subsystem hands to callers. A dedicated enum so the
/// UI can tell a disabled backend or a retired session from a transport failure.
#[derive(Debug)]
pub enum LlmError {
    /// The backend is switched off in config; no network was attempted.
    Disabled,
    Request(String),
    Api(String),
    Stream(String),
    /// The handle belongs to a session that a newer prompt retired.
    Superseded,
    /// The session already delivered its terminal chunk.
    SessionClosed,
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::Disabled => write!(f, "generation backend is disabled in config"),
            LlmError::Request(msg) => write!(f, "request failed: {msg}"),
            LlmError::Api(msg) => write!(f, "backend error: {msg}"),
            LlmError::Stream(msg) => write!(f, "stream error: {msg}"),
            LlmError::Superseded => write!(f, "session was superseded by a newer prompt"),
            LlmError::SessionClosed => write!(f, "session already delivered its final chunk"),
        }
    }
}

impl std::error::Error for LlmError {}

/// One unit of producer output. A stream is zero or more `Delta`s followed by
/// exactly one `Done` or `Failed`.
#[derive(Debug)]
pub enum StreamEvent {
    Delta(String),
    Done,
    Failed(LlmError),
}

#[async_trait::async_trait]
pub trait GenerateClient: Send + Sync {
    /// One complete answer for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;

    /// Stream the answer into `tx`: `Delta`s in production order, then exactly
    /// one terminal `Done`/`Failed`, then return (closing the channel).
    /// A disabled backend must send `Failed(LlmError::Disabled)` without any
    /// network I/O.
    async fn stream(&self, prompt: &str, tx: mpsc::Sender<StreamEvent>);
}

/// Prompt asking for a digest of one feed's recent articles.
pub fn summary_prompt(feed: &str, articles: &[Article], max_articles: usize) -> String {
    let mut prompt = format!(
        "Summarize the following articles from {feed} in a few short paragraphs.\n\n"
    );
    for article in articles.iter().filter(|a| a.feed == feed).take(max_articles) {
        prompt.push_str("Title: ");
        prompt.push_str(&article.title);
        prompt.push_str("\nContent: ");
        prompt.push_str(&article.content);
        prompt.push_str("\n\n");
    }
    prompt
}

/// Prompt seed for asking about a single article.
pub fn article_prompt(article: &Article) -> String {
    format!("Title: {}\nContent: {}\n\n", article.title, article.content)
}
