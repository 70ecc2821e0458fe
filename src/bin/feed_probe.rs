//! Demo that refreshes the configured feeds once and, given an argument,
//! streams one answer from the generation backend.

use std::sync::Arc;

use tidings::llm::{OllamaClient, SessionManager};
use tidings::{Config, FeedManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = Config::load()?;
    let manager = FeedManager::from_config(&config)?;

    if let Err(e) = manager.refresh().await {
        tracing::warn!(error = ?e, "refresh finished with a failing source");
    }
    for article in manager.articles().iter().take(10) {
        println!("[{}] {}", article.feed, article.title);
    }

    if let Some(prompt) = std::env::args().nth(1) {
        let client = OllamaClient::new(config.generation.clone())?;
        let sessions = SessionManager::new(Arc::new(client));
        let handle = sessions.start(prompt);
        loop {
            match sessions.next(&handle).await {
                Ok(chunk) if chunk.last => break,
                Ok(chunk) => print!("{}", chunk.text),
                Err(e) => {
                    eprintln!("generation failed: {e}");
                    break;
                }
            }
        }
        println!();
    }

    Ok(())
}
