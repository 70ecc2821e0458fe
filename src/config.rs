// src/config.rs
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::llm::GenerationConfig;

/// One configured feed. An empty `url` marks an aggregate pseudo-entry (the
/// "All" row in the reader) that is never fetched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedSource {
    pub name: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feeds: Vec<FeedSource>,
    /// Per-request timeout applied to each feed fetch.
    pub fetch_timeout_secs: u64,
    pub generation: GenerationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feeds: Vec::new(),
            fetch_timeout_secs: 30,
            generation: GenerationConfig::default(),
        }
    }
}

const DEFAULT_CONFIG: &str = r#"# tidings configuration

fetch_timeout_secs = 30

[[feeds]]
name = "All"
url = ""

[[feeds]]
name = "Rust Blog"
url = "https://blog.rust-lang.org/feed.xml"

[generation]
enabled = true
url = "http://localhost:11434"
model = "qwen3:32b"
max_articles = 100
timeout_secs = 30
"#;

impl Config {
    /// Load from `~/.config/tidings/config.toml`, writing a commented default
    /// file first if none exists yet.
    pub fn load() -> Result<Self> {
        let dir = dirs::config_dir()
            .context("resolving user config directory")?
            .join("tidings");
        let path = dir.join("config.toml");
        if !path.exists() {
            fs::create_dir_all(&dir)
                .with_context(|| format!("creating config dir {}", dir.display()))?;
            fs::write(&path, DEFAULT_CONFIG)
                .with_context(|| format!("writing default config to {}", path.display()))?;
            tracing::info!(path = %path.display(), "created default config file");
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let config: Config =
            toml::from_str(&raw).with_context(|| format!("parsing config from {}", path.display()))?;
        Ok(config)
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(dirs::config_dir()
            .context("resolving user config directory")?
            .join("tidings")
            .join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_file_parses() {
        let cfg: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(cfg.feeds.len(), 2);
        assert_eq!(cfg.feeds[0].name, "All");
        assert!(cfg.feeds[0].url.is_empty());
        assert!(cfg.generation.enabled);
        assert_eq!(cfg.generation.model, "qwen3:32b");
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert!(cfg.feeds.is_empty());
        assert_eq!(cfg.fetch_timeout_secs, 30);
        assert_eq!(cfg.generation.url, "http://localhost:11434");
    }

    #[test]
    fn load_from_reads_a_file_and_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        fs::write(&path, "[[feeds]]\nname = \"X\"\nurl = \"https://x.test/rss\"\n").unwrap();
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.feeds[0].name, "X");

        fs::write(&path, "feeds = 3").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
