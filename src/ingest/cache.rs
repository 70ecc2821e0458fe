// src/ingest/cache.rs
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// One durable JSON image of an in-memory structure. The reader pre-populates
/// its stores from these at startup, before any network activity.
#[derive(Debug)]
pub struct CacheFile {
    path: PathBuf,
}

impl CacheFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is the empty state. Anything else that goes wrong is
    /// logged and also treated as empty, so a bad cache never blocks startup.
    pub fn load<T: DeserializeOwned + Default>(&self) -> T {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
            Err(e) => {
                tracing::warn!(error = %e, path = %self.path.display(), "failed to read cache file");
                return T::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, path = %self.path.display(), "discarding malformed cache file");
                T::default()
            }
        }
    }

    /// Write-to-temp-then-rename, so a crash mid-write cannot corrupt the
    /// previous valid image.
    pub fn save<T: Serialize>(&self, value: &T) -> Result<()> {
        let dir = self
            .path
            .parent()
            .context("cache path has no parent directory")?;
        fs::create_dir_all(dir)
            .with_context(|| format!("creating cache dir {}", dir.display()))?;

        let data = serde_json::to_vec_pretty(value).context("serializing cache image")?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &data).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}
