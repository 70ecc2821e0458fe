// src/ingest/store.rs
use std::sync::RwLock;

use crate::ingest::types::Article;

/// Holder of the current merged article set. Many concurrent `snapshot`
/// readers; `replace` takes the write lock for the swap only, so a refresh in
/// progress never exposes partial results.
#[derive(Debug)]
pub struct ArticleStore {
    inner: RwLock<Vec<Article>>,
}

impl ArticleStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Vec::new()),
        }
    }

    pub fn with_articles(articles: Vec<Article>) -> Self {
        Self {
            inner: RwLock::new(articles),
        }
    }

    /// Install a freshly merged set, atomically replacing the previous one.
    pub fn replace(&self, articles: Vec<Article>) {
        let mut guard = self.inner.write().expect("article store lock poisoned");
        *guard = articles;
    }

    /// Point-in-time copy. The returned vec never aliases the live set, so
    /// callers can iterate or mutate it freely while refreshes continue.
    pub fn snapshot(&self) -> Vec<Article> {
        self.inner.read().expect("article store lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("article store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ArticleStore {
    fn default() -> Self {
        Self::new()
    }
}
