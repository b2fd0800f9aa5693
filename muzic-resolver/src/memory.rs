//! In-memory resolver.
//!
//! Serves resolutions from a table filled in by the caller. Suitable for
//! development without yt-dlp installed, and for tests that need to count
//! or slow down resolver calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use muzic_core::error::{MuzicError, Result};
use muzic_core::traits::MediaResolver;
use muzic_core::types::{MediaId, Resolution, SearchResult};

/// In-memory resolver backed by a lookup table.
#[derive(Debug, Default)]
pub struct MemoryResolver {
    resolutions: RwLock<HashMap<MediaId, Resolution>>,
    failures: RwLock<HashMap<MediaId, MuzicError>>,
    catalog: RwLock<Vec<SearchResult>>,
    delay: Option<Duration>,
    resolve_calls: AtomicUsize,
}

impl MemoryResolver {
    /// Creates an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `resolve` call sleep first, to widen race windows in tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Registers a resolution, replacing any earlier one for the same id.
    pub fn insert(&self, resolution: Resolution) {
        let id = resolution.id.clone();
        self.failures.write().remove(&id);
        self.resolutions.write().insert(id, resolution);
    }

    /// Makes `resolve(id)` fail with `error`.
    pub fn fail(&self, id: MediaId, error: MuzicError) {
        self.resolutions.write().remove(&id);
        self.failures.write().insert(id, error);
    }

    /// Adds an entry to the search catalog.
    pub fn add_search_result(&self, result: SearchResult) {
        self.catalog.write().push(result);
    }

    /// Returns how many times `resolve` has been called.
    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaResolver for MemoryResolver {
    async fn resolve(&self, id: &MediaId) -> Result<Resolution> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        debug!(%id, "Memory resolve");

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.failures.read().get(id) {
            return Err(err.clone());
        }

        self.resolutions
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| MuzicError::ResolutionFailed {
                id: id.to_string(),
                reason: "Video unavailable".into(),
            })
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Err(MuzicError::InvalidQuery("Query required".into()));
        }

        Ok(self
            .catalog
            .read()
            .iter()
            .filter(|r| r.title.to_lowercase().contains(&query))
            .take(limit)
            .cloned()
            .collect())
    }
}
