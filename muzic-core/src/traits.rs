//! Common traits for muzic.
//!
//! These traits define the seams between the relay core and the outside
//! world, so a subprocess-backed resolver can be swapped for an in-memory
//! one in tests.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{MediaId, Resolution, SearchResult};

// ═══════════════════════════════════════════════════════════════════════════════
// RESOLVER TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Interface for turning identifiers into playable stream locations.
///
/// Implementations must be safe to call concurrently for different
/// identifiers. Concurrent calls for the *same* identifier are collapsed by
/// the single-flight coordinator before they reach the resolver.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Resolves an identifier to a stream location and metadata.
    ///
    /// This is the expensive call (network + parsing) the cache exists to
    /// avoid repeating.
    async fn resolve(&self, id: &MediaId) -> Result<Resolution>;

    /// Searches for media matching a free-text query.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>>;
}
