//! DTOs for API requests and responses.

use serde::{Deserialize, Serialize};

use muzic_cache::CacheStats;
use muzic_core::types::{Resolution, SearchResult};

/// Response for `GET /api/music/{id}`.
#[derive(Debug, Serialize)]
pub struct MusicResponse {
    /// Always true; failures use the error body
    pub success: bool,
    /// Relay link on this server, not the upstream location
    pub stream_url: String,
    pub title: String,
    /// Duration in seconds
    pub duration: u64,
    pub thumbnail: Option<String>,
}

impl MusicResponse {
    pub fn new(resolution: Resolution, stream_url: String) -> Self {
        Self {
            success: true,
            stream_url,
            title: resolution.title,
            duration: resolution.duration_seconds,
            thumbnail: resolution.thumbnail,
        }
    }
}

/// Request for `POST /api/search`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
}

/// Response for `POST /api/search`.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub results: Vec<SearchResult>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
}

/// Cache diagnostics.
#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    #[serde(flatten)]
    pub cache: CacheStats,
    /// Resolutions currently in flight
    pub in_flight: usize,
}
