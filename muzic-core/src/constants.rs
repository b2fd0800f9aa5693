//! Shared constants for muzic.
//!
//! Defaults here are used by the component configs when nothing is set in the
//! environment.

// ═══════════════════════════════════════════════════════════════════════════════
// MEDIA IDENTIFIERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Exact length of a media identifier.
pub const MEDIA_ID_LEN: usize = 11;

/// Watch-page prefix the resolver expands an identifier into.
pub const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

// ═══════════════════════════════════════════════════════════════════════════════
// RESOLUTION CACHE
// ═══════════════════════════════════════════════════════════════════════════════

/// Default lifetime of a cached resolution in seconds (1 hour).
/// Upstream stream locations expire a few hours after they are issued.
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 3600;

/// Default maximum number of cached resolutions.
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 300;

// ═══════════════════════════════════════════════════════════════════════════════
// TIMEOUTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default upper bound on a single resolver call.
pub const DEFAULT_RESOLVE_TIMEOUT_SECONDS: u64 = 45;

/// Default connect timeout for upstream relay requests.
pub const DEFAULT_RELAY_CONNECT_TIMEOUT_SECONDS: u64 = 10;

/// Default read timeout for upstream relay requests.
///
/// Applies to the response head and to every gap between body chunks.
pub const DEFAULT_RELAY_READ_TIMEOUT_SECONDS: u64 = 30;

// ═══════════════════════════════════════════════════════════════════════════════
// RELAY
// ═══════════════════════════════════════════════════════════════════════════════

/// Content type reported when the upstream does not send one.
pub const DEFAULT_AUDIO_CONTENT_TYPE: &str = "audio/mpeg";

/// Number of results returned by a search.
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts_are_bounded() {
        assert!(DEFAULT_RESOLVE_TIMEOUT_SECONDS >= 10);
        assert!(DEFAULT_RELAY_CONNECT_TIMEOUT_SECONDS < DEFAULT_RELAY_READ_TIMEOUT_SECONDS);
    }
}
