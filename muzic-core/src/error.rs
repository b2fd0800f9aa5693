//! Error types for muzic.
//!
//! One `thiserror` enum covers resolution, relay and configuration failures.
//! The enum is `Clone` because a single resolution failure is broadcast to
//! every request waiting on the same identifier.

use thiserror::Error;

/// Result type alias using `MuzicError`.
pub type Result<T> = std::result::Result<T, MuzicError>;

/// Main error type for all muzic operations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MuzicError {
    // ═══════════════════════════════════════════════════════════════════════════
    // CLIENT ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Identifier does not match the expected media id format.
    #[error("Invalid video ID: {0}")]
    InvalidIdentifier(String),

    /// Search query is empty or unusable.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // RESOLUTION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The resolver could not produce a stream location.
    #[error("Resolution failed for '{id}': {reason}")]
    ResolutionFailed { id: String, reason: String },

    /// The resolver did not answer within the resolution timeout.
    #[error("Resolution of '{id}' timed out after {seconds}s")]
    ResolutionTimeout { id: String, seconds: u64 },

    /// The resolver answered but without any playable stream.
    #[error("No stream URL found for '{0}'")]
    NoStreamLocation(String),

    /// Search through the resolver failed.
    #[error("Search failed: {0}")]
    SearchFailed(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // RELAY ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Upstream rejected a previously resolved location (expired or revoked).
    #[error("Stream location rejected by upstream with HTTP {status}")]
    StaleLocation { status: u16 },

    /// Upstream answered with a status the relay does not pass through.
    #[error("Unexpected upstream status: HTTP {status}")]
    UpstreamStatus { status: u16 },

    /// Upstream did not answer within the relay read timeout.
    #[error("Upstream timeout after {seconds}s")]
    UpstreamTimeout { seconds: u64 },

    /// Upstream connection or transfer failed.
    #[error("Upstream request failed: {0}")]
    HttpError(String),

    /// The resolved stream location is not a usable URL.
    #[error("Invalid stream location: {0}")]
    InvalidStreamLocation(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // SERIALIZATION & I/O ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(String),

    /// Process or file I/O error.
    #[error("I/O error: {0}")]
    IoError(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal invariant violation (should never happen).
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl MuzicError {
    /// Returns true if the upstream rejected the stream location itself,
    /// meaning the cached resolution must be discarded.
    pub fn is_stale_location(&self) -> bool {
        matches!(self, MuzicError::StaleLocation { .. })
    }

    /// Returns true if this error was caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            MuzicError::InvalidIdentifier(_) | MuzicError::InvalidQuery(_)
        )
    }

    /// Returns true if this error happened while talking to the upstream
    /// stream location (as opposed to the resolver).
    pub fn is_upstream_error(&self) -> bool {
        matches!(
            self,
            MuzicError::StaleLocation { .. }
                | MuzicError::UpstreamStatus { .. }
                | MuzicError::UpstreamTimeout { .. }
                | MuzicError::HttpError(_)
                | MuzicError::InvalidStreamLocation(_)
        )
    }

    /// Returns true if a fresh client request may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MuzicError::ResolutionTimeout { .. }
                | MuzicError::StaleLocation { .. }
                | MuzicError::UpstreamTimeout { .. }
                | MuzicError::HttpError(_)
        )
    }
}

impl From<serde_json::Error> for MuzicError {
    fn from(err: serde_json::Error) -> Self {
        MuzicError::JsonError(err.to_string())
    }
}

impl From<std::io::Error> for MuzicError {
    fn from(err: std::io::Error) -> Self {
        MuzicError::IoError(err.to_string())
    }
}

impl From<url::ParseError> for MuzicError {
    fn from(err: url::ParseError) -> Self {
        MuzicError::InvalidStreamLocation(err.to_string())
    }
}
