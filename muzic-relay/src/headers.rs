//! Header policy between upstream and client.
//!
//! Upstream → client is an allow-list: only the headers a player needs for
//! seeking are copied, everything else (cookies, CDN diagnostics, framing)
//! stays behind. `Content-Encoding`, `Transfer-Encoding` and `Connection` are
//! never forwarded; [`STRIPPED_HEADERS`] names them for callers and tests.

use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT_ENCODING, ACCEPT_RANGES, CONNECTION, CONTENT_ENCODING,
    CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE, TRANSFER_ENCODING, USER_AGENT,
};
use reqwest::header::HeaderName;

use muzic_core::constants::DEFAULT_AUDIO_CONTENT_TYPE;

/// Headers that describe the upstream hop's framing and must not reach the client.
pub const STRIPPED_HEADERS: [HeaderName; 3] = [CONTENT_ENCODING, TRANSFER_ENCODING, CONNECTION];

/// Builds the headers sent upstream.
///
/// The client's `Range` is copied byte for byte; without one the full
/// resource is requested. `Accept-Encoding: identity` keeps the body
/// un-encoded so dropping `Content-Encoding` on the way back is safe.
pub fn upstream_request_headers(range: Option<&HeaderValue>, user_agent: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(range) = range {
        headers.insert(RANGE, range.clone());
    }
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
    if let Some(ua) = user_agent.and_then(|ua| HeaderValue::from_str(ua).ok()) {
        headers.insert(USER_AGENT, ua);
    }
    headers
}

fn is_chunked(upstream: &HeaderMap) -> bool {
    upstream
        .get_all(TRANSFER_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.to_ascii_lowercase().contains("chunked"))
}

/// Builds the client-facing headers from the upstream response headers.
///
/// - `Content-Type` is copied, defaulting to `audio/mpeg`
/// - `Content-Range` is copied when present
/// - `Content-Length` is copied only for a non-chunked upstream body
/// - `Accept-Ranges: bytes` is always set
pub fn client_response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();

    let content_type = upstream
        .get(CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_AUDIO_CONTENT_TYPE));
    headers.insert(CONTENT_TYPE, content_type);

    if let Some(range) = upstream.get(CONTENT_RANGE) {
        headers.insert(CONTENT_RANGE, range.clone());
    }

    if !is_chunked(upstream) {
        if let Some(len) = upstream.get(CONTENT_LENGTH) {
            headers.insert(CONTENT_LENGTH, len.clone());
        }
    }

    headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers
}
