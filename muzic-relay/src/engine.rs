//! Upstream request + streamed response.

use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use muzic_core::constants::{
    DEFAULT_RELAY_CONNECT_TIMEOUT_SECONDS, DEFAULT_RELAY_READ_TIMEOUT_SECONDS,
};
use muzic_core::error::{MuzicError, Result};

use crate::headers::{client_response_headers, upstream_request_headers};

/// Body of a relayed response: upstream chunks, in order, as they arrive.
///
/// An `Err` item means the transfer broke mid-stream; the response must be
/// terminated rather than completed.
pub type RelayBody = BoxStream<'static, Result<Bytes>>;

/// Relay configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayConfig {
    /// TCP/TLS connect timeout in seconds
    pub connect_timeout_seconds: u64,
    /// Maximum wait for the response head and between body chunks, in seconds
    pub read_timeout_seconds: u64,
    /// User-Agent sent upstream
    pub user_agent: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: DEFAULT_RELAY_CONNECT_TIMEOUT_SECONDS,
            read_timeout_seconds: DEFAULT_RELAY_READ_TIMEOUT_SECONDS,
            user_agent: Some(concat!("muzic/", env!("CARGO_PKG_VERSION")).into()),
        }
    }
}

impl RelayConfig {
    /// Sets both timeouts.
    pub fn with_timeouts(mut self, connect_seconds: u64, read_seconds: u64) -> Self {
        self.connect_timeout_seconds = connect_seconds;
        self.read_timeout_seconds = read_seconds;
        self
    }

    fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_seconds)
    }
}

/// A relayed response, ready to be handed to the HTTP layer.
pub struct RelayResponse {
    /// Upstream status, unchanged
    pub status: StatusCode,
    /// Client-facing headers (see [`crate::headers`])
    pub headers: HeaderMap,
    /// Streamed body
    pub body: RelayBody,
}

impl std::fmt::Debug for RelayResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Streams upstream resources to clients.
///
/// Holds one pooled HTTP client; clone-free sharing through `Arc` is
/// expected.
pub struct RelayEngine {
    client: reqwest::Client,
    config: RelayConfig,
}

impl RelayEngine {
    /// Creates an engine with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(RelayConfig::default())
    }

    /// Creates an engine with custom configuration.
    pub fn with_config(config: RelayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .build()
            .map_err(|e| MuzicError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Requests `location` upstream and returns the response to stream back.
    ///
    /// Fails before any byte is produced if the upstream cannot be reached,
    /// times out, or answers with a status that is not relayed. 403, 404 and
    /// 410 are reported as [`MuzicError::StaleLocation`].
    #[instrument(skip(self, location, range), fields(host = location.host_str().unwrap_or(""), range = ?range))]
    pub async fn relay(&self, location: &Url, range: Option<&HeaderValue>) -> Result<RelayResponse> {
        let request = self
            .client
            .get(location.clone())
            .headers(upstream_request_headers(range, self.config.user_agent.as_deref()));

        let read_timeout = self.config.read_timeout();
        let response = match tokio::time::timeout(read_timeout, request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(map_transport_error(e, self.config.read_timeout_seconds)),
            Err(_) => {
                warn!(seconds = self.config.read_timeout_seconds, "Upstream response timed out");
                return Err(MuzicError::UpstreamTimeout {
                    seconds: self.config.read_timeout_seconds,
                });
            }
        };

        let status = response.status();
        classify_status(status)?;

        let headers = client_response_headers(response.headers());
        debug!(%status, content_range = ?headers.get(reqwest::header::CONTENT_RANGE), "Relaying");

        let body = idle_timeout_stream(
            Box::pin(response.bytes_stream()),
            read_timeout,
            self.config.read_timeout_seconds,
        );

        Ok(RelayResponse {
            status,
            headers,
            body: body.boxed(),
        })
    }
}

/// Decides whether an upstream status is passed through to the client.
fn classify_status(status: StatusCode) -> Result<()> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::RANGE_NOT_SATISFIABLE => Ok(()),
        StatusCode::FORBIDDEN | StatusCode::NOT_FOUND | StatusCode::GONE => {
            warn!(%status, "Upstream rejected stream location");
            Err(MuzicError::StaleLocation { status: status.as_u16() })
        }
        _ => {
            warn!(%status, "Unexpected upstream status");
            Err(MuzicError::UpstreamStatus { status: status.as_u16() })
        }
    }
}

fn map_transport_error(err: reqwest::Error, read_timeout_seconds: u64) -> MuzicError {
    if err.is_timeout() {
        MuzicError::UpstreamTimeout {
            seconds: read_timeout_seconds,
        }
    } else {
        warn!(error = %err, "Upstream request failed");
        MuzicError::HttpError(err.to_string())
    }
}

/// Forwards upstream chunks, ending the stream with an error if no chunk
/// arrives within `idle`. The first error is the last item.
fn idle_timeout_stream<S>(upstream: S, idle: Duration, idle_seconds: u64) -> impl Stream<Item = Result<Bytes>>
where
    S: Stream<Item = reqwest::Result<Bytes>> + Unpin + Send + 'static,
{
    stream::unfold(Some((upstream, 0u64)), move |state| async move {
        let (mut upstream, sent) = state?;

        match tokio::time::timeout(idle, upstream.next()).await {
            Ok(Some(Ok(chunk))) => {
                let sent = sent + chunk.len() as u64;
                Some((Ok(chunk), Some((upstream, sent))))
            }
            Ok(Some(Err(e))) => {
                warn!(bytes = sent, error = %e, "Upstream stream broke");
                Some((Err(MuzicError::HttpError(e.to_string())), None))
            }
            Ok(None) => {
                debug!(bytes = sent, "Upstream stream complete");
                None
            }
            Err(_) => {
                warn!(bytes = sent, seconds = idle_seconds, "Upstream stream stalled");
                Some((Err(MuzicError::UpstreamTimeout { seconds: idle_seconds }), None))
            }
        }
    })
}
