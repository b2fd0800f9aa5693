//! Resolved stream locations and search hits.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{MuzicError, Result};
use crate::types::MediaId;

/// A playable upstream location for a media identifier, plus metadata.
///
/// Produced by a [`MediaResolver`](crate::MediaResolver) and stored in the
/// resolution cache. The location is transient: upstream revokes it after
/// a few hours, or earlier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Identifier this resolution belongs to
    pub id: MediaId,
    /// Upstream URL of the audio stream
    pub stream_url: String,
    /// Human-readable title
    pub title: String,
    /// Duration in whole seconds
    pub duration_seconds: u64,
    /// Thumbnail URL, when the resolver provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl Resolution {
    /// Creates a resolution without a thumbnail.
    pub fn new(
        id: MediaId,
        stream_url: impl Into<String>,
        title: impl Into<String>,
        duration_seconds: u64,
    ) -> Self {
        Self {
            id,
            stream_url: stream_url.into(),
            title: title.into(),
            duration_seconds,
            thumbnail: None,
        }
    }

    /// Sets the thumbnail URL.
    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    /// Parses the stream URL, accepting only http(s) locations.
    pub fn stream_location(&self) -> Result<Url> {
        let url = Url::parse(&self.stream_url)?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(MuzicError::InvalidStreamLocation(format!(
                "unsupported scheme '{}'",
                other
            ))),
        }
    }
}

/// A single search hit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Raw identifier as reported by the resolver
    pub video_id: String,
    /// Title of the media
    pub title: String,
    /// Channel or uploader name
    pub uploader: String,
    /// Duration in whole seconds (0 when unknown)
    pub duration: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Resolution {
        Resolution::new(
            MediaId::new("dQw4w9WgXcQ").unwrap(),
            "https://cdn.example/a.mp4",
            "Sample",
            212,
        )
    }

    #[test]
    fn test_stream_location() {
        let url = sample().stream_location().unwrap();
        assert_eq!(url.host_str(), Some("cdn.example"));
    }

    #[test]
    fn test_stream_location_rejects_other_schemes() {
        let mut res = sample();
        res.stream_url = "file:///etc/passwd".into();
        assert!(matches!(
            res.stream_location(),
            Err(MuzicError::InvalidStreamLocation(_))
        ));

        res.stream_url = "not a url".into();
        assert!(res.stream_location().is_err());
    }

    #[test]
    fn test_thumbnail_skipped_when_absent() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("thumbnail").is_none());

        let json = serde_json::to_value(sample().with_thumbnail("https://i.example/t.jpg")).unwrap();
        assert_eq!(json["thumbnail"], "https://i.example/t.jpg");
    }
}
