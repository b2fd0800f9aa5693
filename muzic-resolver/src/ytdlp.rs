//! yt-dlp backed resolver.
//!
//! Each call spawns `yt-dlp` with `--dump-single-json` and parses its
//! stdout. The child is killed if the calling future is dropped, so a
//! client disconnect or resolution timeout never leaves a stray process.

use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use muzic_core::error::{MuzicError, Result};
use muzic_core::traits::MediaResolver;
use muzic_core::types::{MediaId, Resolution, SearchResult};

/// yt-dlp resolver configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct YtDlpConfig {
    /// Path or name of the yt-dlp binary
    pub binary: String,
    /// Format selector passed to `-f`
    pub format: String,
    /// Socket timeout handed to yt-dlp, in seconds
    pub socket_timeout_seconds: u64,
    /// Extra arguments appended before the URL
    pub extra_args: Vec<String>,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".into(),
            format: "bestaudio/best".into(),
            socket_timeout_seconds: 30,
            extra_args: Vec::new(),
        }
    }
}

impl YtDlpConfig {
    /// Uses a specific yt-dlp binary.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Uses a specific format selector.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }
}

/// Resolver that shells out to yt-dlp.
pub struct YtDlpResolver {
    config: YtDlpConfig,
}

impl YtDlpResolver {
    /// Creates a resolver with default configuration.
    pub fn new() -> Self {
        Self::with_config(YtDlpConfig::default())
    }

    /// Creates a resolver with custom configuration.
    pub fn with_config(config: YtDlpConfig) -> Self {
        Self { config }
    }

    fn common_args(&self) -> Vec<String> {
        vec![
            "--dump-single-json".into(),
            "--skip-download".into(),
            "--no-warnings".into(),
            "--no-progress".into(),
            "--socket-timeout".into(),
            self.config.socket_timeout_seconds.to_string(),
        ]
    }

    fn resolve_args(&self, id: &MediaId) -> Vec<String> {
        let mut args = self.common_args();
        args.extend([
            "--no-playlist".into(),
            "-f".into(),
            self.config.format.clone(),
        ]);
        args.extend(self.config.extra_args.iter().cloned());
        args.push(id.watch_url());
        args
    }

    fn search_args(&self, query: &str, limit: usize) -> Vec<String> {
        let mut args = self.common_args();
        args.push("--flat-playlist".into());
        args.extend(self.config.extra_args.iter().cloned());
        args.push(format!("ytsearch{}:{}", limit, query));
        args
    }

    /// Runs yt-dlp and returns its stdout, or the last stderr line as reason.
    async fn run(&self, args: &[String]) -> std::result::Result<Vec<u8>, String> {
        let output = Command::new(&self.config.binary)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| format!("failed to run {}: {}", self.config.binary, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("no error output")
                .trim()
                .to_string();
            return Err(format!("{} exited with {}: {}", self.config.binary, output.status, reason));
        }

        Ok(output.stdout)
    }
}

impl Default for YtDlpResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    #[instrument(skip(self), fields(id = %id))]
    async fn resolve(&self, id: &MediaId) -> Result<Resolution> {
        debug!("Running yt-dlp");

        let stdout = self
            .run(&self.resolve_args(id))
            .await
            .map_err(|reason| {
                warn!(%reason, "yt-dlp failed");
                MuzicError::ResolutionFailed {
                    id: id.to_string(),
                    reason,
                }
            })?;

        parse_video_info(id, &stdout)
    }

    #[instrument(skip(self))]
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(MuzicError::InvalidQuery("Query required".into()));
        }

        let stdout = self
            .run(&self.search_args(query, limit))
            .await
            .map_err(MuzicError::SearchFailed)?;

        let mut results = parse_search_results(&stdout)?;
        results.truncate(limit);
        debug!(count = results.len(), "Search complete");
        Ok(results)
    }
}

/// Subset of yt-dlp's info dict for a single video.
#[derive(Debug, Deserialize)]
struct VideoInfo {
    url: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    #[serde(default)]
    requested_formats: Vec<FormatInfo>,
}

#[derive(Debug, Deserialize)]
struct FormatInfo {
    url: Option<String>,
    vcodec: Option<String>,
}

/// Subset of yt-dlp's playlist dict for a flat search.
#[derive(Debug, Deserialize)]
struct SearchInfo {
    #[serde(default)]
    entries: Vec<SearchEntry>,
}

#[derive(Debug, Deserialize)]
struct SearchEntry {
    id: Option<String>,
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    duration: Option<f64>,
}

fn whole_seconds(duration: Option<f64>) -> u64 {
    duration
        .filter(|d| d.is_finite() && *d > 0.0)
        .map(|d| d.round() as u64)
        .unwrap_or(0)
}

fn parse_video_info(id: &MediaId, stdout: &[u8]) -> Result<Resolution> {
    let info: VideoInfo = serde_json::from_slice(stdout).map_err(|e| MuzicError::ResolutionFailed {
        id: id.to_string(),
        reason: format!("unreadable yt-dlp output: {}", e),
    })?;

    // Merged formats carry no top-level url; take the audio-only part.
    let stream_url = info.url.or_else(|| {
        info.requested_formats
            .into_iter()
            .filter(|f| f.vcodec.as_deref() == Some("none"))
            .find_map(|f| f.url)
    });

    let stream_url = stream_url.ok_or_else(|| MuzicError::NoStreamLocation(id.to_string()))?;

    let mut resolution = Resolution::new(
        id.clone(),
        stream_url,
        info.title.unwrap_or_else(|| "Unknown".into()),
        whole_seconds(info.duration),
    );
    resolution.thumbnail = info.thumbnail.filter(|t| !t.is_empty());
    Ok(resolution)
}

fn parse_search_results(stdout: &[u8]) -> Result<Vec<SearchResult>> {
    let info: SearchInfo = serde_json::from_slice(stdout)
        .map_err(|e| MuzicError::SearchFailed(format!("unreadable yt-dlp output: {}", e)))?;

    Ok(info
        .entries
        .into_iter()
        .filter_map(|e| {
            Some(SearchResult {
                video_id: e.id?,
                title: e.title.unwrap_or_default(),
                uploader: e.uploader.or(e.channel).unwrap_or_else(|| "Unknown".into()),
                duration: whole_seconds(e.duration),
            })
        })
        .collect())
}
