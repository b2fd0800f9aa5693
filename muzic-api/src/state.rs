//! App state: cache, single-flight coordinator, resolver, relay, config.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use muzic_cache::{CacheConfig, ResolutionCache, SingleFlight};
use muzic_core::constants::{
    DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_TTL_SECONDS, DEFAULT_RELAY_CONNECT_TIMEOUT_SECONDS,
    DEFAULT_RELAY_READ_TIMEOUT_SECONDS, DEFAULT_RESOLVE_TIMEOUT_SECONDS,
};
use muzic_core::error::Result;
use muzic_core::traits::MediaResolver;
use muzic_core::types::MediaId;
use muzic_relay::{RelayConfig, RelayEngine};
use muzic_resolver::{YtDlpConfig, YtDlpResolver};

const DEFAULT_PORT: u16 = 5000;

#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Base URL clients use to reach this server; relay links are built from it
    pub public_url: String,
    pub port: u16,
    pub cache_ttl_seconds: u64,
    pub cache_max_entries: usize,
    pub resolve_timeout_seconds: u64,
    pub relay_connect_timeout_seconds: u64,
    pub relay_read_timeout_seconds: u64,
    pub ytdlp: YtDlpConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            public_url: local_url(DEFAULT_PORT),
            port: DEFAULT_PORT,
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            cache_max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            resolve_timeout_seconds: DEFAULT_RESOLVE_TIMEOUT_SECONDS,
            relay_connect_timeout_seconds: DEFAULT_RELAY_CONNECT_TIMEOUT_SECONDS,
            relay_read_timeout_seconds: DEFAULT_RELAY_READ_TIMEOUT_SECONDS,
            ytdlp: YtDlpConfig::default(),
        }
    }
}

fn local_url(port: u16) -> String {
    format!("http://localhost:{}", port)
}

/// Reads `key`, falling back to `default` when unset or unparsable.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "Ignoring unparsable environment value");
            default
        }),
        Err(_) => default,
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let port = env_or("PORT", DEFAULT_PORT);
        let mut ytdlp = YtDlpConfig::default();
        if let Ok(binary) = std::env::var("YTDLP_PATH") {
            ytdlp = ytdlp.with_binary(binary);
        }
        if let Ok(format) = std::env::var("YTDLP_FORMAT") {
            ytdlp = ytdlp.with_format(format);
        }

        Self {
            public_url: std::env::var("PUBLIC_URL").unwrap_or_else(|_| local_url(port)),
            port,
            cache_ttl_seconds: env_or("CACHE_TTL_SECONDS", DEFAULT_CACHE_TTL_SECONDS),
            cache_max_entries: env_or("CACHE_MAX_ENTRIES", DEFAULT_CACHE_MAX_ENTRIES),
            resolve_timeout_seconds: env_or("RESOLVE_TIMEOUT_SECONDS", DEFAULT_RESOLVE_TIMEOUT_SECONDS),
            relay_connect_timeout_seconds: env_or(
                "RELAY_CONNECT_TIMEOUT_SECONDS",
                DEFAULT_RELAY_CONNECT_TIMEOUT_SECONDS,
            ),
            relay_read_timeout_seconds: env_or(
                "RELAY_READ_TIMEOUT_SECONDS",
                DEFAULT_RELAY_READ_TIMEOUT_SECONDS,
            ),
            ytdlp,
        }
    }

    /// Overrides the public base URL.
    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = url.into();
        self
    }

    /// Relay link handed out for `id`.
    pub fn relay_url(&self, id: &MediaId) -> String {
        format!("{}/api/stream/{}", self.public_url.trim_end_matches('/'), id)
    }

    fn cache_config(&self) -> CacheConfig {
        CacheConfig::default()
            .with_max_entries(self.cache_max_entries)
            .with_ttl_seconds(self.cache_ttl_seconds)
    }

    fn relay_config(&self) -> RelayConfig {
        RelayConfig::default()
            .with_timeouts(self.relay_connect_timeout_seconds, self.relay_read_timeout_seconds)
    }
}

pub struct AppState {
    pub config: ApiConfig,
    pub cache: Arc<ResolutionCache>,
    pub flights: SingleFlight,
    pub resolver: Arc<dyn MediaResolver>,
    pub relay: RelayEngine,
}

impl AppState {
    /// Builds state backed by the yt-dlp resolver.
    pub fn new(config: ApiConfig) -> Result<Self> {
        let resolver = Arc::new(YtDlpResolver::with_config(config.ytdlp.clone()));
        Self::with_resolver(config, resolver)
    }

    /// Builds state around any resolver.
    pub fn with_resolver(config: ApiConfig, resolver: Arc<dyn MediaResolver>) -> Result<Self> {
        let cache = Arc::new(ResolutionCache::with_config(config.cache_config()));
        let flights = SingleFlight::with_timeout(
            Arc::clone(&cache),
            Duration::from_secs(config.resolve_timeout_seconds),
        );
        let relay = RelayEngine::with_config(config.relay_config())?;

        Ok(Self {
            config,
            cache,
            flights,
            resolver,
            relay,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_url() {
        let id = MediaId::new("dQw4w9WgXcQ").unwrap();

        let config = ApiConfig::default().with_public_url("https://muzic.example/");
        assert_eq!(config.relay_url(&id), "https://muzic.example/api/stream/dQw4w9WgXcQ");

        assert_eq!(
            ApiConfig::default().relay_url(&id),
            "http://localhost:5000/api/stream/dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.cache_ttl_seconds, 3600);
        assert_eq!(config.cache_max_entries, 300);
        assert_eq!(config.resolve_timeout_seconds, 45);
    }

    #[test]
    fn test_env_or_falls_back() {
        assert_eq!(env_or("MUZIC_TEST_SURELY_UNSET", 7u64), 7);
    }
}
