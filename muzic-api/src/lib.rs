//! # Muzic API Server
//!
//! HTTP front for the resolution cache and streaming relay.
//!
//! ## Endpoints
//!
//! - `GET /api/status` - Health check
//! - `GET /api/music/:id` - Resolve an identifier to metadata and a relay link
//! - `GET /api/stream/:id` - Relay the audio stream, honouring `Range`
//! - `POST /api/search` - Search by free-text query
//! - `GET /api/cache/stats` - Cache and in-flight diagnostics
//!
//! ## Example
//!
//! ```rust,ignore
//! use muzic_api::{ApiServer, ApiConfig};
//!
//! let config = ApiConfig::from_env();
//! let server = ApiServer::new(config)?;
//! server.run(([0, 0, 0, 0], 5000)).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod routes;
mod handlers;
mod state;
mod dto;
mod error;

pub use routes::create_router;
pub use state::{AppState, ApiConfig};
pub use error::ApiError;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// API server for muzic.
pub struct ApiServer {
    state: Arc<AppState>,
}

impl ApiServer {
    /// Creates a new API server backed by the yt-dlp resolver.
    pub fn new(config: ApiConfig) -> muzic_core::Result<Self> {
        Ok(Self::with_state(Arc::new(AppState::new(config)?)))
    }

    /// Creates a server around pre-built state.
    pub fn with_state(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Creates the router with all routes configured.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers(Any);

        create_router(self.state.clone())
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Runs the server on the given address.
    pub async fn run(self, addr: impl Into<SocketAddr>) -> std::io::Result<()> {
        let addr = addr.into();
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!(
            %addr,
            public_url = %self.state.config.public_url,
            "muzic API server listening"
        );

        axum::serve(listener, self.router()).await
    }
}

/// Starts the API server with configuration from the environment.
pub async fn start_server() -> std::io::Result<()> {
    let config = ApiConfig::from_env();
    let port = config.port;
    let server = ApiServer::new(config).map_err(std::io::Error::other)?;
    server.run(([0, 0, 0, 0], port)).await
}
