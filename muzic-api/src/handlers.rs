//! API route handlers.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue},
    response::Response,
    Json,
};
use tracing::{debug, info, instrument};

use muzic_core::constants::DEFAULT_SEARCH_LIMIT;
use muzic_core::types::{MediaId, Resolution};
use muzic_relay::RelayResponse;

use crate::dto::*;
use crate::error::ApiError;
use crate::state::AppState;

type Result<T> = std::result::Result<T, ApiError>;

/// Where a resolution came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Origin {
    Cache,
    Resolver,
}

/// Cache lookup, falling back to a single-flight resolution on a miss.
async fn lookup_or_resolve(state: &AppState, id: &MediaId) -> Result<(Resolution, Origin)> {
    if let Some(hit) = state.cache.lookup(id) {
        debug!(%id, "Cache hit");
        return Ok((hit, Origin::Cache));
    }

    let resolution = resolve_fresh(state, id).await?;
    Ok((resolution, Origin::Resolver))
}

async fn resolve_fresh(state: &AppState, id: &MediaId) -> Result<Resolution> {
    let resolver = Arc::clone(&state.resolver);
    let resolution = state
        .flights
        .resolve_once(id, move |id| async move { resolver.resolve(&id).await })
        .await?;
    Ok(resolution)
}

/// Relays `resolution`. A location upstream rejects as stale is dropped
/// from the cache, unless a newer one has replaced it already.
async fn relay(
    state: &AppState,
    id: &MediaId,
    resolution: &Resolution,
    range: Option<&HeaderValue>,
) -> muzic_core::Result<RelayResponse> {
    let location = resolution.stream_location()?;
    let result = state.relay.relay(&location, range).await;

    if let Err(e) = &result {
        if e.is_stale_location() && state.cache.invalidate_if(id, &resolution.stream_url) {
            info!(%id, error = %e, "Dropped stale location from cache");
        }
    }
    result
}

fn into_response(relayed: RelayResponse) -> Response {
    let mut response = Response::new(Body::from_stream(relayed.body));
    *response.status_mut() = relayed.status;
    *response.headers_mut() = relayed.headers;
    response
}

/// GET /api/status
pub async fn status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// GET /api/music/:id
///
/// Returns metadata and the relay link; the upstream location is never
/// exposed.
#[instrument(skip(state))]
pub async fn resolve_music(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MusicResponse>> {
    let id = MediaId::new(&id)?;
    let (resolution, _) = lookup_or_resolve(&state, &id).await?;

    let stream_url = state.config.relay_url(&id);
    Ok(Json(MusicResponse::new(resolution, stream_url)))
}

/// GET /api/stream/:id
///
/// Relays the audio with the client's `Range`. A cached location rejected
/// as stale is invalidated and re-resolved once; a fresh location that is
/// rejected is reported as is.
#[instrument(skip(state, headers))]
pub async fn stream_music(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response> {
    let id = MediaId::new(&id)?;
    let range = headers.get(header::RANGE);

    let (resolution, origin) = lookup_or_resolve(&state, &id).await?;

    let relayed = match relay(&state, &id, &resolution, range).await {
        Err(e) if e.is_stale_location() && origin == Origin::Cache => {
            debug!(%id, "Re-resolving after stale cached location");
            let fresh = resolve_fresh(&state, &id).await?;
            relay(&state, &id, &fresh, range).await?
        }
        other => other?,
    };

    debug!(%id, status = %relayed.status, "Streaming");
    Ok(into_response(relayed))
}

/// POST /api/search
pub async fn search(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<SearchRequest>>,
) -> Result<Json<SearchResponse>> {
    let Json(req) = payload.unwrap_or_default();
    let query = req.query.trim();
    if query.is_empty() {
        return Err(ApiError::bad_request("Query required", "INVALID_QUERY"));
    }

    let results = state.resolver.search(query, DEFAULT_SEARCH_LIMIT).await?;
    debug!(query, count = results.len(), "Search complete");

    Ok(Json(SearchResponse {
        success: true,
        results,
    }))
}

/// GET /api/cache/stats
pub async fn cache_stats(State(state): State<Arc<AppState>>) -> Json<CacheStatsResponse> {
    Json(CacheStatsResponse {
        cache: state.cache.stats(),
        in_flight: state.flights.in_flight_count(),
    })
}
