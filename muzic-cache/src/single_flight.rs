//! Single-flight coordination of resolver calls.
//!
//! When several requests miss the cache for the same identifier at once:
//! 1. The first registers as the **owner** and calls the resolver
//! 2. Later ones become **waiters** and subscribe to the owner's broadcast
//! 3. On success the owner inserts into the cache, removes the in-flight
//!    record, then publishes the result; waiters receive the same value
//! 4. On failure the same error is published and nothing is cached
//!
//! Because the cache insert happens before the in-flight record disappears,
//! no request can observe "not in flight" while the cache is still empty.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use muzic_core::constants::DEFAULT_RESOLVE_TIMEOUT_SECONDS;
use muzic_core::error::{MuzicError, Result};
use muzic_core::types::{MediaId, Resolution};

use crate::cache::ResolutionCache;

type FlightResult = Result<Resolution>;

/// Only one completion message is ever sent per flight.
const BROADCAST_CHANNEL_CAPACITY: usize = 1;

type Pending = Arc<DashMap<MediaId, broadcast::Sender<FlightResult>>>;

/// Role assigned to a request after registration.
enum FlightRole {
    Owner(FlightGuard),
    Waiter(broadcast::Receiver<FlightResult>),
}

/// Removes the in-flight record on drop, so a cancelled owner never leaves
/// waiters hanging: dropping the last sender closes their receivers and they
/// start over.
struct FlightGuard {
    id: MediaId,
    sender: broadcast::Sender<FlightResult>,
    pending: Pending,
    completed: bool,
}

impl FlightGuard {
    fn complete(mut self, result: &FlightResult) {
        self.completed = true;
        self.pending.remove(&self.id);
        // No receivers is fine.
        let _ = self.sender.send(result.clone());
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        if !self.completed {
            self.pending.remove(&self.id);
            warn!(id = %self.id, "Resolution abandoned before completion");
        }
    }
}

/// Collapses concurrent resolutions of the same identifier into one
/// resolver call and publishes successful results into the shared cache.
pub struct SingleFlight {
    cache: Arc<ResolutionCache>,
    pending: Pending,
    timeout: Duration,
}

impl SingleFlight {
    /// Creates a coordinator that populates `cache` and uses the default
    /// resolution timeout.
    pub fn new(cache: Arc<ResolutionCache>) -> Self {
        Self::with_timeout(cache, Duration::from_secs(DEFAULT_RESOLVE_TIMEOUT_SECONDS))
    }

    /// Creates a coordinator with a custom resolution timeout.
    pub fn with_timeout(cache: Arc<ResolutionCache>, timeout: Duration) -> Self {
        Self {
            cache,
            pending: Arc::new(DashMap::new()),
            timeout,
        }
    }

    /// Returns the cache this coordinator populates.
    pub fn cache(&self) -> &Arc<ResolutionCache> {
        &self.cache
    }

    /// Returns the number of resolutions currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.pending.len()
    }

    fn try_register(&self, id: &MediaId) -> FlightRole {
        match self.pending.entry(id.clone()) {
            Entry::Vacant(vacant) => {
                let (tx, _rx) = broadcast::channel(BROADCAST_CHANNEL_CAPACITY);
                vacant.insert(tx.clone());
                FlightRole::Owner(FlightGuard {
                    id: id.clone(),
                    sender: tx,
                    pending: Arc::clone(&self.pending),
                    completed: false,
                })
            }
            Entry::Occupied(occupied) => FlightRole::Waiter(occupied.get().subscribe()),
        }
    }

    /// Resolves `id` at most once across all concurrent callers.
    ///
    /// Intended for the cache-miss path. The owner re-checks the cache after
    /// registering, since a previous flight may have finished between the
    /// caller's lookup and the registration. `resolver` is only invoked if
    /// this call ends up owning the flight, and is bounded by the
    /// coordinator's timeout.
    pub async fn resolve_once<F, Fut>(&self, id: &MediaId, resolver: F) -> Result<Resolution>
    where
        F: FnOnce(MediaId) -> Fut,
        Fut: Future<Output = Result<Resolution>>,
    {
        let mut resolver = Some(resolver);

        loop {
            match self.try_register(id) {
                FlightRole::Owner(guard) => {
                    if let Some(hit) = self.cache.peek(id) {
                        debug!(%id, "Resolved by an earlier flight");
                        let result = Ok(hit);
                        guard.complete(&result);
                        return result;
                    }

                    let resolve = resolver.take().ok_or_else(|| {
                        MuzicError::InternalError("resolver already consumed".into())
                    })?;

                    debug!(%id, "Owning resolution");
                    let result = match tokio::time::timeout(self.timeout, resolve(id.clone())).await {
                        Ok(Ok(mut resolution)) => {
                            resolution.id = id.clone();
                            match resolution.stream_location() {
                                Ok(_) => {
                                    self.cache.insert(resolution.clone());
                                    info!(%id, title = %resolution.title, "Resolved");
                                    Ok(resolution)
                                }
                                Err(e) => {
                                    warn!(%id, error = %e, "Resolver returned an unusable stream location");
                                    Err(MuzicError::NoStreamLocation(id.to_string()))
                                }
                            }
                        }
                        Ok(Err(e)) => {
                            warn!(%id, error = %e, "Resolution failed");
                            Err(e)
                        }
                        Err(_) => {
                            warn!(%id, seconds = self.timeout.as_secs(), "Resolution timed out");
                            Err(MuzicError::ResolutionTimeout {
                                id: id.to_string(),
                                seconds: self.timeout.as_secs(),
                            })
                        }
                    };

                    guard.complete(&result);
                    return result;
                }
                FlightRole::Waiter(mut rx) => {
                    debug!(%id, "Waiting on in-flight resolution");
                    match rx.recv().await {
                        Ok(result) => return result,
                        // Owner went away without publishing; start over.
                        Err(RecvError::Closed) | Err(RecvError::Lagged(_)) => continue,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn id() -> MediaId {
        MediaId::new("dQw4w9WgXcQ").unwrap()
    }

    fn sample(id: MediaId) -> Resolution {
        Resolution::new(id, "https://cdn.example/a.mp4", "Sample", 212)
    }

    fn coordinator() -> Arc<SingleFlight> {
        Arc::new(SingleFlight::new(Arc::new(ResolutionCache::new())))
    }

    #[tokio::test]
    async fn test_resolve_once_populates_cache() {
        let flight = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let res = flight
            .resolve_once(&id(), move |id| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(sample(id))
            })
            .await
            .unwrap();

        assert_eq!(res.title, "Sample");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(flight.cache().lookup(&id()), Some(res));
        assert_eq!(flight.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_resolution() {
        let flight = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let flight = Arc::clone(&flight);
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    flight
                        .resolve_once(&id(), move |id| async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok(sample(id))
                        })
                        .await
                })
            })
            .collect();

        let results = futures::future::join_all(tasks).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for r in results {
            assert_eq!(r.unwrap().unwrap(), sample(id()));
        }
        assert_eq!(flight.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_shared_and_not_cached() {
        let flight = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let flight = Arc::clone(&flight);
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    flight
                        .resolve_once(&id(), move |id| async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Err(MuzicError::ResolutionFailed {
                                id: id.to_string(),
                                reason: "Video unavailable".into(),
                            })
                        })
                        .await
                })
            })
            .collect();

        let results = futures::future::join_all(tasks).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for r in results {
            assert!(matches!(
                r.unwrap(),
                Err(MuzicError::ResolutionFailed { ref reason, .. }) if reason == "Video unavailable"
            ));
        }
        assert!(flight.cache().is_empty());
        assert_eq!(flight.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_not_sticky() {
        let flight = coordinator();

        let first = flight
            .resolve_once(&id(), |id| async move {
                Err(MuzicError::NoStreamLocation(id.to_string()))
            })
            .await;
        assert!(first.is_err());

        let second = flight
            .resolve_once(&id(), |id| async move { Ok(sample(id)) })
            .await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_unusable_location_is_not_cached() {
        let flight = coordinator();

        let result = flight
            .resolve_once(&id(), |id| async move {
                Ok(Resolution::new(id, "ftp://cdn.example/a.mp4", "Sample", 212))
            })
            .await;

        assert_eq!(result, Err(MuzicError::NoStreamLocation("dQw4w9WgXcQ".into())));
        assert!(flight.cache().is_empty());
        assert_eq!(flight.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_resolution_timeout() {
        let flight = Arc::new(SingleFlight::with_timeout(
            Arc::new(ResolutionCache::new()),
            Duration::from_millis(20),
        ));

        let result = flight
            .resolve_once(&id(), |id| async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(sample(id))
            })
            .await;

        assert!(matches!(result, Err(MuzicError::ResolutionTimeout { .. })));
        assert!(flight.cache().is_empty());
        assert_eq!(flight.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_owner_rechecks_cache() {
        let flight = coordinator();
        flight.cache().insert(sample(id()));

        let result = flight
            .resolve_once(&id(), |_| async move {
                Err(MuzicError::InternalError("resolver must not run".into()))
            })
            .await;

        assert_eq!(result.unwrap(), sample(id()));
    }

    #[tokio::test]
    async fn test_cancelled_owner_hands_over_to_waiter() {
        let flight = coordinator();
        let waiter_calls = Arc::new(AtomicUsize::new(0));

        let owner = {
            let flight = Arc::clone(&flight);
            tokio::spawn(async move {
                flight
                    .resolve_once(&id(), |id| async move {
                        tokio::time::sleep(Duration::from_secs(30)).await;
                        Ok(sample(id))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(flight.in_flight_count(), 1);

        let waiter = {
            let flight = Arc::clone(&flight);
            let calls = Arc::clone(&waiter_calls);
            tokio::spawn(async move {
                flight
                    .resolve_once(&id(), move |id| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(sample(id))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        owner.abort();

        let result = waiter.await.unwrap();
        assert_eq!(result.unwrap(), sample(id()));
        assert_eq!(waiter_calls.load(Ordering::SeqCst), 1);
        assert_eq!(flight.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_distinct_ids_resolve_independently() {
        let flight = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));

        for raw in ["aaaaaaaaaaa", "bbbbbbbbbbb"] {
            let counter = Arc::clone(&calls);
            flight
                .resolve_once(&MediaId::new(raw).unwrap(), move |id| async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(sample(id))
                })
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(flight.cache().len(), 2);
    }
}
