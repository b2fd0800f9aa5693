//! Resolution cache for muzic.
//!
//! In-memory TTL cache of resolved stream locations, plus the single-flight
//! coordinator that collapses concurrent resolutions of the same identifier.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod cache;
mod single_flight;

pub use cache::{CacheConfig, CacheStats, ResolutionCache};
pub use single_flight::SingleFlight;
