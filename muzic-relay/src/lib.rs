//! # Muzic Relay
//!
//! Streams an upstream audio resource to a client while preserving HTTP
//! Range semantics.
//!
//! - The client's `Range` header is forwarded verbatim
//! - The upstream status (200, 206, 416 …) is preserved
//! - Bytes are forwarded chunk by chunk, never buffered whole
//! - Transport framing headers are dropped by one explicit [`headers`] policy
//!
//! ## Example
//!
//! ```rust,ignore
//! use muzic_relay::{RelayEngine, RelayConfig};
//!
//! let engine = RelayEngine::with_config(RelayConfig::default())?;
//! let relayed = engine.relay(&location, range_header).await?;
//! assert!(relayed.status.is_success());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod headers;
mod engine;

pub use engine::{RelayBody, RelayConfig, RelayEngine, RelayResponse};
