//! # Muzic Core
//!
//! Core types, errors, and traits shared by every muzic crate.
//!
//! - **Types**: media identifiers, resolved stream locations, search results
//! - **Errors**: one error enum covering resolution and relay failures
//! - **Constants**: identifier format, default timeouts and cache sizing
//! - **Traits**: the [`MediaResolver`] seam implemented by resolver backends
//!
//! ## Example
//!
//! ```rust
//! use muzic_core::MediaId;
//!
//! let id: MediaId = "dQw4w9WgXcQ".parse().unwrap();
//! assert_eq!(id.as_str(), "dQw4w9WgXcQ");
//! assert!("not-an-id".parse::<MediaId>().is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{MuzicError, Result};
pub use traits::*;
pub use types::*;
