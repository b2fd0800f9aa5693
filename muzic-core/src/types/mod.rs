//! Domain types for muzic.
//!
//! - [`MediaId`]: validated opaque identifier naming a piece of media
//! - [`Resolution`]: a resolved upstream stream location plus metadata
//! - [`SearchResult`]: one hit returned by a resolver search

mod media;
mod resolution;

pub use media::*;
pub use resolution::*;
