//! # Muzic Resolvers
//!
//! Implementations of [`MediaResolver`](muzic_core::MediaResolver):
//!
//! - [`YtDlpResolver`]: runs `yt-dlp` to extract the best audio stream and metadata
//! - [`MemoryResolver`]: in-memory table, for development and tests

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod memory;
mod ytdlp;

pub use memory::MemoryResolver;
pub use ytdlp::{YtDlpConfig, YtDlpResolver};
