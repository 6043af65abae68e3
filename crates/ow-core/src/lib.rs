//! ow-core: shared types, IDs, errors, configuration, and event system.
//!
//! This crate is the foundational dependency for all other ow-* crates,
//! providing the unified error type, media-domain types for uploads and
//! results, application configuration, byte-size formatting, and a broadcast
//! event bus for job progress.

pub mod config;
pub mod error;
pub mod events;
pub mod format;
pub mod ids;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use format::format_bytes;
pub use ids::*;
pub use media::*;
