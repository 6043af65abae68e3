//! # ow-engine
//!
//! The codec engine adapter for otoware.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- resolve ffmpeg and ffprobe from
//!   config or `PATH`.
//! - **Command execution** ([`ToolCommand`]) -- async builder with optional
//!   timeout and line-by-line stderr streaming.
//! - **Engine file system** ([`EngineFs`]) -- the directory commands read
//!   from and write to, addressed by bare file name.
//! - **Progress parsing** ([`ProgressParser`]) -- turn ffmpeg's log into a
//!   completion ratio.
//! - **The engine seam** ([`CodecEngine`]) with the ffmpeg-backed
//!   [`FfmpegEngine`], and the explicitly owned [`EngineSession`] holding it.

pub mod command;
pub mod engine;
pub mod ffmpeg;
pub mod fs;
pub mod progress;
pub mod session;
pub mod tools;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use engine::{CodecEngine, EngineSignal, SignalSink};
pub use ffmpeg::FfmpegEngine;
pub use fs::EngineFs;
pub use progress::ProgressParser;
pub use session::{EngineSession, EngineState, EngineStateKind, EngineStatus};
pub use tools::{Tool, ToolInfo, ToolRegistry};
