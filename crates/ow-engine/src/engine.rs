//! The codec engine seam.

use async_trait::async_trait;

/// Feedback emitted while a command runs.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineSignal {
    /// Completion of the current command, `0.0..=1.0`.
    Progress(f64),
    /// One line of the engine's log.
    Log(String),
}

/// Receiver for [`EngineSignal`]s during [`CodecEngine::run_command`].
pub type SignalSink<'a> = &'a (dyn Fn(EngineSignal) + Send + Sync);

/// An external media engine driven through its own file system.
///
/// Files are addressed by bare name. All state is shared by every caller of
/// the same engine; callers must not run overlapping jobs that use the same
/// names.
#[async_trait]
pub trait CodecEngine: Send + Sync {
    /// Stage `bytes` under `name`, replacing any existing file.
    async fn write_input(&self, name: &str, bytes: &[u8]) -> ow_core::Result<()>;

    /// Execute one invocation with `args`.
    ///
    /// # Errors
    ///
    /// Returns [`ow_core::Error::Tool`] when the engine reports a failure
    /// (unsupported codec, corrupt input, ...).
    async fn run_command(&self, args: &[String], sink: SignalSink<'_>) -> ow_core::Result<()>;

    /// Read the file stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ow_core::Error::NotFound`] when the file does not exist.
    async fn read_output(&self, name: &str) -> ow_core::Result<Vec<u8>>;

    /// Whether a file named `name` exists.
    async fn contains(&self, name: &str) -> bool;

    /// Remove `name` if present.
    async fn discard(&self, name: &str) -> ow_core::Result<()>;

    /// Version banner of the engine, if known.
    fn version(&self) -> Option<String> {
        None
    }
}
