//! [`CodecEngine`] backed by a local ffmpeg executable.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use ow_core::config::EngineConfig;

use crate::command::ToolCommand;
use crate::engine::{CodecEngine, EngineSignal, SignalSink};
use crate::fs::EngineFs;
use crate::progress::ProgressParser;
use crate::tools::{Tool, ToolRegistry};

/// Flags prepended to every invocation: no banner, never read stdin, always
/// overwrite outputs left by an earlier job.
const ENGINE_FLAGS: [&str; 3] = ["-hide_banner", "-nostdin", "-y"];

/// Log fragments meaning "the command ran but had nothing to write", e.g. an
/// audio step on a source without an audio track.
const NOTHING_PRODUCED: &[&str] = &["does not contain any stream", "matches no streams"];

/// Limit for the `-version` check during initialization.
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// ffmpeg running inside an [`EngineFs`].
#[derive(Debug)]
pub struct FfmpegEngine {
    ffmpeg: PathBuf,
    version: Option<String>,
    fs: EngineFs,
    timeout: Option<Duration>,
}

impl FfmpegEngine {
    /// Locate ffmpeg, confirm it runs, and set up the engine file system.
    ///
    /// # Errors
    ///
    /// Any failure here is terminal for the process: the binary is missing,
    /// cannot be executed (for example the host is out of memory), or the
    /// working directory cannot be created.
    pub async fn initialize(config: &EngineConfig) -> ow_core::Result<Self> {
        let tools = ToolRegistry::discover(config);
        let ffmpeg = tools.require(Tool::Ffmpeg)?.to_path_buf();

        let output = ToolCommand::new(ffmpeg.clone())
            .arg("-version")
            .timeout(PROBE_TIMEOUT)
            .execute()
            .await?;
        let version = output.stdout.lines().next().map(str::to_string);

        let fs = match config.work_dir {
            Some(ref dir) => EngineFs::at(dir)?,
            None => EngineFs::temporary()?,
        };

        tracing::info!(
            ffmpeg = %ffmpeg.display(),
            work_dir = %fs.root().display(),
            "Codec engine ready ({})",
            version.as_deref().unwrap_or("unknown version")
        );

        Ok(Self {
            ffmpeg,
            version,
            fs,
            timeout: config.command_timeout(),
        })
    }

    /// Path of the ffmpeg binary in use.
    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg
    }

    /// Directory backing the engine file system.
    pub fn work_dir(&self) -> &Path {
        self.fs.root()
    }
}

#[async_trait]
impl CodecEngine for FfmpegEngine {
    async fn write_input(&self, name: &str, bytes: &[u8]) -> ow_core::Result<()> {
        self.fs.write_file(name, bytes).await
    }

    async fn run_command(&self, args: &[String], sink: SignalSink<'_>) -> ow_core::Result<()> {
        let mut cmd = ToolCommand::new(self.ffmpeg.clone());
        cmd.args(ENGINE_FLAGS);
        cmd.args(args.iter().cloned());
        cmd.current_dir(self.fs.root());
        if let Some(limit) = self.timeout {
            cmd.timeout(limit);
        }

        tracing::debug!("ffmpeg {}", args.join(" "));

        let mut parser = ProgressParser::new();
        let mut produced_nothing = false;

        let result = cmd
            .execute_with_stderr_callback(|line| {
                if NOTHING_PRODUCED.iter().any(|m| line.contains(m)) {
                    produced_nothing = true;
                }
                if let Some(ratio) = parser.feed(line) {
                    sink(EngineSignal::Progress(ratio));
                }
                sink(EngineSignal::Log(line.to_string()));
            })
            .await;

        match result {
            Ok(_) => {
                sink(EngineSignal::Progress(1.0));
                Ok(())
            }
            Err(e) if produced_nothing => {
                tracing::warn!("ffmpeg produced no output: {e}");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn read_output(&self, name: &str) -> ow_core::Result<Vec<u8>> {
        self.fs.read_file(name).await
    }

    async fn contains(&self, name: &str) -> bool {
        self.fs.exists(name)
    }

    async fn discard(&self, name: &str) -> ow_core::Result<()> {
        self.fs.remove_file(name).await
    }

    fn version(&self) -> Option<String> {
        self.version.clone()
    }
}
