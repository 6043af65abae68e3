//! Locating the engine's executables.
//!
//! A path set in [`EngineConfig`] wins when it exists; otherwise the tool is
//! looked up on `PATH`. Missing tools are simply absent from the registry and
//! surface as an error only when something asks for them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use ow_core::config::EngineConfig;

/// Executables the engine knows how to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tool {
    Ffmpeg,
    Ffprobe,
}

impl Tool {
    pub const ALL: [Tool; 2] = [Tool::Ffmpeg, Tool::Ffprobe];

    pub fn name(self) -> &'static str {
        match self {
            Tool::Ffmpeg => "ffmpeg",
            Tool::Ffprobe => "ffprobe",
        }
    }

    fn configured(self, config: &EngineConfig) -> Option<&Path> {
        match self {
            Tool::Ffmpeg => config.ffmpeg_path.as_deref(),
            Tool::Ffprobe => config.ffprobe_path.as_deref(),
        }
    }

    fn locate(self, config: &EngineConfig) -> Option<PathBuf> {
        match self.configured(config) {
            Some(path) if path.exists() => return Some(path.to_path_buf()),
            Some(path) => tracing::warn!(
                "Configured {} path {} does not exist; searching PATH",
                self.name(),
                path.display()
            ),
            None => {}
        }
        which::which(self.name()).ok()
    }
}

/// Availability report for one tool, as shown by `check-tools` and
/// `GET /api/tools`.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ToolInfo {
    pub name: String,
    pub available: bool,
    /// First line of `<tool> -version`.
    pub version: Option<String>,
    #[schema(value_type = Option<String>)]
    pub path: Option<PathBuf>,
}

/// Resolved executable paths.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    found: BTreeMap<Tool, PathBuf>,
}

impl ToolRegistry {
    pub fn discover(config: &EngineConfig) -> Self {
        let found = Tool::ALL
            .into_iter()
            .filter_map(|tool| tool.locate(config).map(|path| (tool, path)))
            .collect();
        Self { found }
    }

    /// Path of `tool`.
    ///
    /// # Errors
    ///
    /// [`ow_core::Error::Tool`] if discovery did not find it.
    pub fn require(&self, tool: Tool) -> ow_core::Result<&Path> {
        self.found.get(&tool).map(PathBuf::as_path).ok_or_else(|| {
            let name = tool.name();
            ow_core::Error::tool(name, format!("{name} not found; is it installed and in PATH?"))
        })
    }

    /// Probe every known tool. Runs each found executable once.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        Tool::ALL
            .into_iter()
            .map(|tool| {
                let path = self.found.get(&tool);
                ToolInfo {
                    name: tool.name().to_string(),
                    available: path.is_some(),
                    version: path.and_then(|p| version_line(p)),
                    path: path.cloned(),
                }
            })
            .collect()
    }
}

fn version_line(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path).arg("-version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout.lines().next().map(str::to_owned)
}
