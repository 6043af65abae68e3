//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! server, engine and share sections. Every section defaults sensibly so a
//! completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub share: ShareConfig,
}

impl Config {
    /// Parse JSON; absent keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Read and parse `path`. Used by `validate`, where a bad file must fail.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Like [`load`](Self::load), but any problem is logged and answered with
    /// the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match Self::load(path) {
            Ok(config) => config,
            Err(Error::Io { source }) if source.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Ignoring config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Non-fatal problems, in declaration order of the offending fields.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.server.max_upload_bytes == 0 {
            warnings.push("server.max_upload_bytes is 0; every upload will be rejected".into());
        }

        if let Some(ref p) = self.engine.ffmpeg_path {
            if !p.exists() {
                warnings.push(format!(
                    "engine.ffmpeg_path {} does not exist; falling back to PATH",
                    p.display()
                ));
            }
        }

        if let Some(ref dir) = self.engine.work_dir {
            if dir.is_file() {
                warnings.push(format!("engine.work_dir {} is a file", dir.display()));
            }
        }

        if self.engine.command_timeout_secs == Some(0) {
            warnings.push("engine.command_timeout_secs is 0; every command will time out".into());
        }

        if self.share.page_url.is_empty() {
            warnings.push("share.page_url is empty".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted upload body.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            max_upload_bytes: 512 * 1024 * 1024,
        }
    }
}

/// Codec engine settings. Changing these is a deployment-time decision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    /// Directory backing the engine file system. `None` uses a private
    /// temporary directory removed at exit.
    pub work_dir: Option<PathBuf>,
    /// Per-command limit. `None` lets a command run indefinitely.
    pub command_timeout_secs: Option<u64>,
}

impl EngineConfig {
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }
}

/// Copy used by the outbound intent link and the native share action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    pub page_url: String,
    /// Pre-filled text of the intent link. Defaults to the product name and
    /// the page URL on two lines.
    pub intent_text: Option<String>,
    pub hashtag: String,
    /// Footer credit for whoever runs this instance. `null` hides it.
    pub operator: Option<Operator>,
}

/// A name and a link, shown as `運営者：<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Operator {
    pub name: String,
    pub url: String,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            page_url: "https://otoware-maker.vercel.app".into(),
            intent_text: None,
            hashtag: "音割れメーカー".into(),
            operator: Some(Operator {
                name: "barley_ural".into(),
                url: "https://twitter.com/barley_ural".into(),
            }),
        }
    }
}

impl ShareConfig {
    pub fn intent_text(&self) -> String {
        self.intent_text
            .clone()
            .unwrap_or_else(|| format!("音割れメーカー\n{}", self.page_url))
    }

    /// Caption handed to the native share sheet along with the result file.
    pub fn caption(&self) -> String {
        format!("#{} {}", self.hashtag, self.page_url)
    }
}
