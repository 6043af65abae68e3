//! The engine file system.
//!
//! An [`EngineFs`] is the directory every engine command runs in. Callers
//! address files by bare name; names that could reach outside the directory
//! are rejected. The directory lives as long as the engine and is never
//! cleared wholesale; a name written twice is overwritten.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

enum Root {
    /// Private directory removed when the engine is dropped.
    Temp(TempDir),
    /// Operator-provided directory, left in place.
    Dir(PathBuf),
}

/// Directory-backed file store shared by all engine commands.
pub struct EngineFs {
    root: Root,
}

impl std::fmt::Debug for EngineFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineFs").field("root", &self.root()).finish()
    }
}

impl EngineFs {
    /// Create a file system backed by a fresh temporary directory.
    pub fn temporary() -> ow_core::Result<Self> {
        let temp_dir = tempfile::Builder::new()
            .prefix("otoware-engine-")
            .tempdir()
            .map_err(|e| ow_core::Error::tool("engine-fs", format!("failed to create temp dir: {e}")))?;
        Ok(Self {
            root: Root::Temp(temp_dir),
        })
    }

    /// Create a file system backed by `dir`, creating it if needed.
    pub fn at(dir: &Path) -> ow_core::Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            ow_core::Error::tool(
                "engine-fs",
                format!("failed to create work dir {}: {e}", dir.display()),
            )
        })?;
        Ok(Self {
            root: Root::Dir(dir.to_path_buf()),
        })
    }

    /// Directory that commands run in.
    pub fn root(&self) -> &Path {
        match &self.root {
            Root::Temp(t) => t.path(),
            Root::Dir(d) => d,
        }
    }

    /// Full path for `name`, rejecting names that are not a single plain
    /// path component.
    pub fn resolve(&self, name: &str) -> ow_core::Result<PathBuf> {
        let invalid = name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
            || name.contains('\0');
        if invalid {
            return Err(ow_core::Error::Validation(format!(
                "invalid engine file name: {name:?}"
            )));
        }
        Ok(self.root().join(name))
    }

    /// Write `bytes` under `name`, replacing any previous file.
    pub async fn write_file(&self, name: &str, bytes: &[u8]) -> ow_core::Result<()> {
        let path = self.resolve(name)?;
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }

    /// Read the file stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ow_core::Error::NotFound`] when no such file exists.
    pub async fn read_file(&self, name: &str) -> ow_core::Result<Vec<u8>> {
        let path = self.resolve(name)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ow_core::Error::not_found("engine file", name))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove `name` if it exists.
    pub async fn remove_file(&self, name: &str) -> ow_core::Result<()> {
        let path = self.resolve(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether `name` currently exists.
    pub fn exists(&self, name: &str) -> bool {
        self.resolve(name).map(|p| p.is_file()).unwrap_or(false)
    }
}
