//! The process-wide engine handle.
//!
//! [`EngineSession`] owns the loaded engine and records whether loading
//! succeeded. Initialization runs at most once; a failure is permanent for the
//! life of the session.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::engine::CodecEngine;

/// Lifecycle of the engine.
#[derive(Clone)]
pub enum EngineState {
    Uninitialized,
    Ready(Arc<dyn CodecEngine>),
    Failed(String),
}

impl std::fmt::Debug for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::Ready(_) => write!(f, "Ready"),
            Self::Failed(msg) => f.debug_tuple("Failed").field(msg).finish(),
        }
    }
}

/// Serializable summary of [`EngineState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EngineStateKind {
    Uninitialized,
    Ready,
    Failed,
}

/// Engine status reported to clients.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct EngineStatus {
    pub state: EngineStateKind,
    /// Failure message when `state` is `failed`.
    pub message: Option<String>,
    /// Engine version banner when `state` is `ready`.
    pub version: Option<String>,
}

/// Owned, lazily initialized handle to the codec engine.
pub struct EngineSession {
    state: RwLock<EngineState>,
    started: AtomicBool,
}

impl Default for EngineSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineSession {
    /// A session whose engine has not been loaded yet.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(EngineState::Uninitialized),
            started: AtomicBool::new(false),
        }
    }

    /// A session wrapping an already-loaded engine.
    pub fn ready(engine: Arc<dyn CodecEngine>) -> Self {
        Self {
            state: RwLock::new(EngineState::Ready(engine)),
            started: AtomicBool::new(true),
        }
    }

    /// A session whose engine failed to load with `message`.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            state: RwLock::new(EngineState::Failed(message.into())),
            started: AtomicBool::new(true),
        }
    }

    /// Run `init` and record its outcome. Only the first call does anything;
    /// later calls return `false` without running `init`.
    pub async fn initialize_with<F, Fut>(&self, init: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ow_core::Result<Arc<dyn CodecEngine>>>,
    {
        if self.started.swap(true, Ordering::SeqCst) {
            return false;
        }

        let next = match init().await {
            Ok(engine) => EngineState::Ready(engine),
            Err(e) => {
                tracing::error!("Codec engine failed to initialize: {e}");
                EngineState::Failed(e.to_string())
            }
        };
        *self.state.write() = next;
        true
    }

    /// Current state snapshot.
    pub fn state(&self) -> EngineState {
        self.state.read().clone()
    }

    /// The loaded engine.
    ///
    /// # Errors
    ///
    /// Returns [`ow_core::Error::EngineUnavailable`] unless the engine is ready.
    pub fn engine(&self) -> ow_core::Result<Arc<dyn CodecEngine>> {
        match &*self.state.read() {
            EngineState::Ready(engine) => Ok(engine.clone()),
            EngineState::Uninitialized => Err(ow_core::Error::EngineUnavailable(
                "engine is still loading".into(),
            )),
            EngineState::Failed(msg) => Err(ow_core::Error::EngineUnavailable(msg.clone())),
        }
    }

    /// Failure message, if initialization failed.
    pub fn failure(&self) -> Option<String> {
        match &*self.state.read() {
            EngineState::Failed(msg) => Some(msg.clone()),
            _ => None,
        }
    }

    pub fn status(&self) -> EngineStatus {
        match &*self.state.read() {
            EngineState::Uninitialized => EngineStatus {
                state: EngineStateKind::Uninitialized,
                message: None,
                version: None,
            },
            EngineState::Ready(engine) => EngineStatus {
                state: EngineStateKind::Ready,
                message: None,
                version: engine.version(),
            },
            EngineState::Failed(msg) => EngineStatus {
                state: EngineStateKind::Failed,
                message: Some(msg.clone()),
                version: None,
            },
        }
    }
}
