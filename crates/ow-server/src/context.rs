//! Application context shared by every request handler.

use std::sync::Arc;

use ow_core::config::Config;
use ow_core::events::EventBus;
use ow_engine::{EngineSession, ToolRegistry};

use crate::jobs::JobBoard;
use crate::upload::UploadGate;

/// Application context shared by all request handlers (via Axum state).
///
/// This is cheaply cloneable because it only holds `Arc`s.
#[derive(Clone)]
pub struct AppContext {
    /// Immutable application configuration snapshot.
    pub config: Arc<Config>,
    /// The codec engine, once loaded.
    pub session: Arc<EngineSession>,
    /// Broadcast event bus for SSE.
    pub event_bus: Arc<EventBus>,
    /// Admits at most one running job.
    pub gate: Arc<UploadGate>,
    /// Current job and latest result.
    pub board: Arc<JobBoard>,
    /// External tool registry.
    pub tools: Arc<ToolRegistry>,
}

impl AppContext {
    pub fn new(config: Config, session: Arc<EngineSession>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            config: Arc::new(config),
            session,
            event_bus: Arc::new(EventBus::default()),
            gate: Arc::new(UploadGate::new()),
            board: Arc::new(JobBoard::new()),
            tools,
        }
    }
}
