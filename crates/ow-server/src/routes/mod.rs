//! Route handlers for the HTTP API.

pub mod engine;
pub mod events;
pub mod jobs;
pub mod shell;

/// GET /health
pub async fn health_check() -> &'static str {
    "ok"
}
