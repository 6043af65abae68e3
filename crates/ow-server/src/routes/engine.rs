//! Engine status and tool availability.

use axum::extract::State;
use axum::Json;

use ow_engine::{EngineStatus, ToolInfo};

use crate::context::AppContext;

#[utoipa::path(
    get,
    path = "/api/engine",
    responses(
        (status = 200, description = "Codec engine lifecycle state", body = EngineStatus)
    )
)]
pub async fn engine_status(State(ctx): State<AppContext>) -> Json<EngineStatus> {
    Json(ctx.session.status())
}

#[utoipa::path(
    get,
    path = "/api/tools",
    responses(
        (status = 200, description = "List external tool availability", body = Vec<ToolInfo>)
    )
)]
pub async fn tools(State(ctx): State<AppContext>) -> Json<Vec<ToolInfo>> {
    Json(ctx.tools.check_all())
}
