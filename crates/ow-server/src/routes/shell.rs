//! The page, its view model, and drop-zone feedback.

use axum::extract::{Query, State};
use axum::response::Html;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::context::AppContext;
use crate::shell::{ShellView, INDEX_HTML};
use crate::upload::{Affordance, DropZone, UNSUPPORTED_TYPE_COPY};

/// GET /
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ShellParams {
    /// Whether the client can hand files to a native share sheet.
    #[serde(default)]
    pub can_share_files: bool,
}

#[utoipa::path(
    get,
    path = "/api/shell",
    params(ShellParams),
    responses(
        (status = 200, description = "Everything the page renders", body = ShellView)
    )
)]
pub async fn shell_view(
    State(ctx): State<AppContext>,
    Query(params): Query<ShellParams>,
) -> Json<ShellView> {
    Json(ShellView::build(&ctx, params.can_share_files))
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct DropZoneParams {
    /// MIME type of the item being dragged.
    #[serde(default)]
    pub mime: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DropZoneResponse {
    pub affordance: Affordance,
    /// Copy to show when the drop would be rejected.
    pub message: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/dropzone",
    params(DropZoneParams),
    responses(
        (status = 200, description = "Drop-zone state for a drag entering with this type", body = DropZoneResponse)
    )
)]
pub async fn dropzone(
    State(ctx): State<AppContext>,
    Query(params): Query<DropZoneParams>,
) -> Json<DropZoneResponse> {
    let mut zone = DropZone::new(ctx.gate.is_busy());
    let affordance = zone.enter(&params.mime);
    let message = (affordance == Affordance::Reject).then(|| UNSUPPORTED_TYPE_COPY.to_string());
    Json(DropZoneResponse {
        affordance,
        message,
    })
}
