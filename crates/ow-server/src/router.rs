//! Axum router construction.
//!
//! Builds the full application router with the page, the JSON API, the SSE
//! stream, OpenAPI docs, and middleware layers.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::context::AppContext;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::engine::engine_status,
        routes::engine::tools,
        routes::shell::shell_view,
        routes::shell::dropzone,
        routes::jobs::upload,
        routes::jobs::current_job,
        routes::jobs::result,
    ),
    components(schemas(
        routes::shell::DropZoneResponse,
        crate::shell::ShellView,
        crate::shell::Banner,
        crate::shell::BannerKind,
        crate::shell::ProgressView,
        crate::shell::ResultView,
        crate::shell::ShareView,
        crate::upload::Affordance,
        ow_engine::EngineStatus,
        ow_engine::EngineStateKind,
        ow_engine::ToolInfo,
        ow_pipeline::JobSnapshot,
        ow_pipeline::JobPhase,
        ow_core::MediaKind,
        ow_core::config::Operator,
        ow_core::JobId,
    ))
)]
struct ApiDoc;

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let upload_limit = ctx.config.server.max_upload_bytes;

    let api = Router::new()
        .route("/engine", get(routes::engine::engine_status))
        .route("/tools", get(routes::engine::tools))
        .route("/shell", get(routes::shell::shell_view))
        .route("/dropzone", get(routes::shell::dropzone))
        .route(
            "/upload",
            post(routes::jobs::upload)
                .layer::<_, std::convert::Infallible>(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(upload_limit)),
        )
        .route("/job", get(routes::jobs::current_job))
        .route("/result", get(routes::jobs::result))
        .route("/events", get(routes::events::events_handler));

    Router::new()
        .route("/", get(routes::shell::index))
        .route("/health", get(routes::health_check))
        .nest("/api", api)
        .merge(SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
