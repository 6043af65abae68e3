//! Upload, job status, and result download.

use axum::extract::{Multipart, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use ow_core::media::encode_uri_component;
use ow_pipeline::JobSnapshot;

use crate::context::AppContext;
use crate::error::AppError;
use crate::jobs;
use crate::upload::read_upload;

#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(content = String, content_type = "multipart/form-data", description = "One `file` part"),
    responses(
        (status = 202, description = "Job started", body = JobSnapshot),
        (status = 400, description = "No file in the request"),
        (status = 409, description = "A job is already running"),
        (status = 415, description = "Not an audio or video file"),
        (status = 503, description = "Codec engine not available")
    )
)]
pub async fn upload(
    State(ctx): State<AppContext>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<JobSnapshot>), AppError> {
    let file = read_upload(multipart).await.inspect_err(|e| {
        tracing::info!("Upload rejected: {e}");
    })?;

    let snapshot = jobs::submit(&ctx, file).inspect_err(|e| {
        tracing::info!("Upload rejected: {e}");
    })?;

    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

#[utoipa::path(
    get,
    path = "/api/job",
    responses(
        (status = 200, description = "Current or most recent job", body = JobSnapshot),
        (status = 404, description = "No job has run yet")
    )
)]
pub async fn current_job(State(ctx): State<AppContext>) -> Result<Json<JobSnapshot>, AppError> {
    ctx.board
        .current()
        .map(Json)
        .ok_or_else(|| ow_core::Error::not_found("job", "current").into())
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ResultParams {
    /// Serve as an attachment instead of inline.
    #[serde(default)]
    pub download: bool,
}

#[utoipa::path(
    get,
    path = "/api/result",
    params(ResultParams),
    responses(
        (status = 200, description = "Result bytes with the input's MIME type"),
        (status = 404, description = "No result available")
    )
)]
pub async fn result(
    State(ctx): State<AppContext>,
    Query(params): Query<ResultParams>,
) -> Result<Response, AppError> {
    let result = ctx
        .board
        .result()
        .ok_or_else(|| ow_core::Error::not_found("result", "latest"))?;

    let content_type = HeaderValue::from_str(&result.mime)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = content_disposition(&result.file_name, params.download);

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
        ],
        result.data,
    )
        .into_response())
}

/// `Content-Disposition` with an ASCII fallback and the UTF-8 name as an
/// RFC 5987 `filename*` parameter.
pub fn content_disposition(file_name: &str, attachment: bool) -> HeaderValue {
    let kind = if attachment { "attachment" } else { "inline" };
    let fallback: String = file_name
        .chars()
        .map(|c| match c {
            ' '..='~' if c != '"' && c != '\\' => c,
            _ => '_',
        })
        .collect();
    let value = format!(
        "{kind}; filename=\"{fallback}\"; filename*=UTF-8''{}",
        encode_uri_component(file_name)
    );
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("inline"))
}
