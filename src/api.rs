use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

use crate::{
    badge::{
        crop::{self, CropSelection},
        export::{self, RenderOptions},
        layout::BadgeRecord,
        photo, BadgeError,
    },
    state::AppState,
    util,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[utoipa::path(get, path = "/health", tag = "badgegen", responses((status=200, body=HealthResponse)))]
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok".into() })
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PhotoPreviewRequest {
    /// Source image as a data URI or plain base64.
    pub file: String,
    pub crop: Option<CropSelection>,
    pub zoom: Option<f32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PhotoUploadRequest {
    pub emp_id: u32,
    pub en_firstname: String,
    /// Source image as a data URI or plain base64.
    pub file: String,
    pub crop: Option<CropSelection>,
    pub zoom: Option<f32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PhotoUploadResponse {
    /// Stored canonical filename.
    pub file: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BadgeRenderRequest {
    pub record: BadgeRecord,
    /// Resolution multiplier; defaults to the on-screen preview scale.
    pub scale: Option<f32>,
    /// Background hex color; white when omitted.
    pub background: Option<String>,
    /// Attach the export filename so browsers download instead of display.
    pub download: Option<bool>,
}

fn error_response(err: BadgeError) -> (StatusCode, String) {
    let status = match &err {
        BadgeError::InvalidSource(_)
        | BadgeError::MissingRequiredField(_)
        | BadgeError::Encoding(_) => StatusCode::BAD_REQUEST,
        BadgeError::RenderTimeout => StatusCode::GATEWAY_TIMEOUT,
        BadgeError::Storage(_) | BadgeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!(%err, "badge pipeline failure");
    }
    (status, err.to_string())
}

fn decode_upload(file: &str) -> Result<Vec<u8>, (StatusCode, String)> {
    util::decode_image_payload(file).ok_or((
        StatusCode::BAD_REQUEST,
        "file must be a base64-encoded image".to_string(),
    ))
}

#[utoipa::path(
    post,
    path = "/photo/preview",
    tag = "badgegen",
    request_body = PhotoPreviewRequest,
    responses(
        (status=200, description="Normalized crop preview", content_type="image/jpeg"),
        (status=400, description="Undecodable source")
    )
)]
pub async fn photo_preview(
    Json(req): Json<PhotoPreviewRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let bytes = decode_upload(&req.file)?;
    let sample = crop::normalize(&bytes, req.crop, req.zoom).map_err(error_response)?;
    let jpeg = sample.to_jpeg(90).map_err(error_response)?;
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], jpeg))
}

#[utoipa::path(
    post,
    path = "/photo",
    tag = "badgegen",
    request_body = PhotoUploadRequest,
    responses(
        (status=200, body=PhotoUploadResponse),
        (status=400, description="Undecodable source"),
        (status=500, description="Storage failure")
    )
)]
pub async fn photo_upload(
    State(st): State<Arc<AppState>>,
    Json(req): Json<PhotoUploadRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let bytes = decode_upload(&req.file)?;
    let sample = crop::normalize(&bytes, req.crop, req.zoom).map_err(error_response)?;
    let canonical = photo::canonicalize(&sample).map_err(error_response)?;
    let file = st
        .store
        .replace(req.emp_id, &req.en_firstname, &canonical)
        .map_err(error_response)?;
    Ok(Json(PhotoUploadResponse { file }))
}

#[utoipa::path(
    delete,
    path = "/photo/{emp_id}",
    tag = "badgegen",
    params(("emp_id" = u32, Path, description = "Employee id")),
    responses((status=204, description="Photo removed"), (status=404, description="No stored photo"))
)]
pub async fn photo_delete(
    State(st): State<Arc<AppState>>,
    Path(emp_id): Path<u32>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let removed = st.store.remove(emp_id).map_err(error_response)?;
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, "no stored photo".to_string()))
    }
}

fn content_type_for(path: &str) -> &'static str {
    match path.rsplit('.').next() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

#[utoipa::path(
    get,
    path = "/uploads/{path}",
    tag = "badgegen",
    params(("path" = String, Path, description = "File under the uploads root")),
    responses((status=200, description="Stored photo or card art"), (status=404, description="Not found"))
)]
pub async fn serve_upload(
    State(st): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match st.store.read(&path) {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, content_type_for(&path))], bytes)),
        Err(_) => Err((StatusCode::NOT_FOUND, "not found".to_string())),
    }
}

#[utoipa::path(
    post,
    path = "/badge",
    tag = "badgegen",
    request_body = BadgeRenderRequest,
    responses(
        (status=200, description="Rendered badge", content_type="image/png"),
        (status=400, description="Invalid record or multiplier"),
        (status=504, description="Resources did not stabilize")
    )
)]
pub async fn render_badge(
    State(st): State<Arc<AppState>>,
    Json(req): Json<BadgeRenderRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let scale = req.scale.unwrap_or(1.0);
    if !scale.is_finite() || scale <= 0.0 {
        return Err((StatusCode::BAD_REQUEST, format!("invalid scale: {scale}")));
    }

    let background = match req.background.as_deref() {
        Some(s) => Some(crate::badge::compose::parse_hex_color(s).ok_or((
            StatusCode::BAD_REQUEST,
            format!("invalid background color: {s}"),
        ))?),
        None => None,
    };

    let opts = RenderOptions {
        scale,
        background,
        timeout: st.render_timeout,
    };
    let png = export::render_badge(&st.http, &st.store, &st.code, &req.record, &opts)
        .await
        .map_err(error_response)?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
    if req.download.unwrap_or(false) {
        let name = export::export_filename(&req.record).map_err(error_response)?;
        if let Ok(v) = HeaderValue::from_str(&format!("attachment; filename=\"{name}\"")) {
            headers.insert(header::CONTENT_DISPOSITION, v);
        }
    }
    Ok((headers, png))
}
