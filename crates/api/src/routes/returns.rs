//! Return (devolución) routes.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use validator::Validate;

use domain::models::lead_return::{
    AttachmentKind, ListReturnsQuery, RequestReturnBody, ResolveReturnBody, SubmitEvidenceBody,
};
use domain::models::LeadReturn;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::CurrentUser;
use crate::services::LeadReturnService;

fn service(state: &AppState) -> LeadReturnService {
    LeadReturnService::new(
        state.pool.clone(),
        state.blobs.clone(),
        state.config.storage.max_attachment_bytes,
    )
}

fn content_type(kind: AttachmentKind, file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match (kind, extension.as_str()) {
        (AttachmentKind::Audio, "mp3") => "audio/mpeg",
        (AttachmentKind::Audio, "ogg" | "oga" | "opus") => "audio/ogg",
        (AttachmentKind::Audio, "wav") => "audio/wav",
        (AttachmentKind::Audio, "m4a") => "audio/mp4",
        (AttachmentKind::Image, "jpg" | "jpeg") => "image/jpeg",
        (AttachmentKind::Image, "png") => "image/png",
        (AttachmentKind::Image, "webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Flag a lead for return.
///
/// POST /api/v1/leads/:lead_id/returns
pub async fn request_return(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(lead_id): Path<i64>,
    body: Option<Json<RequestReturnBody>>,
) -> Result<(StatusCode, Json<LeadReturn>), ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    body.validate()?;
    let ret = service(&state).request(&actor, lead_id, &body).await?;
    Ok((StatusCode::CREATED, Json(ret)))
}

/// GET /api/v1/returns?open_only=true
pub async fn list_returns(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(query): Query<ListReturnsQuery>,
) -> Result<Json<Vec<LeadReturn>>, ApiError> {
    Ok(Json(service(&state).list(&actor, &query).await?))
}

/// GET /api/v1/returns/:return_id
pub async fn get_return(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(return_id): Path<i64>,
) -> Result<Json<LeadReturn>, ApiError> {
    Ok(Json(service(&state).get(&actor, return_id).await?))
}

/// Upload evidence for a pending return.
///
/// POST /api/v1/returns/:return_id/evidence
///
/// Files are base64-encoded in the JSON body.
pub async fn submit_evidence(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(return_id): Path<i64>,
    Json(body): Json<SubmitEvidenceBody>,
) -> Result<Json<LeadReturn>, ApiError> {
    body.validate()?;
    Ok(Json(
        service(&state)
            .submit_evidence(&actor, return_id, &body)
            .await?,
    ))
}

/// Download one evidence file.
///
/// GET /api/v1/returns/:return_id/attachments/:attachment_id
pub async fn download_attachment(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path((return_id, attachment_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    let (attachment, bytes) = service(&state)
        .download(&actor, return_id, attachment_id)
        .await?;

    let content_type = content_type(attachment.kind, &attachment.file_name);
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        attachment.file_name
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

/// Accept or reject a return under review (admin).
///
/// POST /api/v1/returns/:return_id/resolve
pub async fn resolve_return(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(return_id): Path<i64>,
    Json(body): Json<ResolveReturnBody>,
) -> Result<Json<LeadReturn>, ApiError> {
    body.validate()?;
    Ok(Json(
        service(&state).resolve(&actor, return_id, &body).await?,
    ))
}

/// Cancel an open return and restore its lead.
///
/// POST /api/v1/returns/:return_id/cancel
pub async fn cancel_return(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(return_id): Path<i64>,
) -> Result<Json<LeadReturn>, ApiError> {
    Ok(Json(service(&state).cancel(&actor, return_id).await?))
}
