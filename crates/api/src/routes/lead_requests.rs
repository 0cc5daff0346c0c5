//! Lead request (solicitud) routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use domain::models::lead_request::{
    ApproveRequestBody, CreateRequestResponse, ListRequestsQuery, RejectRequestBody,
    RequestDecisionResponse,
};
use domain::models::LeadRequest;
use domain::services::QuotaStatus;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::CurrentUser;
use crate::services::LeadRequestService;

fn service(state: &AppState) -> LeadRequestService {
    LeadRequestService::new(state.pool.clone(), state.mirror.clone())
}

/// Request a new lead.
///
/// POST /api/v1/requests
///
/// Refused with 422 when the agent's untreated leads and pending requests
/// reach the company limit. Automatic companies decide immediately.
pub async fn create_request(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
) -> Result<(StatusCode, Json<CreateRequestResponse>), ApiError> {
    let response = service(&state).create(&actor).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/v1/requests/quota
pub async fn get_quota(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
) -> Result<Json<QuotaStatus>, ApiError> {
    Ok(Json(service(&state).quota(&actor).await?))
}

/// List requests: agents see their own, coordinators their company's.
///
/// GET /api/v1/requests
pub async fn list_requests(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(query): Query<ListRequestsQuery>,
) -> Result<Json<Vec<LeadRequest>>, ApiError> {
    Ok(Json(service(&state).list(&actor, &query).await?))
}

/// Approve a request and grant a lead in one transaction.
///
/// POST /api/v1/requests/:request_id/approve
pub async fn approve_request(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(request_id): Path<i64>,
    body: Option<Json<ApproveRequestBody>>,
) -> Result<Json<RequestDecisionResponse>, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    Ok(Json(
        service(&state).approve(&actor, request_id, &body).await?,
    ))
}

/// POST /api/v1/requests/:request_id/reject
pub async fn reject_request(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(request_id): Path<i64>,
    body: Option<Json<RejectRequestBody>>,
) -> Result<Json<LeadRequest>, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    body.validate()?;
    Ok(Json(
        service(&state).reject(&actor, request_id, &body).await?,
    ))
}

/// POST /api/v1/requests/:request_id/cancel
pub async fn cancel_request(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(request_id): Path<i64>,
) -> Result<Json<LeadRequest>, ApiError> {
    Ok(Json(service(&state).cancel(&actor, request_id).await?))
}
