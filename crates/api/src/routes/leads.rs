//! Lead routes: listing, export, import, lifecycle and assignment.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use validator::Validate;

use domain::models::import::{ImportCsvQuery, ImportLeadsRequest, ImportReport};
use domain::models::lead::{
    AssignAgentRequest, AssignAgentResponse, AssignCompanyRequest, AssignCompanyResponse,
    LeadListResponse, ListLeadsQuery, RefuseLeadResponse, SetStatusRequest,
};
use domain::models::Lead;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{AdminUser, CurrentUser};
use crate::services::{ImportService, LeadService};

fn lead_service(state: &AppState) -> LeadService {
    LeadService::new(
        state.pool.clone(),
        state.partner.clone(),
        state.mirror.clone(),
    )
}

/// List leads in one of the views, scoped to the caller's role.
///
/// GET /api/v1/leads
pub async fn list_leads(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(query): Query<ListLeadsQuery>,
) -> Result<Json<LeadListResponse>, ApiError> {
    Ok(Json(lead_service(&state).list(&actor, &query).await?))
}

/// Export the filtered view as CSV.
///
/// GET /api/v1/leads/export
pub async fn export_leads(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(query): Query<ListLeadsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let csv = lead_service(&state).export_csv(&actor, &query).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"leads.csv\"",
            ),
        ],
        csv,
    ))
}

/// GET /api/v1/leads/:lead_id
pub async fn get_lead(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(lead_id): Path<i64>,
) -> Result<Json<Lead>, ApiError> {
    Ok(Json(lead_service(&state).get(&actor, lead_id).await?))
}

/// Import leads from JSON rows.
///
/// POST /api/v1/leads/import
///
/// Invalid and duplicate rows are reported, never fatal.
pub async fn import_leads(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
    Json(request): Json<ImportLeadsRequest>,
) -> Result<(StatusCode, Json<ImportReport>), ApiError> {
    let report = ImportService::new(state.pool.clone())
        .import_rows(&actor, &request.rows, request.check_duplicates)
        .await?;
    Ok((StatusCode::CREATED, Json(report)))
}

/// Import leads from a CSV body.
///
/// POST /api/v1/leads/import/csv?check_duplicates=true
///
/// Headers must be exactly `name,phone,platform,company_id,quality,notes`.
pub async fn import_leads_csv(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
    Query(query): Query<ImportCsvQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<ImportReport>), ApiError> {
    let report = ImportService::new(state.pool.clone())
        .import_csv(&actor, &body, query.check_duplicates)
        .await?;
    Ok((StatusCode::CREATED, Json(report)))
}

/// Change a lead's sub-status.
///
/// POST /api/v1/leads/:lead_id/status
///
/// Agents update leads they own. Coordinators also take an unassigned lead
/// of their company in the same write.
pub async fn set_status(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(lead_id): Path<i64>,
    Json(request): Json<SetStatusRequest>,
) -> Result<Json<Lead>, ApiError> {
    let lead = lead_service(&state)
        .change_status(&actor, lead_id, request.temp_status)
        .await?;
    Ok(Json(lead))
}

/// POST /api/v1/leads/:lead_id/cancel-status
pub async fn cancel_status(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
    Path(lead_id): Path<i64>,
) -> Result<Json<Lead>, ApiError> {
    Ok(Json(lead_service(&state).cancel_status(&actor, lead_id).await?))
}

/// Release a lead's agent.
///
/// POST /api/v1/leads/:lead_id/refuse
pub async fn refuse_lead(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(lead_id): Path<i64>,
) -> Result<Json<RefuseLeadResponse>, ApiError> {
    Ok(Json(lead_service(&state).refuse(&actor, lead_id).await?))
}

/// Hand leads to a company.
///
/// POST /api/v1/leads/assign-company
///
/// Leads for a company with a partner integration are pushed to its
/// webhook instead of being assigned locally.
pub async fn assign_company(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
    Json(request): Json<AssignCompanyRequest>,
) -> Result<Json<AssignCompanyResponse>, ApiError> {
    request.validate()?;
    Ok(Json(
        lead_service(&state).assign_company(&actor, &request).await?,
    ))
}

/// POST /api/v1/leads/:lead_id/assign-agent
pub async fn assign_agent(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(lead_id): Path<i64>,
    Json(request): Json<AssignAgentRequest>,
) -> Result<Json<AssignAgentResponse>, ApiError> {
    let response = lead_service(&state)
        .assign_agent(&actor, lead_id, request.user_id)
        .await?;
    Ok(Json(response))
}
