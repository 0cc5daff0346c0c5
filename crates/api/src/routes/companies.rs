//! Company administration routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use validator::Validate;

use domain::models::company::{CreateCompanyRequest, UpdateCompanySettingsRequest};
use domain::models::{Actor, Company, Role, User};
use persistence::repositories::{CompanyRepository, CreateCompanyInput, UserRepository};

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{AdminUser, CurrentUser};

fn blank_to_none(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn ensure_company_access(actor: &Actor, company_id: i64) -> Result<(), ApiError> {
    match actor.role {
        Role::Admin => Ok(()),
        Role::Coordinator | Role::Agent if actor.company_id == Some(company_id) => Ok(()),
        Role::Coordinator | Role::Agent => Err(ApiError::Forbidden(
            "You can only access your own company".to_string(),
        )),
    }
}

async fn load_company(state: &AppState, company_id: i64) -> Result<Company, ApiError> {
    CompanyRepository::new(state.pool.clone())
        .find_by_id(company_id)
        .await?
        .map(Company::from)
        .ok_or_else(|| ApiError::NotFound(format!("Company {} not found", company_id)))
}

/// Create a company.
///
/// POST /api/v1/companies
pub async fn create_company(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
    Json(request): Json<CreateCompanyRequest>,
) -> Result<(StatusCode, Json<Company>), ApiError> {
    request.validate()?;

    let repo = CompanyRepository::new(state.pool.clone());
    let company = Company::from(
        repo.create(CreateCompanyInput {
            name: request.name.trim().to_string(),
            has_api: request.has_api,
            api_url: blank_to_none(request.api_url.as_deref()),
            api_token: blank_to_none(request.api_token.as_deref()),
            max_requests_per_agent: request.max_requests_per_agent,
            auto_assign: request.auto_assign,
            agents_can_refuse: request.agents_can_refuse,
        })
        .await?,
    );

    info!(
        company_id = company.id,
        user_id = actor.user_id,
        has_api = company.has_api,
        "Company created"
    );

    Ok((StatusCode::CREATED, Json(company)))
}

/// List all companies.
///
/// GET /api/v1/companies
pub async fn list_companies(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<Vec<Company>>, ApiError> {
    let companies = CompanyRepository::new(state.pool.clone())
        .list()
        .await?
        .into_iter()
        .map(Company::from)
        .collect();
    Ok(Json(companies))
}

/// GET /api/v1/companies/:company_id
pub async fn get_company(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(company_id): Path<i64>,
) -> Result<Json<Company>, ApiError> {
    ensure_company_access(&actor, company_id)?;
    Ok(Json(load_company(&state, company_id).await?))
}

/// Update lead-distribution and partner settings.
///
/// PATCH /api/v1/companies/:company_id/settings
///
/// Absent fields keep their value; the partner settings are re-checked on
/// the merged result.
pub async fn update_settings(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
    Path(company_id): Path<i64>,
    Json(request): Json<UpdateCompanySettingsRequest>,
) -> Result<Json<Company>, ApiError> {
    request.validate()?;

    let current = load_company(&state, company_id).await?;
    let merged = request.merge_into(&current).map_err(|e| {
        ApiError::Validation(
            e.message
                .map(|m| m.to_string())
                .unwrap_or_else(|| e.code.to_string()),
        )
    })?;

    let updated = CompanyRepository::new(state.pool.clone())
        .update_settings(
            company_id,
            CreateCompanyInput {
                name: merged.name.trim().to_string(),
                has_api: merged.has_api,
                api_url: blank_to_none(merged.api_url.as_deref()),
                api_token: blank_to_none(merged.api_token.as_deref()),
                max_requests_per_agent: merged.max_requests_per_agent,
                auto_assign: merged.auto_assign,
                agents_can_refuse: merged.agents_can_refuse,
            },
        )
        .await?
        .map(Company::from)
        .ok_or_else(|| ApiError::NotFound(format!("Company {} not found", company_id)))?;

    info!(
        company_id,
        user_id = actor.user_id,
        auto_assign = updated.auto_assign,
        max_requests_per_agent = updated.max_requests_per_agent,
        agents_can_refuse = updated.agents_can_refuse,
        has_api = updated.has_api,
        "Company settings updated"
    );

    Ok(Json(updated))
}

/// Users of a company (coordinators and agents).
///
/// GET /api/v1/companies/:company_id/agents
pub async fn list_agents(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(company_id): Path<i64>,
) -> Result<Json<Vec<User>>, ApiError> {
    match actor.role {
        Role::Admin => {}
        Role::Coordinator => ensure_company_access(&actor, company_id)?,
        Role::Agent => {
            return Err(ApiError::Forbidden(
                "Agents cannot list company users".to_string(),
            ))
        }
    }
    load_company(&state, company_id).await?;

    let users = UserRepository::new(state.pool.clone())
        .list_by_company(company_id)
        .await?
        .into_iter()
        .map(User::from)
        .collect();
    Ok(Json(users))
}
