//! User administration routes.

use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

use domain::models::user::CreateUserRequest;
use domain::models::User;
use persistence::repositories::UserRepository;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{AdminUser, CurrentUser};
use crate::services::AuthService;

/// Create a user.
///
/// POST /api/v1/users
///
/// Coordinators and agents must name an existing company; administrators
/// must not.
pub async fn create_user(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    request.validate()?;

    let service = AuthService::new(state.pool.clone(), state.jwt.clone());
    let user = service.create_user(&request).await?;

    tracing::info!(user_id = user.id, created_by = actor.user_id, "User provisioned");
    Ok((StatusCode::CREATED, Json(user)))
}

/// The authenticated user's profile.
///
/// GET /api/v1/users/me
pub async fn me(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
) -> Result<Json<User>, ApiError> {
    let user = UserRepository::new(state.pool.clone())
        .find_by_id(actor.user_id)
        .await?
        .map(User::from)
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(Json(user))
}
