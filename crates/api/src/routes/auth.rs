//! Authentication routes.

use axum::{extract::State, Json};
use validator::Validate;

use domain::models::user::{LoginRequest, LoginResponse};

use crate::app::AppState;
use crate::error::ApiError;
use crate::services::auth::{AuthError, AuthService};

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::EmailAlreadyExists => {
                ApiError::Conflict("Email already registered".to_string())
            }
            AuthError::InvalidCredentials => {
                ApiError::Unauthorized("Invalid email or password".to_string())
            }
            AuthError::UserDisabled => ApiError::Forbidden("User is disabled".to_string()),
            AuthError::CompanyNotFound(id) => ApiError::NotFound(format!("Company {}", id)),
            AuthError::DatabaseError(db_err) => ApiError::from(db_err),
            AuthError::PasswordError(e) => ApiError::Internal(format!("Password error: {}", e)),
            AuthError::TokenError(e) => ApiError::Internal(format!("Token error: {}", e)),
        }
    }
}

/// Login with email and password.
///
/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    request.validate()?;

    let service = AuthService::new(state.pool.clone(), state.jwt.clone());
    let response = service
        .login(request.email.trim(), &request.password)
        .await?;

    Ok(Json(response))
}
