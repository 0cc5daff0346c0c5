//! Bearer-token authentication extractors.
//!
//! The acting identity is rebuilt from the JWT claims on every request;
//! handlers never trust a role or company sent in the body.

use std::str::FromStr;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use domain::models::{Actor, Role};
use shared::jwt::{extract_user_id, Claims, JwtConfig, JwtError};

use crate::app::AppState;
use crate::error::ApiError;

/// The authenticated caller.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Actor);

/// The authenticated caller, who must be an administrator.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub Actor);

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

    header
        .strip_prefix("Bearer ")
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Invalid Authorization header format".to_string()))
}

fn actor_from_claims(claims: &Claims) -> Result<Actor, ApiError> {
    let user_id = extract_user_id(claims)
        .map_err(|_| ApiError::Unauthorized("Invalid token subject".to_string()))?;
    let role = Role::from_str(&claims.role)
        .map_err(|_| ApiError::Unauthorized("Invalid token role".to_string()))?;

    if role.requires_company() && claims.company_id.is_none() {
        return Err(ApiError::Unauthorized(
            "Token is missing the user's company".to_string(),
        ));
    }

    Ok(Actor {
        user_id,
        role,
        company_id: claims.company_id,
    })
}

/// Validates `token` and returns the caller it identifies.
pub fn authenticate(jwt: &JwtConfig, token: &str) -> Result<Actor, ApiError> {
    let claims = jwt.validate_token(token).map_err(|e| match e {
        JwtError::TokenExpired => ApiError::Unauthorized("Token has expired".to_string()),
        _ => ApiError::Unauthorized("Invalid or expired token".to_string()),
    })?;
    actor_from_claims(&claims)
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(actor) = parts.extensions.get::<Actor>() {
            return Ok(CurrentUser(*actor));
        }

        let actor = authenticate(&state.jwt, bearer_token(parts)?)?;
        parts.extensions.insert(actor);
        Ok(CurrentUser(actor))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(actor) = CurrentUser::from_request_parts(parts, state).await?;
        match actor.role {
            Role::Admin => Ok(AdminUser(actor)),
            Role::Coordinator | Role::Agent => Err(ApiError::Forbidden(
                "Administrator access required".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::jwt::TokenSubject;

    fn jwt() -> JwtConfig {
        JwtConfig::new("extractor-test-secret-1234", 600, 0).unwrap()
    }

    fn token(role: &str, company_id: Option<i64>) -> String {
        jwt()
            .generate_access_token(TokenSubject {
                user_id: 30,
                role,
                company_id,
            })
            .unwrap()
            .0
    }

    #[test]
    fn test_agent_token_becomes_actor() {
        let actor = authenticate(&jwt(), &token("agente", Some(7))).unwrap();
        assert_eq!(
            actor,
            Actor {
                user_id: 30,
                role: Role::Agent,
                company_id: Some(7)
            }
        );
    }

    #[test]
    fn test_admin_token_has_no_company() {
        let actor = authenticate(&jwt(), &token("administrador", None)).unwrap();
        assert_eq!(actor.role, Role::Admin);
        assert_eq!(actor.company_id, None);
    }

    #[test]
    fn test_company_role_without_company_is_rejected() {
        assert!(matches!(
            authenticate(&jwt(), &token("coordinador", None)),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        assert!(matches!(
            authenticate(&jwt(), &token("superuser", None)),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let other = JwtConfig::new("a-completely-different-secret", 600, 0).unwrap();
        let (foreign, _) = other
            .generate_access_token(TokenSubject {
                user_id: 1,
                role: "administrador",
                company_id: None,
            })
            .unwrap();
        assert!(authenticate(&jwt(), &foreign).is_err());
    }
}
