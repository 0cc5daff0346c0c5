//! Login and user provisioning.

use std::sync::Arc;

use persistence::repositories::{CompanyRepository, CreateUserInput, UserRepository};
use shared::jwt::{JwtConfig, JwtError, TokenSubject};
use shared::password::{hash_password, verify_password, PasswordError};
use sqlx::PgPool;
use thiserror::Error;

use domain::models::user::{CreateUserRequest, LoginResponse};
use domain::models::User;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Email already registered")]
    EmailAlreadyExists,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User is disabled")]
    UserDisabled,

    #[error("Company {0} not found")]
    CompanyNotFound(i64),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Password error: {0}")]
    PasswordError(#[from] PasswordError),

    #[error("Token error: {0}")]
    TokenError(#[from] JwtError),
}

/// Authentication service.
pub struct AuthService {
    pool: PgPool,
    jwt: Arc<JwtConfig>,
}

impl AuthService {
    pub fn new(pool: PgPool, jwt: Arc<JwtConfig>) -> Self {
        Self { pool, jwt }
    }

    /// Checks credentials and issues an access token.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let users = UserRepository::new(self.pool.clone());
        let entity = users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &entity.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }
        if !entity.is_active {
            return Err(AuthError::UserDisabled);
        }

        let user = User::from(entity);
        let (access_token, jti) = self.jwt.generate_access_token(TokenSubject {
            user_id: user.id,
            role: user.role.as_str(),
            company_id: user.company_id,
        })?;

        tracing::info!(user_id = user.id, role = %user.role, jti = %jti, "User logged in");

        Ok(LoginResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.access_token_expiry_secs,
            user,
        })
    }

    /// Creates a user. The request must already be validated.
    pub async fn create_user(&self, request: &CreateUserRequest) -> Result<User, AuthError> {
        if let Some(company_id) = request.company_id {
            let companies = CompanyRepository::new(self.pool.clone());
            if companies.find_by_id(company_id).await?.is_none() {
                return Err(AuthError::CompanyNotFound(company_id));
            }
        }

        let password_hash = hash_password(&request.password)?;
        let users = UserRepository::new(self.pool.clone());
        let created = users
            .create(CreateUserInput {
                email: request.email.clone(),
                password_hash,
                name: request.name.trim().to_string(),
                role: request.role.into(),
                company_id: request.company_id,
            })
            .await;

        match created {
            Ok(entity) => {
                let user = User::from(entity);
                tracing::info!(
                    user_id = user.id,
                    role = %user.role,
                    company_id = ?user.company_id,
                    "User created"
                );
                Ok(user)
            }
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
                Err(AuthError::EmailAlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }
}
