//! User entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use domain::models::{Role, User};

/// Database enum for user roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "user_role")]
pub enum UserRoleDb {
    #[sqlx(rename = "administrador")]
    Admin,
    #[sqlx(rename = "coordinador")]
    Coordinator,
    #[sqlx(rename = "agente")]
    Agent,
}

impl From<UserRoleDb> for Role {
    fn from(db: UserRoleDb) -> Self {
        match db {
            UserRoleDb::Admin => Role::Admin,
            UserRoleDb::Coordinator => Role::Coordinator,
            UserRoleDb::Agent => Role::Agent,
        }
    }
}

impl From<Role> for UserRoleDb {
    fn from(role: Role) -> Self {
        match role {
            Role::Admin => UserRoleDb::Admin,
            Role::Coordinator => UserRoleDb::Coordinator,
            Role::Agent => UserRoleDb::Agent,
        }
    }
}

/// Database row mapping for the users table.
#[derive(Debug, Clone, FromRow)]
pub struct UserEntity {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: UserRoleDb,
    pub company_id: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserEntity> for User {
    fn from(entity: UserEntity) -> Self {
        Self {
            id: entity.id,
            email: entity.email,
            name: entity.name,
            role: entity.role.into(),
            company_id: entity.company_id,
            is_active: entity.is_active,
            created_at: entity.created_at,
        }
    }
}
