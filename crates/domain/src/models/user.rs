//! Users, roles and the acting identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::{Validate, ValidationError};

/// The three back-office roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "administrador")]
    Admin,
    #[serde(rename = "coordinador")]
    Coordinator,
    #[serde(rename = "agente")]
    Agent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "administrador",
            Role::Coordinator => "coordinador",
            Role::Agent => "agente",
        }
    }

    /// Coordinators and agents always belong to a company.
    pub fn requires_company(&self) -> bool {
        match self {
            Role::Admin => false,
            Role::Coordinator | Role::Agent => true,
        }
    }

    /// Roles that can hold leads as their working owner.
    pub fn can_own_leads(&self) -> bool {
        match self {
            Role::Admin => false,
            Role::Coordinator | Role::Agent => true,
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "administrador" => Ok(Role::Admin),
            "coordinador" => Ok(Role::Coordinator),
            "agente" => Ok(Role::Agent),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The user performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
    pub company_id: Option<i64>,
}

impl Actor {
    pub fn belongs_to(&self, company_id: Option<i64>) -> bool {
        matches!((self.company_id, company_id), (Some(mine), Some(theirs)) if mine == theirs)
    }
}

/// User domain model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn as_actor(&self) -> Actor {
        Actor {
            user_id: self.id,
            role: self.role,
            company_id: self.company_id,
        }
    }
}

/// Request to create a user (administrators only).
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_company_for_role"))]
pub struct CreateUserRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,

    #[validate(length(min = 2, max = 100, message = "name must be 2-100 characters"))]
    pub name: String,

    #[validate(length(min = 8, max = 128, message = "password must be 8-128 characters"))]
    pub password: String,

    pub role: Role,

    pub company_id: Option<i64>,
}

fn validate_company_for_role(req: &CreateUserRequest) -> Result<(), ValidationError> {
    match (req.role.requires_company(), req.company_id) {
        (true, None) => {
            let mut err = ValidationError::new("company_required");
            err.message = Some("coordinators and agents need a company_id".into());
            Err(err)
        }
        (false, Some(_)) => {
            let mut err = ValidationError::new("company_not_allowed");
            err.message = Some("administrators cannot belong to a company".into());
            Err(err)
        }
        _ => Ok(()),
    }
}

/// Login request.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Login response.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: User,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_names() {
        assert_eq!(serde_json::to_string(&Role::Coordinator).unwrap(), "\"coordinador\"");
        assert_eq!("AGENTE".parse::<Role>().unwrap(), Role::Agent);
        assert!("supervisor".parse::<Role>().is_err());
    }

    #[test]
    fn test_actor_belongs_to() {
        let actor = Actor {
            user_id: 1,
            role: Role::Agent,
            company_id: Some(7),
        };
        assert!(actor.belongs_to(Some(7)));
        assert!(!actor.belongs_to(Some(8)));
        assert!(!actor.belongs_to(None));
    }

    #[test]
    fn test_create_user_requires_company_for_agents() {
        let req = CreateUserRequest {
            email: "agente@example.com".into(),
            name: "Agente Uno".into(),
            password: "supersecret".into(),
            role: Role::Agent,
            company_id: None,
        };
        assert!(req.validate().is_err());

        let req = CreateUserRequest {
            company_id: Some(3),
            ..req
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_create_admin_rejects_company() {
        let req = CreateUserRequest {
            email: "admin@example.com".into(),
            name: "Admin".into(),
            password: "supersecret".into(),
            role: Role::Admin,
            company_id: Some(1),
        };
        assert!(req.validate().is_err());
    }
}
