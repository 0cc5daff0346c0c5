//! Company entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use domain::models::Company;

/// Database row mapping for the companies table.
#[derive(Debug, Clone, FromRow)]
pub struct CompanyEntity {
    pub id: i64,
    pub name: String,
    pub has_api: bool,
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub max_requests_per_agent: i32,
    pub auto_assign: bool,
    pub agents_can_refuse: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CompanyEntity> for Company {
    fn from(entity: CompanyEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            has_api: entity.has_api,
            api_url: entity.api_url,
            api_token: entity.api_token,
            max_requests_per_agent: entity.max_requests_per_agent,
            auto_assign: entity.auto_assign,
            agents_can_refuse: entity.agents_can_refuse,
            created_at: entity.created_at,
        }
    }
}
