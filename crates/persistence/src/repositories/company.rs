//! Company repository for database operations.

use sqlx::PgPool;

use crate::entities::CompanyEntity;
use crate::metrics::{QueryTimer, Table};

/// Input for creating a company.
#[derive(Debug, Clone)]
pub struct CreateCompanyInput {
    pub name: String,
    pub has_api: bool,
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub max_requests_per_agent: i32,
    pub auto_assign: bool,
    pub agents_can_refuse: bool,
}

/// Repository for company database operations.
#[derive(Clone)]
pub struct CompanyRepository {
    pool: PgPool,
}

impl CompanyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, input: CreateCompanyInput) -> Result<CompanyEntity, sqlx::Error> {
        let timer = QueryTimer::new(Table::Companies, "create_company");
        let result = sqlx::query_as::<_, CompanyEntity>(
            r#"
            INSERT INTO companies (
                name, has_api, api_url, api_token,
                max_requests_per_agent, auto_assign, agents_can_refuse
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&input.name)
        .bind(input.has_api)
        .bind(&input.api_url)
        .bind(&input.api_token)
        .bind(input.max_requests_per_agent)
        .bind(input.auto_assign)
        .bind(input.agents_can_refuse)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<CompanyEntity>, sqlx::Error> {
        let timer = QueryTimer::new(Table::Companies, "find_company_by_id");
        let result = sqlx::query_as::<_, CompanyEntity>("SELECT * FROM companies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        result
    }

    pub async fn list(&self) -> Result<Vec<CompanyEntity>, sqlx::Error> {
        let timer = QueryTimer::new(Table::Companies, "list_companies");
        let result = sqlx::query_as::<_, CompanyEntity>("SELECT * FROM companies ORDER BY name")
            .fetch_all(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Returns which of `ids` exist.
    pub async fn existing_ids(&self, ids: &[i64]) -> Result<Vec<i64>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let timer = QueryTimer::new(Table::Companies, "existing_company_ids");
        let result = sqlx::query_scalar::<_, i64>("SELECT id FROM companies WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Overwrites the settings of a company with already-merged values.
    pub async fn update_settings(
        &self,
        id: i64,
        input: CreateCompanyInput,
    ) -> Result<Option<CompanyEntity>, sqlx::Error> {
        let timer = QueryTimer::new(Table::Companies, "update_company_settings");
        let result = sqlx::query_as::<_, CompanyEntity>(
            r#"
            UPDATE companies
            SET name = $2,
                has_api = $3,
                api_url = $4,
                api_token = $5,
                max_requests_per_agent = $6,
                auto_assign = $7,
                agents_can_refuse = $8,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(input.has_api)
        .bind(&input.api_url)
        .bind(&input.api_token)
        .bind(input.max_requests_per_agent)
        .bind(input.auto_assign)
        .bind(input.agents_can_refuse)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }
}
