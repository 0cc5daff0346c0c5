//! User repository for database operations.

use sqlx::PgPool;

use crate::entities::{UserEntity, UserRoleDb};
use crate::metrics::{QueryTimer, Table};

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: UserRoleDb,
    pub company_id: Option<i64>,
}

/// Repository for user database operations.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, input: CreateUserInput) -> Result<UserEntity, sqlx::Error> {
        let timer = QueryTimer::new(Table::Users, "create_user");
        let result = sqlx::query_as::<_, UserEntity>(
            r#"
            INSERT INTO users (email, password_hash, name, role, company_id)
            VALUES (LOWER($1), $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&input.email)
        .bind(&input.password_hash)
        .bind(&input.name)
        .bind(input.role)
        .bind(input.company_id)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new(Table::Users, "find_user_by_id");
        let result = sqlx::query_as::<_, UserEntity>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        result
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new(Table::Users, "find_user_by_email");
        let result =
            sqlx::query_as::<_, UserEntity>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
                .bind(email)
                .fetch_optional(&self.pool)
                .await;
        timer.record();
        result
    }

    /// Users of a company, coordinators first.
    pub async fn list_by_company(&self, company_id: i64) -> Result<Vec<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new(Table::Users, "list_users_by_company");
        let result = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT * FROM users
            WHERE company_id = $1
            ORDER BY role, name
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Display name of a user, used to enrich ownership conflicts.
    pub async fn find_name(&self, id: i64) -> Result<Option<String>, sqlx::Error> {
        let timer = QueryTimer::new(Table::Users, "find_user_name");
        let result = sqlx::query_scalar::<_, String>("SELECT name FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        result
    }
}
