//! Lead repository for database operations.
//!
//! Every write that changes the owner of a lead is a single conditional
//! `UPDATE` guarded on the owner the caller saw, so two concurrent claims on
//! the same lead can never both succeed.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;
use sqlx::{PgConnection, PgPool, Postgres};

use domain::models::lead::{AssigneeChange, Lead, LeadFilter, LeadPatch, LeadView, NewLead};

use crate::entities::{LeadEntity, LeadStatusDb, PlatformDb, TempStatusDb};
use crate::metrics::{QueryTimer, Table};

/// Upper bound on rows returned by an export.
pub const MAX_EXPORT_ROWS: i64 = 50_000;

/// A bind value of a dynamic filter.
enum FilterArg {
    Id(i64),
    Text(String),
    Time(DateTime<Utc>),
    Status(LeadStatusDb),
    TempStatus(TempStatusDb),
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Builds the WHERE clause for a scoped filter; placeholders start at `$1`.
fn where_clause(filter: &LeadFilter) -> (String, Vec<FilterArg>) {
    let mut conditions: Vec<String> = Vec::new();
    let mut args: Vec<FilterArg> = Vec::new();

    match filter.view {
        LeadView::Active => conditions.push("status = 'activo'".to_string()),
        LeadView::History => conditions
            .push("status IN ('convertido', 'perdido', 'no_valido', 'devolucion')".to_string()),
        LeadView::Unassigned => conditions.push("company_id IS NULL".to_string()),
    }

    if let Some(company_id) = filter.company_id {
        args.push(FilterArg::Id(company_id));
        conditions.push(format!("company_id = ${}", args.len()));
    }
    if let Some(user_id) = filter.user_id {
        args.push(FilterArg::Id(user_id));
        conditions.push(format!("user_id = ${}", args.len()));
    }
    if let Some(status) = filter.status {
        args.push(FilterArg::Status(status.into()));
        conditions.push(format!("status = ${}", args.len()));
    }
    if let Some(temp_status) = filter.temp_status {
        args.push(FilterArg::TempStatus(temp_status.into()));
        conditions.push(format!("temp_status = ${}", args.len()));
    }
    if let Some(ref phone) = filter.phone {
        args.push(FilterArg::Text(format!("%{}%", escape_like(phone))));
        conditions.push(format!("phone LIKE ${}", args.len()));
    }
    let column = filter.date_field.column();
    if let Some(from) = filter.from {
        args.push(FilterArg::Time(from));
        conditions.push(format!("{} >= ${}", column, args.len()));
    }
    if let Some(to) = filter.to {
        args.push(FilterArg::Time(to));
        conditions.push(format!("{} <= ${}", column, args.len()));
    }

    (conditions.join(" AND "), args)
}

fn bind_args<'q, O>(
    mut query: QueryAs<'q, Postgres, O, PgArguments>,
    args: &[FilterArg],
) -> QueryAs<'q, Postgres, O, PgArguments> {
    for arg in args {
        query = match arg {
            FilterArg::Id(v) => query.bind(*v),
            FilterArg::Text(v) => query.bind(v.clone()),
            FilterArg::Time(v) => query.bind(*v),
            FilterArg::Status(v) => query.bind(*v),
            FilterArg::TempStatus(v) => query.bind(*v),
        };
    }
    query
}

/// Applies a lifecycle patch if the lead still has the owner and status of
/// `before`. Returns `None` when the guard no longer holds.
pub async fn apply_patch_on(
    conn: &mut PgConnection,
    before: &Lead,
    patch: &LeadPatch,
) -> Result<Option<LeadEntity>, sqlx::Error> {
    let mut sets = vec!["updated_at = NOW()".to_string()];
    let mut param = 3;

    if patch.status.is_some() {
        param += 1;
        sets.push(format!("status = ${}", param));
    }
    if patch.temp_status.is_some() {
        param += 1;
        sets.push(format!("temp_status = ${}", param));
    }
    match patch.assignee {
        Some(AssigneeChange::Claim { .. }) => {
            sets.push(format!("user_id = ${}", param + 1));
            sets.push(format!("agent_assigned_at = ${}", param + 2));
        }
        Some(AssigneeChange::Release) => {
            sets.push("user_id = NULL".to_string());
            sets.push("agent_assigned_at = NULL".to_string());
        }
        None => {}
    }

    let sql = format!(
        r#"
        UPDATE leads
        SET {}
        WHERE id = $1 AND status = $2 AND user_id IS NOT DISTINCT FROM $3
        RETURNING *
        "#,
        sets.join(", ")
    );

    let mut query = sqlx::query_as::<_, LeadEntity>(&sql)
        .bind(before.id)
        .bind(LeadStatusDb::from(before.status))
        .bind(before.user_id);
    if let Some(status) = patch.status {
        query = query.bind(LeadStatusDb::from(status));
    }
    if let Some(temp_status) = patch.temp_status {
        query = query.bind(TempStatusDb::from(temp_status));
    }
    if let Some(AssigneeChange::Claim { user_id, at }) = patch.assignee {
        query = query.bind(user_id).bind(at);
    }

    query.fetch_optional(conn).await
}

/// Claims the most recently entered unassigned active lead of a company.
///
/// Rows locked by a concurrent claim are skipped rather than waited on.
pub async fn claim_most_recent_unassigned(
    conn: &mut PgConnection,
    company_id: i64,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<Option<LeadEntity>, sqlx::Error> {
    let timer = QueryTimer::new(Table::Leads, "claim_most_recent_unassigned_lead");
    let result = sqlx::query_as::<_, LeadEntity>(
        r#"
        UPDATE leads
        SET user_id = $2, agent_assigned_at = $3, updated_at = NOW()
        WHERE id = (
            SELECT id FROM leads
            WHERE company_id = $1 AND user_id IS NULL AND status = 'activo'
            ORDER BY entered_at DESC, id DESC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
        )
        AND user_id IS NULL
        RETURNING *
        "#,
    )
    .bind(company_id)
    .bind(user_id)
    .bind(now)
    .fetch_optional(conn)
    .await;
    timer.record();
    result
}

/// Claims a specific lead if it is an unassigned active lead of the company.
pub async fn claim_unassigned(
    conn: &mut PgConnection,
    lead_id: i64,
    company_id: i64,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<Option<LeadEntity>, sqlx::Error> {
    let timer = QueryTimer::new(Table::Leads, "claim_unassigned_lead");
    let result = sqlx::query_as::<_, LeadEntity>(
        r#"
        UPDATE leads
        SET user_id = $3, agent_assigned_at = $4, updated_at = NOW()
        WHERE id = $1 AND company_id = $2 AND user_id IS NULL AND status = 'activo'
        RETURNING *
        "#,
    )
    .bind(lead_id)
    .bind(company_id)
    .bind(user_id)
    .bind(now)
    .fetch_optional(conn)
    .await;
    timer.record_guarded(&result);
    result
}

/// Repository for lead database operations.
#[derive(Clone)]
pub struct LeadRepository {
    pool: PgPool,
}

impl LeadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<LeadEntity>, sqlx::Error> {
        let timer = QueryTimer::new(Table::Leads, "find_lead_by_id");
        let result = sqlx::query_as::<_, LeadEntity>("SELECT * FROM leads WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Lists a page of leads matching the filter, with the total count.
    pub async fn list(
        &self,
        filter: &LeadFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<LeadEntity>, i64), sqlx::Error> {
        let timer = QueryTimer::new(Table::Leads, "list_leads");
        let (where_sql, args) = where_clause(filter);

        let count_sql = format!("SELECT COUNT(*) FROM leads WHERE {}", where_sql);
        let (total,) = bind_args(sqlx::query_as::<_, (i64,)>(&count_sql), &args)
            .fetch_one(&self.pool)
            .await?;

        let list_sql = format!(
            r#"
            SELECT * FROM leads
            WHERE {}
            ORDER BY {} DESC NULLS LAST, id DESC
            LIMIT ${} OFFSET ${}
            "#,
            where_sql,
            filter.date_field.column(),
            args.len() + 1,
            args.len() + 2
        );
        let entities = bind_args(sqlx::query_as::<_, LeadEntity>(&list_sql), &args)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        timer.record();
        Ok((entities, total))
    }

    /// All leads matching the filter, capped at [`MAX_EXPORT_ROWS`].
    pub async fn export(&self, filter: &LeadFilter) -> Result<Vec<LeadEntity>, sqlx::Error> {
        let timer = QueryTimer::new(Table::Leads, "export_leads");
        let (where_sql, args) = where_clause(filter);
        let sql = format!(
            r#"
            SELECT * FROM leads
            WHERE {}
            ORDER BY {} DESC NULLS LAST, id DESC
            LIMIT ${}
            "#,
            where_sql,
            filter.date_field.column(),
            args.len() + 1
        );
        let result = bind_args(sqlx::query_as::<_, LeadEntity>(&sql), &args)
            .bind(MAX_EXPORT_ROWS)
            .fetch_all(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Phones among `phones` that already exist.
    pub async fn existing_phones(&self, phones: &[String]) -> Result<Vec<String>, sqlx::Error> {
        if phones.is_empty() {
            return Ok(Vec::new());
        }
        let timer = QueryTimer::new(Table::Leads, "existing_lead_phones");
        let result =
            sqlx::query_scalar::<_, String>("SELECT DISTINCT phone FROM leads WHERE phone = ANY($1)")
                .bind(phones)
                .fetch_all(&self.pool)
                .await;
        timer.record();
        result
    }

    /// Ids among `ids` that exist.
    pub async fn existing_ids(&self, ids: &[i64]) -> Result<Vec<i64>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let timer = QueryTimer::new(Table::Leads, "existing_lead_ids");
        let result = sqlx::query_scalar::<_, i64>("SELECT id FROM leads WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Inserts a batch of leads in one transaction.
    ///
    /// Leads with a company are stamped as assigned to it at `now`.
    pub async fn insert_many(
        &self,
        leads: &[NewLead],
        now: DateTime<Utc>,
    ) -> Result<Vec<LeadEntity>, sqlx::Error> {
        let timer = QueryTimer::new(Table::Leads, "insert_leads");
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(leads.len());

        for lead in leads {
            let entity = sqlx::query_as::<_, LeadEntity>(
                r#"
                INSERT INTO leads (
                    name, phone, platform, quality, notes,
                    company_id, company_assigned_at, entered_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING *
                "#,
            )
            .bind(&lead.name)
            .bind(&lead.phone)
            .bind(PlatformDb::from(lead.platform))
            .bind(lead.quality)
            .bind(&lead.notes)
            .bind(lead.company_id)
            .bind(lead.company_id.map(|_| now))
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;
            inserted.push(entity);
        }

        tx.commit().await?;
        timer.record();
        Ok(inserted)
    }

    /// Applies a lifecycle patch guarded on the snapshot `before`.
    pub async fn apply_patch(
        &self,
        before: &Lead,
        patch: &LeadPatch,
    ) -> Result<Option<LeadEntity>, sqlx::Error> {
        let timer = QueryTimer::new(Table::Leads, "apply_lead_patch");
        let mut conn = self.pool.acquire().await?;
        let result = apply_patch_on(&mut *conn, before, patch).await;
        timer.record_guarded(&result);
        result
    }

    /// Assigns every lead in `lead_ids` to a company in one transaction.
    ///
    /// Returns `None`, writing nothing, when any id does not exist. A lead
    /// moving to a different company loses its agent.
    pub async fn assign_company(
        &self,
        lead_ids: &[i64],
        company_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<Vec<LeadEntity>>, sqlx::Error> {
        let timer = QueryTimer::new(Table::Leads, "assign_leads_to_company");
        let mut ids = lead_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mut tx = self.pool.begin().await?;

        let locked = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM leads WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;

        if locked.len() != ids.len() {
            tx.rollback().await?;
            timer.record();
            return Ok(None);
        }

        let updated = sqlx::query_as::<_, LeadEntity>(
            r#"
            UPDATE leads
            SET user_id = CASE WHEN company_id = $1 THEN user_id ELSE NULL END,
                agent_assigned_at = CASE WHEN company_id = $1 THEN agent_assigned_at ELSE NULL END,
                company_id = $1,
                company_assigned_at = $2,
                updated_at = NOW()
            WHERE id = ANY($3)
            RETURNING *
            "#,
        )
        .bind(company_id)
        .bind(now)
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        Ok(Some(updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::lead::{DateField, LeadStatus, TempStatus};

    fn filter() -> LeadFilter {
        LeadFilter {
            view: LeadView::Active,
            company_id: None,
            user_id: None,
            status: None,
            temp_status: None,
            phone: None,
            date_field: DateField::EnteredAt,
            from: None,
            to: None,
        }
    }

    #[test]
    fn test_where_clause_for_plain_view() {
        let (sql, args) = where_clause(&filter());
        assert_eq!(sql, "status = 'activo'");
        assert!(args.is_empty());
    }

    #[test]
    fn test_where_clause_numbers_placeholders_in_order() {
        let f = LeadFilter {
            view: LeadView::History,
            company_id: Some(7),
            user_id: Some(30),
            status: Some(LeadStatus::Lost),
            temp_status: Some(TempStatus::NotClosed),
            phone: Some("600".into()),
            date_field: DateField::AgentAssignedAt,
            from: Some(Utc::now()),
            to: Some(Utc::now()),
        };
        let (sql, args) = where_clause(&f);
        assert_eq!(args.len(), 7);
        assert!(sql.contains("company_id = $1"));
        assert!(sql.contains("user_id = $2"));
        assert!(sql.contains("status = $3"));
        assert!(sql.contains("temp_status = $4"));
        assert!(sql.contains("phone LIKE $5"));
        assert!(sql.contains("agent_assigned_at >= $6"));
        assert!(sql.contains("agent_assigned_at <= $7"));
    }

    #[test]
    fn test_unassigned_view() {
        let f = LeadFilter {
            view: LeadView::Unassigned,
            ..filter()
        };
        let (sql, _) = where_clause(&f);
        assert_eq!(sql, "company_id IS NULL");
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("60_0%"), "60\\_0\\%");
    }
}
