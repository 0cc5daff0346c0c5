//! Lead request repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use domain::models::lead_request::NO_LEADS_AVAILABLE;
use domain::services::QuotaUsage;
use domain::LeadError;

use crate::entities::{LeadEntity, LeadRequestEntity, LeadRequestStatusDb};
use crate::metrics::{QueryTimer, Table};
use crate::repositories::lead::{claim_most_recent_unassigned, claim_unassigned};

/// Result of an approval attempt.
#[derive(Debug)]
pub enum ApproveOutcome {
    /// The request was approved and the lead claimed for the agent.
    Approved {
        request: LeadRequestEntity,
        lead: LeadEntity,
    },
    /// No unassigned lead existed; the request was rejected.
    RejectedNoLeads(LeadRequestEntity),
    /// The chosen lead is not an unassigned lead of the company; nothing
    /// was written.
    LeadUnavailable,
    /// The request was already decided; nothing was written.
    NotPending(LeadRequestEntity),
    NotFound,
}

/// Filters for listing requests.
#[derive(Debug, Clone, Default)]
pub struct ListLeadRequestsQuery {
    pub company_id: Option<i64>,
    pub agent_id: Option<i64>,
    pub status: Option<LeadRequestStatusDb>,
}

async fn quota_usage_on(conn: &mut PgConnection, agent_id: i64) -> Result<QuotaUsage, sqlx::Error> {
    let (untreated_leads, pending_requests) = sqlx::query_as::<_, (i64, i64)>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM leads
             WHERE user_id = $1 AND status = 'activo' AND temp_status = 'sin_tratar'),
            (SELECT COUNT(*) FROM lead_requests
             WHERE agent_id = $1 AND status = 'pendiente')
        "#,
    )
    .bind(agent_id)
    .fetch_one(conn)
    .await?;

    Ok(QuotaUsage {
        untreated_leads,
        pending_requests,
    })
}

/// Repository for lead request database operations.
#[derive(Clone)]
pub struct LeadRequestRepository {
    pool: PgPool,
}

impl LeadRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<LeadRequestEntity>, sqlx::Error> {
        let timer = QueryTimer::new(Table::LeadRequests, "find_lead_request_by_id");
        let result =
            sqlx::query_as::<_, LeadRequestEntity>("SELECT * FROM lead_requests WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await;
        timer.record();
        result
    }

    /// Current quota usage of an agent.
    pub async fn quota_usage(&self, agent_id: i64) -> Result<QuotaUsage, sqlx::Error> {
        let timer = QueryTimer::new(Table::LeadRequests, "lead_request_quota_usage");
        let mut conn = self.pool.acquire().await?;
        let result = quota_usage_on(&mut *conn, agent_id).await;
        timer.record();
        result
    }

    /// Creates a pending request if `check` accepts the agent's usage.
    ///
    /// Usage is read and the row inserted under a per-agent transaction
    /// lock, so concurrent requests from one agent are serialized.
    pub async fn create_within_quota<F>(
        &self,
        agent_id: i64,
        company_id: i64,
        check: F,
    ) -> Result<LeadRequestEntity, LeadError>
    where
        F: FnOnce(QuotaUsage) -> Result<(), LeadError> + Send,
    {
        let timer = QueryTimer::new(Table::LeadRequests, "create_lead_request");
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(agent_id)
            .execute(&mut *tx)
            .await?;

        let usage = quota_usage_on(&mut *tx, agent_id).await?;
        if let Err(err) = check(usage) {
            tx.rollback().await?;
            timer.record();
            return Err(err);
        }

        let entity = sqlx::query_as::<_, LeadRequestEntity>(
            r#"
            INSERT INTO lead_requests (agent_id, company_id)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(agent_id)
        .bind(company_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        Ok(entity)
    }

    /// Approves a pending request and claims a lead for its agent in one
    /// transaction.
    ///
    /// With `lead_id` the given lead is claimed; otherwise the most recently
    /// entered unassigned lead of the request's company. When no lead is
    /// available in the latter case the request is rejected instead.
    /// `decided_by` is `None` for automatic approvals.
    pub async fn approve(
        &self,
        request_id: i64,
        decided_by: Option<i64>,
        lead_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<ApproveOutcome, sqlx::Error> {
        let timer = QueryTimer::new(Table::LeadRequests, "approve_lead_request");
        let mut tx = self.pool.begin().await?;

        let request = sqlx::query_as::<_, LeadRequestEntity>(
            "SELECT * FROM lead_requests WHERE id = $1 FOR UPDATE",
        )
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?;

        let request = match request {
            Some(r) if r.status == LeadRequestStatusDb::Pending => r,
            Some(r) => {
                tx.rollback().await?;
                timer.record();
                return Ok(ApproveOutcome::NotPending(r));
            }
            None => {
                tx.rollback().await?;
                timer.record();
                return Ok(ApproveOutcome::NotFound);
            }
        };

        let claimed = match lead_id {
            Some(lead_id) => {
                claim_unassigned(&mut *tx, lead_id, request.company_id, request.agent_id, now)
                    .await?
            }
            None => {
                claim_most_recent_unassigned(&mut *tx, request.company_id, request.agent_id, now)
                    .await?
            }
        };

        let outcome = match (claimed, lead_id) {
            (Some(lead), _) => {
                let request = sqlx::query_as::<_, LeadRequestEntity>(
                    r#"
                    UPDATE lead_requests
                    SET status = 'aprobada', lead_id = $2, decided_at = $3, decided_by = $4
                    WHERE id = $1 AND status = 'pendiente'
                    RETURNING *
                    "#,
                )
                .bind(request.id)
                .bind(lead.id)
                .bind(now)
                .bind(decided_by)
                .fetch_one(&mut *tx)
                .await?;
                ApproveOutcome::Approved { request, lead }
            }
            (None, Some(_)) => {
                tx.rollback().await?;
                timer.record();
                return Ok(ApproveOutcome::LeadUnavailable);
            }
            (None, None) => {
                let request = decide_on(
                    &mut *tx,
                    request.id,
                    LeadRequestStatusDb::Rejected,
                    decided_by,
                    Some(NO_LEADS_AVAILABLE),
                    now,
                )
                .await?
                .ok_or(sqlx::Error::RowNotFound)?;
                ApproveOutcome::RejectedNoLeads(request)
            }
        };

        tx.commit().await?;
        timer.record();
        Ok(outcome)
    }

    /// Rejects a pending request. `None` when it is no longer pending.
    pub async fn reject(
        &self,
        request_id: i64,
        decided_by: i64,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<LeadRequestEntity>, sqlx::Error> {
        let timer = QueryTimer::new(Table::LeadRequests, "reject_lead_request");
        let mut conn = self.pool.acquire().await?;
        let result = decide_on(
            &mut *conn,
            request_id,
            LeadRequestStatusDb::Rejected,
            Some(decided_by),
            reason,
            now,
        )
        .await;
        timer.record();
        result
    }

    /// Cancels a pending request on behalf of its agent.
    pub async fn cancel(
        &self,
        request_id: i64,
        agent_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<LeadRequestEntity>, sqlx::Error> {
        let timer = QueryTimer::new(Table::LeadRequests, "cancel_lead_request");
        let mut conn = self.pool.acquire().await?;
        let result = decide_on(
            &mut *conn,
            request_id,
            LeadRequestStatusDb::Cancelled,
            Some(agent_id),
            None,
            now,
        )
        .await;
        timer.record();
        result
    }

    /// Lists requests, newest first.
    pub async fn list(
        &self,
        query: &ListLeadRequestsQuery,
    ) -> Result<Vec<LeadRequestEntity>, sqlx::Error> {
        let timer = QueryTimer::new(Table::LeadRequests, "list_lead_requests");

        let mut conditions = vec!["TRUE".to_string()];
        let mut param_count = 0;

        if query.company_id.is_some() {
            param_count += 1;
            conditions.push(format!("company_id = ${}", param_count));
        }
        if query.agent_id.is_some() {
            param_count += 1;
            conditions.push(format!("agent_id = ${}", param_count));
        }
        if query.status.is_some() {
            param_count += 1;
            conditions.push(format!("status = ${}", param_count));
        }

        let sql = format!(
            "SELECT * FROM lead_requests WHERE {} ORDER BY created_at DESC, id DESC",
            conditions.join(" AND ")
        );

        let mut list_query = sqlx::query_as::<_, LeadRequestEntity>(&sql);
        if let Some(company_id) = query.company_id {
            list_query = list_query.bind(company_id);
        }
        if let Some(agent_id) = query.agent_id {
            list_query = list_query.bind(agent_id);
        }
        if let Some(status) = query.status {
            list_query = list_query.bind(status);
        }

        let result = list_query.fetch_all(&self.pool).await;
        timer.record();
        result
    }
}

/// Moves a pending request to a decided state without a lead.
async fn decide_on(
    conn: &mut PgConnection,
    request_id: i64,
    status: LeadRequestStatusDb,
    decided_by: Option<i64>,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Option<LeadRequestEntity>, sqlx::Error> {
    sqlx::query_as::<_, LeadRequestEntity>(
        r#"
        UPDATE lead_requests
        SET status = $2, decided_by = $3, reason = $4, decided_at = $5
        WHERE id = $1 AND status = 'pendiente'
        RETURNING *
        "#,
    )
    .bind(request_id)
    .bind(status)
    .bind(decided_by)
    .bind(reason)
    .bind(now)
    .fetch_optional(conn)
    .await
}
