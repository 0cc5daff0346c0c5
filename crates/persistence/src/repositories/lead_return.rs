//! Lead return repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use domain::models::lead::{Lead, LeadPatch};

use crate::entities::{
    AttachmentEntity, AttachmentKindDb, LeadEntity, LeadReturnEntity, LeadReturnStatusDb,
};
use crate::metrics::{QueryTimer, Table};
use crate::repositories::lead::apply_patch_on;

/// Metadata of a stored evidence file.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub kind: AttachmentKindDb,
    pub bucket: String,
    pub path: String,
    pub file_name: String,
    pub size_bytes: i64,
}

/// Which returns a caller may list.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReturnScope {
    /// Only returns on leads of this company.
    pub company_id: Option<i64>,
    /// Only returns requested by this user.
    pub requested_by: Option<i64>,
}

/// Repository for lead return database operations.
#[derive(Clone)]
pub struct LeadReturnRepository {
    pool: PgPool,
}

impl LeadReturnRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a return and applies `lead_patch` to the lead in one
    /// transaction.
    ///
    /// Returns `None` when the lead changed since `before` was read. A second
    /// open return on the same lead fails with a unique violation.
    pub async fn open(
        &self,
        before: &Lead,
        lead_patch: &LeadPatch,
        requested_by: i64,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<LeadReturnEntity>, sqlx::Error> {
        let timer = QueryTimer::new(Table::LeadReturns, "open_lead_return");
        let mut tx = self.pool.begin().await?;

        if apply_patch_on(&mut *tx, before, lead_patch).await?.is_none() {
            tx.rollback().await?;
            timer.record();
            return Ok(None);
        }

        let entity = sqlx::query_as::<_, LeadReturnEntity>(
            r#"
            INSERT INTO lead_returns (lead_id, requested_by, reason, requested_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(before.id)
        .bind(requested_by)
        .bind(reason)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        Ok(Some(entity))
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<LeadReturnEntity>, sqlx::Error> {
        let timer = QueryTimer::new(Table::LeadReturns, "find_lead_return_by_id");
        let result =
            sqlx::query_as::<_, LeadReturnEntity>("SELECT * FROM lead_returns WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await;
        timer.record();
        result
    }

    /// The return of a lead that is still `pendiente` or `tramite`, if any.
    pub async fn find_open_for_lead(
        &self,
        lead_id: i64,
    ) -> Result<Option<LeadReturnEntity>, sqlx::Error> {
        let timer = QueryTimer::new(Table::LeadReturns, "find_open_lead_return");
        let result = sqlx::query_as::<_, LeadReturnEntity>(
            r#"
            SELECT * FROM lead_returns
            WHERE lead_id = $1 AND status IN ('pendiente', 'tramite')
            "#,
        )
        .bind(lead_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Attachments of several returns.
    pub async fn attachments_for(
        &self,
        return_ids: &[i64],
    ) -> Result<Vec<AttachmentEntity>, sqlx::Error> {
        if return_ids.is_empty() {
            return Ok(Vec::new());
        }
        let timer = QueryTimer::new(Table::LeadReturns, "find_lead_return_attachments");
        let result = sqlx::query_as::<_, AttachmentEntity>(
            r#"
            SELECT * FROM lead_return_attachments
            WHERE return_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(return_ids)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find_attachment(
        &self,
        return_id: i64,
        attachment_id: i64,
    ) -> Result<Option<AttachmentEntity>, sqlx::Error> {
        let timer = QueryTimer::new(Table::LeadReturns, "find_lead_return_attachment");
        let result = sqlx::query_as::<_, AttachmentEntity>(
            "SELECT * FROM lead_return_attachments WHERE id = $1 AND return_id = $2",
        )
        .bind(attachment_id)
        .bind(return_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Lists returns in scope, newest first.
    pub async fn list(
        &self,
        scope: ReturnScope,
        open_only: bool,
    ) -> Result<Vec<LeadReturnEntity>, sqlx::Error> {
        let timer = QueryTimer::new(Table::LeadReturns, "list_lead_returns");

        let mut conditions = vec!["TRUE".to_string()];
        let mut param_count = 0;

        if open_only {
            conditions.push("r.status IN ('pendiente', 'tramite')".to_string());
        }
        if scope.company_id.is_some() {
            param_count += 1;
            conditions.push(format!("l.company_id = ${}", param_count));
        }
        if scope.requested_by.is_some() {
            param_count += 1;
            conditions.push(format!("r.requested_by = ${}", param_count));
        }

        let sql = format!(
            r#"
            SELECT r.* FROM lead_returns r
            JOIN leads l ON l.id = r.lead_id
            WHERE {}
            ORDER BY r.requested_at DESC, r.id DESC
            "#,
            conditions.join(" AND ")
        );

        let mut query = sqlx::query_as::<_, LeadReturnEntity>(&sql);
        if let Some(company_id) = scope.company_id {
            query = query.bind(company_id);
        }
        if let Some(requested_by) = scope.requested_by {
            query = query.bind(requested_by);
        }

        let result = query.fetch_all(&self.pool).await;
        timer.record();
        result
    }

    /// Records evidence and moves a pending return to `tramite`.
    ///
    /// Returns `None`, writing nothing, when the return is not pending.
    pub async fn submit_evidence(
        &self,
        return_id: i64,
        attachments: &[NewAttachment],
        reason: Option<&str>,
    ) -> Result<Option<(LeadReturnEntity, Vec<AttachmentEntity>)>, sqlx::Error> {
        let timer = QueryTimer::new(Table::LeadReturns, "submit_lead_return_evidence");
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, LeadReturnEntity>(
            r#"
            UPDATE lead_returns
            SET status = 'tramite', reason = COALESCE($2, reason), updated_at = NOW()
            WHERE id = $1 AND status = 'pendiente'
            RETURNING *
            "#,
        )
        .bind(return_id)
        .bind(reason)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(updated) = updated else {
            tx.rollback().await?;
            timer.record();
            return Ok(None);
        };

        let mut stored = Vec::with_capacity(attachments.len());
        for attachment in attachments {
            let entity = sqlx::query_as::<_, AttachmentEntity>(
                r#"
                INSERT INTO lead_return_attachments
                    (return_id, kind, bucket, path, file_name, size_bytes)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
                "#,
            )
            .bind(return_id)
            .bind(attachment.kind)
            .bind(&attachment.bucket)
            .bind(&attachment.path)
            .bind(&attachment.file_name)
            .bind(attachment.size_bytes)
            .fetch_one(&mut *tx)
            .await?;
            stored.push(entity);
        }

        tx.commit().await?;
        timer.record();
        Ok(Some((updated, stored)))
    }

    /// Applies an admin decision to a return in `tramite`.
    pub async fn resolve(
        &self,
        return_id: i64,
        status: LeadReturnStatusDb,
        comment: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<LeadReturnEntity>, sqlx::Error> {
        let timer = QueryTimer::new(Table::LeadReturns, "resolve_lead_return");
        let result = sqlx::query_as::<_, LeadReturnEntity>(
            r#"
            UPDATE lead_returns
            SET status = $2, admin_comment = $3, resolved_at = $4, updated_at = NOW()
            WHERE id = $1 AND status = 'tramite'
            RETURNING *
            "#,
        )
        .bind(return_id)
        .bind(status)
        .bind(comment)
        .bind(now)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Cancels an open return and restores its lead in one transaction.
    pub async fn cancel(
        &self,
        return_id: i64,
        lead_patch: &LeadPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<(LeadReturnEntity, LeadEntity)>, sqlx::Error> {
        let timer = QueryTimer::new(Table::LeadReturns, "cancel_lead_return");
        let mut tx = self.pool.begin().await?;

        let cancelled = sqlx::query_as::<_, LeadReturnEntity>(
            r#"
            UPDATE lead_returns
            SET status = 'cancelado', resolved_at = $2, updated_at = NOW()
            WHERE id = $1 AND status IN ('pendiente', 'tramite')
            RETURNING *
            "#,
        )
        .bind(return_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(cancelled) = cancelled else {
            tx.rollback().await?;
            timer.record();
            return Ok(None);
        };

        let status = lead_patch.status.map(crate::entities::LeadStatusDb::from);
        let temp_status = lead_patch.temp_status.map(crate::entities::TempStatusDb::from);
        let lead = sqlx::query_as::<_, LeadEntity>(
            r#"
            UPDATE leads
            SET status = COALESCE($2, status),
                temp_status = COALESCE($3, temp_status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(cancelled.lead_id)
        .bind(status)
        .bind(temp_status)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        Ok(Some((cancelled, lead)))
    }
}
