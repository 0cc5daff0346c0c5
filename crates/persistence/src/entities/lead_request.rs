//! Lead request entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use domain::models::{LeadRequest, LeadRequestStatus};

/// Database enum for request status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "lead_request_status")]
pub enum LeadRequestStatusDb {
    #[sqlx(rename = "pendiente")]
    Pending,
    #[sqlx(rename = "aprobada")]
    Approved,
    #[sqlx(rename = "rechazada")]
    Rejected,
    #[sqlx(rename = "cancelada")]
    Cancelled,
}

impl From<LeadRequestStatusDb> for LeadRequestStatus {
    fn from(db: LeadRequestStatusDb) -> Self {
        match db {
            LeadRequestStatusDb::Pending => LeadRequestStatus::Pending,
            LeadRequestStatusDb::Approved => LeadRequestStatus::Approved,
            LeadRequestStatusDb::Rejected => LeadRequestStatus::Rejected,
            LeadRequestStatusDb::Cancelled => LeadRequestStatus::Cancelled,
        }
    }
}

impl From<LeadRequestStatus> for LeadRequestStatusDb {
    fn from(status: LeadRequestStatus) -> Self {
        match status {
            LeadRequestStatus::Pending => LeadRequestStatusDb::Pending,
            LeadRequestStatus::Approved => LeadRequestStatusDb::Approved,
            LeadRequestStatus::Rejected => LeadRequestStatusDb::Rejected,
            LeadRequestStatus::Cancelled => LeadRequestStatusDb::Cancelled,
        }
    }
}

/// Database row mapping for the lead_requests table.
#[derive(Debug, Clone, FromRow)]
pub struct LeadRequestEntity {
    pub id: i64,
    pub agent_id: i64,
    pub company_id: i64,
    pub status: LeadRequestStatusDb,
    pub lead_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<i64>,
    pub reason: Option<String>,
}

impl From<LeadRequestEntity> for LeadRequest {
    fn from(entity: LeadRequestEntity) -> Self {
        Self {
            id: entity.id,
            agent_id: entity.agent_id,
            company_id: entity.company_id,
            status: entity.status.into(),
            lead_id: entity.lead_id,
            created_at: entity.created_at,
            decided_at: entity.decided_at,
            decided_by: entity.decided_by,
            reason: entity.reason,
        }
    }
}
