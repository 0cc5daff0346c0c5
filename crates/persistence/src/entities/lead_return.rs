//! Lead return and attachment entities (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use domain::models::lead_return::{Attachment, AttachmentKind, LeadReturn, LeadReturnStatus};

/// Database enum for return status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "lead_return_status")]
pub enum LeadReturnStatusDb {
    #[sqlx(rename = "pendiente")]
    Pending,
    #[sqlx(rename = "tramite")]
    InReview,
    #[sqlx(rename = "resuelto")]
    Resolved,
    #[sqlx(rename = "rechazado")]
    Rejected,
    #[sqlx(rename = "cancelado")]
    Cancelled,
}

impl From<LeadReturnStatusDb> for LeadReturnStatus {
    fn from(db: LeadReturnStatusDb) -> Self {
        match db {
            LeadReturnStatusDb::Pending => LeadReturnStatus::Pending,
            LeadReturnStatusDb::InReview => LeadReturnStatus::InReview,
            LeadReturnStatusDb::Resolved => LeadReturnStatus::Resolved,
            LeadReturnStatusDb::Rejected => LeadReturnStatus::Rejected,
            LeadReturnStatusDb::Cancelled => LeadReturnStatus::Cancelled,
        }
    }
}

impl From<LeadReturnStatus> for LeadReturnStatusDb {
    fn from(status: LeadReturnStatus) -> Self {
        match status {
            LeadReturnStatus::Pending => LeadReturnStatusDb::Pending,
            LeadReturnStatus::InReview => LeadReturnStatusDb::InReview,
            LeadReturnStatus::Resolved => LeadReturnStatusDb::Resolved,
            LeadReturnStatus::Rejected => LeadReturnStatusDb::Rejected,
            LeadReturnStatus::Cancelled => LeadReturnStatusDb::Cancelled,
        }
    }
}

/// Database enum for attachment kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "attachment_kind", rename_all = "lowercase")]
pub enum AttachmentKindDb {
    Audio,
    Image,
}

impl From<AttachmentKindDb> for AttachmentKind {
    fn from(db: AttachmentKindDb) -> Self {
        match db {
            AttachmentKindDb::Audio => AttachmentKind::Audio,
            AttachmentKindDb::Image => AttachmentKind::Image,
        }
    }
}

impl From<AttachmentKind> for AttachmentKindDb {
    fn from(kind: AttachmentKind) -> Self {
        match kind {
            AttachmentKind::Audio => AttachmentKindDb::Audio,
            AttachmentKind::Image => AttachmentKindDb::Image,
        }
    }
}

/// Database row mapping for the lead_returns table.
#[derive(Debug, Clone, FromRow)]
pub struct LeadReturnEntity {
    pub id: i64,
    pub lead_id: i64,
    pub requested_by: i64,
    pub status: LeadReturnStatusDb,
    pub reason: Option<String>,
    pub admin_comment: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Database row mapping for the lead_return_attachments table.
#[derive(Debug, Clone, FromRow)]
pub struct AttachmentEntity {
    pub id: i64,
    pub return_id: i64,
    pub kind: AttachmentKindDb,
    pub bucket: String,
    pub path: String,
    pub file_name: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

impl From<AttachmentEntity> for Attachment {
    fn from(entity: AttachmentEntity) -> Self {
        Self {
            id: entity.id,
            return_id: entity.return_id,
            kind: entity.kind.into(),
            bucket: entity.bucket,
            path: entity.path,
            file_name: entity.file_name,
            size_bytes: entity.size_bytes,
            created_at: entity.created_at,
        }
    }
}

impl LeadReturnEntity {
    /// Builds the domain record with its attachments.
    pub fn into_domain(self, attachments: Vec<AttachmentEntity>) -> LeadReturn {
        LeadReturn {
            id: self.id,
            lead_id: self.lead_id,
            requested_by: self.requested_by,
            status: self.status.into(),
            reason: self.reason,
            admin_comment: self.admin_comment,
            requested_at: self.requested_at,
            resolved_at: self.resolved_at,
            attachments: attachments.into_iter().map(Attachment::from).collect(),
        }
    }
}

impl From<LeadReturnEntity> for LeadReturn {
    fn from(entity: LeadReturnEntity) -> Self {
        entity.into_domain(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_entity_with_attachments() {
        let entity = LeadReturnEntity {
            id: 9,
            lead_id: 101,
            requested_by: 30,
            status: LeadReturnStatusDb::InReview,
            reason: Some("wrong number".to_string()),
            admin_comment: None,
            requested_at: Utc::now(),
            resolved_at: None,
            updated_at: Utc::now(),
        };
        let attachment = AttachmentEntity {
            id: 1,
            return_id: 9,
            kind: AttachmentKindDb::Audio,
            bucket: "return-audio".to_string(),
            path: "9/call.mp3".to_string(),
            file_name: "call.mp3".to_string(),
            size_bytes: 2048,
            created_at: Utc::now(),
        };
        let ret = entity.into_domain(vec![attachment]);
        assert_eq!(ret.status, LeadReturnStatus::InReview);
        assert_eq!(ret.attachments.len(), 1);
        assert_eq!(ret.attachments[0].kind, AttachmentKind::Audio);
    }
}
