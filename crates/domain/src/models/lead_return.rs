//! Lead returns (devoluciones) and their evidence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Return state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeadReturnStatus {
    /// Flagged by the company, waiting for evidence.
    #[serde(rename = "pendiente")]
    Pending,
    /// Evidence submitted, waiting for an administrator.
    #[serde(rename = "tramite")]
    InReview,
    #[serde(rename = "resuelto")]
    Resolved,
    #[serde(rename = "rechazado")]
    Rejected,
    #[serde(rename = "cancelado")]
    Cancelled,
}

impl LeadReturnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadReturnStatus::Pending => "pendiente",
            LeadReturnStatus::InReview => "tramite",
            LeadReturnStatus::Resolved => "resuelto",
            LeadReturnStatus::Rejected => "rechazado",
            LeadReturnStatus::Cancelled => "cancelado",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, LeadReturnStatus::Pending | LeadReturnStatus::InReview)
    }
}

/// Kind of evidence file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Audio,
    Image,
}

impl AttachmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentKind::Audio => "audio",
            AttachmentKind::Image => "image",
        }
    }

    /// Blob bucket the kind is stored in.
    pub fn bucket(&self) -> &'static str {
        match self {
            AttachmentKind::Audio => "return-audio",
            AttachmentKind::Image => "return-images",
        }
    }
}

/// Stored evidence file metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub return_id: i64,
    pub kind: AttachmentKind,
    pub bucket: String,
    pub path: String,
    pub file_name: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

/// A return record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadReturn {
    pub id: i64,
    pub lead_id: i64,
    pub requested_by: i64,
    pub status: LeadReturnStatus,
    pub reason: Option<String>,
    pub admin_comment: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Admin decision on a return in review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnDecision {
    Accept,
    Reject,
}

/// Body of `POST /leads/:id/returns`.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RequestReturnBody {
    #[validate(length(max = 2000, message = "reason must be at most 2000 characters"))]
    pub reason: Option<String>,
}

/// A base64 file inside an evidence submission.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EvidenceFile {
    #[validate(length(min = 1, max = 255, message = "file_name must be 1-255 characters"))]
    pub file_name: String,
    /// Base64 (standard alphabet) file contents.
    pub data: String,
}

/// Body of `POST /returns/:id/evidence`.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SubmitEvidenceBody {
    #[validate(nested)]
    pub audio: Option<EvidenceFile>,
    #[validate(nested)]
    pub image: Option<EvidenceFile>,
    #[validate(length(max = 2000, message = "reason must be at most 2000 characters"))]
    pub reason: Option<String>,
}

/// Body of `POST /returns/:id/resolve`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResolveReturnBody {
    pub decision: ReturnDecision,
    #[validate(length(max = 2000, message = "comment must be at most 2000 characters"))]
    pub comment: Option<String>,
}

/// Query string of `GET /returns`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListReturnsQuery {
    #[serde(default)]
    pub open_only: bool,
}
