//! Agent requests for a new lead (solicitudes).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::LeadError;
use crate::models::lead::Lead;

/// Request state. Only `pendiente` can change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeadRequestStatus {
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "aprobada")]
    Approved,
    #[serde(rename = "rechazada")]
    Rejected,
    #[serde(rename = "cancelada")]
    Cancelled,
}

impl LeadRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadRequestStatus::Pending => "pendiente",
            LeadRequestStatus::Approved => "aprobada",
            LeadRequestStatus::Rejected => "rechazada",
            LeadRequestStatus::Cancelled => "cancelada",
        }
    }
}

/// A lead request raised by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadRequest {
    pub id: i64,
    pub agent_id: i64,
    pub company_id: i64,
    pub status: LeadRequestStatus,
    /// Set exactly when the request is approved.
    pub lead_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl LeadRequest {
    /// Fails unless the request is still undecided.
    pub fn ensure_pending(&self) -> Result<(), LeadError> {
        match self.status {
            LeadRequestStatus::Pending => Ok(()),
            other => Err(LeadError::conflict(format!(
                "Request {} is already {}",
                self.id,
                other.as_str()
            ))),
        }
    }
}

/// Query string of `GET /requests`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListRequestsQuery {
    pub status: Option<LeadRequestStatus>,
}

/// Body of `POST /requests/:id/approve`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApproveRequestBody {
    /// Lead to grant; the most recent unassigned lead when absent.
    pub lead_id: Option<i64>,
}

/// Body of `POST /requests/:id/reject`.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RejectRequestBody {
    #[validate(length(max = 500, message = "reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

/// Reason stored when no lead can satisfy a request.
pub const NO_LEADS_AVAILABLE: &str = "No unassigned leads available for this company";

/// Outcome returned to the agent on creation.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRequestResponse {
    pub request: LeadRequest,
    /// True when the company resolves requests automatically.
    pub auto_assigned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Outcome of a coordinator decision.
#[derive(Debug, Clone, Serialize)]
pub struct RequestDecisionResponse {
    pub request: LeadRequest,
    /// The granted lead, when the request was approved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead: Option<Lead>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(status: LeadRequestStatus) -> LeadRequest {
        LeadRequest {
            id: 5,
            agent_id: 30,
            company_id: 7,
            status,
            lead_id: None,
            created_at: Utc::now(),
            decided_at: None,
            decided_by: None,
            reason: None,
        }
    }

    #[test]
    fn test_only_pending_requests_can_change() {
        assert!(request(LeadRequestStatus::Pending).ensure_pending().is_ok());
        for status in [
            LeadRequestStatus::Approved,
            LeadRequestStatus::Rejected,
            LeadRequestStatus::Cancelled,
        ] {
            let err = request(status).ensure_pending().unwrap_err();
            assert!(matches!(err, LeadError::Conflict { .. }));
        }
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&LeadRequestStatus::Approved).unwrap(),
            "\"aprobada\""
        );
        let q: ListRequestsQuery = serde_json::from_str(r#"{"status":"pendiente"}"#).unwrap();
        assert_eq!(q.status, Some(LeadRequestStatus::Pending));
    }
}
