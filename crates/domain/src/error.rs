//! Error taxonomy shared by the lead workflows.

use serde::Serialize;
use thiserror::Error;

/// Which limit blocked a new lead request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QuotaReason {
    /// The agent still holds untreated (`sin_tratar`) leads.
    #[serde(rename = "leads_sin_tratar")]
    UntreatedLeads,
    /// The agent has undecided requests.
    #[serde(rename = "solicitudes_pendientes")]
    PendingRequests,
    /// Both counts contribute to the limit.
    #[serde(rename = "ambos")]
    Both,
}

impl QuotaReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaReason::UntreatedLeads => "leads_sin_tratar",
            QuotaReason::PendingRequests => "solicitudes_pendientes",
            QuotaReason::Both => "ambos",
        }
    }
}

impl std::fmt::Display for QuotaReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by lead, request and return workflows.
#[derive(Debug, Error)]
pub enum LeadError {
    /// Caller input failed a precondition; nothing was written.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Current ownership or state contradicts the requested transition.
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        /// Id of the user currently holding the lead, when that is the cause.
        owner: Option<i64>,
    },

    /// Role or ownership guard failed.
    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The request quota of the agent's company is exhausted.
    #[error("Request limit reached: {0}")]
    QuotaExceeded(QuotaReason),

    /// A partner or messaging call failed in a way that aborts the operation.
    #[error("Partner integration failed: {0}")]
    Integration(String),

    /// The store call failed.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl LeadError {
    pub fn conflict(message: impl Into<String>) -> Self {
        LeadError::Conflict {
            message: message.into(),
            owner: None,
        }
    }

    pub fn owned_by(owner: i64) -> Self {
        LeadError::Conflict {
            message: format!("Lead is already assigned to user {}", owner),
            owner: Some(owner),
        }
    }
}

impl From<sqlx::Error> for LeadError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => LeadError::NotFound("Resource not found".into()),
            sqlx::Error::Database(ref db_err) if db_err.code().as_deref() == Some("23505") => {
                LeadError::conflict("Resource already exists")
            }
            other => LeadError::Persistence(other.to_string()),
        }
    }
}
