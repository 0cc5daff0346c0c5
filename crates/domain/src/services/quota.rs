//! Per-agent request quota.

use serde::Serialize;

use crate::error::{LeadError, QuotaReason};

/// What currently counts against an agent's quota.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QuotaUsage {
    /// Leads owned by the agent that are still `sin_tratar`.
    pub untreated_leads: i64,
    /// The agent's undecided requests.
    pub pending_requests: i64,
}

impl QuotaUsage {
    pub fn total(&self) -> i64 {
        self.untreated_leads + self.pending_requests
    }
}

/// Checks whether one more request fits under `cap`.
///
/// The request is allowed only while `untreated + pending < cap`.
pub fn check_request_quota(usage: QuotaUsage, cap: i64) -> Result<(), LeadError> {
    if usage.total() < cap {
        return Ok(());
    }
    let reason = match (usage.untreated_leads > 0, usage.pending_requests > 0) {
        (true, true) => QuotaReason::Both,
        (true, false) => QuotaReason::UntreatedLeads,
        _ => QuotaReason::PendingRequests,
    };
    Err(LeadError::QuotaExceeded(reason))
}

/// An agent's standing against the quota, as shown before requesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaStatus {
    #[serde(flatten)]
    pub usage: QuotaUsage,
    pub max_requests_per_agent: i64,
    pub can_request: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<QuotaReason>,
}

impl QuotaStatus {
    pub fn evaluate(usage: QuotaUsage, cap: i64) -> Self {
        let reason = match check_request_quota(usage, cap) {
            Err(LeadError::QuotaExceeded(reason)) => Some(reason),
            _ => None,
        };
        Self {
            usage,
            max_requests_per_agent: cap,
            can_request: reason.is_none(),
            reason,
        }
    }
}
