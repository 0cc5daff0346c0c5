//! External integrations: the partner lead webhook and the messaging
//! assignment mirror.
//!
//! Both collaborators answer with the same envelope and their failures are
//! split into soft (the local operation proceeds with a warning) and hard
//! (the operation aborts).

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Response envelope of both collaborators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerResponse {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
    pub error: Option<String>,
}

/// Result of one collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrationOutcome {
    Ok(String),
    /// Non-blocking failure, surfaced as a warning.
    SoftFailure(String),
    /// Failure that aborts the operation.
    HardFailure(String),
}

impl IntegrationOutcome {
    /// Classifies an HTTP answer.
    ///
    /// 403 and 404 are soft. Any other non-2xx status, an unreadable body or
    /// `success: false` is hard.
    pub fn classify(status: u16, body: Option<PartnerResponse>) -> Self {
        let detail = |body: &Option<PartnerResponse>| {
            body.as_ref()
                .and_then(|b| b.error.clone().or_else(|| b.message.clone()))
        };

        match status {
            403 | 404 => IntegrationOutcome::SoftFailure(
                detail(&body).unwrap_or_else(|| format!("collaborator answered {}", status)),
            ),
            200..=299 => match body {
                Some(b) if b.success => {
                    IntegrationOutcome::Ok(b.message.unwrap_or_else(|| "ok".to_string()))
                }
                Some(b) => IntegrationOutcome::HardFailure(
                    b.error
                        .or(b.message)
                        .unwrap_or_else(|| "collaborator reported failure".to_string()),
                ),
                None => IntegrationOutcome::HardFailure("unreadable collaborator response".into()),
            },
            _ => IntegrationOutcome::HardFailure(
                detail(&body).unwrap_or_else(|| format!("collaborator answered {}", status)),
            ),
        }
    }
}

/// Where a has_api company receives leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartnerEndpoint {
    pub base_url: String,
    pub token: String,
}

/// Pushes leads to a partner company's own system.
#[async_trait::async_trait]
pub trait PartnerGateway: Send + Sync {
    async fn send_leads(&self, endpoint: &PartnerEndpoint, lead_ids: &[i64]) -> IntegrationOutcome;
}

/// Mirrors agent assignments into the messaging platform.
#[async_trait::async_trait]
pub trait AssignmentMirror: Send + Sync {
    /// Whether leads of `company_id` are mirrored.
    fn handles(&self, company_id: i64) -> bool;

    /// `assign` is false when the agent released the lead.
    async fn mirror_assignment(&self, lead_id: i64, agent_id: i64, assign: bool)
        -> IntegrationOutcome;
}

/// In-memory gateway for tests and local runs.
#[derive(Debug)]
pub struct MockPartnerGateway {
    outcome: IntegrationOutcome,
    calls: Mutex<Vec<Vec<i64>>>,
}

impl MockPartnerGateway {
    pub fn new() -> Self {
        Self::with_outcome(IntegrationOutcome::Ok("accepted".into()))
    }

    pub fn with_outcome(outcome: IntegrationOutcome) -> Self {
        Self {
            outcome,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Lead id batches received so far.
    pub fn calls(&self) -> Vec<Vec<i64>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Default for MockPartnerGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PartnerGateway for MockPartnerGateway {
    async fn send_leads(&self, endpoint: &PartnerEndpoint, lead_ids: &[i64]) -> IntegrationOutcome {
        tracing::info!(
            url = %endpoint.base_url,
            count = lead_ids.len(),
            "Mock: Would send leads to partner"
        );
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(lead_ids.to_vec());
        }
        self.outcome.clone()
    }
}

/// In-memory mirror for tests and local runs.
#[derive(Debug)]
pub struct MockAssignmentMirror {
    company_id: Option<i64>,
    outcome: IntegrationOutcome,
    calls: Mutex<Vec<(i64, i64, bool)>>,
}

impl MockAssignmentMirror {
    /// A mirror that handles no company.
    pub fn disabled() -> Self {
        Self {
            company_id: None,
            outcome: IntegrationOutcome::Ok("skipped".into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn for_company(company_id: i64, outcome: IntegrationOutcome) -> Self {
        Self {
            company_id: Some(company_id),
            outcome,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `(lead_id, agent_id, assign)` calls received so far.
    pub fn calls(&self) -> Vec<(i64, i64, bool)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl AssignmentMirror for MockAssignmentMirror {
    fn handles(&self, company_id: i64) -> bool {
        self.company_id == Some(company_id)
    }

    async fn mirror_assignment(
        &self,
        lead_id: i64,
        agent_id: i64,
        assign: bool,
    ) -> IntegrationOutcome {
        tracing::info!(lead_id, agent_id, assign, "Mock: Would mirror assignment");
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((lead_id, agent_id, assign));
        }
        self.outcome.clone()
    }
}
