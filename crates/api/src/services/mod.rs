//! Workflow services and external collaborator clients.
//!
//! Workflow services load snapshots, ask the domain for a decision and
//! persist it with guarded writes. They return [`LeadError`]; routes convert
//! it to an HTTP response.

pub mod auth;
pub mod blob_store;
pub mod import;
pub mod lead_requests;
pub mod lead_returns;
pub mod leads;
pub mod messaging;
pub mod partner;

pub use auth::{AuthError, AuthService};
pub use blob_store::{blob_store_from_config, BlobStore, LocalBlobStore, S3BlobStore};
pub use import::ImportService;
pub use lead_requests::LeadRequestService;
pub use lead_returns::LeadReturnService;
pub use leads::LeadService;
pub use messaging::HttpAssignmentMirror;
pub use partner::HttpPartnerGateway;

use domain::models::Lead;
use domain::services::{AssignmentMirror, IntegrationOutcome};
use domain::LeadError;
use persistence::repositories::{LeadRepository, UserRepository};

pub(crate) async fn load_lead(leads: &LeadRepository, id: i64) -> Result<Lead, LeadError> {
    leads
        .find_by_id(id)
        .await?
        .map(Lead::from)
        .ok_or_else(|| LeadError::NotFound(format!("Lead {}", id)))
}

/// Names the current owner in an ownership conflict.
pub(crate) async fn describe_conflict(users: &UserRepository, err: LeadError) -> LeadError {
    match err {
        LeadError::Conflict {
            owner: Some(owner), ..
        } => match users.find_name(owner).await {
            Ok(Some(name)) => LeadError::Conflict {
                message: format!("Lead is already assigned to {}", name),
                owner: Some(owner),
            },
            _ => LeadError::owned_by(owner),
        },
        other => other,
    }
}

/// Mirrors a fresh agent assignment when the lead's company is mirrored.
///
/// Any failure is returned as a warning; the local assignment stands.
pub(crate) async fn mirror_assignment(mirror: &dyn AssignmentMirror, lead: &Lead) -> Option<String> {
    let agent_id = lead.user_id?;
    mirror_change(mirror, lead, agent_id, true).await
}

/// Mirrors `agent_id` letting go of `lead`; failures become a warning.
pub(crate) async fn mirror_release(
    mirror: &dyn AssignmentMirror,
    lead: &Lead,
    agent_id: i64,
) -> Option<String> {
    mirror_change(mirror, lead, agent_id, false).await
}

async fn mirror_change(
    mirror: &dyn AssignmentMirror,
    lead: &Lead,
    agent_id: i64,
    assign: bool,
) -> Option<String> {
    let company_id = lead.company_id?;
    if !mirror.handles(company_id) {
        return None;
    }
    match mirror.mirror_assignment(lead.id, agent_id, assign).await {
        IntegrationOutcome::Ok(_) => None,
        IntegrationOutcome::SoftFailure(message) | IntegrationOutcome::HardFailure(message) => {
            tracing::warn!(
                lead_id = lead.id,
                user_id = agent_id,
                company_id,
                assign,
                error = %message,
                "Messaging mirror failed; local change kept"
            );
            Some(format!("Messaging platform not updated: {}", message))
        }
    }
}

/// Explains a guarded write that matched no row.
pub(crate) async fn lost_race(leads: &LeadRepository, before: &Lead) -> LeadError {
    match leads.find_by_id(before.id).await {
        Ok(Some(current)) => match current.user_id {
            Some(owner) if current.user_id != before.user_id => LeadError::owned_by(owner),
            _ => LeadError::conflict(format!(
                "Lead {} was modified by someone else; reload and retry",
                before.id
            )),
        },
        Ok(None) => LeadError::NotFound(format!("Lead {}", before.id)),
        Err(e) => e.into(),
    }
}
