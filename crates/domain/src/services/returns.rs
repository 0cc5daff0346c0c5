//! Return (devolución) transitions.

use crate::error::LeadError;
use crate::models::lead::{Lead, LeadPatch, LeadStatus};
use crate::models::lead_return::{LeadReturn, LeadReturnStatus, ReturnDecision};
use crate::models::user::{Actor, Role};
use crate::services::lifecycle::cancel_status;

/// Where a return goes after an admin decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub status: LeadReturnStatus,
    pub comment: Option<String>,
}

fn coordinator_of(lead: &Lead, actor: &Actor) -> bool {
    actor.role == Role::Coordinator && actor.belongs_to(lead.company_id)
}

/// Checks that `actor` may flag `lead` for return.
///
/// Returns the patch moving the lead to `devolucion`.
pub fn request_return(lead: &Lead, actor: &Actor) -> Result<LeadPatch, LeadError> {
    match actor.role {
        Role::Admin => {
            return Err(LeadError::Permission(
                "Returns are requested by the company holding the lead".into(),
            ))
        }
        Role::Coordinator => {
            if !coordinator_of(lead, actor) {
                return Err(LeadError::Permission(format!(
                    "Lead {} does not belong to your company",
                    lead.id
                )));
            }
        }
        Role::Agent => {
            if lead.user_id != Some(actor.user_id) {
                return Err(LeadError::Permission(format!(
                    "Lead {} is not assigned to you",
                    lead.id
                )));
            }
        }
    }

    match lead.status {
        LeadStatus::Active => Ok(LeadPatch {
            status: Some(LeadStatus::Returned),
            ..Default::default()
        }),
        LeadStatus::Returned => Err(LeadError::conflict(format!(
            "Lead {} already has an open return",
            lead.id
        ))),
        other => Err(LeadError::Validation(format!(
            "Lead {} is {} and cannot be returned",
            lead.id,
            other.as_str()
        ))),
    }
}

/// Whether `actor` may see a return on `lead`.
pub fn can_view(ret: &LeadReturn, lead: &Lead, actor: &Actor) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Coordinator => coordinator_of(lead, actor),
        Role::Agent => ret.requested_by == actor.user_id,
    }
}

/// Checks an evidence submission; the return moves to `tramite`.
pub fn submit_evidence(
    ret: &LeadReturn,
    lead: &Lead,
    actor: &Actor,
) -> Result<LeadReturnStatus, LeadError> {
    if ret.requested_by != actor.user_id && !coordinator_of(lead, actor) {
        return Err(LeadError::Permission(
            "Only the requesting company can submit evidence".into(),
        ));
    }
    match ret.status {
        LeadReturnStatus::Pending => Ok(LeadReturnStatus::InReview),
        other => Err(LeadError::conflict(format!(
            "Return {} is {}; evidence is only accepted while pendiente",
            ret.id,
            other.as_str()
        ))),
    }
}

/// Admin decision on a return under review.
///
/// Accepting resolves it. Rejecting sends it back to `pendiente` and needs a
/// comment telling the company what is missing.
pub fn resolve(
    ret: &LeadReturn,
    actor: &Actor,
    decision: ReturnDecision,
    comment: Option<&str>,
) -> Result<Resolution, LeadError> {
    if actor.role != Role::Admin {
        return Err(LeadError::Permission(
            "Only administrators can resolve returns".into(),
        ));
    }
    if ret.status != LeadReturnStatus::InReview {
        return Err(LeadError::conflict(format!(
            "Return {} is {}; only returns in tramite can be resolved",
            ret.id,
            ret.status.as_str()
        )));
    }

    let comment = comment.map(str::trim).filter(|c| !c.is_empty()).map(String::from);
    match decision {
        ReturnDecision::Accept => Ok(Resolution {
            status: LeadReturnStatus::Resolved,
            comment,
        }),
        ReturnDecision::Reject => match comment {
            Some(comment) => Ok(Resolution {
                status: LeadReturnStatus::Pending,
                comment: Some(comment),
            }),
            None => Err(LeadError::Validation(
                "A comment is required when rejecting a return".into(),
            )),
        },
    }
}

/// Cancels an open return. Returns the patch restoring the lead.
pub fn cancel(ret: &LeadReturn, lead: &Lead, actor: &Actor) -> Result<LeadPatch, LeadError> {
    match actor.role {
        Role::Admin => {}
        Role::Coordinator if coordinator_of(lead, actor) => {}
        Role::Coordinator | Role::Agent => {
            return Err(LeadError::Permission(
                "Only administrators and the company's coordinators can cancel returns".into(),
            ))
        }
    }
    if !ret.status.is_open() {
        return Err(LeadError::conflict(format!(
            "Return {} is already {}",
            ret.id,
            ret.status.as_str()
        )));
    }
    Ok(cancel_status())
}
