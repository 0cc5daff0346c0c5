//! Lead state machine.
//!
//! Every function takes a snapshot of the lead and the acting user and
//! returns the [`LeadPatch`] to apply, or the reason the transition is not
//! allowed. The store applies the patch conditioned on the snapshot's owner
//! and status, so a decision taken on stale data never lands.

use chrono::{DateTime, Utc};

use crate::error::LeadError;
use crate::models::company::Company;
use crate::models::lead::{AssigneeChange, Lead, LeadPatch, LeadStatus, TempStatus};
use crate::models::user::{Actor, Role, User};

/// Patch for a new sub-status, closing the lead when the sub-status is a
/// terminal trigger.
pub fn status_patch(new: TempStatus) -> LeadPatch {
    LeadPatch {
        status: new.terminal_status(),
        temp_status: Some(new),
        assignee: None,
    }
}

fn ensure_active(lead: &Lead) -> Result<(), LeadError> {
    if lead.is_active() {
        Ok(())
    } else {
        Err(LeadError::Validation(format!(
            "Lead {} is {} and no longer in the working set",
            lead.id,
            lead.status.as_str()
        )))
    }
}

fn ensure_same_company(lead: &Lead, actor: &Actor) -> Result<(), LeadError> {
    if actor.belongs_to(lead.company_id) {
        Ok(())
    } else {
        Err(LeadError::Permission(format!(
            "Lead {} does not belong to your company",
            lead.id
        )))
    }
}

/// Sets the sub-status of a lead the actor already owns.
pub fn set_temporary_status(
    lead: &Lead,
    actor: &Actor,
    new: TempStatus,
) -> Result<LeadPatch, LeadError> {
    ensure_active(lead)?;
    match lead.user_id {
        Some(owner) if owner == actor.user_id => Ok(status_patch(new)),
        Some(owner) => Err(LeadError::owned_by(owner)),
        None => Err(LeadError::Permission(format!(
            "Lead {} is not assigned to you",
            lead.id
        ))),
    }
}

/// Sets the sub-status and, if the lead has no owner, assigns it to the
/// acting coordinator in the same write.
pub fn claim_and_set_status(
    lead: &Lead,
    actor: &Actor,
    new: TempStatus,
    now: DateTime<Utc>,
) -> Result<LeadPatch, LeadError> {
    ensure_active(lead)?;
    ensure_same_company(lead, actor)?;
    match lead.user_id {
        Some(owner) if owner == actor.user_id => Ok(status_patch(new)),
        Some(owner) => Err(LeadError::owned_by(owner)),
        None => Ok(LeadPatch {
            assignee: Some(AssigneeChange::Claim {
                user_id: actor.user_id,
                at: now,
            }),
            ..status_patch(new)
        }),
    }
}

/// Status change entry point; picks the transition for the actor's role.
///
/// Administrators change the sub-status without any ownership effect.
pub fn change_status(
    lead: &Lead,
    actor: &Actor,
    new: TempStatus,
    now: DateTime<Utc>,
) -> Result<LeadPatch, LeadError> {
    match actor.role {
        Role::Admin => {
            ensure_active(lead)?;
            Ok(status_patch(new))
        }
        Role::Coordinator => claim_and_set_status(lead, actor, new, now),
        Role::Agent => {
            ensure_same_company(lead, actor)?;
            set_temporary_status(lead, actor, new)
        }
    }
}

/// Puts a lead back into the working set as untreated.
pub fn cancel_status() -> LeadPatch {
    LeadPatch {
        status: Some(LeadStatus::Active),
        temp_status: Some(TempStatus::Untreated),
        assignee: None,
    }
}

/// Admin reset of a lead, whatever its statuses.
///
/// `open_return` is the id of a return still pendiente or tramite on the
/// lead; that one has to be cancelled through the return workflow so both
/// records stay consistent. Resolved returns do not block the reset.
pub fn cancel_lead_status(
    lead: &Lead,
    actor: &Actor,
    open_return: Option<i64>,
) -> Result<LeadPatch, LeadError> {
    match actor.role {
        Role::Admin => {}
        Role::Coordinator | Role::Agent => {
            return Err(LeadError::Permission(
                "Only administrators can cancel a lead status".into(),
            ))
        }
    }
    if let Some(return_id) = open_return {
        return Err(LeadError::conflict(format!(
            "Lead {} has open return {}; cancel the return instead",
            lead.id, return_id
        )));
    }
    Ok(cancel_status())
}

/// Releases the lead's agent, leaving company and statuses untouched.
pub fn refuse(lead: &Lead, actor: &Actor, company: &Company) -> Result<LeadPatch, LeadError> {
    let owner = lead.user_id.ok_or_else(|| {
        LeadError::Validation(format!("Lead {} has no assigned agent", lead.id))
    })?;

    match actor.role {
        Role::Admin => {}
        Role::Coordinator => ensure_same_company(lead, actor)?,
        Role::Agent => {
            if owner != actor.user_id {
                return Err(LeadError::Permission(format!(
                    "Lead {} is not assigned to you",
                    lead.id
                )));
            }
            if !company.agents_can_refuse {
                return Err(LeadError::Permission(
                    "Your company does not allow agents to refuse leads".into(),
                ));
            }
        }
    }

    Ok(LeadPatch {
        assignee: Some(AssigneeChange::Release),
        ..Default::default()
    })
}

/// Assigns a company lead to one of the company's agents.
pub fn assign_to_agent(
    lead: &Lead,
    actor: &Actor,
    target: &User,
    now: DateTime<Utc>,
) -> Result<LeadPatch, LeadError> {
    match actor.role {
        Role::Admin => {}
        Role::Coordinator => ensure_same_company(lead, actor)?,
        Role::Agent => {
            return Err(LeadError::Permission(
                "Agents cannot assign leads".into(),
            ))
        }
    }

    let company_id = lead.company_id.ok_or_else(|| {
        LeadError::Validation(format!(
            "Lead {} must be assigned to a company before an agent",
            lead.id
        ))
    })?;
    ensure_active(lead)?;

    if !target.role.can_own_leads() || !target.is_active || target.company_id != Some(company_id) {
        return Err(LeadError::Validation(format!(
            "User {} is not an active agent of company {}",
            target.id, company_id
        )));
    }

    if let Some(owner) = lead.user_id {
        return Err(LeadError::owned_by(owner));
    }

    Ok(LeadPatch {
        assignee: Some(AssigneeChange::Claim {
            user_id: target.id,
            at: now,
        }),
        ..Default::default()
    })
}
