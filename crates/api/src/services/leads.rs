//! Lead reads, lifecycle transitions and assignments.

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;

use domain::models::lead::{
    AssignAgentResponse, AssignCompanyRequest, AssignCompanyResponse, LeadListResponse,
    ListLeadsQuery, RefuseLeadResponse,
};
use domain::models::{Actor, Company, Lead, LeadPatch, TempStatus, User};
use domain::services::{lifecycle, AssignmentMirror, IntegrationOutcome, PartnerEndpoint, PartnerGateway};
use domain::LeadError;
use persistence::repositories::{
    CompanyRepository, LeadRepository, LeadReturnRepository, UserRepository,
};
use shared::pagination::Pagination;

use crate::middleware::metrics::record_lead_assigned;
use crate::services::{
    describe_conflict, import, load_lead, lost_race, mirror_assignment, mirror_release,
};

pub struct LeadService {
    pool: PgPool,
    partner: Arc<dyn PartnerGateway>,
    mirror: Arc<dyn AssignmentMirror>,
}

impl LeadService {
    pub fn new(
        pool: PgPool,
        partner: Arc<dyn PartnerGateway>,
        mirror: Arc<dyn AssignmentMirror>,
    ) -> Self {
        Self {
            pool,
            partner,
            mirror,
        }
    }

    fn leads(&self) -> LeadRepository {
        LeadRepository::new(self.pool.clone())
    }

    fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone())
    }

    async fn company(&self, id: i64) -> Result<Company, LeadError> {
        CompanyRepository::new(self.pool.clone())
            .find_by_id(id)
            .await?
            .map(Company::from)
            .ok_or_else(|| LeadError::NotFound(format!("Company {}", id)))
    }

    /// Writes `patch` guarded on `before`.
    async fn persist(&self, before: &Lead, patch: &LeadPatch) -> Result<Lead, LeadError> {
        let leads = self.leads();
        match leads.apply_patch(before, patch).await? {
            Some(entity) => Ok(entity.into()),
            None => Err(describe_conflict(&self.users(), lost_race(&leads, before).await).await),
        }
    }

    async fn decided<T>(&self, decision: Result<T, LeadError>) -> Result<T, LeadError> {
        match decision {
            Ok(value) => Ok(value),
            Err(err) => Err(describe_conflict(&self.users(), err).await),
        }
    }

    /// A single lead, if the caller may see it.
    pub async fn get(&self, actor: &Actor, id: i64) -> Result<Lead, LeadError> {
        let lead = load_lead(&self.leads(), id).await?;
        if !lead.visible_to(actor) {
            return Err(LeadError::NotFound(format!("Lead {}", id)));
        }
        Ok(lead)
    }

    pub async fn list(
        &self,
        actor: &Actor,
        query: &ListLeadsQuery,
    ) -> Result<LeadListResponse, LeadError> {
        let filter = query.scoped(actor)?;
        let params = query.page_params();
        let (limit, offset) = params.limit_offset();

        let (entities, total) = self.leads().list(&filter, limit, offset).await?;
        Ok(LeadListResponse {
            data: entities.into_iter().map(Lead::from).collect(),
            pagination: Pagination::new(params, total),
        })
    }

    /// The filtered view as CSV bytes.
    pub async fn export_csv(&self, actor: &Actor, query: &ListLeadsQuery) -> Result<Vec<u8>, LeadError> {
        let filter = query.scoped(actor)?;
        let leads: Vec<Lead> = self
            .leads()
            .export(&filter)
            .await?
            .into_iter()
            .map(Lead::from)
            .collect();

        tracing::info!(user_id = actor.user_id, rows = leads.len(), "Leads exported");
        import::write_export(&leads)
    }

    /// Sets the sub-status; a coordinator claims an unassigned lead in the
    /// same write.
    pub async fn change_status(
        &self,
        actor: &Actor,
        id: i64,
        temp_status: TempStatus,
    ) -> Result<Lead, LeadError> {
        let lead = load_lead(&self.leads(), id).await?;
        let patch = self
            .decided(lifecycle::change_status(&lead, actor, temp_status, Utc::now()))
            .await?;
        let updated = self.persist(&lead, &patch).await?;

        tracing::info!(
            lead_id = id,
            user_id = actor.user_id,
            temp_status = temp_status.as_str(),
            status = updated.status.as_str(),
            "Lead status changed"
        );
        Ok(updated)
    }

    /// Admin reset of a closed lead to activo/sin_tratar.
    pub async fn cancel_status(&self, actor: &Actor, id: i64) -> Result<Lead, LeadError> {
        let lead = load_lead(&self.leads(), id).await?;
        let open_return = LeadReturnRepository::new(self.pool.clone())
            .find_open_for_lead(id)
            .await?
            .map(|ret| ret.id);
        let patch = lifecycle::cancel_lead_status(&lead, actor, open_return)?;
        let updated = self.persist(&lead, &patch).await?;

        tracing::info!(lead_id = id, user_id = actor.user_id, "Lead status cancelled");
        Ok(updated)
    }

    /// Releases the lead's agent and mirrors the release.
    pub async fn refuse(&self, actor: &Actor, id: i64) -> Result<RefuseLeadResponse, LeadError> {
        let lead = load_lead(&self.leads(), id).await?;
        let company_id = lead.company_id.ok_or_else(|| {
            LeadError::Validation(format!("Lead {} is not assigned to a company", id))
        })?;
        let company = self.company(company_id).await?;

        let patch = lifecycle::refuse(&lead, actor, &company)?;
        let updated = self.persist(&lead, &patch).await?;

        tracing::info!(
            lead_id = id,
            company_id,
            user_id = actor.user_id,
            released = ?lead.user_id,
            "Lead refused"
        );
        let warning = match lead.user_id {
            Some(agent_id) => mirror_release(self.mirror.as_ref(), &updated, agent_id).await,
            None => None,
        };
        Ok(RefuseLeadResponse {
            lead: updated,
            warning,
        })
    }

    /// Hands leads to a company: integrated companies receive them through
    /// their webhook, others get them assigned locally.
    pub async fn assign_company(
        &self,
        actor: &Actor,
        request: &AssignCompanyRequest,
    ) -> Result<AssignCompanyResponse, LeadError> {
        let company = self.company(request.company_id).await?;

        let mut ids = request.lead_ids.clone();
        ids.sort_unstable();
        ids.dedup();

        let leads = self.leads();
        let existing = leads.existing_ids(&ids).await?;
        if existing.len() != ids.len() {
            let missing: Vec<String> = ids
                .iter()
                .filter(|id| !existing.contains(id))
                .map(|id| id.to_string())
                .collect();
            return Err(LeadError::NotFound(format!("Leads {}", missing.join(", "))));
        }

        if let Some((base_url, token)) = company.partner_endpoint() {
            let endpoint = PartnerEndpoint {
                base_url: base_url.to_string(),
                token: token.to_string(),
            };
            return match self.partner.send_leads(&endpoint, &ids).await {
                IntegrationOutcome::Ok(message) => {
                    record_lead_assigned("partner", ids.len());
                    tracing::info!(
                        company_id = company.id,
                        user_id = actor.user_id,
                        count = ids.len(),
                        "Leads sent to partner company"
                    );
                    Ok(AssignCompanyResponse {
                        leads: Vec::new(),
                        sent_to_partner: true,
                        message: Some(message),
                        warning: None,
                    })
                }
                IntegrationOutcome::SoftFailure(message) => Ok(AssignCompanyResponse {
                    leads: Vec::new(),
                    sent_to_partner: false,
                    message: None,
                    warning: Some(format!("Partner did not accept the leads: {}", message)),
                }),
                IntegrationOutcome::HardFailure(message) => Err(LeadError::Integration(message)),
            };
        }

        let assigned: Vec<Lead> = leads
            .assign_company(&ids, company.id, Utc::now())
            .await?
            .ok_or_else(|| LeadError::conflict("Some leads were deleted while being assigned"))?
            .into_iter()
            .map(Lead::from)
            .collect();

        record_lead_assigned("company", assigned.len());
        tracing::info!(
            company_id = company.id,
            user_id = actor.user_id,
            count = assigned.len(),
            "Leads assigned to company"
        );
        Ok(AssignCompanyResponse {
            leads: assigned,
            sent_to_partner: false,
            message: None,
            warning: None,
        })
    }

    /// Assigns an unowned lead to an agent of its company.
    pub async fn assign_agent(
        &self,
        actor: &Actor,
        id: i64,
        user_id: i64,
    ) -> Result<AssignAgentResponse, LeadError> {
        let lead = load_lead(&self.leads(), id).await?;
        let target: User = self
            .users()
            .find_by_id(user_id)
            .await?
            .map(User::from)
            .ok_or_else(|| LeadError::NotFound(format!("User {}", user_id)))?;

        let patch = self
            .decided(lifecycle::assign_to_agent(&lead, actor, &target, Utc::now()))
            .await?;
        let updated = self.persist(&lead, &patch).await?;

        record_lead_assigned("agent", 1);
        tracing::info!(
            lead_id = id,
            company_id = ?updated.company_id,
            user_id = target.id,
            assigned_by = actor.user_id,
            "Lead assigned to agent"
        );

        let warning = mirror_assignment(self.mirror.as_ref(), &updated).await;
        Ok(AssignAgentResponse {
            lead: updated,
            warning,
        })
    }
}
