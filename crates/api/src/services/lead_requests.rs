//! Agent lead requests: quota, creation, decisions.

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;

use domain::models::lead_request::{
    ApproveRequestBody, CreateRequestResponse, ListRequestsQuery, RejectRequestBody,
    RequestDecisionResponse,
};
use domain::models::{Actor, Company, Lead, LeadRequest, LeadRequestStatus, Role};
use domain::services::{check_request_quota, AssignmentMirror, QuotaStatus};
use domain::LeadError;
use persistence::repositories::{
    ApproveOutcome, CompanyRepository, LeadRepository, LeadRequestRepository,
    ListLeadRequestsQuery, UserRepository,
};

use crate::middleware::metrics::{record_lead_assigned, record_lead_request};
use crate::services::{describe_conflict, mirror_assignment};

fn agent_company(actor: &Actor) -> Result<i64, LeadError> {
    match (actor.role, actor.company_id) {
        (Role::Agent, Some(company_id)) => Ok(company_id),
        _ => Err(LeadError::Permission("Only agents can request leads".into())),
    }
}

/// Admins decide any request; coordinators those of their company.
fn ensure_can_decide(actor: &Actor, request: &LeadRequest) -> Result<(), LeadError> {
    match actor.role {
        Role::Admin => Ok(()),
        Role::Coordinator if actor.company_id == Some(request.company_id) => Ok(()),
        Role::Coordinator | Role::Agent => Err(LeadError::Permission(
            "Only the company's coordinators can decide this request".into(),
        )),
    }
}

pub struct LeadRequestService {
    pool: PgPool,
    mirror: Arc<dyn AssignmentMirror>,
}

impl LeadRequestService {
    pub fn new(pool: PgPool, mirror: Arc<dyn AssignmentMirror>) -> Self {
        Self { pool, mirror }
    }

    fn requests(&self) -> LeadRequestRepository {
        LeadRequestRepository::new(self.pool.clone())
    }

    async fn company(&self, id: i64) -> Result<Company, LeadError> {
        CompanyRepository::new(self.pool.clone())
            .find_by_id(id)
            .await?
            .map(Company::from)
            .ok_or_else(|| LeadError::NotFound(format!("Company {}", id)))
    }

    async fn load(&self, id: i64) -> Result<LeadRequest, LeadError> {
        self.requests()
            .find_by_id(id)
            .await?
            .map(LeadRequest::from)
            .ok_or_else(|| LeadError::NotFound(format!("Request {}", id)))
    }

    /// Whether the agent may raise a new request right now.
    pub async fn quota(&self, actor: &Actor) -> Result<QuotaStatus, LeadError> {
        let company_id = agent_company(actor)?;
        let company = self.company(company_id).await?;
        let usage = self.requests().quota_usage(actor.user_id).await?;
        Ok(QuotaStatus::evaluate(usage, company.request_cap()))
    }

    /// Raises a request; automatic companies resolve it immediately.
    pub async fn create(&self, actor: &Actor) -> Result<CreateRequestResponse, LeadError> {
        let company_id = agent_company(actor)?;
        let company = self.company(company_id).await?;
        let cap = company.request_cap();

        let created = self
            .requests()
            .create_within_quota(actor.user_id, company_id, |usage| {
                check_request_quota(usage, cap)
            })
            .await;

        let entity = match created {
            Ok(entity) => entity,
            Err(err @ LeadError::QuotaExceeded(reason)) => {
                record_lead_request("quota_exceeded");
                tracing::info!(
                    user_id = actor.user_id,
                    company_id,
                    reason = %reason,
                    "Lead request refused by quota"
                );
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        tracing::info!(
            request_id = entity.id,
            user_id = actor.user_id,
            company_id,
            "Lead request created"
        );

        if !company.auto_assign {
            record_lead_request("pending");
            return Ok(CreateRequestResponse {
                request: entity.into(),
                auto_assigned: false,
                warning: None,
            });
        }

        let decision = self.settle(entity.id, None, None).await?;
        Ok(CreateRequestResponse {
            request: decision.request,
            auto_assigned: true,
            warning: decision.warning,
        })
    }

    /// Runs the approve transaction and reports its outcome.
    async fn settle(
        &self,
        request_id: i64,
        decided_by: Option<i64>,
        lead_id: Option<i64>,
    ) -> Result<RequestDecisionResponse, LeadError> {
        match self
            .requests()
            .approve(request_id, decided_by, lead_id, Utc::now())
            .await?
        {
            ApproveOutcome::Approved { request, lead } => {
                let request = LeadRequest::from(request);
                let lead = Lead::from(lead);
                record_lead_request("approved");
                record_lead_assigned("agent", 1);
                tracing::info!(
                    request_id,
                    lead_id = lead.id,
                    user_id = request.agent_id,
                    company_id = request.company_id,
                    decided_by = ?decided_by,
                    "Lead request approved"
                );
                let warning = mirror_assignment(self.mirror.as_ref(), &lead).await;
                Ok(RequestDecisionResponse {
                    request,
                    lead: Some(lead),
                    warning,
                })
            }
            ApproveOutcome::RejectedNoLeads(request) => {
                record_lead_request("rejected");
                tracing::info!(
                    request_id,
                    company_id = request.company_id,
                    "Lead request rejected: no unassigned leads"
                );
                Ok(RequestDecisionResponse {
                    request: request.into(),
                    lead: None,
                    warning: None,
                })
            }
            ApproveOutcome::LeadUnavailable => {
                let lead_id = lead_id.unwrap_or_default();
                let leads = LeadRepository::new(self.pool.clone());
                let err = match leads.find_by_id(lead_id).await? {
                    None => LeadError::NotFound(format!("Lead {}", lead_id)),
                    Some(lead) => match lead.user_id {
                        Some(owner) => LeadError::owned_by(owner),
                        None => LeadError::conflict(format!(
                            "Lead {} is not an active unassigned lead of the request's company",
                            lead_id
                        )),
                    },
                };
                Err(describe_conflict(&UserRepository::new(self.pool.clone()), err).await)
            }
            ApproveOutcome::NotPending(request) => {
                LeadRequest::from(request).ensure_pending()?;
                Err(LeadError::conflict(format!(
                    "Request {} is no longer pending",
                    request_id
                )))
            }
            ApproveOutcome::NotFound => Err(LeadError::NotFound(format!("Request {}", request_id))),
        }
    }

    pub async fn list(
        &self,
        actor: &Actor,
        query: &ListRequestsQuery,
    ) -> Result<Vec<LeadRequest>, LeadError> {
        let scope = match actor.role {
            Role::Admin => ListLeadRequestsQuery::default(),
            Role::Coordinator => ListLeadRequestsQuery {
                company_id: actor.company_id,
                ..Default::default()
            },
            Role::Agent => ListLeadRequestsQuery {
                agent_id: Some(actor.user_id),
                ..Default::default()
            },
        };
        let filter = ListLeadRequestsQuery {
            status: query.status.map(Into::into),
            ..scope
        };

        Ok(self
            .requests()
            .list(&filter)
            .await?
            .into_iter()
            .map(LeadRequest::from)
            .collect())
    }

    /// Grants a lead: the given one, or the company's most recent
    /// unassigned lead. With none available the request is rejected.
    pub async fn approve(
        &self,
        actor: &Actor,
        id: i64,
        body: &ApproveRequestBody,
    ) -> Result<RequestDecisionResponse, LeadError> {
        let request = self.load(id).await?;
        ensure_can_decide(actor, &request)?;
        request.ensure_pending()?;

        self.settle(id, Some(actor.user_id), body.lead_id).await
    }

    pub async fn reject(
        &self,
        actor: &Actor,
        id: i64,
        body: &RejectRequestBody,
    ) -> Result<LeadRequest, LeadError> {
        let request = self.load(id).await?;
        ensure_can_decide(actor, &request)?;
        request.ensure_pending()?;

        let reason = body
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty());
        let rejected = self
            .requests()
            .reject(id, actor.user_id, reason, Utc::now())
            .await?;

        match rejected {
            Some(entity) => {
                record_lead_request("rejected");
                tracing::info!(request_id = id, decided_by = actor.user_id, "Lead request rejected");
                Ok(entity.into())
            }
            None => Err(self.no_longer_pending(id).await),
        }
    }

    /// Withdraws a pending request; only its agent may do so.
    pub async fn cancel(&self, actor: &Actor, id: i64) -> Result<LeadRequest, LeadError> {
        let request = self.load(id).await?;
        if request.agent_id != actor.user_id {
            return Err(LeadError::Permission(
                "Only the requesting agent can cancel a request".into(),
            ));
        }
        request.ensure_pending()?;

        match self.requests().cancel(id, actor.user_id, Utc::now()).await? {
            Some(entity) => {
                record_lead_request("cancelled");
                tracing::info!(request_id = id, user_id = actor.user_id, "Lead request cancelled");
                Ok(entity.into())
            }
            None => Err(self.no_longer_pending(id).await),
        }
    }

    async fn no_longer_pending(&self, id: i64) -> LeadError {
        match self.load(id).await {
            Ok(request) if request.status != LeadRequestStatus::Pending => request
                .ensure_pending()
                .err()
                .unwrap_or_else(|| LeadError::conflict(format!("Request {} changed", id))),
            Ok(_) => LeadError::conflict(format!("Request {} changed; retry", id)),
            Err(err) => err,
        }
    }
}
