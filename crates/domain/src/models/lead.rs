//! Lead domain model, lifecycle states and list filters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::LeadError;
use crate::models::user::{Actor, Role};
use shared::pagination::{PageParams, Pagination};

/// Coarse lifecycle state of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeadStatus {
    #[serde(rename = "activo")]
    Active,
    #[serde(rename = "convertido")]
    Converted,
    #[serde(rename = "perdido")]
    Lost,
    #[serde(rename = "no_valido")]
    Invalid,
    /// Flagged for return; a devolución is open or was accepted.
    #[serde(rename = "devolucion")]
    Returned,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::Active => "activo",
            LeadStatus::Converted => "convertido",
            LeadStatus::Lost => "perdido",
            LeadStatus::Invalid => "no_valido",
            LeadStatus::Returned => "devolucion",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "activo" => Some(LeadStatus::Active),
            "convertido" => Some(LeadStatus::Converted),
            "perdido" => Some(LeadStatus::Lost),
            "no_valido" => Some(LeadStatus::Invalid),
            "devolucion" => Some(LeadStatus::Returned),
            _ => None,
        }
    }

    /// States shown in the history view.
    pub fn history() -> [LeadStatus; 4] {
        [
            LeadStatus::Converted,
            LeadStatus::Lost,
            LeadStatus::Invalid,
            LeadStatus::Returned,
        ]
    }
}

/// Fine-grained working sub-status of an active lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TempStatus {
    #[serde(rename = "sin_tratar")]
    Untreated,
    #[serde(rename = "no_contesta")]
    NoAnswer,
    #[serde(rename = "no_valido")]
    Invalid,
    #[serde(rename = "gestion")]
    InProgress,
    #[serde(rename = "convertido")]
    Converted,
    #[serde(rename = "no_cerrado")]
    NotClosed,
}

impl TempStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TempStatus::Untreated => "sin_tratar",
            TempStatus::NoAnswer => "no_contesta",
            TempStatus::Invalid => "no_valido",
            TempStatus::InProgress => "gestion",
            TempStatus::Converted => "convertido",
            TempStatus::NotClosed => "no_cerrado",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "sin_tratar" => Some(TempStatus::Untreated),
            "no_contesta" => Some(TempStatus::NoAnswer),
            "no_valido" => Some(TempStatus::Invalid),
            "gestion" => Some(TempStatus::InProgress),
            "convertido" => Some(TempStatus::Converted),
            "no_cerrado" => Some(TempStatus::NotClosed),
            _ => None,
        }
    }

    /// Coarse state this sub-status forces, if it closes the lead.
    pub fn terminal_status(&self) -> Option<LeadStatus> {
        match self {
            TempStatus::Converted => Some(LeadStatus::Converted),
            TempStatus::NotClosed => Some(LeadStatus::Lost),
            TempStatus::Invalid => Some(LeadStatus::Invalid),
            TempStatus::Untreated | TempStatus::NoAnswer | TempStatus::InProgress => None,
        }
    }
}

/// Source platform of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Facebook,
    Instagram,
    X,
    Tiktok,
    Callbell,
    Other,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::X => "x",
            Platform::Tiktok => "tiktok",
            Platform::Callbell => "callbell",
            Platform::Other => "other",
        }
    }

    /// Parses an imported value; anything unrecognised is `Other`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "facebook" => Platform::Facebook,
            "instagram" => Platform::Instagram,
            "x" | "twitter" => Platform::X,
            "tiktok" => Platform::Tiktok,
            "callbell" => Platform::Callbell,
            _ => Platform::Other,
        }
    }
}

/// Lead domain model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub platform: Platform,
    pub quality: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub company_id: Option<i64>,
    pub user_id: Option<i64>,
    pub status: LeadStatus,
    pub temp_status: TempStatus,
    pub entered_at: DateTime<Utc>,
    pub company_assigned_at: Option<DateTime<Utc>>,
    pub agent_assigned_at: Option<DateTime<Utc>>,
}

impl Lead {
    /// Whether the lead is part of the active working set.
    pub fn is_active(&self) -> bool {
        self.status == LeadStatus::Active
    }
}

/// Change to the agent assignment of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssigneeChange {
    /// Set the owner; only valid while the lead is unassigned.
    Claim { user_id: i64, at: DateTime<Utc> },
    /// Clear the owner and the agent-assignment timestamp.
    Release,
}

/// Field changes produced by a lifecycle transition.
///
/// Applied by the store with a guard on the owner and status the decision
/// was taken against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadPatch {
    pub status: Option<LeadStatus>,
    pub temp_status: Option<TempStatus>,
    pub assignee: Option<AssigneeChange>,
}

impl LeadPatch {
    /// Returns `lead` with the patch applied.
    pub fn apply(&self, lead: &Lead) -> Lead {
        let mut next = lead.clone();
        if let Some(status) = self.status {
            next.status = status;
        }
        if let Some(temp) = self.temp_status {
            next.temp_status = temp;
        }
        match self.assignee {
            Some(AssigneeChange::Claim { user_id, at }) => {
                next.user_id = Some(user_id);
                next.agent_assigned_at = Some(at);
            }
            Some(AssigneeChange::Release) => {
                next.user_id = None;
                next.agent_assigned_at = None;
            }
            None => {}
        }
        next
    }
}

/// Which list a query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadView {
    #[default]
    Active,
    History,
    Unassigned,
}

/// Date column a range filter applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateField {
    EnteredAt,
    CompanyAssignedAt,
    AgentAssignedAt,
}

impl DateField {
    pub fn column(&self) -> &'static str {
        match self {
            DateField::EnteredAt => "entered_at",
            DateField::CompanyAssignedAt => "company_assigned_at",
            DateField::AgentAssignedAt => "agent_assigned_at",
        }
    }

    /// The date each role filters on by default.
    pub fn default_for(role: Role) -> Self {
        match role {
            Role::Admin => DateField::EnteredAt,
            Role::Coordinator => DateField::CompanyAssignedAt,
            Role::Agent => DateField::AgentAssignedAt,
        }
    }
}

/// Query string accepted by the list and export endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListLeadsQuery {
    #[serde(default)]
    pub view: LeadView,
    pub company_id: Option<i64>,
    pub user_id: Option<i64>,
    pub status: Option<LeadStatus>,
    pub temp_status: Option<TempStatus>,
    pub phone: Option<String>,
    pub date_field: Option<DateField>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// A list query after role scoping; safe to hand to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadFilter {
    pub view: LeadView,
    pub company_id: Option<i64>,
    pub user_id: Option<i64>,
    pub status: Option<LeadStatus>,
    pub temp_status: Option<TempStatus>,
    pub phone: Option<String>,
    pub date_field: DateField,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl ListLeadsQuery {
    pub fn page_params(&self) -> PageParams {
        let defaults = PageParams::default();
        PageParams {
            page: self.page.unwrap_or(defaults.page),
            per_page: self.per_page.unwrap_or(defaults.per_page),
        }
        .normalized()
    }

    /// Narrows the query to what `actor` may see.
    pub fn scoped(&self, actor: &Actor) -> Result<LeadFilter, LeadError> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(LeadError::Validation("`from` must not be after `to`".into()));
            }
        }

        let (company_id, user_id) = match actor.role {
            Role::Admin => (self.company_id, self.user_id),
            Role::Coordinator => {
                if self.view == LeadView::Unassigned {
                    return Err(LeadError::Permission(
                        "Only administrators can list unassigned leads".into(),
                    ));
                }
                if self.company_id.is_some() && self.company_id != actor.company_id {
                    return Err(LeadError::Permission(
                        "Coordinators can only list their own company's leads".into(),
                    ));
                }
                (actor.company_id, self.user_id)
            }
            Role::Agent => {
                if self.view == LeadView::Unassigned {
                    return Err(LeadError::Permission(
                        "Only administrators can list unassigned leads".into(),
                    ));
                }
                if self.user_id.is_some() && self.user_id != Some(actor.user_id) {
                    return Err(LeadError::Permission(
                        "Agents can only list their own leads".into(),
                    ));
                }
                (actor.company_id, Some(actor.user_id))
            }
        };

        let phone = self
            .phone
            .as_deref()
            .map(shared::validation::normalize_phone)
            .filter(|p| !p.is_empty());

        Ok(LeadFilter {
            view: self.view,
            company_id,
            user_id,
            status: self.status,
            temp_status: self.temp_status,
            phone,
            date_field: self
                .date_field
                .unwrap_or_else(|| DateField::default_for(actor.role)),
            from: self.from,
            to: self.to,
        })
    }
}

/// One lead to create, from JSON or a CSV row.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ImportRow {
    #[validate(
        custom(function = "shared::validation::validate_not_blank"),
        length(max = 200, message = "name must be at most 200 characters")
    )]
    pub name: String,

    #[validate(custom(function = "shared::validation::validate_phone"))]
    pub phone: String,

    #[serde(default)]
    pub platform: Option<String>,

    #[serde(default)]
    pub company_id: Option<i64>,

    #[serde(default)]
    #[validate(custom(function = "shared::validation::validate_quality"))]
    pub quality: Option<i32>,

    #[serde(default)]
    #[validate(length(max = 2000, message = "notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

/// A validated lead ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLead {
    pub name: String,
    pub phone: String,
    pub platform: Platform,
    pub quality: i32,
    pub notes: Option<String>,
    pub company_id: Option<i64>,
}

impl From<&ImportRow> for NewLead {
    fn from(row: &ImportRow) -> Self {
        Self {
            name: row.name.trim().to_string(),
            phone: shared::validation::normalize_phone(&row.phone),
            platform: row
                .platform
                .as_deref()
                .map(Platform::parse_lenient)
                .unwrap_or(Platform::Other),
            quality: row.quality.unwrap_or(1),
            notes: row
                .notes
                .as_ref()
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            company_id: row.company_id,
        }
    }
}

/// Body of `POST /leads/:id/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct SetStatusRequest {
    pub temp_status: TempStatus,
}

/// Body of `POST /leads/assign-company`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AssignCompanyRequest {
    #[validate(length(min = 1, max = 500, message = "lead_ids must contain 1-500 ids"))]
    pub lead_ids: Vec<i64>,
    pub company_id: i64,
}

/// Body of `POST /leads/:id/assign-agent`.
#[derive(Debug, Clone, Deserialize)]
pub struct AssignAgentRequest {
    pub user_id: i64,
}

/// A page of leads.
#[derive(Debug, Clone, Serialize)]
pub struct LeadListResponse {
    pub data: Vec<Lead>,
    pub pagination: Pagination,
}

/// Result of a bulk company assignment.
#[derive(Debug, Clone, Serialize)]
pub struct AssignCompanyResponse {
    /// Leads assigned locally; empty when they went to the partner.
    pub leads: Vec<Lead>,
    pub sent_to_partner: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// A lead after an agent assignment, with any mirror warning.
#[derive(Debug, Clone, Serialize)]
pub struct AssignAgentResponse {
    pub lead: Lead,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// A lead after its agent was released, with any mirror warning.
#[derive(Debug, Clone, Serialize)]
pub struct RefuseLeadResponse {
    pub lead: Lead,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl Lead {
    /// Whether `actor` may read this lead.
    pub fn visible_to(&self, actor: &Actor) -> bool {
        match actor.role {
            Role::Admin => true,
            Role::Coordinator => actor.belongs_to(self.company_id),
            Role::Agent => self.user_id == Some(actor.user_id),
        }
    }
}
