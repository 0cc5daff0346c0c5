//! Client companies and their lead-distribution settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use shared::validation::{validate_requests_per_agent, MAX_REQUESTS_PER_AGENT, MIN_REQUESTS_PER_AGENT};

/// How agent lead requests get resolved in a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentMode {
    /// Requests wait for a coordinator.
    Manual,
    /// Requests are satisfied on creation.
    Automatic,
}

/// Company domain model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    pub name: String,
    /// Leads sent to this company go to the partner webhook instead of
    /// being assigned locally.
    pub has_api: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(skip_serializing)]
    pub api_token: Option<String>,
    pub max_requests_per_agent: i32,
    pub auto_assign: bool,
    pub agents_can_refuse: bool,
    pub created_at: DateTime<Utc>,
}

impl Company {
    pub fn assignment_mode(&self) -> AssignmentMode {
        if self.auto_assign {
            AssignmentMode::Automatic
        } else {
            AssignmentMode::Manual
        }
    }

    /// Request cap, clamped into the supported range.
    pub fn request_cap(&self) -> i64 {
        i64::from(
            self.max_requests_per_agent
                .clamp(MIN_REQUESTS_PER_AGENT, MAX_REQUESTS_PER_AGENT),
        )
    }

    /// Partner endpoint and token, when the company is integrated.
    pub fn partner_endpoint(&self) -> Option<(&str, &str)> {
        if !self.has_api {
            return None;
        }
        match (self.api_url.as_deref(), self.api_token.as_deref()) {
            (Some(url), Some(token)) => Some((url, token)),
            _ => None,
        }
    }
}

/// Request to create a company.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_partner_settings"))]
pub struct CreateCompanyRequest {
    #[validate(length(min = 2, max = 120, message = "name must be 2-120 characters"))]
    pub name: String,

    #[serde(default)]
    pub has_api: bool,

    #[validate(url(message = "api_url must be a valid URL"))]
    pub api_url: Option<String>,

    pub api_token: Option<String>,

    #[serde(default = "default_requests_per_agent")]
    #[validate(custom(function = "validate_requests_per_agent"))]
    pub max_requests_per_agent: i32,

    #[serde(default)]
    pub auto_assign: bool,

    #[serde(default = "default_true")]
    pub agents_can_refuse: bool,
}

fn default_requests_per_agent() -> i32 {
    1
}

fn default_true() -> bool {
    true
}

fn validate_partner_settings(req: &CreateCompanyRequest) -> Result<(), ValidationError> {
    check_partner_settings(req.has_api, req.api_url.as_deref(), req.api_token.as_deref())
}

fn check_partner_settings(
    has_api: bool,
    api_url: Option<&str>,
    api_token: Option<&str>,
) -> Result<(), ValidationError> {
    let present = |v: Option<&str>| v.map(|s| !s.trim().is_empty()).unwrap_or(false);
    if has_api && !(present(api_url) && present(api_token)) {
        let mut err = ValidationError::new("partner_settings");
        err.message = Some("api_url and api_token are required when has_api is enabled".into());
        return Err(err);
    }
    Ok(())
}

/// Partial update of company settings. Absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateCompanySettingsRequest {
    #[validate(length(min = 2, max = 120, message = "name must be 2-120 characters"))]
    pub name: Option<String>,
    pub has_api: Option<bool>,
    #[validate(url(message = "api_url must be a valid URL"))]
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    #[validate(custom(function = "validate_requests_per_agent"))]
    pub max_requests_per_agent: Option<i32>,
    pub auto_assign: Option<bool>,
    pub agents_can_refuse: Option<bool>,
}

impl UpdateCompanySettingsRequest {
    /// Applies the update to a copy of `company` and re-checks the partner
    /// settings on the merged result.
    pub fn merge_into(&self, company: &Company) -> Result<Company, ValidationError> {
        let mut merged = company.clone();
        if let Some(name) = &self.name {
            merged.name = name.clone();
        }
        if let Some(has_api) = self.has_api {
            merged.has_api = has_api;
        }
        if let Some(url) = &self.api_url {
            merged.api_url = Some(url.clone());
        }
        if let Some(token) = &self.api_token {
            merged.api_token = Some(token.clone());
        }
        if let Some(max) = self.max_requests_per_agent {
            merged.max_requests_per_agent = max;
        }
        if let Some(auto) = self.auto_assign {
            merged.auto_assign = auto;
        }
        if let Some(refuse) = self.agents_can_refuse {
            merged.agents_can_refuse = refuse;
        }
        check_partner_settings(
            merged.has_api,
            merged.api_url.as_deref(),
            merged.api_token.as_deref(),
        )?;
        Ok(merged)
    }
}
