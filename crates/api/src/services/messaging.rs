//! Mirrors agent assignments into the messaging platform.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use domain::services::{AssignmentMirror, IntegrationOutcome, PartnerResponse};

use crate::config::MessagingConfig;
use crate::middleware::metrics::record_integration_call;
use crate::services::partner::outcome_label;

#[derive(Debug, Serialize)]
struct AssignPayload {
    lead_id: i64,
    agent_id: i64,
    assign: bool,
}

/// `POST {url}/assign` client, active for one company only. Releases are
/// sent with `assign: false`.
#[derive(Debug, Clone)]
pub struct HttpAssignmentMirror {
    client: Client,
    url: String,
    token: String,
    company_id: Option<i64>,
}

impl HttpAssignmentMirror {
    /// Builds the mirror; it handles no company when messaging is not
    /// configured.
    pub fn from_config(config: &MessagingConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            company_id: config.is_enabled().then_some(config.company_id).flatten(),
        })
    }
}

#[async_trait]
impl AssignmentMirror for HttpAssignmentMirror {
    fn handles(&self, company_id: i64) -> bool {
        self.company_id == Some(company_id)
    }

    async fn mirror_assignment(
        &self,
        lead_id: i64,
        agent_id: i64,
        assign: bool,
    ) -> IntegrationOutcome {
        let outcome = match self
            .client
            .post(format!("{}/assign", self.url))
            .bearer_auth(&self.token)
            .json(&AssignPayload {
                lead_id,
                agent_id,
                assign,
            })
            .send()
            .await
        {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.json::<PartnerResponse>().await.ok();
                IntegrationOutcome::classify(status, body)
            }
            Err(e) => IntegrationOutcome::HardFailure(format!("Messaging unreachable: {}", e)),
        };

        record_integration_call("messaging", outcome_label(&outcome));
        outcome
    }
}
