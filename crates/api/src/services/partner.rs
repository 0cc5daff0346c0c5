//! HTTP client for partner companies' lead intake.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use domain::services::{IntegrationOutcome, PartnerEndpoint, PartnerGateway, PartnerResponse};

use crate::middleware::metrics::record_integration_call;

#[derive(Debug, Serialize)]
struct SendLeadsPayload<'a> {
    lead_ids: &'a [i64],
}

/// Outcome label for metrics.
pub(crate) fn outcome_label(outcome: &IntegrationOutcome) -> &'static str {
    match outcome {
        IntegrationOutcome::Ok(_) => "ok",
        IntegrationOutcome::SoftFailure(_) => "soft",
        IntegrationOutcome::HardFailure(_) => "hard",
    }
}

/// Pushes leads with `POST {api_url}/leads/send`.
#[derive(Debug, Clone)]
pub struct HttpPartnerGateway {
    client: Client,
}

impl HttpPartnerGateway {
    pub fn new(timeout_secs: u64) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PartnerGateway for HttpPartnerGateway {
    async fn send_leads(&self, endpoint: &PartnerEndpoint, lead_ids: &[i64]) -> IntegrationOutcome {
        let url = format!("{}/leads/send", endpoint.base_url.trim_end_matches('/'));

        let outcome = match self
            .client
            .post(&url)
            .bearer_auth(&endpoint.token)
            .json(&SendLeadsPayload { lead_ids })
            .send()
            .await
        {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.json::<PartnerResponse>().await.ok();
                IntegrationOutcome::classify(status, body)
            }
            Err(e) => IntegrationOutcome::HardFailure(format!("Partner unreachable: {}", e)),
        };

        record_integration_call("partner", outcome_label(&outcome));
        match &outcome {
            IntegrationOutcome::Ok(message) => {
                tracing::info!(url = %url, count = lead_ids.len(), message = %message, "Leads sent to partner")
            }
            IntegrationOutcome::SoftFailure(message) | IntegrationOutcome::HardFailure(message) => {
                tracing::warn!(url = %url, count = lead_ids.len(), error = %message, "Partner rejected leads")
            }
        }
        outcome
    }
}
