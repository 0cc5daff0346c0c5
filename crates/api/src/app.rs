use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use domain::services::{AssignmentMirror, PartnerGateway};
use shared::jwt::{JwtConfig, JwtError};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, trace_id};
use crate::routes::{auth, companies, health, lead_requests, leads, returns, users};
use crate::services::{
    blob_store_from_config, BlobStore, HttpAssignmentMirror, HttpPartnerGateway,
};

/// Errors building the application state.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Invalid JWT configuration: {0}")]
    Jwt(#[from] JwtError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub jwt: Arc<JwtConfig>,
    pub partner: Arc<dyn PartnerGateway>,
    pub mirror: Arc<dyn AssignmentMirror>,
    pub blobs: Arc<dyn BlobStore>,
}

impl AppState {
    /// Builds the state with the HTTP and blob storage collaborators.
    pub async fn new(config: Config, pool: PgPool) -> Result<Self, StartupError> {
        let partner = Arc::new(HttpPartnerGateway::new(
            config.integrations.partner_timeout_secs,
        )?);
        let mirror = Arc::new(HttpAssignmentMirror::from_config(
            &config.integrations.messaging,
        )?);
        let blobs = blob_store_from_config(&config.storage).await;
        Self::with_collaborators(config, pool, partner, mirror, blobs)
    }

    pub fn with_collaborators(
        config: Config,
        pool: PgPool,
        partner: Arc<dyn PartnerGateway>,
        mirror: Arc<dyn AssignmentMirror>,
        blobs: Arc<dyn BlobStore>,
    ) -> Result<Self, StartupError> {
        let jwt = JwtConfig::new(
            &config.jwt.secret,
            config.jwt.access_token_expiry_secs,
            config.jwt.leeway_secs,
        )?;
        Ok(Self {
            pool,
            config: Arc::new(config),
            jwt: Arc::new(jwt),
            partner,
            mirror,
            blobs,
        })
    }
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    let cors = if config.security.cors_origins.is_empty() {
        // Default: allow any origin (for development)
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Authentication happens in the handlers' extractors.
    let api_routes = Router::new()
        .route("/api/v1/auth/login", post(auth::login))
        // Companies and users (admin)
        .route(
            "/api/v1/companies",
            post(companies::create_company).get(companies::list_companies),
        )
        .route("/api/v1/companies/:company_id", get(companies::get_company))
        .route(
            "/api/v1/companies/:company_id/settings",
            patch(companies::update_settings),
        )
        .route(
            "/api/v1/companies/:company_id/agents",
            get(companies::list_agents),
        )
        .route("/api/v1/users", post(users::create_user))
        .route("/api/v1/users/me", get(users::me))
        // Leads
        .route("/api/v1/leads", get(leads::list_leads))
        .route("/api/v1/leads/export", get(leads::export_leads))
        .route("/api/v1/leads/import", post(leads::import_leads))
        .route("/api/v1/leads/import/csv", post(leads::import_leads_csv))
        .route("/api/v1/leads/assign-company", post(leads::assign_company))
        .route("/api/v1/leads/:lead_id", get(leads::get_lead))
        .route("/api/v1/leads/:lead_id/status", post(leads::set_status))
        .route(
            "/api/v1/leads/:lead_id/cancel-status",
            post(leads::cancel_status),
        )
        .route("/api/v1/leads/:lead_id/refuse", post(leads::refuse_lead))
        .route(
            "/api/v1/leads/:lead_id/assign-agent",
            post(leads::assign_agent),
        )
        .route("/api/v1/leads/:lead_id/returns", post(returns::request_return))
        // Lead requests
        .route(
            "/api/v1/requests",
            post(lead_requests::create_request).get(lead_requests::list_requests),
        )
        .route("/api/v1/requests/quota", get(lead_requests::get_quota))
        .route(
            "/api/v1/requests/:request_id/approve",
            post(lead_requests::approve_request),
        )
        .route(
            "/api/v1/requests/:request_id/reject",
            post(lead_requests::reject_request),
        )
        .route(
            "/api/v1/requests/:request_id/cancel",
            post(lead_requests::cancel_request),
        )
        // Returns
        .route("/api/v1/returns", get(returns::list_returns))
        .route("/api/v1/returns/:return_id", get(returns::get_return))
        .route(
            "/api/v1/returns/:return_id/evidence",
            post(returns::submit_evidence),
        )
        .route(
            "/api/v1/returns/:return_id/attachments/:attachment_id",
            get(returns::download_attachment),
        )
        .route(
            "/api/v1/returns/:return_id/resolve",
            post(returns::resolve_return),
        )
        .route(
            "/api/v1/returns/:return_id/cancel",
            post(returns::cancel_return),
        );

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(DefaultBodyLimit::max(config.server.max_body_size))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
