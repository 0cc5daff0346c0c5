use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    /// JWT authentication configuration
    pub jwt: JwtAuthConfig,
    #[serde(default)]
    pub integrations: IntegrationsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Upper bound for request bodies; evidence uploads arrive as base64 JSON.
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl From<&DatabaseConfig> for persistence::db::DatabaseConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_connections: config.max_connections,
            min_connections: config.min_connections,
            connect_timeout_secs: config.connect_timeout_secs,
            idle_timeout_secs: config.idle_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtAuthConfig {
    /// HS256 signing secret
    pub secret: String,

    /// Access token expiration in seconds (default: 28800 = 8 hours)
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry_secs: i64,

    /// Leeway in seconds for clock skew tolerance
    #[serde(default = "default_jwt_leeway")]
    pub leeway_secs: u64,
}

/// Outbound calls to partner systems and the messaging platform.
#[derive(Debug, Clone, Deserialize)]
pub struct IntegrationsConfig {
    /// Timeout for partner webhook calls
    #[serde(default = "default_partner_timeout")]
    pub partner_timeout_secs: u64,

    #[serde(default)]
    pub messaging: MessagingConfig,
}

impl Default for IntegrationsConfig {
    fn default() -> Self {
        Self {
            partner_timeout_secs: default_partner_timeout(),
            messaging: MessagingConfig::default(),
        }
    }
}

/// Assignment mirror into the messaging platform. Disabled unless `url`,
/// `token` and `company_id` are all set.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagingConfig {
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub token: String,

    /// The only company whose assignments are mirrored
    #[serde(default)]
    pub company_id: Option<i64>,

    #[serde(default = "default_partner_timeout")]
    pub timeout_secs: u64,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            company_id: None,
            timeout_secs: default_partner_timeout(),
        }
    }
}

impl MessagingConfig {
    pub fn is_enabled(&self) -> bool {
        !self.url.is_empty() && !self.token.is_empty() && self.company_id.is_some()
    }
}

/// Where return evidence is stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Directory tree under `root_dir`, for development and tests
    #[default]
    Local,
    /// S3-compatible object storage (AWS S3, MinIO)
    S3,
}

/// Blob storage for return evidence.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root directory of the local backend; every bucket is a sub-directory
    #[serde(default = "default_storage_root")]
    pub root_dir: String,

    #[serde(default)]
    pub s3: S3StorageConfig,

    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            root_dir: default_storage_root(),
            s3: S3StorageConfig::default(),
            max_attachment_bytes: default_max_attachment_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3StorageConfig {
    /// Custom endpoint such as a MinIO server; empty means AWS
    #[serde(default)]
    pub endpoint: String,

    #[serde(default = "default_s3_region")]
    pub region: String,

    /// Static credentials; when both are empty the AWS default chain is used
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,

    /// Prepended to the evidence bucket names (`return-audio`, `return-images`)
    #[serde(default)]
    pub bucket_prefix: String,

    #[serde(default = "default_true")]
    pub force_path_style: bool,
}

impl Default for S3StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            region: default_s3_region(),
            access_key: String::new(),
            secret_key: String::new(),
            bucket_prefix: String::new(),
            force_path_style: true,
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_body_size() -> usize {
    16 * 1024 * 1024
}
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    5
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_access_token_expiry() -> i64 {
    28800
}
fn default_jwt_leeway() -> u64 {
    shared::jwt::DEFAULT_LEEWAY_SECS
}
fn default_partner_timeout() -> u64 {
    30
}
fn default_storage_root() -> String {
    "./data/blobs".to_string()
}
fn default_max_attachment_bytes() -> usize {
    5 * 1024 * 1024
}
fn default_s3_region() -> String {
    "us-east-1".to_string()
}
fn default_true() -> bool {
    true
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with LEADFLOW__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("LEADFLOW").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Defaults are embedded so tests do not depend on the working directory.
    /// Validation is skipped to allow partial configs.
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            request_timeout_secs = 30

            [database]
            url = ""
            max_connections = 20
            min_connections = 5
            connect_timeout_secs = 10
            idle_timeout_secs = 600

            [logging]
            level = "info"
            format = "json"

            [security]
            cors_origins = []

            [jwt]
            secret = "test-secret-with-enough-length"
            access_token_expiry_secs = 3600
            leeway_secs = 30

            [integrations]
            partner_timeout_secs = 30

            [integrations.messaging]
            url = ""
            token = ""

            [storage]
            backend = "local"
            root_dir = "./data/test-blobs"
            max_attachment_bytes = 5242880
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "LEADFLOW__DATABASE__URL environment variable must be set".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if self.jwt.secret.len() < shared::jwt::MIN_SECRET_LEN {
            return Err(ConfigValidationError::MissingRequired(format!(
                "LEADFLOW__JWT__SECRET must be at least {} characters",
                shared::jwt::MIN_SECRET_LEN
            )));
        }

        let messaging = &self.integrations.messaging;
        if !messaging.url.is_empty() && !messaging.is_enabled() {
            return Err(ConfigValidationError::InvalidValue(
                "integrations.messaging needs url, token and company_id together".to_string(),
            ));
        }

        let s3 = &self.storage.s3;
        if self.storage.backend == StorageBackend::S3
            && s3.access_key.is_empty() != s3.secret_key.is_empty()
        {
            return Err(ConfigValidationError::InvalidValue(
                "storage.s3 needs access_key and secret_key together".to_string(),
            ));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }
}
