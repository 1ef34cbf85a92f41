//! # Configuration Settings
//!
//! Defines the configuration structure for PasswordPal. Everything is read
//! once at startup and handed to components explicitly.

use crate::errors::{PasswordPalError, Result};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Validate, Default)]
pub struct AppConfig {
    #[validate(nested)]
    pub server: ServerConfig,

    #[validate(nested)]
    pub database: DatabaseConfig,

    #[validate(nested)]
    pub observability: ObservabilityConfig,

    #[validate(nested)]
    pub auth: AuthConfig,

    pub encryption: EncryptionConfig,

    #[validate(nested)]
    pub sharing: SharingConfig,

    #[validate(nested)]
    pub rate_limit: RateLimitConfig,

    #[validate(nested)]
    pub retention: RetentionConfig,

    #[validate(nested)]
    pub bootstrap: BootstrapConfig,
}

impl AppConfig {
    /// Build the configuration from environment variables and validate it.
    pub fn from_env() -> Result<Self> {
        let config = Self {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            observability: ObservabilityConfig::from_env()?,
            auth: AuthConfig::from_env()?,
            encryption: EncryptionConfig::from_env()?,
            sharing: SharingConfig::from_env()?,
            rate_limit: RateLimitConfig::from_env()?,
            retention: RetentionConfig::from_env()?,
            bootstrap: BootstrapConfig::from_env(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(PasswordPalError::from)?;
        self.validate_custom()
    }

    fn validate_custom(&self) -> Result<()> {
        if !self.database.url.starts_with("sqlite:") {
            return Err(PasswordPalError::config("DATABASE_URL must start with 'sqlite:'"));
        }

        if self.auth.jwt_secret.len() < 32 {
            return Err(PasswordPalError::config("JWT_SECRET must be at least 32 characters long"));
        }

        if self.auth.bcrypt_cost < MIN_BCRYPT_COST {
            return Err(PasswordPalError::config(format!(
                "BCRYPT_COST must be at least {}",
                MIN_BCRYPT_COST
            )));
        }

        self.encryption.key_bytes()?;

        url::Url::parse(&self.sharing.frontend_url).map_err(|e| {
            PasswordPalError::config(format!(
                "FRONTEND_URL '{}' is not a valid URL: {}",
                self.sharing.frontend_url, e
            ))
        })?;

        if self.database.min_connections > self.database.max_connections {
            return Err(PasswordPalError::config(
                "DATABASE_MIN_CONNECTIONS cannot exceed DATABASE_MAX_CONNECTIONS",
            ));
        }

        Ok(())
    }
}

/// Minimum bcrypt work factor accepted in production configuration.
pub const MIN_BCRYPT_COST: u32 = 12;

/// HTTP server configuration
#[derive(Debug, Clone, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1, message = "Host cannot be empty"))]
    pub host: String,

    #[validate(range(min = 1, message = "Port must be between 1 and 65535"))]
    pub port: u16,

    /// Maximum request body size in bytes
    #[validate(range(min = 1024, message = "Max body size must be at least 1KB"))]
    pub max_body_size: usize,

    /// CORS allowed origins (empty = allow all)
    pub cors_origins: Vec<String>,

    /// Reverse proxies whose `X-Forwarded-For`/`X-Real-IP` headers are
    /// believed. Empty means the socket peer is always the client.
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_body_size: 64 * 1024,
            cors_origins: vec![],
            trusted_proxies: vec![],
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            host: env_string("PASSWORDPAL_HOST").unwrap_or(defaults.host),
            port: env_parse("PASSWORDPAL_PORT", defaults.port)?,
            max_body_size: env_parse("PASSWORDPAL_MAX_BODY_SIZE", defaults.max_body_size)?,
            cors_origins: env_list("CORS_ORIGINS"),
            trusted_proxies: parse_trusted_proxies(&env_list("TRUSTED_PROXIES"))?,
        })
    }
}

fn parse_trusted_proxies(entries: &[String]) -> Result<Vec<IpAddr>> {
    entries
        .iter()
        .map(|raw| {
            raw.parse::<IpAddr>().map_err(|e| {
                PasswordPalError::config(format!(
                    "Invalid value '{}' for TRUSTED_PROXIES: {}",
                    raw, e
                ))
            })
        })
        .collect()
}

/// Database configuration
#[derive(Debug, Clone, Validate)]
pub struct DatabaseConfig {
    #[validate(length(min = 1, message = "Database URL cannot be empty"))]
    pub url: String,

    #[validate(range(min = 1, max = 100, message = "Max connections must be between 1 and 100"))]
    pub max_connections: u32,

    #[validate(range(max = 50, message = "Min connections must be between 0 and 50"))]
    pub min_connections: u32,

    #[validate(range(min = 1, max = 60, message = "Connect timeout must be between 1 and 60 seconds"))]
    pub connect_timeout_seconds: u64,

    /// Idle timeout in seconds (0 = no timeout)
    pub idle_timeout_seconds: u64,

    /// Apply pending migrations when the pool is created
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/passwordpal.db".to_string(),
            max_connections: 10,
            min_connections: 0,
            connect_timeout_seconds: 10,
            idle_timeout_seconds: 600,
            auto_migrate: true,
        }
    }
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Get idle timeout as Duration (None if 0)
    pub fn idle_timeout(&self) -> Option<Duration> {
        if self.idle_timeout_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.idle_timeout_seconds))
        }
    }

    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            url: env_string("DATABASE_URL").unwrap_or(defaults.url),
            max_connections: env_parse("DATABASE_MAX_CONNECTIONS", defaults.max_connections)?,
            min_connections: env_parse("DATABASE_MIN_CONNECTIONS", defaults.min_connections)?,
            connect_timeout_seconds: env_parse(
                "DATABASE_CONNECT_TIMEOUT_SECONDS",
                defaults.connect_timeout_seconds,
            )?,
            idle_timeout_seconds: env_parse(
                "DATABASE_IDLE_TIMEOUT_SECONDS",
                defaults.idle_timeout_seconds,
            )?,
            auto_migrate: env_bool("DATABASE_AUTO_MIGRATE", defaults.auto_migrate),
        })
    }
}

/// Logging and metrics configuration
#[derive(Debug, Clone, Validate)]
pub struct ObservabilityConfig {
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service_name: String,

    /// Log level used when RUST_LOG is not set
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    pub json_logging: bool,

    /// Prometheus exporter port (0 = disabled)
    pub metrics_port: u16,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "passwordpal".to_string(),
            log_level: "info".to_string(),
            json_logging: false,
            metrics_port: 0,
        }
    }
}

impl ObservabilityConfig {
    /// Get metrics bind address (None if disabled)
    pub fn metrics_bind_address(&self) -> Option<String> {
        if self.metrics_port == 0 {
            None
        } else {
            Some(format!("0.0.0.0:{}", self.metrics_port))
        }
    }

    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            service_name: env_string("PASSWORDPAL_SERVICE_NAME").unwrap_or(defaults.service_name),
            log_level: env_string("PASSWORDPAL_LOG_LEVEL").unwrap_or(defaults.log_level),
            json_logging: env_bool("PASSWORDPAL_LOG_JSON", defaults.json_logging),
            metrics_port: env_parse("PASSWORDPAL_METRICS_PORT", defaults.metrics_port)?,
        })
    }
}

/// Session token and federated login configuration
#[derive(Clone, Validate)]
pub struct AuthConfig {
    /// HS256 signing secret for session tokens
    pub jwt_secret: String,

    #[validate(range(
        min = 60,
        max = 604800,
        message = "Token expiry must be between 1 minute and 7 days"
    ))]
    pub token_expiry_seconds: u64,

    #[validate(range(min = 4, max = 31, message = "bcrypt cost must be between 4 and 31"))]
    pub bcrypt_cost: u32,

    /// OAuth client id; federated login is disabled when absent
    pub google_client_id: Option<String>,

    #[validate(length(min = 1, message = "Allowed SSO domain cannot be empty"))]
    pub allowed_sso_domain: String,

    #[validate(url(message = "Google JWKS URL must be a valid URL"))]
    pub google_jwks_url: String,

    #[validate(length(min = 1, message = "At least one Google issuer is required"))]
    pub google_issuers: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_expiry_seconds: 24 * 60 * 60,
            bcrypt_cost: MIN_BCRYPT_COST,
            google_client_id: None,
            allowed_sso_domain: "tymeglobal.com".to_string(),
            google_jwks_url: "https://www.googleapis.com/oauth2/v3/certs".to_string(),
            google_issuers: vec![
                "accounts.google.com".to_string(),
                "https://accounts.google.com".to_string(),
            ],
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("token_expiry_seconds", &self.token_expiry_seconds)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("google_client_id", &self.google_client_id)
            .field("allowed_sso_domain", &self.allowed_sso_domain)
            .field("google_jwks_url", &self.google_jwks_url)
            .field("google_issuers", &self.google_issuers)
            .finish()
    }
}

impl AuthConfig {
    pub fn token_expiry(&self) -> Duration {
        Duration::from_secs(self.token_expiry_seconds)
    }

    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let jwt_secret = env_string("JWT_SECRET")
            .ok_or_else(|| PasswordPalError::config("JWT_SECRET environment variable not set"))?;

        let google_issuers = {
            let issuers = env_list("GOOGLE_ISSUERS");
            if issuers.is_empty() {
                defaults.google_issuers
            } else {
                issuers
            }
        };

        Ok(Self {
            jwt_secret,
            token_expiry_seconds: env_parse(
                "JWT_EXPIRY_SECONDS",
                defaults.token_expiry_seconds,
            )?,
            bcrypt_cost: env_parse("BCRYPT_COST", defaults.bcrypt_cost)?,
            google_client_id: env_string("GOOGLE_CLIENT_ID"),
            allowed_sso_domain: env_string("ALLOWED_SSO_DOMAIN")
                .unwrap_or(defaults.allowed_sso_domain),
            google_jwks_url: env_string("GOOGLE_JWKS_URL").unwrap_or(defaults.google_jwks_url),
            google_issuers,
        })
    }
}

/// Master key for secret payload encryption
#[derive(Clone, Default)]
pub struct EncryptionConfig {
    /// 64 hex characters (256 bits)
    pub key_hex: String,
}

impl fmt::Debug for EncryptionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionConfig").field("key_hex", &"[REDACTED]").finish()
    }
}

impl EncryptionConfig {
    pub fn from_env() -> Result<Self> {
        let key_hex = env_string("ENCRYPTION_KEY").ok_or_else(|| {
            PasswordPalError::config(
                "ENCRYPTION_KEY environment variable not set. \
                 Generate a key with: openssl rand -hex 32",
            )
        })?;
        Ok(Self { key_hex })
    }

    /// Decode the key, failing on anything but exactly 32 bytes of hex.
    pub fn key_bytes(&self) -> Result<zeroize::Zeroizing<[u8; 32]>> {
        let decoded = zeroize::Zeroizing::new(hex::decode(self.key_hex.trim()).map_err(|e| {
            PasswordPalError::config(format!("ENCRYPTION_KEY must be hex encoded: {}", e))
        })?);

        if decoded.len() != 32 {
            return Err(PasswordPalError::config(format!(
                "ENCRYPTION_KEY must be 32 bytes (64 hex characters), got {} bytes",
                decoded.len()
            )));
        }

        let mut key = zeroize::Zeroizing::new([0u8; 32]);
        key.copy_from_slice(&decoded);
        Ok(key)
    }
}

/// Who may call `GET /passwords/:guid`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetrievalAccess {
    /// Bearer token with the admin role
    #[default]
    Admin,
    /// Any valid bearer token
    Authenticated,
    /// Anyone holding the link; a valid token is still recorded as the actor
    Anonymous,
}

impl FromStr for RetrievalAccess {
    type Err = PasswordPalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "authenticated" => Ok(Self::Authenticated),
            "anonymous" => Ok(Self::Anonymous),
            other => Err(PasswordPalError::config(format!(
                "RETRIEVAL_ACCESS must be one of admin, authenticated, anonymous (got '{}')",
                other
            ))),
        }
    }
}

/// Shareable link composition and retrieval gate
#[derive(Debug, Clone, Validate)]
pub struct SharingConfig {
    #[validate(length(min = 1, message = "Frontend URL cannot be empty"))]
    pub frontend_url: String,

    pub retrieval_access: RetrievalAccess,
}

impl Default for SharingConfig {
    fn default() -> Self {
        Self {
            frontend_url: "http://localhost:3000".to_string(),
            retrieval_access: RetrievalAccess::Admin,
        }
    }
}

impl SharingConfig {
    /// `{frontend_url}/retrieve/{guid}`
    pub fn shareable_link(&self, guid: &str) -> String {
        format!("{}/retrieve/{}", self.frontend_url.trim_end_matches('/'), guid)
    }

    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let retrieval_access = match env_string("RETRIEVAL_ACCESS") {
            Some(value) => value.parse()?,
            None => defaults.retrieval_access,
        };
        Ok(Self {
            frontend_url: env_string("FRONTEND_URL").unwrap_or(defaults.frontend_url),
            retrieval_access,
        })
    }
}

/// Per-client request budgets
#[derive(Debug, Clone, Validate)]
pub struct RateLimitConfig {
    pub enabled: bool,

    #[validate(range(min = 1, message = "Login limit must be at least 1"))]
    pub login_max_requests: u32,
    pub login_window_seconds: u64,

    #[validate(range(min = 1, message = "Retrieval limit must be at least 1"))]
    pub retrieval_max_requests: u32,
    pub retrieval_window_seconds: u64,

    #[validate(range(min = 1, message = "API limit must be at least 1"))]
    pub api_max_requests: u32,
    pub api_window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            login_max_requests: 5,
            login_window_seconds: 15 * 60,
            retrieval_max_requests: 10,
            retrieval_window_seconds: 60,
            api_max_requests: 100,
            api_window_seconds: 15 * 60,
        }
    }
}

impl RateLimitConfig {
    pub fn disabled() -> Self {
        Self { enabled: false, ..Self::default() }
    }

    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            enabled: env_bool("RATE_LIMIT_ENABLED", defaults.enabled),
            login_max_requests: env_parse("RATE_LIMIT_LOGIN_MAX", defaults.login_max_requests)?,
            login_window_seconds: env_parse(
                "RATE_LIMIT_LOGIN_WINDOW_SECONDS",
                defaults.login_window_seconds,
            )?,
            retrieval_max_requests: env_parse(
                "RATE_LIMIT_RETRIEVAL_MAX",
                defaults.retrieval_max_requests,
            )?,
            retrieval_window_seconds: env_parse(
                "RATE_LIMIT_RETRIEVAL_WINDOW_SECONDS",
                defaults.retrieval_window_seconds,
            )?,
            api_max_requests: env_parse("RATE_LIMIT_API_MAX", defaults.api_max_requests)?,
            api_window_seconds: env_parse(
                "RATE_LIMIT_API_WINDOW_SECONDS",
                defaults.api_window_seconds,
            )?,
        })
    }
}

/// How long soft-deleted secrets and audit entries are kept
#[derive(Debug, Clone, Validate)]
pub struct RetentionConfig {
    /// Delete access log entries older than this many days (None = forever)
    #[validate(range(min = 1, message = "Audit retention must be at least 1 day"))]
    pub audit_retention_days: Option<u32>,

    /// Purge secrets soft-deleted longer ago than this many days (None = never)
    #[validate(range(min = 1, message = "Deleted secret retention must be at least 1 day"))]
    pub deleted_secret_retention_days: Option<u32>,

    #[validate(range(min = 60, message = "Sweep interval must be at least 60 seconds"))]
    pub sweep_interval_seconds: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            audit_retention_days: None,
            deleted_secret_retention_days: None,
            sweep_interval_seconds: 60 * 60,
        }
    }
}

impl RetentionConfig {
    pub fn is_enabled(&self) -> bool {
        self.audit_retention_days.is_some() || self.deleted_secret_retention_days.is_some()
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            audit_retention_days: env_parse_optional("AUDIT_RETENTION_DAYS")?,
            deleted_secret_retention_days: env_parse_optional("DELETED_SECRET_RETENTION_DAYS")?,
            sweep_interval_seconds: env_parse(
                "RETENTION_SWEEP_INTERVAL_SECONDS",
                defaults.sweep_interval_seconds,
            )?,
        })
    }
}

/// Default administrator created when no admin exists
#[derive(Clone, Validate)]
pub struct BootstrapConfig {
    #[validate(length(min = 1, message = "Admin username cannot be empty"))]
    pub admin_username: String,

    #[validate(email(message = "Admin email must be a valid email address"))]
    pub admin_email: String,

    #[validate(length(min = 8, message = "Admin password must be at least 8 characters"))]
    pub admin_password: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            admin_username: "admin".to_string(),
            admin_email: "admin@passwordpal.com".to_string(),
            admin_password: "Admin123!".to_string(),
        }
    }
}

impl fmt::Debug for BootstrapConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapConfig")
            .field("admin_username", &self.admin_username)
            .field("admin_email", &self.admin_email)
            .field("admin_password", &"[REDACTED]")
            .finish()
    }
}

impl BootstrapConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            admin_username: env_string("SEED_ADMIN_USERNAME").unwrap_or(defaults.admin_username),
            admin_email: env_string("SEED_ADMIN_EMAIL").unwrap_or(defaults.admin_email),
            admin_password: env_string("SEED_ADMIN_PASSWORD").unwrap_or(defaults.admin_password),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env_string(key) {
        Some(raw) => raw.parse::<T>().map_err(|e| {
            PasswordPalError::config(format!("Invalid value '{}' for {}: {}", raw, key, e))
        }),
        None => Ok(default),
    }
}

fn env_parse_optional<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    env_string(key)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| {
                PasswordPalError::config(format!("Invalid value '{}' for {}: {}", raw, key, e))
            })
        })
        .transpose()
}

fn env_bool(key: &str, default: bool) -> bool {
    env_string(key)
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

fn env_list(key: &str) -> Vec<String> {
    env_string(key)
        .map(|raw| {
            raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
        })
        .unwrap_or_default()
}
