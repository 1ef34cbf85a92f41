//! # Structured Logging
//!
//! `tracing-subscriber` setup. `RUST_LOG` wins over the configured level;
//! JSON output is opt-in for log shippers.

use crate::config::{AppConfig, ObservabilityConfig};
use crate::errors::{PasswordPalError, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| {
            PasswordPalError::config(format!("Invalid log level '{}': {}", config.log_level, e))
        })?;

    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json_logging {
        registry.with(fmt::layer().json().with_current_span(true).with_target(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    result.map_err(|e| PasswordPalError::config(format!("Failed to initialize logging: {}", e)))
}

/// Log configuration at startup. Secrets never reach this line.
pub fn log_config_info(config: &AppConfig) {
    tracing::info!(
        server_address = %config.server.bind_address(),
        database_url = %crate::storage::pool::sanitize_url(&config.database.url),
        token_expiry_seconds = config.auth.token_expiry_seconds,
        bcrypt_cost = config.auth.bcrypt_cost,
        google_sso_enabled = config.auth.google_client_id.is_some(),
        allowed_sso_domain = %config.auth.allowed_sso_domain,
        frontend_url = %config.sharing.frontend_url,
        retrieval_access = ?config.sharing.retrieval_access,
        rate_limit_enabled = config.rate_limit.enabled,
        audit_retention_days = ?config.retention.audit_retention_days,
        deleted_secret_retention_days = ?config.retention.deleted_secret_retention_days,
        metrics_enabled = config.observability.metrics_port != 0,
        "PasswordPal configuration"
    );
}
