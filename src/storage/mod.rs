//! # Storage and Persistence
//!
//! SQLite connectivity, embedded migrations and the repositories for users,
//! secrets and the access log.

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use crate::config::DatabaseConfig;

pub use migrations::{list_applied_migrations, validate_migrations, MigrationInfo};
pub use pool::{create_pool, DbPool};
pub use repositories::{
    AccessLogRepository, SecretRepository, SqlxAccessLogRepository, SqlxSecretRepository,
    SqlxUserRepository, UserRepository,
};

use crate::errors::{PasswordPalError, Result};

/// Run database migrations
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    migrations::run_migrations(pool).await
}

/// Check database connectivity
pub async fn check_connection(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| PasswordPalError::database(e, "Database connectivity check failed"))?;

    Ok(())
}
