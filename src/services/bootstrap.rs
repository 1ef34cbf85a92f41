//! First-start provisioning of the default administrator.

use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::hashing::PasswordHasher;
use crate::auth::user::{AuthProvider, NewUser, Role, User};
use crate::config::BootstrapConfig;
use crate::errors::Result;
use crate::storage::repositories::{SqlxUserRepository, UserRepository};
use crate::storage::DbPool;

/// Outcome of [`ensure_admin`]
#[derive(Debug, Clone, PartialEq)]
pub enum BootstrapOutcome {
    /// At least one admin already existed
    AlreadyProvisioned { admins: i64 },
    Created(User),
}

/// Create the configured admin account when no admin exists yet.
///
/// Running it again after an admin exists is a no-op.
pub async fn ensure_admin(
    users: Arc<dyn UserRepository>,
    hasher: &PasswordHasher,
    config: &BootstrapConfig,
) -> Result<BootstrapOutcome> {
    let admins = users.count_by_role(Role::Admin).await?;
    if admins > 0 {
        info!(admins, "Admin account already configured");
        return Ok(BootstrapOutcome::AlreadyProvisioned { admins });
    }

    info!(username = %config.admin_username, "No admin account found - creating default admin");
    let password_hash = hasher.hash(&config.admin_password).await?;

    let user = users
        .create(NewUser {
            username: config.admin_username.clone(),
            email: User::normalize_email(&config.admin_email),
            password_hash: Some(password_hash),
            role: Role::Admin,
            auth_provider: AuthProvider::Local,
            created_by: None,
        })
        .await?;

    if config.admin_password == BootstrapConfig::default().admin_password {
        warn!(
            username = %user.username,
            "Default admin created with the built-in password; change it immediately"
        );
    }

    Ok(BootstrapOutcome::Created(user))
}

pub async fn ensure_admin_with_sqlx(
    pool: DbPool,
    hasher: &PasswordHasher,
    config: &BootstrapConfig,
) -> Result<BootstrapOutcome> {
    ensure_admin(Arc::new(SqlxUserRepository::new(pool)), hasher, config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_helpers::TestDatabase;

    #[tokio::test]
    async fn creates_admin_once() {
        let db = TestDatabase::new().await;
        let hasher = PasswordHasher::new(4);
        let config = BootstrapConfig::default();

        let first = ensure_admin_with_sqlx(db.pool.clone(), &hasher, &config).await.unwrap();
        let user = match first {
            BootstrapOutcome::Created(user) => user,
            other => panic!("expected admin to be created, got {:?}", other),
        };
        assert_eq!(user.role, Role::Admin);
        assert_eq!(user.username, "admin");

        let second = ensure_admin_with_sqlx(db.pool.clone(), &hasher, &config).await.unwrap();
        assert_eq!(second, BootstrapOutcome::AlreadyProvisioned { admins: 1 });
    }

    #[tokio::test]
    async fn seeded_password_verifies() {
        let db = TestDatabase::new().await;
        let hasher = PasswordHasher::new(4);
        let config = BootstrapConfig::default();
        ensure_admin_with_sqlx(db.pool.clone(), &hasher, &config).await.unwrap();

        let (_, hash) = SqlxUserRepository::new(db.pool.clone())
            .find_credentials("admin")
            .await
            .unwrap()
            .unwrap();
        assert!(hasher.verify("Admin123!", &hash.unwrap()).await.unwrap());
    }
}
