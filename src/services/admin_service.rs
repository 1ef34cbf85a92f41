//! Administration: account management, audit queries and dashboard stats.
//!
//! Callers are expected to have passed the admin check already; this layer
//! enforces the data rules (closed role set, self-delete refusal).

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};
use validator::Validate;

use crate::auth::hashing::PasswordHasher;
use crate::auth::models::AuthContext;
use crate::auth::user::{
    AuthProvider, CreateUserRequest, NewUser, Role, UpdateUser, UpdateUserRequest, User,
};
use crate::auth::user_validation::validate_password;
use crate::domain::{
    AccessLogEntry, AccessLogFilter, AccessStatistics, Page, PageRequest, UserId,
};
use crate::errors::{PasswordPalError, Result};
use crate::services::audit::AuditLogger;
use crate::storage::repositories::{
    SecretRepository, SqlxSecretRepository, SqlxUserRepository, UserRepository,
};
use crate::storage::DbPool;

pub const DEFAULT_PAGE_SIZE: u32 = 50;

fn parse_role(value: &str) -> Result<Role> {
    Role::from_str(value.trim())
        .map_err(|_| PasswordPalError::validation_field("Role must be 'admin' or 'user'", "role"))
}

fn check_password(password: &str) -> Result<()> {
    validate_password(password).map_err(|e| {
        PasswordPalError::validation_field(
            e.message.map(|m| m.to_string()).unwrap_or_else(|| "Invalid password".to_string()),
            "password",
        )
    })
}

#[derive(Clone)]
pub struct AdminService {
    users: Arc<dyn UserRepository>,
    secrets: Arc<dyn SecretRepository>,
    audit: AuditLogger,
    hasher: PasswordHasher,
}

impl AdminService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        secrets: Arc<dyn SecretRepository>,
        audit: AuditLogger,
        hasher: PasswordHasher,
    ) -> Self {
        Self { users, secrets, audit, hasher }
    }

    pub fn with_sqlx(pool: DbPool, hasher: PasswordHasher) -> Self {
        Self::new(
            Arc::new(SqlxUserRepository::new(pool.clone())),
            Arc::new(SqlxSecretRepository::new(pool.clone())),
            AuditLogger::with_sqlx(pool),
            hasher,
        )
    }

    #[instrument(skip(self), fields(page = page.page, limit = page.limit))]
    pub async fn list_users(&self, page: PageRequest) -> Result<Page<User>> {
        let total = self.users.count().await?;
        let users = self.users.list(page).await?;
        Ok(Page::new(users, total, page))
    }

    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn get_user(&self, id: &UserId) -> Result<User> {
        self.users.find_by_id(id).await?.ok_or_else(|| PasswordPalError::not_found("User", id.as_str()))
    }

    #[instrument(skip(self, actor, request), fields(actor = %actor.user_id, username = %request.username))]
    pub async fn create_user(&self, actor: &AuthContext, request: CreateUserRequest) -> Result<User> {
        request.validate()?;
        let role = parse_role(&request.role)?;
        let auth_provider = match request.auth_provider.as_deref() {
            Some(value) => AuthProvider::from_str(value.trim()).map_err(|_| {
                PasswordPalError::validation_field(
                    "Auth provider must be 'local', 'google' or 'both'",
                    "auth_provider",
                )
            })?,
            None => AuthProvider::Local,
        };

        let password_hash = match (request.password.as_deref(), auth_provider) {
            (Some(password), _) => {
                check_password(password)?;
                Some(self.hasher.hash(password).await?)
            }
            (None, AuthProvider::Google) => None,
            (None, AuthProvider::Local | AuthProvider::Both) => {
                return Err(PasswordPalError::validation_field(
                    "Password is required for local accounts",
                    "password",
                ))
            }
        };

        let user = self
            .users
            .create(NewUser {
                username: request.username.trim().to_string(),
                email: User::normalize_email(&request.email),
                password_hash,
                role,
                auth_provider,
                created_by: Some(actor.user_id.clone()),
            })
            .await?;

        info!(user_id = %user.id, role = %user.role, "User created");
        Ok(user)
    }

    #[instrument(skip(self, request), fields(user_id = %id))]
    pub async fn update_user(&self, id: &UserId, request: UpdateUserRequest) -> Result<User> {
        request.validate()?;

        let mut update = UpdateUser {
            username: request.username.map(|u| u.trim().to_string()),
            email: request.email.as_deref().map(User::normalize_email),
            password_hash: None,
            role: request.role.as_deref().map(parse_role).transpose()?,
            is_active: request.is_active,
        };

        if let Some(password) = request.password.as_deref() {
            check_password(password)?;
            update.password_hash = Some(self.hasher.hash(password).await?);
        }

        if update.is_empty() {
            return Err(PasswordPalError::validation("No fields to update"));
        }

        let user = self.users.update(id, update).await?;
        info!(user_id = %user.id, "User updated");
        Ok(user)
    }

    /// Delete an account and deactivate its secrets. Self-deletion is refused.
    #[instrument(skip(self, actor), fields(actor = %actor.user_id, user_id = %id))]
    pub async fn delete_user(&self, actor: &AuthContext, id: &UserId) -> Result<()> {
        if &actor.user_id == id {
            return Err(PasswordPalError::conflict("Cannot delete your own account", "User"));
        }

        let outcome = self.users.delete_with_secrets(id, Utc::now()).await?;
        if !outcome.deleted {
            return Err(PasswordPalError::not_found("User", id.as_str()));
        }

        info!(
            user_id = %id,
            secrets_deactivated = outcome.secrets_deactivated,
            "User deleted"
        );
        Ok(())
    }

    pub async fn logs(
        &self,
        filter: &AccessLogFilter,
        page: PageRequest,
    ) -> Result<Page<AccessLogEntry>> {
        self.audit.query(filter, page).await
    }

    #[instrument(skip(self))]
    pub async fn statistics(&self, now: DateTime<Utc>) -> Result<AccessStatistics> {
        let accesses = self.audit.access_counts(now).await?;

        Ok(AccessStatistics {
            total_users: self.users.count().await?,
            active_users: self.users.count_active().await?,
            total_passwords: self.secrets.count().await?,
            active_passwords: self.secrets.count_active().await?,
            total_accesses: accesses.total,
            accesses_today: accesses.today,
            accesses_this_week: accesses.this_week,
            accesses_this_month: accesses.this_month,
        })
    }
}
