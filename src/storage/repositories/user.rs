//! User repository
//!
//! CRUD for accounts plus the login side effects (last login, federated
//! identity linking) and the transactional delete that deactivates the
//! user's secrets before removing the row.

use crate::auth::user::{AuthProvider, NewUser, Role, UpdateUser, User};
use crate::domain::{PageRequest, UserId};
use crate::errors::{PasswordPalError, Result};
use crate::storage::DbPool;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::str::FromStr;
use tracing::instrument;

use super::map_write_error;

const USER_COLUMNS: &str = "id, username, email, password_hash, role, auth_provider, google_id, \
     is_active, created_by, created_at, updated_at, last_login";

#[derive(Debug, Clone, FromRow)]
struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub role: String,
    pub auth_provider: String,
    pub google_id: Option<String>,
    pub is_active: bool,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Outcome of [`UserRepository::delete_with_secrets`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserDeletion {
    pub deleted: bool,
    pub secrets_deactivated: u64,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user. Duplicate username or email yields `Conflict`.
    async fn create(&self, user: NewUser) -> Result<User>;

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Lookup by normalized (lowercase) email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// User plus stored password hash, for credential verification only
    async fn find_credentials(&self, username: &str) -> Result<Option<(User, Option<String>)>>;

    /// Apply the `Some` fields of `update`. Missing user yields `NotFound`.
    async fn update(&self, id: &UserId, update: UpdateUser) -> Result<User>;

    async fn update_last_login(&self, id: &UserId, at: DateTime<Utc>) -> Result<()>;

    /// Set the provider flag and external identity reference
    async fn link_google_identity(
        &self,
        id: &UserId,
        provider: AuthProvider,
        google_id: &str,
    ) -> Result<User>;

    /// Deactivate the user's secrets and remove the user in one transaction
    async fn delete_with_secrets(&self, id: &UserId, at: DateTime<Utc>) -> Result<UserDeletion>;

    /// Newest first
    async fn list(&self, page: PageRequest) -> Result<Vec<User>>;

    async fn count(&self) -> Result<i64>;

    async fn count_active(&self) -> Result<i64>;

    async fn count_by_role(&self, role: Role) -> Result<i64>;
}

#[derive(Debug, Clone)]
pub struct SqlxUserRepository {
    pool: DbPool,
}

impl SqlxUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn row_to_user(&self, row: UserRow) -> Result<User> {
        let role = Role::from_str(&row.role).map_err(|_| {
            PasswordPalError::internal(format!("Unknown role '{}' in users table", row.role))
        })?;
        let auth_provider = AuthProvider::from_str(&row.auth_provider).map_err(|_| {
            PasswordPalError::internal(format!(
                "Unknown auth provider '{}' in users table",
                row.auth_provider
            ))
        })?;

        Ok(User {
            id: UserId::from_string(row.id),
            username: row.username,
            email: row.email,
            role,
            auth_provider,
            is_active: row.is_active,
            google_id: row.google_id,
            created_by: row.created_by.map(UserId::from_string),
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_login: row.last_login,
        })
    }

    async fn fetch_one_where(&self, clause: &str, value: &str) -> Result<Option<UserRow>> {
        let sql = format!("SELECT {} FROM users WHERE {} = $1", USER_COLUMNS, clause);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PasswordPalError::database(e, format!("Failed to fetch user by {}", clause)))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    #[instrument(skip(self, user), fields(username = %user.username), name = "db_create_user")]
    async fn create(&self, user: NewUser) -> Result<User> {
        let id = UserId::new();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, role, auth_provider, is_active, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, 1, $7, $8, $9)
            "#,
        )
        .bind(&id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.auth_provider.as_str())
        .bind(&user.created_by)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "User", "Failed to create user"))?;

        self.find_by_id(&id)
            .await?
            .ok_or_else(|| PasswordPalError::internal("User not found after creation"))
    }

    #[instrument(skip(self), fields(user_id = %id), name = "db_find_user_by_id")]
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>> {
        let row = self.fetch_one_where("id", id.as_str()).await?;
        row.map(|r| self.row_to_user(r)).transpose()
    }

    #[instrument(skip(self), name = "db_find_user_by_username")]
    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = self.fetch_one_where("username", username).await?;
        row.map(|r| self.row_to_user(r)).transpose()
    }

    #[instrument(skip(self), name = "db_find_user_by_email")]
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = self.fetch_one_where("email", email).await?;
        row.map(|r| self.row_to_user(r)).transpose()
    }

    #[instrument(skip(self), name = "db_find_user_credentials")]
    async fn find_credentials(&self, username: &str) -> Result<Option<(User, Option<String>)>> {
        match self.fetch_one_where("username", username).await? {
            Some(row) => {
                let password_hash = row.password_hash.clone();
                Ok(Some((self.row_to_user(row)?, password_hash)))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, update), fields(user_id = %id), name = "db_update_user")]
    async fn update(&self, id: &UserId, update: UpdateUser) -> Result<User> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET username = COALESCE($1, username),
                email = COALESCE($2, email),
                password_hash = COALESCE($3, password_hash),
                role = COALESCE($4, role),
                is_active = COALESCE($5, is_active),
                updated_at = $6
            WHERE id = $7
            "#,
        )
        .bind(&update.username)
        .bind(&update.email)
        .bind(&update.password_hash)
        .bind(update.role.map(|r| r.as_str()))
        .bind(update.is_active)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "User", "Failed to update user"))?;

        if result.rows_affected() == 0 {
            return Err(PasswordPalError::not_found("User", id.as_str()));
        }

        self.find_by_id(id)
            .await?
            .ok_or_else(|| PasswordPalError::internal("User not found after update"))
    }

    #[instrument(skip(self), fields(user_id = %id), name = "db_update_last_login")]
    async fn update_last_login(&self, id: &UserId, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = $1 WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| PasswordPalError::database(e, "Failed to update last login"))?;

        Ok(())
    }

    #[instrument(skip(self, google_id), fields(user_id = %id, provider = %provider), name = "db_link_google_identity")]
    async fn link_google_identity(
        &self,
        id: &UserId,
        provider: AuthProvider,
        google_id: &str,
    ) -> Result<User> {
        let result = sqlx::query(
            "UPDATE users SET auth_provider = $1, google_id = $2, updated_at = $3 WHERE id = $4",
        )
        .bind(provider.as_str())
        .bind(google_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "User", "Failed to link Google identity"))?;

        if result.rows_affected() == 0 {
            return Err(PasswordPalError::not_found("User", id.as_str()));
        }

        self.find_by_id(id)
            .await?
            .ok_or_else(|| PasswordPalError::internal("User not found after update"))
    }

    #[instrument(skip(self), fields(user_id = %id), name = "db_delete_user_with_secrets")]
    async fn delete_with_secrets(&self, id: &UserId, at: DateTime<Utc>) -> Result<UserDeletion> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PasswordPalError::database(e, "Failed to begin user deletion"))?;

        let deactivated = sqlx::query(
            r#"
            UPDATE passwords
            SET is_active = 0, deleted_at = $1, updated_at = $1
            WHERE created_by = $2 AND is_active = 1
            "#,
        )
        .bind(at)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| PasswordPalError::database(e, "Failed to deactivate user's passwords"))?
        .rows_affected();

        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| PasswordPalError::database(e, "Failed to delete user"))?
            .rows_affected();

        if deleted == 0 {
            tx.rollback()
                .await
                .map_err(|e| PasswordPalError::database(e, "Failed to roll back user deletion"))?;
            return Ok(UserDeletion { deleted: false, secrets_deactivated: 0 });
        }

        tx.commit()
            .await
            .map_err(|e| PasswordPalError::database(e, "Failed to commit user deletion"))?;

        Ok(UserDeletion { deleted: true, secrets_deactivated: deactivated })
    }

    #[instrument(skip(self), fields(page = page.page, limit = page.limit), name = "db_list_users")]
    async fn list(&self, page: PageRequest) -> Result<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM users ORDER BY created_at DESC, id LIMIT $1 OFFSET $2",
            USER_COLUMNS
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PasswordPalError::database(e, "Failed to list users"))?;

        rows.into_iter().map(|r| self.row_to_user(r)).collect()
    }

    #[instrument(skip(self), name = "db_count_users")]
    async fn count(&self) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PasswordPalError::database(e, "Failed to count users"))
    }

    #[instrument(skip(self), name = "db_count_active_users")]
    async fn count_active(&self) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PasswordPalError::database(e, "Failed to count active users"))
    }

    #[instrument(skip(self), fields(role = %role), name = "db_count_users_by_role")]
    async fn count_by_role(&self, role: Role) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role = $1")
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PasswordPalError::database(e, "Failed to count users by role"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_helpers::TestDatabase;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: Some("$2b$04$hash".to_string()),
            role: Role::User,
            auth_provider: AuthProvider::Local,
            created_by: None,
        }
    }

    #[tokio::test]
    async fn create_and_find_user() {
        let db = TestDatabase::new().await;
        let repo = SqlxUserRepository::new(db.pool.clone());

        let user = repo.create(new_user("alice", "alice@example.com")).await.unwrap();
        assert!(user.is_active);
        assert_eq!(user.role, Role::User);

        assert_eq!(repo.find_by_id(&user.id).await.unwrap().unwrap().username, "alice");
        assert!(repo.find_by_username("alice").await.unwrap().is_some());
        assert!(repo.find_by_email("alice@example.com").await.unwrap().is_some());
        assert!(repo.find_by_username("bob").await.unwrap().is_none());

        let (_, hash) = repo.find_credentials("alice").await.unwrap().unwrap();
        assert_eq!(hash.as_deref(), Some("$2b$04$hash"));
    }

    #[tokio::test]
    async fn duplicate_username_or_email_conflicts() {
        let db = TestDatabase::new().await;
        let repo = SqlxUserRepository::new(db.pool.clone());
        repo.create(new_user("alice", "alice@example.com")).await.unwrap();

        let err = repo.create(new_user("alice", "other@example.com")).await.unwrap_err();
        assert!(matches!(err, PasswordPalError::Conflict { ref message, .. } if message.contains("Username")));

        let err = repo.create(new_user("other", "alice@example.com")).await.unwrap_err();
        assert!(matches!(err, PasswordPalError::Conflict { ref message, .. } if message.contains("Email")));
    }

    #[tokio::test]
    async fn partial_update_only_touches_given_fields() {
        let db = TestDatabase::new().await;
        let repo = SqlxUserRepository::new(db.pool.clone());
        let user = repo.create(new_user("alice", "alice@example.com")).await.unwrap();

        let updated = repo
            .update(&user.id, UpdateUser { role: Some(Role::Admin), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(updated.role, Role::Admin);
        assert_eq!(updated.email, "alice@example.com");

        let missing = repo
            .update(&UserId::new(), UpdateUser { is_active: Some(false), ..Default::default() })
            .await;
        assert!(matches!(missing, Err(PasswordPalError::NotFound { .. })));
    }

    #[tokio::test]
    async fn delete_missing_user_reports_not_deleted() {
        let db = TestDatabase::new().await;
        let repo = SqlxUserRepository::new(db.pool.clone());
        let outcome = repo.delete_with_secrets(&UserId::new(), Utc::now()).await.unwrap();
        assert!(!outcome.deleted);
    }

    #[tokio::test]
    async fn link_google_identity_upgrades_provider() {
        let db = TestDatabase::new().await;
        let repo = SqlxUserRepository::new(db.pool.clone());
        let user = repo.create(new_user("alice", "alice@example.com")).await.unwrap();

        let linked =
            repo.link_google_identity(&user.id, AuthProvider::Both, "google-sub-1").await.unwrap();
        assert_eq!(linked.auth_provider, AuthProvider::Both);
        assert_eq!(linked.google_id.as_deref(), Some("google-sub-1"));
    }

    #[tokio::test]
    async fn counts_and_listing() {
        let db = TestDatabase::new().await;
        let repo = SqlxUserRepository::new(db.pool.clone());
        let a = repo.create(new_user("a", "a@example.com")).await.unwrap();
        repo.create(new_user("b", "b@example.com")).await.unwrap();
        repo.update(&a.id, UpdateUser { is_active: Some(false), ..Default::default() })
            .await
            .unwrap();

        assert_eq!(repo.count().await.unwrap(), 2);
        assert_eq!(repo.count_active().await.unwrap(), 1);
        assert_eq!(repo.count_by_role(Role::Admin).await.unwrap(), 0);

        let page = PageRequest::new(Some(1), Some(1), 50).unwrap();
        assert_eq!(repo.list(page).await.unwrap().len(), 1);
    }
}
