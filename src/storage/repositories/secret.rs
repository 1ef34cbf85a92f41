//! Secret repository
//!
//! Persistence for shared secrets. The quota increment is a single
//! conditional `UPDATE ... RETURNING` so concurrent retrievals of the same
//! link can never push `current_access_count` past `max_access_count`.

use crate::domain::{NewSecret, PageRequest, SecretId, SecretRecord, UserId};
use crate::errors::{PasswordPalError, Result};
use crate::storage::DbPool;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::instrument;

use super::map_write_error;

const SECRET_COLUMNS: &str = "id, guid, encrypted_password, encryption_iv, title, created_by, \
     expires_at, max_access_count, current_access_count, is_active, created_at, updated_at, deleted_at";

#[derive(Debug, Clone, FromRow)]
struct SecretRow {
    pub id: String,
    pub guid: String,
    pub encrypted_password: String,
    pub encryption_iv: String,
    pub title: Option<String>,
    pub created_by: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_access_count: Option<i64>,
    pub current_access_count: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<SecretRow> for SecretRecord {
    fn from(row: SecretRow) -> Self {
        SecretRecord {
            id: SecretId::from_string(row.id),
            guid: row.guid,
            encrypted_password: row.encrypted_password,
            encryption_iv: row.encryption_iv,
            title: row.title,
            created_by: row.created_by.map(UserId::from_string),
            expires_at: row.expires_at,
            max_access_count: row.max_access_count,
            current_access_count: row.current_access_count,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[async_trait]
pub trait SecretRepository: Send + Sync {
    async fn create(&self, secret: NewSecret) -> Result<SecretRecord>;

    /// Lookup by the opaque identifier from the shareable link
    async fn find_by_guid(&self, guid: &str) -> Result<Option<SecretRecord>>;

    async fn find_by_id(&self, id: &SecretId) -> Result<Option<SecretRecord>>;

    /// Atomically consume one access if the secret is active, unexpired and
    /// under quota at `now`. Returns the new access count, or `None` when
    /// nothing was consumed.
    async fn consume_access(&self, id: &SecretId, now: DateTime<Utc>) -> Result<Option<i64>>;

    /// Mark an active secret deleted. Returns false if it was already inactive.
    async fn soft_delete(&self, id: &SecretId, at: DateTime<Utc>) -> Result<bool>;

    /// Active secrets owned by `owner`, newest first
    async fn list_active_by_owner(
        &self,
        owner: &UserId,
        page: PageRequest,
    ) -> Result<Vec<SecretRecord>>;

    async fn count_active_by_owner(&self, owner: &UserId) -> Result<i64>;

    async fn count(&self) -> Result<i64>;

    async fn count_active(&self) -> Result<i64>;

    /// Physically remove secrets soft deleted before `cutoff`
    async fn purge_deleted_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

#[derive(Debug, Clone)]
pub struct SqlxSecretRepository {
    pool: DbPool,
}

impl SqlxSecretRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SecretRepository for SqlxSecretRepository {
    #[instrument(skip(self, secret), fields(owner = %secret.created_by), name = "db_create_secret")]
    async fn create(&self, secret: NewSecret) -> Result<SecretRecord> {
        let id = SecretId::new();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO passwords (id, guid, encrypted_password, encryption_iv, title, created_by, expires_at, max_access_count, current_access_count, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, 1, $9, $10)
            "#,
        )
        .bind(&id)
        .bind(&secret.guid)
        .bind(&secret.encrypted_password)
        .bind(&secret.encryption_iv)
        .bind(&secret.title)
        .bind(&secret.created_by)
        .bind(secret.expires_at)
        .bind(secret.max_access_count)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "Password", "Failed to create password"))?;

        self.find_by_id(&id)
            .await?
            .ok_or_else(|| PasswordPalError::internal("Password not found after creation"))
    }

    #[instrument(skip(self, guid), name = "db_find_secret_by_guid")]
    async fn find_by_guid(&self, guid: &str) -> Result<Option<SecretRecord>> {
        let sql = format!("SELECT {} FROM passwords WHERE guid = $1", SECRET_COLUMNS);
        let row = sqlx::query_as::<_, SecretRow>(&sql)
            .bind(guid)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PasswordPalError::database(e, "Failed to fetch password by guid"))?;

        Ok(row.map(SecretRecord::from))
    }

    #[instrument(skip(self), fields(secret_id = %id), name = "db_find_secret_by_id")]
    async fn find_by_id(&self, id: &SecretId) -> Result<Option<SecretRecord>> {
        let sql = format!("SELECT {} FROM passwords WHERE id = $1", SECRET_COLUMNS);
        let row = sqlx::query_as::<_, SecretRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PasswordPalError::database(e, "Failed to fetch password"))?;

        Ok(row.map(SecretRecord::from))
    }

    #[instrument(skip(self), fields(secret_id = %id), name = "db_consume_secret_access")]
    async fn consume_access(&self, id: &SecretId, now: DateTime<Utc>) -> Result<Option<i64>> {
        sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE passwords
            SET current_access_count = current_access_count + 1, updated_at = $1
            WHERE id = $2
              AND is_active = 1
              AND (expires_at IS NULL OR expires_at > $1)
              AND (max_access_count IS NULL OR current_access_count < max_access_count)
            RETURNING current_access_count
            "#,
        )
        .bind(now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PasswordPalError::database(e, "Failed to record password access"))
    }

    #[instrument(skip(self), fields(secret_id = %id), name = "db_soft_delete_secret")]
    async fn soft_delete(&self, id: &SecretId, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE passwords SET is_active = 0, deleted_at = $1, updated_at = $1 WHERE id = $2 AND is_active = 1",
        )
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| PasswordPalError::database(e, "Failed to delete password"))?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self), fields(owner = %owner, page = page.page), name = "db_list_secrets_by_owner")]
    async fn list_active_by_owner(
        &self,
        owner: &UserId,
        page: PageRequest,
    ) -> Result<Vec<SecretRecord>> {
        let sql = format!(
            "SELECT {} FROM passwords WHERE created_by = $1 AND is_active = 1 \
             ORDER BY created_at DESC, id LIMIT $2 OFFSET $3",
            SECRET_COLUMNS
        );
        let rows = sqlx::query_as::<_, SecretRow>(&sql)
            .bind(owner)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PasswordPalError::database(e, "Failed to list passwords"))?;

        Ok(rows.into_iter().map(SecretRecord::from).collect())
    }

    #[instrument(skip(self), fields(owner = %owner), name = "db_count_secrets_by_owner")]
    async fn count_active_by_owner(&self, owner: &UserId) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM passwords WHERE created_by = $1 AND is_active = 1",
        )
        .bind(owner)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PasswordPalError::database(e, "Failed to count passwords"))
    }

    #[instrument(skip(self), name = "db_count_secrets")]
    async fn count(&self) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM passwords")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PasswordPalError::database(e, "Failed to count passwords"))
    }

    #[instrument(skip(self), name = "db_count_active_secrets")]
    async fn count_active(&self) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM passwords WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PasswordPalError::database(e, "Failed to count active passwords"))
    }

    #[instrument(skip(self), name = "db_purge_deleted_secrets")]
    async fn purge_deleted_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM passwords WHERE is_active = 0 AND deleted_at IS NOT NULL AND deleted_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| PasswordPalError::database(e, "Failed to purge deleted passwords"))?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::user::{AuthProvider, NewUser, Role};
    use crate::storage::repositories::{SqlxUserRepository, UserRepository};
    use crate::storage::test_helpers::TestDatabase;
    use chrono::Duration;

    async fn owner(db: &TestDatabase) -> UserId {
        SqlxUserRepository::new(db.pool.clone())
            .create(NewUser {
                username: "owner".into(),
                email: "owner@example.com".into(),
                password_hash: Some("hash".into()),
                role: Role::User,
                auth_provider: AuthProvider::Local,
                created_by: None,
            })
            .await
            .unwrap()
            .id
    }

    fn new_secret(owner: &UserId, max: Option<i64>, expires_at: Option<DateTime<Utc>>) -> NewSecret {
        NewSecret {
            guid: uuid::Uuid::new_v4().to_string(),
            encrypted_password: "00".into(),
            encryption_iv: "00".into(),
            title: Some("db".into()),
            created_by: owner.clone(),
            expires_at,
            max_access_count: max,
        }
    }

    #[tokio::test]
    async fn consume_respects_quota() {
        let db = TestDatabase::new().await;
        let repo = SqlxSecretRepository::new(db.pool.clone());
        let owner = owner(&db).await;
        let secret = repo.create(new_secret(&owner, Some(2), None)).await.unwrap();

        let now = Utc::now();
        assert_eq!(repo.consume_access(&secret.id, now).await.unwrap(), Some(1));
        assert_eq!(repo.consume_access(&secret.id, now).await.unwrap(), Some(2));
        assert_eq!(repo.consume_access(&secret.id, now).await.unwrap(), None);

        let stored = repo.find_by_guid(&secret.guid).await.unwrap().unwrap();
        assert_eq!(stored.current_access_count, 2);
    }

    #[tokio::test]
    async fn consume_refuses_expired_and_deleted() {
        let db = TestDatabase::new().await;
        let repo = SqlxSecretRepository::new(db.pool.clone());
        let owner = owner(&db).await;
        let now = Utc::now();

        let expiring = repo.create(new_secret(&owner, None, Some(now + Duration::minutes(5)))).await.unwrap();
        assert_eq!(repo.consume_access(&expiring.id, now + Duration::minutes(10)).await.unwrap(), None);

        let deleted = repo.create(new_secret(&owner, None, None)).await.unwrap();
        assert!(repo.soft_delete(&deleted.id, now).await.unwrap());
        assert!(!repo.soft_delete(&deleted.id, now).await.unwrap());
        assert_eq!(repo.consume_access(&deleted.id, now).await.unwrap(), None);
    }

    #[tokio::test]
    async fn listing_only_returns_active_secrets_of_owner() {
        let db = TestDatabase::new().await;
        let repo = SqlxSecretRepository::new(db.pool.clone());
        let owner = owner(&db).await;

        let kept = repo.create(new_secret(&owner, None, None)).await.unwrap();
        let removed = repo.create(new_secret(&owner, None, None)).await.unwrap();
        repo.soft_delete(&removed.id, Utc::now()).await.unwrap();

        let page = PageRequest::new(None, None, 20).unwrap();
        let listed = repo.list_active_by_owner(&owner, page).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, kept.id);
        assert_eq!(repo.count_active_by_owner(&owner).await.unwrap(), 1);
        assert_eq!(repo.count().await.unwrap(), 2);
        assert_eq!(repo.count_active().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn purge_removes_only_old_deleted_rows() {
        let db = TestDatabase::new().await;
        let repo = SqlxSecretRepository::new(db.pool.clone());
        let owner = owner(&db).await;
        let now = Utc::now();

        let old = repo.create(new_secret(&owner, None, None)).await.unwrap();
        repo.soft_delete(&old.id, now - Duration::days(40)).await.unwrap();
        let recent = repo.create(new_secret(&owner, None, None)).await.unwrap();
        repo.soft_delete(&recent.id, now).await.unwrap();
        repo.create(new_secret(&owner, None, None)).await.unwrap();

        assert_eq!(repo.purge_deleted_before(now - Duration::days(30)).await.unwrap(), 1);
        assert!(repo.find_by_id(&old.id).await.unwrap().is_none());
        assert!(repo.find_by_id(&recent.id).await.unwrap().is_some());
    }
}
