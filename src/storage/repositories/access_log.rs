//! Access log repository
//!
//! Append-only storage for the audit trail plus the filtered, joined read
//! model used by the admin views. Rows are only ever removed by the
//! retention sweeper.

use crate::domain::{
    AccessLogEntry, AccessLogFilter, AccessLogId, AccessType, NewAccessLogEntry, PageRequest,
    SecretId, UserId,
};
use crate::errors::{PasswordPalError, Result};
use crate::storage::DbPool;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite};
use std::str::FromStr;
use tracing::instrument;

#[derive(Debug, Clone, FromRow)]
struct AccessLogRow {
    pub id: String,
    pub password_id: Option<String>,
    pub accessed_by: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub access_type: String,
    pub success: bool,
    pub created_at: DateTime<Utc>,
    pub username: Option<String>,
    pub password_title: Option<String>,
}

impl TryFrom<AccessLogRow> for AccessLogEntry {
    type Error = PasswordPalError;

    fn try_from(row: AccessLogRow) -> Result<Self> {
        let access_type = AccessType::from_str(&row.access_type)
            .map_err(|e| PasswordPalError::internal(format!("Corrupt access log row: {}", e)))?;

        Ok(AccessLogEntry {
            id: AccessLogId::from_string(row.id),
            password_id: row.password_id.map(SecretId::from_string),
            accessed_by: row.accessed_by.map(UserId::from_string),
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            access_type,
            success: row.success,
            created_at: row.created_at,
            username: row.username,
            password_title: row.password_title,
        })
    }
}

#[async_trait]
pub trait AccessLogRepository: Send + Sync {
    async fn insert(&self, entry: NewAccessLogEntry, at: DateTime<Utc>) -> Result<AccessLogId>;

    /// Filtered entries joined with actor username and secret title, newest first
    async fn query(&self, filter: &AccessLogFilter, page: PageRequest)
        -> Result<Vec<AccessLogEntry>>;

    async fn count(&self, filter: &AccessLogFilter) -> Result<i64>;

    /// Entries at or after `since`; all entries when `None`
    async fn count_since(&self, since: Option<DateTime<Utc>>) -> Result<i64>;

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

#[derive(Debug, Clone)]
pub struct SqlxAccessLogRepository {
    pool: DbPool,
}

impl SqlxAccessLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &AccessLogFilter) {
        builder.push(" WHERE 1 = 1");

        if let Some(password_id) = &filter.password_id {
            builder.push(" AND al.password_id = ");
            builder.push_bind(password_id.clone());
        }
        if let Some(accessed_by) = &filter.accessed_by {
            builder.push(" AND al.accessed_by = ");
            builder.push_bind(accessed_by.clone());
        }
        if let Some(access_type) = filter.access_type {
            builder.push(" AND al.access_type = ");
            builder.push_bind(access_type.as_str());
        }
        if let Some(start) = filter.start {
            builder.push(" AND al.created_at >= ");
            builder.push_bind(start);
        }
        if let Some(end) = filter.end {
            builder.push(" AND al.created_at <= ");
            builder.push_bind(end);
        }
    }
}

#[async_trait]
impl AccessLogRepository for SqlxAccessLogRepository {
    #[instrument(skip(self, entry), fields(access_type = %entry.access_type, success = entry.success), name = "db_insert_access_log")]
    async fn insert(&self, entry: NewAccessLogEntry, at: DateTime<Utc>) -> Result<AccessLogId> {
        let id = AccessLogId::new();

        sqlx::query(
            r#"
            INSERT INTO access_logs (id, password_id, accessed_by, ip_address, user_agent, access_type, success, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&id)
        .bind(&entry.password_id)
        .bind(&entry.accessed_by)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(entry.access_type.as_str())
        .bind(entry.success)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| PasswordPalError::database(e, "Failed to write access log"))?;

        Ok(id)
    }

    #[instrument(skip(self, filter), fields(page = page.page, limit = page.limit), name = "db_query_access_logs")]
    async fn query(
        &self,
        filter: &AccessLogFilter,
        page: PageRequest,
    ) -> Result<Vec<AccessLogEntry>> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT al.id, al.password_id, al.accessed_by, al.ip_address, al.user_agent,
                   al.access_type, al.success, al.created_at,
                   u.username AS username, p.title AS password_title
            FROM access_logs al
            LEFT JOIN users u ON u.id = al.accessed_by
            LEFT JOIN passwords p ON p.id = al.password_id
            "#,
        );
        Self::push_filters(&mut builder, filter);
        builder.push(" ORDER BY al.created_at DESC, al.id LIMIT ");
        builder.push_bind(page.limit());
        builder.push(" OFFSET ");
        builder.push_bind(page.offset());

        let rows = builder
            .build_query_as::<AccessLogRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PasswordPalError::database(e, "Failed to query access logs"))?;

        rows.into_iter().map(AccessLogEntry::try_from).collect()
    }

    #[instrument(skip(self, filter), name = "db_count_access_logs")]
    async fn count(&self, filter: &AccessLogFilter) -> Result<i64> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM access_logs al");
        Self::push_filters(&mut builder, filter);

        builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PasswordPalError::database(e, "Failed to count access logs"))
    }

    #[instrument(skip(self), name = "db_count_access_logs_since")]
    async fn count_since(&self, since: Option<DateTime<Utc>>) -> Result<i64> {
        let query = match since {
            Some(since) => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM access_logs WHERE created_at >= $1")
                    .bind(since)
            }
            None => sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM access_logs"),
        };

        query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PasswordPalError::database(e, "Failed to count access logs"))
    }

    #[instrument(skip(self), name = "db_delete_old_access_logs")]
    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM access_logs WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| PasswordPalError::database(e, "Failed to delete old access logs"))?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::user::{AuthProvider, NewUser, Role};
    use crate::domain::NewSecret;
    use crate::storage::repositories::{
        SecretRepository, SqlxSecretRepository, SqlxUserRepository, UserRepository,
    };
    use crate::storage::test_helpers::TestDatabase;
    use chrono::Duration;

    fn entry(
        password_id: Option<SecretId>,
        accessed_by: Option<UserId>,
        access_type: AccessType,
        success: bool,
    ) -> NewAccessLogEntry {
        NewAccessLogEntry {
            password_id,
            accessed_by,
            ip_address: Some("10.0.0.1".into()),
            user_agent: Some("test-agent".into()),
            access_type,
            success,
        }
    }

    #[tokio::test]
    async fn query_joins_username_and_title_and_filters() {
        let db = TestDatabase::new().await;
        let users = SqlxUserRepository::new(db.pool.clone());
        let secrets = SqlxSecretRepository::new(db.pool.clone());
        let logs = SqlxAccessLogRepository::new(db.pool.clone());

        let user = users
            .create(NewUser {
                username: "carol".into(),
                email: "carol@example.com".into(),
                password_hash: Some("hash".into()),
                role: Role::User,
                auth_provider: AuthProvider::Local,
                created_by: None,
            })
            .await
            .unwrap();
        let secret = secrets
            .create(NewSecret {
                guid: "guid-1".into(),
                encrypted_password: "00".into(),
                encryption_iv: "00".into(),
                title: Some("wifi".into()),
                created_by: user.id.clone(),
                expires_at: None,
                max_access_count: None,
            })
            .await
            .unwrap();

        let now = Utc::now();
        logs.insert(entry(Some(secret.id.clone()), Some(user.id.clone()), AccessType::Create, true), now - Duration::minutes(2))
            .await
            .unwrap();
        logs.insert(entry(Some(secret.id.clone()), None, AccessType::View, false), now - Duration::minutes(1))
            .await
            .unwrap();
        logs.insert(entry(None, None, AccessType::View, false), now).await.unwrap();

        let page = PageRequest::new(None, None, 50).unwrap();
        let all = logs.query(&AccessLogFilter::default(), page).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[0].created_at >= all[1].created_at);

        let created = logs
            .query(&AccessLogFilter { access_type: Some(AccessType::Create), ..Default::default() }, page)
            .await
            .unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].username.as_deref(), Some("carol"));
        assert_eq!(created[0].password_title.as_deref(), Some("wifi"));

        let by_secret = AccessLogFilter { password_id: Some(secret.id.clone()), ..Default::default() };
        assert_eq!(logs.count(&by_secret).await.unwrap(), 2);

        let recent = AccessLogFilter { start: Some(now - Duration::seconds(30)), ..Default::default() };
        assert_eq!(logs.count(&recent).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn count_since_and_delete_before() {
        let db = TestDatabase::new().await;
        let logs = SqlxAccessLogRepository::new(db.pool.clone());
        let now = Utc::now();

        logs.insert(entry(None, None, AccessType::View, false), now - Duration::days(40)).await.unwrap();
        logs.insert(entry(None, None, AccessType::View, true), now).await.unwrap();

        assert_eq!(logs.count_since(None).await.unwrap(), 2);
        assert_eq!(logs.count_since(Some(now - Duration::days(1))).await.unwrap(), 1);
        assert_eq!(logs.delete_before(now - Duration::days(30)).await.unwrap(), 1);
        assert_eq!(logs.count_since(None).await.unwrap(), 1);
    }
}
