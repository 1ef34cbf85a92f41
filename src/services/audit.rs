//! Audit trail for secret operations.
//!
//! Writes are best effort: a failed insert is logged and counted but never
//! returned to the caller of the operation being recorded.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{error, instrument};

use crate::domain::{
    AccessLogEntry, AccessLogFilter, AccessType, NewAccessLogEntry, Page, PageRequest,
    RequestOrigin, SecretId, UserId,
};
use crate::errors::Result;
use crate::observability::metrics;
use crate::storage::repositories::{AccessLogRepository, SqlxAccessLogRepository};
use crate::storage::DbPool;

/// Access counts over the dashboard windows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessCounts {
    pub total: i64,
    pub today: i64,
    pub this_week: i64,
    pub this_month: i64,
}

#[derive(Clone)]
pub struct AuditLogger {
    repository: Arc<dyn AccessLogRepository>,
}

impl AuditLogger {
    pub fn new(repository: Arc<dyn AccessLogRepository>) -> Self {
        Self { repository }
    }

    pub fn with_sqlx(pool: DbPool) -> Self {
        Self::new(Arc::new(SqlxAccessLogRepository::new(pool)))
    }

    /// Append one entry. Never fails.
    #[instrument(skip(self, origin), fields(access_type = %access_type, success = success))]
    pub async fn record(
        &self,
        password_id: Option<&SecretId>,
        accessed_by: Option<&UserId>,
        origin: &RequestOrigin,
        access_type: AccessType,
        success: bool,
    ) {
        let entry = NewAccessLogEntry {
            password_id: password_id.cloned(),
            accessed_by: accessed_by.cloned(),
            ip_address: origin.ip_address.clone(),
            user_agent: origin.user_agent.clone(),
            access_type,
            success,
        };

        if let Err(e) = self.repository.insert(entry, Utc::now()).await {
            error!(
                error = %e,
                password_id = ?password_id.map(|id| id.as_str()),
                access_type = %access_type,
                "Failed to write access log entry"
            );
            metrics::record_audit_failure();
        }
    }

    #[instrument(skip(self, filter), fields(page = page.page, limit = page.limit))]
    pub async fn query(
        &self,
        filter: &AccessLogFilter,
        page: PageRequest,
    ) -> Result<Page<AccessLogEntry>> {
        let total = self.repository.count(filter).await?;
        let data = self.repository.query(filter, page).await?;
        Ok(Page::new(data, total, page))
    }

    /// Counts for the windows starting at UTC midnight today, 7 and 30 days back
    pub async fn access_counts(&self, now: DateTime<Utc>) -> Result<AccessCounts> {
        let midnight = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc())
            .unwrap_or(now);

        Ok(AccessCounts {
            total: self.repository.count_since(None).await?,
            today: self.repository.count_since(Some(midnight)).await?,
            this_week: self.repository.count_since(Some(midnight - Duration::days(7))).await?,
            this_month: self.repository.count_since(Some(midnight - Duration::days(30))).await?,
        })
    }

    /// Remove entries older than `cutoff`
    pub async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.repository.delete_before(cutoff).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AccessLogId;
    use crate::errors::PasswordPalError;
    use crate::storage::test_helpers::TestDatabase;
    use async_trait::async_trait;
    use tracing_test::traced_test;

    struct FailingRepository;

    #[async_trait]
    impl AccessLogRepository for FailingRepository {
        async fn insert(&self, _: NewAccessLogEntry, _: DateTime<Utc>) -> Result<AccessLogId> {
            Err(PasswordPalError::internal("disk full"))
        }

        async fn query(&self, _: &AccessLogFilter, _: PageRequest) -> Result<Vec<AccessLogEntry>> {
            Ok(Vec::new())
        }

        async fn count(&self, _: &AccessLogFilter) -> Result<i64> {
            Ok(0)
        }

        async fn count_since(&self, _: Option<DateTime<Utc>>) -> Result<i64> {
            Ok(0)
        }

        async fn delete_before(&self, _: DateTime<Utc>) -> Result<u64> {
            Ok(0)
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn failed_write_is_swallowed_and_logged() {
        let logger = AuditLogger::new(Arc::new(FailingRepository));
        logger.record(None, None, &RequestOrigin::default(), AccessType::View, false).await;
        assert!(logs_contain("Failed to write access log entry"));
    }

    #[tokio::test]
    async fn records_and_pages_entries() {
        let db = TestDatabase::new().await;
        let logger = AuditLogger::with_sqlx(db.pool.clone());
        let origin = RequestOrigin {
            ip_address: Some("192.0.2.1".into()),
            user_agent: Some("curl/8".into()),
        };

        for _ in 0..3 {
            logger.record(None, None, &origin, AccessType::View, false).await;
        }

        let page = PageRequest::new(Some(1), Some(2), 50).unwrap();
        let result = logger.query(&AccessLogFilter::default(), page).await.unwrap();
        assert_eq!(result.total, 3);
        assert_eq!(result.data.len(), 2);
        assert_eq!(result.total_pages, 2);
        assert_eq!(result.data[0].ip_address.as_deref(), Some("192.0.2.1"));

        let counts = logger.access_counts(Utc::now()).await.unwrap();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.today, 3);
        assert_eq!(counts.this_month, 3);
    }
}
