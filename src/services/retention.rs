//! Background pruning of old access log entries and soft-deleted secrets.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::RetentionConfig;
use crate::errors::Result;
use crate::services::audit::AuditLogger;
use crate::storage::repositories::{SecretRepository, SqlxSecretRepository};
use crate::storage::DbPool;

/// Rows removed by one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub access_logs_pruned: u64,
    pub secrets_purged: u64,
}

#[derive(Clone)]
pub struct RetentionSweeper {
    config: RetentionConfig,
    audit: AuditLogger,
    secrets: Arc<dyn SecretRepository>,
}

impl RetentionSweeper {
    pub fn new(
        config: RetentionConfig,
        audit: AuditLogger,
        secrets: Arc<dyn SecretRepository>,
    ) -> Self {
        Self { config, audit, secrets }
    }

    pub fn with_sqlx(pool: DbPool, config: RetentionConfig) -> Self {
        Self::new(
            config,
            AuditLogger::with_sqlx(pool.clone()),
            Arc::new(SqlxSecretRepository::new(pool)),
        )
    }

    /// Apply the configured retention windows relative to `now`.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        if let Some(days) = self.config.audit_retention_days {
            let cutoff = now - Duration::days(i64::from(days));
            report.access_logs_pruned = self.audit.prune_before(cutoff).await?;
        }

        if let Some(days) = self.config.deleted_secret_retention_days {
            let cutoff = now - Duration::days(i64::from(days));
            report.secrets_purged = self.secrets.purge_deleted_before(cutoff).await?;
        }

        Ok(report)
    }

    /// Run forever on the configured interval. Returns `None` when no
    /// retention window is set.
    pub fn spawn(self) -> Option<JoinHandle<()>> {
        if !self.config.is_enabled() {
            debug!("Retention sweeper disabled");
            return None;
        }

        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.sweep_interval());
            loop {
                interval.tick().await;
                match self.run_once(Utc::now()).await {
                    Ok(report) if report != SweepReport::default() => {
                        info!(
                            access_logs_pruned = report.access_logs_pruned,
                            secrets_purged = report.secrets_purged,
                            "Retention sweep removed expired rows"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "Retention sweep failed");
                    }
                }
            }
        }))
    }
}
