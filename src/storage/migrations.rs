//! # Database Migration Management
//!
//! Schema evolution using SQL files compiled into the binary. Each pending
//! migration runs in its own transaction and is recorded in
//! `_passwordpal_migrations`.

use crate::errors::{PasswordPalError, Result};
use crate::storage::DbPool;
use serde::Serialize;
use sqlx::Row;
use tracing::{error, info, warn};

/// Embedded migrations, ordered by version prefix
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "20260101000001_create_users",
        include_str!("../../migrations/20260101000001_create_users.sql"),
    ),
    (
        "20260101000002_create_passwords",
        include_str!("../../migrations/20260101000002_create_passwords.sql"),
    ),
    (
        "20260101000003_create_access_logs",
        include_str!("../../migrations/20260101000003_create_access_logs.sql"),
    ),
];

/// Migration information structure
#[derive(Debug, Clone, Serialize)]
pub struct MigrationInfo {
    pub version: i64,
    pub description: String,
    pub installed_on: chrono::DateTime<chrono::Utc>,
    pub execution_time: i64,
}

/// Run all pending database migrations
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    info!("Starting database migration process");

    create_migration_table(pool).await?;
    let applied = get_applied_migration_versions(pool).await?;

    let mut migrations_run = 0;
    for (name, sql) in MIGRATIONS {
        let version = extract_version_from_filename(name)?;

        if applied.contains(&version) {
            info!(version = version, "Migration already applied: {}", name);
            continue;
        }

        info!(version = version, "Running migration: {}", name);
        let start_time = std::time::Instant::now();

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| PasswordPalError::database(e, "Failed to start migration transaction"))?;

        sqlx::raw_sql(sql).execute(&mut *tx).await.map_err(|e| {
            error!(error = %e, migration = name, "Migration failed");
            PasswordPalError::database(e, format!("Migration failed: {}", name))
        })?;

        let execution_time = start_time.elapsed().as_millis() as i64;
        sqlx::query(
            "INSERT INTO _passwordpal_migrations (version, description, execution_time, installed_on) VALUES ($1, $2, $3, $4)",
        )
        .bind(version)
        .bind(*name)
        .bind(execution_time)
        .bind(chrono::Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!(error = %e, migration = name, "Failed to record migration");
            PasswordPalError::database(e, format!("Failed to record migration: {}", name))
        })?;

        tx.commit()
            .await
            .map_err(|e| PasswordPalError::database(e, "Failed to commit migration transaction"))?;

        migrations_run += 1;
        info!(version = version, execution_time_ms = execution_time, "Migration completed: {}", name);
    }

    if migrations_run > 0 {
        info!(count = migrations_run, "Database migrations completed");
    } else {
        info!("No pending migrations");
    }

    Ok(())
}

async fn create_migration_table(pool: &DbPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _passwordpal_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            execution_time INTEGER NOT NULL,
            installed_on TEXT NOT NULL
        )
    "#,
    )
    .execute(pool)
    .await
    .map_err(|e| PasswordPalError::database(e, "Failed to create migration tracking table"))?;

    Ok(())
}

async fn get_applied_migration_versions(pool: &DbPool) -> Result<Vec<i64>> {
    let rows = sqlx::query("SELECT version FROM _passwordpal_migrations ORDER BY version")
        .fetch_all(pool)
        .await
        .map_err(|e| PasswordPalError::database(e, "Failed to get applied migrations"))?;

    Ok(rows.into_iter().map(|row| row.get::<i64, _>("version")).collect())
}

fn extract_version_from_filename(filename: &str) -> Result<i64> {
    let version_str = filename.split('_').next().ok_or_else(|| {
        PasswordPalError::validation(format!("Invalid migration filename: {}", filename))
    })?;

    version_str.parse::<i64>().map_err(|_| {
        PasswordPalError::validation(format!("Invalid version in filename: {}", filename))
    })
}

/// Validate that every embedded migration is applied and nothing unknown is
pub async fn validate_migrations(pool: &DbPool) -> Result<bool> {
    create_migration_table(pool).await?;
    let applied = get_applied_migration_versions(pool).await?;
    let expected = MIGRATIONS
        .iter()
        .map(|(name, _)| extract_version_from_filename(name))
        .collect::<Result<Vec<_>>>()?;

    for version in &expected {
        if !applied.contains(version) {
            warn!(version = version, "Missing migration");
            return Ok(false);
        }
    }

    for version in &applied {
        if !expected.contains(version) {
            warn!(version = version, "Unexpected migration found");
            return Ok(false);
        }
    }

    Ok(true)
}

/// List all applied migrations
pub async fn list_applied_migrations(pool: &DbPool) -> Result<Vec<MigrationInfo>> {
    create_migration_table(pool).await?;
    let rows = sqlx::query(
        "SELECT version, description, execution_time, installed_on FROM _passwordpal_migrations ORDER BY version",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| PasswordPalError::database(e, "Failed to list applied migrations"))?;

    Ok(rows
        .into_iter()
        .map(|row| MigrationInfo {
            version: row.get("version"),
            description: row.get("description"),
            installed_on: row.get("installed_on"),
            execution_time: row.get("execution_time"),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_helpers::TestDatabase;

    #[test]
    fn test_extract_version_from_filename() {
        assert_eq!(
            extract_version_from_filename("20260101000001_create_users").unwrap(),
            20260101000001
        );
        assert!(extract_version_from_filename("invalid_filename").is_err());
    }

    #[test]
    fn embedded_migrations_are_ordered() {
        let versions: Vec<i64> =
            MIGRATIONS.iter().map(|(n, _)| extract_version_from_filename(n).unwrap()).collect();
        let mut sorted = versions.clone();
        sorted.sort();
        assert_eq!(versions, sorted);
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let db = TestDatabase::new().await;
        run_migrations(&db.pool).await.unwrap();
        run_migrations(&db.pool).await.unwrap();

        assert!(validate_migrations(&db.pool).await.unwrap());
        assert_eq!(list_applied_migrations(&db.pool).await.unwrap().len(), MIGRATIONS.len());
    }
}
