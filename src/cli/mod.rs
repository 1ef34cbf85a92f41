//! # Command Line Interface
//!
//! `serve` (default), `migrate` and `seed-admin`.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use crate::api::{start_api_server, AppState};
use crate::auth::PasswordHasher;
use crate::config::{AppConfig, DatabaseConfig, ObservabilityConfig};
use crate::observability::{init_logging, init_observability, log_config_info};
use crate::services::{ensure_admin_with_sqlx, BootstrapOutcome, RetentionSweeper};
use crate::storage::{
    create_pool, list_applied_migrations, run_migrations, validate_migrations, MigrationInfo,
};
use crate::{APP_NAME, VERSION};

#[derive(Parser)]
#[command(name = "passwordpal")]
#[command(about = "PasswordPal credential sharing service")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Database URL override
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server (default)
    Serve,

    /// Apply pending database migrations
    Migrate {
        /// Only list applied migrations
        #[arg(long)]
        list: bool,
    },

    /// Create the default admin account if no admin exists
    SeedAdmin,
}

fn observability_config(verbose: bool) -> anyhow::Result<ObservabilityConfig> {
    let mut config = ObservabilityConfig::from_env()?;
    if verbose {
        config.log_level = "debug".to_string();
    }
    Ok(config)
}

fn apply_overrides(database: &mut DatabaseConfig, database_url: Option<String>) {
    if let Some(url) = database_url {
        database.url = url;
    }
}

pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let mut config = AppConfig::from_env()?;
            apply_overrides(&mut config.database, cli.database_url);
            if cli.verbose {
                config.observability.log_level = "debug".to_string();
            }
            serve(config).await
        }
        Commands::Migrate { list } => {
            init_logging(&observability_config(cli.verbose)?)?;
            let mut database = DatabaseConfig::from_env()?;
            apply_overrides(&mut database, cli.database_url);
            database.auto_migrate = false;
            migrate(&database, list).await
        }
        Commands::SeedAdmin => {
            let mut config = AppConfig::from_env()?;
            apply_overrides(&mut config.database, cli.database_url);
            init_logging(&observability_config(cli.verbose)?)?;
            seed_admin(&config).await
        }
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    init_observability(&config.observability)?;
    info!(app_name = APP_NAME, version = VERSION, "Starting PasswordPal");
    log_config_info(&config);

    let pool = create_pool(&config.database).await?;

    let hasher = PasswordHasher::new(config.auth.bcrypt_cost);
    if let BootstrapOutcome::Created(user) =
        ensure_admin_with_sqlx(pool.clone(), &hasher, &config.bootstrap).await?
    {
        info!(user_id = %user.id, username = %user.username, "Default admin account created");
    }

    let _sweeper = RetentionSweeper::with_sqlx(pool.clone(), config.retention.clone()).spawn();

    let state = AppState::from_config(Arc::new(config), pool)?;
    start_api_server(state).await?;

    info!("PasswordPal shutdown completed");
    Ok(())
}

async fn migrate(database: &DatabaseConfig, list: bool) -> anyhow::Result<()> {
    let pool = create_pool(database).await?;

    if !list {
        println!("Running database migrations...");
        run_migrations(&pool).await?;
        if validate_migrations(&pool).await? {
            println!("Migrations completed successfully!");
        }
    }

    let migrations = list_applied_migrations(&pool).await?;
    if migrations.is_empty() {
        println!("No migrations have been applied");
    } else {
        println!("Applied migrations:");
        print_migrations_table(&migrations);
    }

    Ok(())
}

async fn seed_admin(config: &AppConfig) -> anyhow::Result<()> {
    let pool = create_pool(&config.database).await?;
    let hasher = PasswordHasher::new(config.auth.bcrypt_cost);

    match ensure_admin_with_sqlx(pool, &hasher, &config.bootstrap).await? {
        BootstrapOutcome::Created(user) => {
            println!("Created admin account '{}' ({})", user.username, user.email);
        }
        BootstrapOutcome::AlreadyProvisioned { admins } => {
            println!("Nothing to do: {} admin account(s) already exist", admins);
        }
    }

    Ok(())
}

fn print_migrations_table(migrations: &[MigrationInfo]) {
    println!();
    println!("{:<15} {:<50} {:<25} {:<10}", "Version", "Description", "Applied On", "Time (ms)");
    println!("{}", "-".repeat(100));

    for migration in migrations {
        println!(
            "{:<15} {:<50} {:<25} {:<10}",
            migration.version,
            truncate_string(&migration.description, 48),
            migration.installed_on.format("%Y-%m-%d %H:%M:%S"),
            migration.execution_time
        );
    }
    println!();
}

fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max_len.saturating_sub(3)).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["passwordpal"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["passwordpal", "migrate", "--list"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Migrate { list: true })));

        let cli = Cli::try_parse_from(["passwordpal", "seed-admin", "--database-url", "sqlite:x.db"])
            .unwrap();
        assert!(matches!(cli.command, Some(Commands::SeedAdmin)));
        assert_eq!(cli.database_url.as_deref(), Some("sqlite:x.db"));
    }

    #[test]
    fn truncates_long_descriptions() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("abcdefghijkl", 8), "abcde...");
    }
}
