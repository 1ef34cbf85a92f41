//! Business logic services
//!
//! This module contains service layer components that encapsulate
//! business logic, separated from HTTP concerns.

pub mod access_policy;
pub mod admin_service;
pub mod audit;
pub mod bootstrap;
pub mod retention;
pub mod secret_service;

pub use admin_service::AdminService;
pub use audit::{AccessCounts, AuditLogger};
pub use bootstrap::{ensure_admin, ensure_admin_with_sqlx, BootstrapOutcome};
pub use retention::{RetentionSweeper, SweepReport};
pub use secret_service::SecretService;
