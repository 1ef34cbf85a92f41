//! # PasswordPal
//!
//! Backend for sharing credentials through single-use or count-limited links.
//! A user stores a secret, receives an opaque GUID and a shareable link, and the
//! recipient redeems the link until it expires, exhausts its quota or is deleted.
//!
//! ## Architecture
//!
//! ```text
//! REST API (axum) → Services → Repositories (sqlx/SQLite)
//!       ↓              ↓
//!  Auth middleware   Crypto (AES-256-GCM, bcrypt, JWT)
//! ```
//!
//! Every retrieval attempt, successful or not, lands in the access log.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod domain;
pub mod errors;
pub mod observability;
pub mod services;
pub mod storage;

pub use config::AppConfig;
pub use errors::{Error, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_available() {
        assert!(!VERSION.is_empty());
        assert_eq!(APP_NAME, "passwordpal");
    }
}
