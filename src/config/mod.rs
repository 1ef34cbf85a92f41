//! # Configuration Management
//!
//! Process-wide configuration loaded once at startup (after `.env` has been
//! read by `dotenvy`) and passed explicitly to the components that need it.

pub mod settings;

pub use settings::{
    AppConfig, AuthConfig, BootstrapConfig, DatabaseConfig, EncryptionConfig,
    ObservabilityConfig, RateLimitConfig, RetentionConfig, RetrievalAccess, ServerConfig,
    SharingConfig, MIN_BCRYPT_COST,
};
