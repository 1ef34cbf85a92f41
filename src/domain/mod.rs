//! Domain layer
//!
//! Plain data types for secrets, audit entries and pagination. Nothing here
//! talks to the database or HTTP.

pub mod access_log;
pub mod id;
pub mod pagination;
pub mod secret;

pub use access_log::{
    AccessLogEntry, AccessLogFilter, AccessStatistics, AccessType, NewAccessLogEntry,
    RequestOrigin,
};
pub use id::{AccessLogId, SecretId, UserId};
pub use pagination::{Page, PageRequest, MAX_PAGE_SIZE};
pub use secret::{
    CreateSecretRequest, CreatedSecret, NewSecret, RetrievedSecret, SecretRecord, SecretSummary,
};
