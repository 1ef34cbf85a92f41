//! Repository modules for data access
//!
//! One file per table. Each exposes an `#[async_trait]` trait consumed by
//! the services and a `Sqlx*` implementation backed by the pool.

pub mod access_log;
pub mod secret;
pub mod user;

pub use access_log::{AccessLogRepository, SqlxAccessLogRepository};
pub use secret::{SecretRepository, SqlxSecretRepository};
pub use user::{SqlxUserRepository, UserRepository};

use crate::errors::PasswordPalError;

/// Map a UNIQUE violation to `Conflict`, anything else to `Database`.
///
/// SQLite reports the failing column as `table.column` in the message.
pub(crate) fn map_write_error(
    err: sqlx::Error,
    resource_type: &str,
    context: &str,
) -> PasswordPalError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let message = db_err.message();
            let what = if message.contains(".username") {
                "Username already exists"
            } else if message.contains(".email") {
                "Email already exists"
            } else if message.contains(".google_id") {
                "Google account is already linked to another user"
            } else if message.contains(".guid") {
                "Identifier already in use"
            } else {
                "Resource already exists"
            };
            return PasswordPalError::conflict(what, resource_type);
        }
    }
    PasswordPalError::database(err, context)
}
