//! # Error Types
//!
//! Error taxonomy for PasswordPal built on `thiserror`.

use std::fmt;

/// Custom result type for PasswordPal operations
pub type Result<T> = std::result::Result<T, PasswordPalError>;

/// Main error type for PasswordPal
#[derive(thiserror::Error, Debug)]
pub enum PasswordPalError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Database and storage errors
    #[error("Database error: {context}")]
    Database {
        #[source]
        source: sqlx::Error,
        context: String,
    },

    /// I/O errors with additional context
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {context}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },

    /// Malformed or missing input
    #[error("Validation error: {message}")]
    Validation { message: String, field: Option<String> },

    /// Missing, invalid or expired credentials
    #[error("Authentication error: {message}")]
    Auth { message: String, error_type: AuthErrorType },

    /// Authenticated but not allowed
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// Resource not found errors
    #[error("Resource not found: {resource_type} with ID '{id}'")]
    NotFound { resource_type: String, id: String },

    /// The secret exists but can no longer be retrieved
    #[error("{reason}")]
    Gone { reason: GoneReason },

    /// Uniqueness violations and refused self-targeting operations
    #[error("Resource conflict: {message}")]
    Conflict { message: String, resource_type: String },

    /// Encryption or decryption failure
    #[error("Crypto error: {message}")]
    Crypto { message: String },

    /// Internal server errors
    #[error("Internal server error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Authentication error subtypes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorType {
    InvalidToken,
    ExpiredToken,
    MissingToken,
    InvalidCredentials,
}

impl fmt::Display for AuthErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthErrorType::InvalidToken => write!(f, "invalid_token"),
            AuthErrorType::ExpiredToken => write!(f, "expired_token"),
            AuthErrorType::MissingToken => write!(f, "missing_token"),
            AuthErrorType::InvalidCredentials => write!(f, "invalid_credentials"),
        }
    }
}

/// Why a secret that exists refuses retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoneReason {
    Deleted,
    Expired,
    AccessLimitReached,
}

impl GoneReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoneReason::Deleted => "deleted",
            GoneReason::Expired => "expired",
            GoneReason::AccessLimitReached => "access_limit_reached",
        }
    }
}

impl fmt::Display for GoneReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoneReason::Deleted => write!(f, "This password has been deleted"),
            GoneReason::Expired => write!(f, "This password has expired"),
            GoneReason::AccessLimitReached => {
                write!(f, "This password has reached its access limit")
            }
        }
    }
}

impl PasswordPalError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create a database error with context
    pub fn database<S: Into<String>>(source: sqlx::Error, context: S) -> Self {
        Self::Database { source, context: context.into() }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create an authentication error
    pub fn auth<S: Into<String>>(message: S, error_type: AuthErrorType) -> Self {
        Self::Auth { message: message.into(), error_type }
    }

    pub fn forbidden<S: Into<String>>(message: S) -> Self {
        Self::Forbidden { message: message.into() }
    }

    /// Create a not found error
    pub fn not_found<R: Into<String>, I: Into<String>>(resource_type: R, id: I) -> Self {
        Self::NotFound { resource_type: resource_type.into(), id: id.into() }
    }

    pub fn gone(reason: GoneReason) -> Self {
        Self::Gone { reason }
    }

    /// Create a conflict error
    pub fn conflict<M: Into<String>, R: Into<String>>(message: M, resource_type: R) -> Self {
        Self::Conflict { message: message.into(), resource_type: resource_type.into() }
    }

    pub fn crypto<S: Into<String>>(message: S) -> Self {
        Self::Crypto { message: message.into() }
    }

    /// Create an internal server error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Get the HTTP status code that should be returned for this error
    pub fn status_code(&self) -> u16 {
        match self {
            PasswordPalError::Validation { .. } => 400,
            PasswordPalError::Auth { .. } => 401,
            PasswordPalError::Forbidden { .. } => 403,
            PasswordPalError::NotFound { .. } => 404,
            PasswordPalError::Conflict { .. } => 409,
            PasswordPalError::Gone { .. } => 410,
            PasswordPalError::Config { .. }
            | PasswordPalError::Database { .. }
            | PasswordPalError::Io { .. }
            | PasswordPalError::Serialization { .. }
            | PasswordPalError::Crypto { .. }
            | PasswordPalError::Internal { .. } => 500,
        }
    }

    /// Whether the message may be shown to the caller as-is
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}

impl From<sqlx::Error> for PasswordPalError {
    fn from(error: sqlx::Error) -> Self {
        Self::Database { source: error, context: "Database operation failed".to_string() }
    }
}

impl From<std::io::Error> for PasswordPalError {
    fn from(error: std::io::Error) -> Self {
        Self::Io { source: error, context: "I/O operation failed".to_string() }
    }
}

impl From<serde_json::Error> for PasswordPalError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization { source: error, context: "JSON serialization failed".to_string() }
    }
}

impl From<validator::ValidationErrors> for PasswordPalError {
    fn from(errors: validator::ValidationErrors) -> Self {
        // First field message, ordered by field name
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        for (field, field_errors) in fields {
            if let Some(error) = field_errors.first() {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for {}", field));
                return Self::validation_field(message, field.to_string());
            }
        }

        Self::validation(errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(PasswordPalError::validation("bad").status_code(), 400);
        assert_eq!(
            PasswordPalError::auth("nope", AuthErrorType::MissingToken).status_code(),
            401
        );
        assert_eq!(PasswordPalError::forbidden("no").status_code(), 403);
        assert_eq!(PasswordPalError::not_found("Password", "abc").status_code(), 404);
        assert_eq!(PasswordPalError::gone(GoneReason::Expired).status_code(), 410);
        assert_eq!(PasswordPalError::conflict("dup", "User").status_code(), 409);
        assert_eq!(PasswordPalError::crypto("bad tag").status_code(), 500);
        assert_eq!(PasswordPalError::internal("boom").status_code(), 500);
    }

    #[test]
    fn test_gone_messages() {
        assert_eq!(
            PasswordPalError::gone(GoneReason::Deleted).to_string(),
            "This password has been deleted"
        );
        assert_eq!(
            PasswordPalError::gone(GoneReason::Expired).to_string(),
            "This password has expired"
        );
        assert_eq!(
            PasswordPalError::gone(GoneReason::AccessLimitReached).to_string(),
            "This password has reached its access limit"
        );
    }

    #[test]
    fn test_client_error_classification() {
        assert!(PasswordPalError::validation("x").is_client_error());
        assert!(!PasswordPalError::crypto("x").is_client_error());
        assert!(!PasswordPalError::config("x").is_client_error());
    }

    #[test]
    fn test_validation_errors_conversion_uses_field_message() {
        let mut errors = validator::ValidationErrors::new();
        let mut error = validator::ValidationError::new("length");
        error.message = Some("Username is required".into());
        errors.add("username", error);

        match PasswordPalError::from(errors) {
            PasswordPalError::Validation { message, field } => {
                assert_eq!(message, "Username is required");
                assert_eq!(field.as_deref(), Some("username"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
