//! Request-scoped identity and authentication failures.

use thiserror::Error;

use crate::auth::jwt::Claims;
use crate::auth::user::Role;
use crate::domain::UserId;
use crate::errors::{AuthErrorType, Error};

/// Identity attached to a request after its bearer token validated.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthContext {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl AuthContext {
    pub fn new(user_id: UserId, username: String, email: String, role: Role) -> Self {
        Self { user_id, username, email, role }
    }

    pub fn from_claims(claims: &Claims) -> Result<Self, AuthError> {
        let user_id = claims.user_id().map_err(|_| AuthError::InvalidToken)?;
        Ok(Self::new(user_id, claims.username.clone(), claims.email.clone(), claims.role))
    }

    pub fn is_admin(&self) -> bool {
        match self.role {
            Role::Admin => true,
            Role::User => false,
        }
    }
}

/// Errors returned by authentication middleware/services.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Access token required")]
    MissingBearer,
    #[error("Malformed authorization header")]
    MalformedBearer,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Token has expired")]
    ExpiredToken,
    #[error("Admin access required")]
    Forbidden,
    #[error(transparent)]
    Persistence(#[from] Error),
}

impl AuthError {
    /// Label used for authentication metrics.
    pub fn metric_label(&self) -> &'static str {
        match self {
            AuthError::MissingBearer => "missing_bearer",
            AuthError::MalformedBearer => "malformed",
            AuthError::InvalidToken => "invalid",
            AuthError::ExpiredToken => "expired",
            AuthError::Forbidden => "forbidden",
            AuthError::Persistence(_) => "error",
        }
    }
}

impl From<AuthError> for Error {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingBearer => Error::auth(err.to_string(), AuthErrorType::MissingToken),
            AuthError::MalformedBearer | AuthError::InvalidToken => {
                Error::auth(err.to_string(), AuthErrorType::InvalidToken)
            }
            AuthError::ExpiredToken => Error::auth(err.to_string(), AuthErrorType::ExpiredToken),
            AuthError::Forbidden => Error::forbidden(err.to_string()),
            AuthError::Persistence(inner) => inner,
        }
    }
}
