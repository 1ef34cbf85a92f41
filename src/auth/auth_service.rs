//! Bearer token authentication for incoming requests.

use std::sync::Arc;

use tracing::{field, instrument};

use crate::auth::jwt::SessionTokenService;
use crate::auth::models::{AuthContext, AuthError};
use crate::errors::{AuthErrorType, PasswordPalError};
use crate::observability::metrics;

/// Turns an `Authorization` header into an [`AuthContext`].
///
/// Stateless: no database round trip, validity is signature plus expiry.
#[derive(Clone, Debug)]
pub struct AuthService {
    tokens: Arc<SessionTokenService>,
}

impl AuthService {
    pub fn new(tokens: Arc<SessionTokenService>) -> Self {
        Self { tokens }
    }

    #[instrument(skip(self, header), fields(user_id = field::Empty))]
    pub fn authenticate(&self, header: Option<&str>) -> Result<AuthContext, AuthError> {
        let result = self.authenticate_inner(header);
        match &result {
            Ok(context) => {
                tracing::Span::current().record("user_id", context.user_id.as_str());
                metrics::record_authentication("success");
            }
            Err(err) => metrics::record_authentication(err.metric_label()),
        }
        result
    }

    /// Same as [`authenticate`](Self::authenticate) but an absent or bad token
    /// yields `None` instead of an error.
    pub fn authenticate_optional(&self, header: Option<&str>) -> Option<AuthContext> {
        self.authenticate_inner(header).ok()
    }

    fn authenticate_inner(&self, header: Option<&str>) -> Result<AuthContext, AuthError> {
        let header = header.map(str::trim).unwrap_or_default();
        if header.is_empty() {
            return Err(AuthError::MissingBearer);
        }

        let Some(token) = header.strip_prefix("Bearer ") else {
            return Err(AuthError::MalformedBearer);
        };
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingBearer);
        }

        let claims = self.tokens.validate(token).map_err(|err| match err {
            PasswordPalError::Auth { error_type: AuthErrorType::ExpiredToken, .. } => {
                AuthError::ExpiredToken
            }
            _ => AuthError::InvalidToken,
        })?;

        AuthContext::from_claims(&claims)
    }
}
