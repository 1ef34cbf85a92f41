//! Session tokens: HS256 JWTs carrying the user's identity and role.
//!
//! Tokens are not stored server-side. A token is valid while its signature
//! verifies and `exp` lies in the future.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

use crate::auth::user::{Role, User};
use crate::config::AuthConfig;
use crate::domain::UserId;
use crate::errors::{AuthErrorType, PasswordPalError, Result};

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly signed token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and validates session tokens
pub struct SessionTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetime: Duration,
}

impl std::fmt::Debug for SessionTokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokenService").field("lifetime", &self.lifetime).finish()
    }
}

impl SessionTokenService {
    pub fn new(secret: &[u8], lifetime: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            lifetime,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        let lifetime = Duration::from_std(config.token_expiry())
            .map_err(|e| PasswordPalError::config(format!("Invalid token expiry: {}", e)))?;
        Ok(Self::new(config.jwt_secret.as_bytes(), lifetime))
    }

    /// Sign a token for `user`, valid from now for the configured lifetime.
    pub fn issue(&self, user: &User) -> Result<IssuedToken> {
        self.issue_at(user, Utc::now())
    }

    pub fn issue_at(&self, user: &User, issued_at: DateTime<Utc>) -> Result<IssuedToken> {
        let expires_at = issued_at + self.lifetime;
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| PasswordPalError::internal(format!("failed to sign token: {}", e)))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Verify signature and expiry.
    pub fn validate(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => {
                    PasswordPalError::auth("Token has expired", AuthErrorType::ExpiredToken)
                }
                _ => PasswordPalError::auth("Invalid token", AuthErrorType::InvalidToken),
            })
    }
}

impl Claims {
    pub fn user_id(&self) -> Result<UserId> {
        UserId::parse(&self.sub).map_err(|_| {
            PasswordPalError::auth("Invalid token subject", AuthErrorType::InvalidToken)
        })
    }
}
