//! Shared handler state, built once from the loaded configuration.

use std::sync::Arc;

use crate::api::rate_limit::RateLimiters;
use crate::auth::{
    AuthService, GoogleIdTokenVerifier, IdentityVerifier, LoginService, PasswordHasher,
    SessionTokenService,
};
use crate::config::AppConfig;
use crate::crypto::SecretCipher;
use crate::errors::Result;
use crate::services::{AdminService, SecretService};
use crate::storage::DbPool;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pool: DbPool,
    pub auth: Arc<AuthService>,
    pub logins: LoginService,
    pub secrets: SecretService,
    pub admin: AdminService,
    pub rate_limits: RateLimiters,
}

impl AppState {
    /// Wire every service against `pool`. `verifier` is `None` when Google
    /// sign-in is not configured.
    pub fn new(
        config: Arc<AppConfig>,
        pool: DbPool,
        verifier: Option<Arc<dyn IdentityVerifier>>,
    ) -> Result<Self> {
        let tokens = Arc::new(SessionTokenService::from_config(&config.auth)?);
        let cipher = SecretCipher::from_config(&config.encryption)?;
        let hasher = PasswordHasher::new(config.auth.bcrypt_cost);

        Ok(Self {
            auth: Arc::new(AuthService::new(tokens.clone())),
            logins: LoginService::with_sqlx(
                pool.clone(),
                hasher.clone(),
                tokens,
                verifier,
                config.auth.allowed_sso_domain.clone(),
            ),
            secrets: SecretService::with_sqlx(pool.clone(), cipher, config.sharing.clone()),
            admin: AdminService::with_sqlx(pool.clone(), hasher),
            rate_limits: RateLimiters::from_config(&config.rate_limit),
            config,
            pool,
        })
    }

    /// Same as [`new`](Self::new) with the Google verifier taken from config.
    pub fn from_config(config: Arc<AppConfig>, pool: DbPool) -> Result<Self> {
        let verifier = GoogleIdTokenVerifier::from_config(&config.auth)
            .map(|v| Arc::new(v) as Arc<dyn IdentityVerifier>);
        Self::new(config, pool, verifier)
    }
}
