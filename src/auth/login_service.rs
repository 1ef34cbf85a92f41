//! Login flows: username/password and federated Google sign-in.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::auth::google::IdentityVerifier;
use crate::auth::hashing::PasswordHasher;
use crate::auth::jwt::SessionTokenService;
use crate::auth::models::AuthContext;
use crate::auth::user::{AuthProvider, LoginRequest, User, UserProfile};
use crate::errors::{AuthErrorType, PasswordPalError, Result};
use crate::observability::metrics;
use crate::storage::repositories::{SqlxUserRepository, UserRepository};
use crate::storage::DbPool;

/// `{token, user}` returned by both login endpoints
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub token: String,
    pub user: UserProfile,
}

fn invalid_credentials() -> PasswordPalError {
    PasswordPalError::auth("Invalid credentials", AuthErrorType::InvalidCredentials)
}

fn account_deactivated() -> PasswordPalError {
    PasswordPalError::forbidden("Account is deactivated")
}

/// Service for handling interactive authentication.
#[derive(Clone)]
pub struct LoginService {
    users: Arc<dyn UserRepository>,
    hasher: PasswordHasher,
    tokens: Arc<SessionTokenService>,
    verifier: Option<Arc<dyn IdentityVerifier>>,
    allowed_domain: String,
}

impl LoginService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        hasher: PasswordHasher,
        tokens: Arc<SessionTokenService>,
        verifier: Option<Arc<dyn IdentityVerifier>>,
        allowed_domain: impl Into<String>,
    ) -> Self {
        Self { users, hasher, tokens, verifier, allowed_domain: allowed_domain.into() }
    }

    pub fn with_sqlx(
        pool: DbPool,
        hasher: PasswordHasher,
        tokens: Arc<SessionTokenService>,
        verifier: Option<Arc<dyn IdentityVerifier>>,
        allowed_domain: impl Into<String>,
    ) -> Self {
        Self::new(Arc::new(SqlxUserRepository::new(pool)), hasher, tokens, verifier, allowed_domain)
    }

    /// Username/password login.
    ///
    /// Unknown users and wrong passwords both yield `Auth`; a deactivated
    /// account yields `Forbidden`.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginOutcome> {
        let (user, password_hash) = match self.users.find_credentials(&request.username).await? {
            Some(found) => found,
            None => {
                self.hasher.verify_dummy(&request.password).await;
                warn!("login attempt for non-existent user");
                metrics::record_login("password", "invalid_credentials");
                return Err(invalid_credentials());
            }
        };

        if !user.is_active {
            warn!(user_id = %user.id, "login attempt on deactivated account");
            metrics::record_login("password", "inactive");
            return Err(account_deactivated());
        }

        let password_hash = match password_hash {
            Some(hash) if user.auth_provider.allows_password() => hash,
            _ => {
                self.hasher.verify_dummy(&request.password).await;
                warn!(user_id = %user.id, "password login attempted on federated-only account");
                metrics::record_login("password", "invalid_credentials");
                return Err(invalid_credentials());
            }
        };

        if !self.hasher.verify(&request.password, &password_hash).await? {
            warn!(user_id = %user.id, "login attempt with incorrect password");
            metrics::record_login("password", "invalid_credentials");
            return Err(invalid_credentials());
        }

        self.complete_login(user, "password").await
    }

    /// Google sign-in. Never provisions accounts.
    #[instrument(skip(self, id_token))]
    pub async fn login_with_federated_identity(&self, id_token: &str) -> Result<LoginOutcome> {
        let verifier = self
            .verifier
            .as_ref()
            .ok_or_else(|| PasswordPalError::validation("Google login is not configured"))?;

        let identity = match verifier.verify(id_token).await {
            Ok(identity) => identity,
            Err(e) => {
                metrics::record_login("google", "invalid_token");
                return Err(e);
            }
        };

        if !self.domain_allowed(&identity.email) {
            warn!(email = %identity.email, "Google login from disallowed domain");
            metrics::record_login("google", "domain_rejected");
            return Err(PasswordPalError::forbidden(format!(
                "Only @{} accounts are allowed",
                self.allowed_domain
            )));
        }

        let user = match self.users.find_by_email(&identity.email).await? {
            Some(user) => user,
            None => {
                warn!(email = %identity.email, "Google login for unknown account");
                metrics::record_login("google", "no_account");
                return Err(PasswordPalError::forbidden(
                    "No account found for this email. Please contact an administrator.",
                ));
            }
        };

        if !user.is_active {
            warn!(user_id = %user.id, "Google login on deactivated account");
            metrics::record_login("google", "inactive");
            return Err(account_deactivated());
        }

        let user = match (user.auth_provider, user.google_id.as_deref()) {
            (AuthProvider::Local, _) => {
                info!(user_id = %user.id, "Linking Google identity to local account");
                self.users
                    .link_google_identity(&user.id, AuthProvider::Both, &identity.subject)
                    .await?
            }
            (provider, None) => {
                self.users.link_google_identity(&user.id, provider, &identity.subject).await?
            }
            (_, Some(_)) => user,
        };

        self.complete_login(user, "google").await
    }

    /// Profile of the token's user, re-read from storage.
    #[instrument(skip(self, context), fields(user_id = %context.user_id))]
    pub async fn current_user(&self, context: &AuthContext) -> Result<UserProfile> {
        let user = self
            .users
            .find_by_id(&context.user_id)
            .await?
            .ok_or_else(|| PasswordPalError::not_found("User", context.user_id.as_str()))?;

        if !user.is_active {
            return Err(account_deactivated());
        }

        Ok(UserProfile::from(&user))
    }

    fn domain_allowed(&self, email: &str) -> bool {
        let suffix = format!("@{}", self.allowed_domain.trim_start_matches('@').to_lowercase());
        email.to_lowercase().ends_with(&suffix)
    }

    async fn complete_login(&self, mut user: User, method: &str) -> Result<LoginOutcome> {
        let now = Utc::now();
        self.users.update_last_login(&user.id, now).await?;
        user.last_login = Some(now);

        let issued = self.tokens.issue(&user)?;
        metrics::record_login(method, "success");
        info!(user_id = %user.id, method, "User logged in");

        Ok(LoginOutcome { token: issued.token, user: UserProfile::from(&user) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::google::VerifiedIdentity;
    use crate::auth::user::{NewUser, Role, UpdateUser};
    use crate::storage::test_helpers::TestDatabase;
    use async_trait::async_trait;

    struct StubVerifier(VerifiedIdentity);

    #[async_trait]
    impl IdentityVerifier for StubVerifier {
        async fn verify(&self, _id_token: &str) -> Result<VerifiedIdentity> {
            Ok(self.0.clone())
        }
    }

    struct Fixture {
        _db: TestDatabase,
        users: Arc<SqlxUserRepository>,
        hasher: PasswordHasher,
        tokens: Arc<SessionTokenService>,
    }

    impl Fixture {
        async fn new() -> Self {
            let db = TestDatabase::new().await;
            let users = Arc::new(SqlxUserRepository::new(db.pool.clone()));
            let tokens = Arc::new(SessionTokenService::new(
                b"0123456789abcdef0123456789abcdef",
                chrono::Duration::hours(24),
            ));
            Self { _db: db, users, hasher: PasswordHasher::new(4), tokens }
        }

        fn service(&self, identity: Option<VerifiedIdentity>) -> LoginService {
            let verifier = identity.map(|i| Arc::new(StubVerifier(i)) as Arc<dyn IdentityVerifier>);
            LoginService::new(
                self.users.clone(),
                self.hasher.clone(),
                self.tokens.clone(),
                verifier,
                "tymeglobal.com",
            )
        }

        async fn local_user(&self, username: &str, email: &str, password: &str) -> User {
            self.users
                .create(NewUser {
                    username: username.into(),
                    email: email.into(),
                    password_hash: Some(self.hasher.hash(password).await.unwrap()),
                    role: Role::User,
                    auth_provider: AuthProvider::Local,
                    created_by: None,
                })
                .await
                .unwrap()
        }
    }

    fn login(username: &str, password: &str) -> LoginRequest {
        LoginRequest { username: username.into(), password: password.into() }
    }

    fn google(email: &str) -> VerifiedIdentity {
        VerifiedIdentity { email: email.into(), subject: "google-sub".into(), name: "Jane".into() }
    }

    #[tokio::test]
    async fn successful_login_issues_token_and_sets_last_login() {
        let f = Fixture::new().await;
        let user = f.local_user("alice", "alice@tymeglobal.com", "Passw0rd!").await;

        let outcome = f.service(None).login(&login("alice", "Passw0rd!")).await.unwrap();
        let claims = f.tokens.validate(&outcome.token).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert!(outcome.user.last_login.is_some());
        assert!(f.users.find_by_id(&user.id).await.unwrap().unwrap().last_login.is_some());
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_are_unauthenticated() {
        let f = Fixture::new().await;
        f.local_user("alice", "alice@tymeglobal.com", "Passw0rd!").await;
        let service = f.service(None);

        let err = service.login(&login("alice", "nope")).await.unwrap_err();
        assert_eq!(err.status_code(), 401);
        let err = service.login(&login("ghost", "nope")).await.unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[tokio::test]
    async fn inactive_account_is_forbidden_even_with_correct_password() {
        let f = Fixture::new().await;
        let user = f.local_user("alice", "alice@tymeglobal.com", "Passw0rd!").await;
        f.users
            .update(&user.id, UpdateUser { is_active: Some(false), ..Default::default() })
            .await
            .unwrap();

        let err = f.service(None).login(&login("alice", "Passw0rd!")).await.unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn federated_login_upgrades_local_account() {
        let f = Fixture::new().await;
        let user = f.local_user("jane", "jane@tymeglobal.com", "Passw0rd!").await;

        let outcome = f
            .service(Some(google("jane@tymeglobal.com")))
            .login_with_federated_identity("token")
            .await
            .unwrap();
        assert_eq!(outcome.user.auth_provider, AuthProvider::Both);

        let stored = f.users.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.google_id.as_deref(), Some("google-sub"));
    }

    #[tokio::test]
    async fn federated_login_outside_domain_is_forbidden_and_changes_nothing() {
        let f = Fixture::new().await;
        let user = f.local_user("jane", "jane@gmail.com", "Passw0rd!").await;

        let err = f
            .service(Some(google("jane@gmail.com")))
            .login_with_federated_identity("token")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);

        let stored = f.users.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(stored, user);
    }

    #[tokio::test]
    async fn federated_login_never_provisions() {
        let f = Fixture::new().await;
        let err = f
            .service(Some(google("new@tymeglobal.com")))
            .login_with_federated_identity("token")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert_eq!(f.users.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn federated_login_unconfigured_is_rejected() {
        let f = Fixture::new().await;
        let err = f.service(None).login_with_federated_identity("token").await.unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
