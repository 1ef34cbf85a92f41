//! Shared HTTP test harness: a fresh SQLite database per app, the production
//! router, and a canned identity verifier for Google sign-in.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, Response},
    Router,
};
use passwordpal::{
    api::{build_router, AppState},
    auth::{
        user::{AuthProvider, NewUser, Role, User},
        IdentityVerifier, PasswordHasher, VerifiedIdentity,
    },
    config::{AppConfig, AuthConfig, DatabaseConfig, EncryptionConfig, RateLimitConfig, RetrievalAccess},
    errors::{AuthErrorType, PasswordPalError, Result},
    storage::{create_pool, DbPool, SqlxUserRepository, UserRepository},
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const ADMIN_PASSWORD: &str = "Adm1n!Passw0rd";
pub const USER_PASSWORD: &str = "Us3r!Passw0rd";

/// Treats the ID token as the email it asserts; `invalid` fails verification.
pub struct StubVerifier;

#[async_trait]
impl IdentityVerifier for StubVerifier {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity> {
        if id_token == "invalid" {
            return Err(PasswordPalError::auth(
                "Invalid Google token",
                AuthErrorType::InvalidToken,
            ));
        }
        Ok(VerifiedIdentity {
            email: id_token.to_lowercase(),
            subject: format!("sub-{}", id_token),
            name: "Test User".to_string(),
        })
    }
}

pub struct TestApp {
    pub state: AppState,
    pub pool: DbPool,
    _dir: TempDir,
}

pub fn test_config(retrieval_access: RetrievalAccess) -> AppConfig {
    let mut config = AppConfig {
        auth: AuthConfig {
            jwt_secret: "integration-test-signing-secret-0123456789".to_string(),
            bcrypt_cost: 4,
            allowed_sso_domain: "example.com".to_string(),
            ..AuthConfig::default()
        },
        encryption: EncryptionConfig { key_hex: "42".repeat(32) },
        rate_limit: RateLimitConfig::disabled(),
        ..AppConfig::default()
    };
    config.sharing.retrieval_access = retrieval_access;
    config
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config(RetrievalAccess::Admin)).await
    }

    pub async fn with_config(mut config: AppConfig) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        config.database = DatabaseConfig {
            url: format!("sqlite://{}", dir.path().join("passwordpal.db").display()),
            max_connections: 5,
            auto_migrate: true,
            ..DatabaseConfig::default()
        };

        let pool = create_pool(&config.database).await.expect("create pool");
        let state = AppState::new(
            Arc::new(config),
            pool.clone(),
            Some(Arc::new(StubVerifier) as Arc<dyn IdentityVerifier>),
        )
        .expect("build state");

        Self { state, pool, _dir: dir }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn create_user(
        &self,
        username: &str,
        password: Option<&str>,
        role: Role,
        provider: AuthProvider,
    ) -> User {
        let password_hash = match password {
            Some(password) => Some(PasswordHasher::new(4).hash(password).await.expect("hash")),
            None => None,
        };
        SqlxUserRepository::new(self.pool.clone())
            .create(NewUser {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password_hash,
                role,
                auth_provider: provider,
                created_by: None,
            })
            .await
            .expect("create user")
    }

    pub async fn create_admin(&self, username: &str) -> User {
        self.create_user(username, Some(ADMIN_PASSWORD), Role::Admin, AuthProvider::Local).await
    }

    pub async fn create_member(&self, username: &str) -> User {
        self.create_user(username, Some(USER_PASSWORD), Role::User, AuthProvider::Local).await
    }

    /// Log in through the API and return the bearer token.
    pub async fn login(&self, username: &str, password: &str) -> String {
        let response = self
            .request(
                Method::POST,
                "/api/auth/login",
                None,
                Some(serde_json::json!({ "username": username, "password": password })),
            )
            .await;
        assert_eq!(response.status(), 200, "login for {} failed", username);
        let body = read_json(response).await;
        body["data"]["token"].as_str().expect("token").to_string()
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json).expect("serialize body")))
                .expect("build request"),
            None => builder.body(Body::empty()).expect("build request"),
        };

        self.router().oneshot(request).await.expect("request")
    }

    /// Store a secret as `token` and return its GUID.
    pub async fn share(&self, token: &str, body: Value) -> String {
        let response = self.request(Method::POST, "/api/passwords", Some(token), Some(body)).await;
        assert_eq!(response.status(), 201);
        let body = read_json(response).await;
        body["data"]["guid"].as_str().expect("guid").to_string()
    }
}

pub async fn read_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}
