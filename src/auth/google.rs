//! Federated identity verification for Google sign-in.
//!
//! ID tokens are RS256 JWTs signed with one of Google's rotating keys. The
//! key set is fetched from the JWKS endpoint and cached; an unknown `kid`
//! forces a refresh.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::config::AuthConfig;
use crate::errors::{AuthErrorType, PasswordPalError, Result};

const JWKS_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Identity asserted by a verified external token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    /// Lowercased email
    pub email: String,
    /// Provider subject identifier
    pub subject: String,
    pub name: String,
}

/// Verifies an external identity token.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity>;
}

#[derive(Debug, Deserialize)]
struct GoogleClaims {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<serde_json::Value>,
    name: Option<String>,
}

impl GoogleClaims {
    fn email_is_verified(&self) -> bool {
        match &self.email_verified {
            Some(serde_json::Value::Bool(verified)) => *verified,
            Some(serde_json::Value::String(verified)) => verified == "true",
            _ => false,
        }
    }
}

struct CachedKeys {
    fetched_at: Instant,
    keys: JwkSet,
}

pub struct GoogleIdTokenVerifier {
    client: reqwest::Client,
    jwks_url: String,
    client_id: String,
    issuers: Vec<String>,
    cache: RwLock<Option<CachedKeys>>,
}

impl std::fmt::Debug for GoogleIdTokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleIdTokenVerifier")
            .field("jwks_url", &self.jwks_url)
            .field("client_id", &self.client_id)
            .finish()
    }
}

fn invalid_token() -> PasswordPalError {
    PasswordPalError::auth("Invalid Google token", AuthErrorType::InvalidCredentials)
}

impl GoogleIdTokenVerifier {
    pub fn new(client_id: String, jwks_url: String, issuers: Vec<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            jwks_url,
            client_id,
            issuers,
            cache: RwLock::new(None),
        }
    }

    /// `None` when no client id is configured; federated login is then off.
    pub fn from_config(config: &AuthConfig) -> Option<Self> {
        config.google_client_id.as_ref().map(|client_id| {
            Self::new(
                client_id.clone(),
                config.google_jwks_url.clone(),
                config.google_issuers.clone(),
            )
        })
    }

    async fn fetch_keys(&self) -> Result<JwkSet> {
        let response = self
            .client
            .get(&self.jwks_url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PasswordPalError::internal(format!("Failed to fetch Google keys: {}", e)))?;

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| PasswordPalError::internal(format!("Invalid Google key set: {}", e)))
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.fetched_at.elapsed() < JWKS_CACHE_TTL {
                    if let Some(jwk) = cached.keys.find(kid) {
                        return DecodingKey::from_jwk(jwk).map_err(|_| invalid_token());
                    }
                }
            }
        }

        debug!(kid, "Refreshing Google signing keys");
        let keys = self.fetch_keys().await?;
        let key = keys.find(kid).map(DecodingKey::from_jwk);
        *self.cache.write().await = Some(CachedKeys { fetched_at: Instant::now(), keys });

        match key {
            Some(Ok(key)) => Ok(key),
            _ => {
                warn!(kid, "Google token signed with unknown key");
                Err(invalid_token())
            }
        }
    }
}

#[async_trait]
impl IdentityVerifier for GoogleIdTokenVerifier {
    #[instrument(skip(self, id_token), name = "google_verify_id_token")]
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity> {
        let header = decode_header(id_token).map_err(|_| invalid_token())?;
        if header.alg != Algorithm::RS256 {
            return Err(invalid_token());
        }
        let kid = header.kid.ok_or_else(invalid_token)?;
        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.set_issuer(&self.issuers);

        let claims = decode::<GoogleClaims>(id_token, &key, &validation)
            .map_err(|e| {
                warn!(error = %e, "Google token rejected");
                invalid_token()
            })?
            .claims;

        let email = match (&claims.email, claims.email_is_verified()) {
            (Some(email), true) => email.trim().to_lowercase(),
            _ => {
                return Err(PasswordPalError::auth(
                    "Google account email is not verified",
                    AuthErrorType::InvalidCredentials,
                ))
            }
        };

        let name = claims
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

        Ok(VerifiedIdentity { email, subject: claims.sub, name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PRIVATE_KEY: &str = include_str!("../../tests/fixtures/google_test_key.pem");
    const MODULUS: &str = include_str!("../../tests/fixtures/google_test_key.n");
    const CLIENT_ID: &str = "client-123.apps.googleusercontent.com";
    const ISSUER: &str = "https://accounts.google.com";

    async fn verifier_with_keys() -> (MockServer, GoogleIdTokenVerifier) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/certs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "keys": [{
                    "kty": "RSA",
                    "kid": "test-key",
                    "use": "sig",
                    "alg": "RS256",
                    "n": MODULUS.trim(),
                    "e": "AQAB"
                }]
            })))
            .mount(&server)
            .await;

        let verifier = GoogleIdTokenVerifier::new(
            CLIENT_ID.to_string(),
            format!("{}/certs", server.uri()),
            vec![ISSUER.to_string(), "accounts.google.com".to_string()],
        );
        (server, verifier)
    }

    fn sign(claims: serde_json::Value, kid: &str) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        let key = EncodingKey::from_rsa_pem(PRIVATE_KEY.as_bytes()).unwrap();
        encode(&header, &claims, &key).unwrap()
    }

    fn claims(aud: &str, email_verified: bool) -> serde_json::Value {
        let now = chrono::Utc::now().timestamp();
        json!({
            "iss": ISSUER,
            "aud": aud,
            "sub": "1234567890",
            "email": "Jane.Doe@TymeGlobal.com",
            "email_verified": email_verified,
            "iat": now,
            "exp": now + 600
        })
    }

    #[tokio::test]
    async fn verifies_token_signed_by_published_key() {
        let (_server, verifier) = verifier_with_keys().await;
        let identity = verifier.verify(&sign(claims(CLIENT_ID, true), "test-key")).await.unwrap();

        assert_eq!(identity.email, "jane.doe@tymeglobal.com");
        assert_eq!(identity.subject, "1234567890");
        assert_eq!(identity.name, "jane.doe");
    }

    #[tokio::test]
    async fn rejects_wrong_audience_unknown_key_and_unverified_email() {
        let (_server, verifier) = verifier_with_keys().await;

        let wrong_audience = sign(claims("someone-else", true), "test-key");
        assert!(verifier.verify(&wrong_audience).await.is_err());

        let unknown_kid = sign(claims(CLIENT_ID, true), "rotated-away");
        assert!(verifier.verify(&unknown_kid).await.is_err());

        let unverified = sign(claims(CLIENT_ID, false), "test-key");
        assert!(verifier.verify(&unverified).await.is_err());

        assert!(verifier.verify("not-a-jwt").await.is_err());
    }

    #[test]
    fn disabled_without_client_id() {
        let config = AuthConfig { google_client_id: None, ..AuthConfig::default() };
        assert!(GoogleIdTokenVerifier::from_config(&config).is_none());
    }
}
