//! Axum middleware and extractors for authentication and authorization.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, Extension, FromRequestParts, State},
    http::{header::AUTHORIZATION, header::USER_AGENT, request::Parts, Extensions, HeaderMap, Method, Request},
    middleware::Next,
    response::Response,
};
use tracing::{field, info_span, warn};

use crate::api::error::ApiError;
use crate::auth::auth_service::AuthService;
use crate::auth::authorization::authorize_admin;
use crate::auth::models::AuthContext;
use crate::domain::RequestOrigin;

pub type AuthServiceState = Arc<AuthService>;

const MAX_USER_AGENT_LEN: usize = 512;

fn authorization_header(request: &Request<Body>) -> Option<&str> {
    request.headers().get(AUTHORIZATION).and_then(|value| value.to_str().ok())
}

/// Reject requests without a valid bearer token; attach the [`AuthContext`]
/// otherwise.
pub async fn authenticate(
    State(auth_service): State<AuthServiceState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if request.method() == Method::OPTIONS {
        return Ok(next.run(request).await);
    }

    let correlation_id = uuid::Uuid::new_v4();
    let span = info_span!(
        "auth_middleware.authenticate",
        http.method = %request.method(),
        http.path = %request.uri().path(),
        auth.user_id = field::Empty,
        correlation_id = %correlation_id
    );

    let result = span.in_scope(|| auth_service.authenticate(authorization_header(&request)));
    match result {
        Ok(context) => {
            span.record("auth.user_id", field::display(&context.user_id));
            request.extensions_mut().insert(context);
            Ok(next.run(request).await)
        }
        Err(err) => {
            warn!(%correlation_id, error = %err, "authentication failed");
            Err(ApiError::from(err))
        }
    }
}

/// Attach an [`AuthContext`] when a valid token is present; never rejects.
pub async fn authenticate_optional(
    State(auth_service): State<AuthServiceState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(context) = auth_service.authenticate_optional(authorization_header(&request)) {
        request.extensions_mut().insert(context);
    }
    next.run(request).await
}

/// Must run after [`authenticate`].
pub async fn require_admin(
    Extension(context): Extension<AuthContext>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if let Err(err) = authorize_admin(&context) {
        warn!(
            user_id = %context.user_id,
            http.path = %request.uri().path(),
            "admin check failed"
        );
        return Err(ApiError::from(err));
    }

    Ok(next.run(request).await)
}

/// Identity attached by [`authenticate_optional`], if any.
#[derive(Debug, Clone)]
pub struct MaybeAuth(pub Option<AuthContext>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeAuth {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuth(parts.extensions.get::<AuthContext>().cloned()))
    }
}

/// Proxies allowed to report the client address. The router attaches this
/// to every request as an extension.
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies(Arc<Vec<IpAddr>>);

impl TrustedProxies {
    pub fn new(proxies: Vec<IpAddr>) -> Self {
        Self(Arc::new(proxies))
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.0.contains(ip)
    }
}

fn forwarded_client(headers: &HeaderMap) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse::<IpAddr>().ok());

    forwarded.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    })
}

/// Client address: the socket peer, or the first `X-Forwarded-For` hop
/// (then `X-Real-IP`) when the peer is a trusted proxy.
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> Option<String> {
    let peer = extensions.get::<ConnectInfo<SocketAddr>>().map(|ConnectInfo(addr)| addr.ip());

    let behind_trusted_proxy = match (peer, extensions.get::<TrustedProxies>()) {
        (Some(peer), Some(proxies)) => proxies.contains(&peer),
        _ => false,
    };

    if behind_trusted_proxy {
        if let Some(forwarded) = forwarded_client(headers) {
            return Some(forwarded.to_string());
        }
    }

    peer.map(|ip| ip.to_string())
}

impl<S: Send + Sync> FromRequestParts<S> for RequestOrigin {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.chars().take(MAX_USER_AGENT_LEN).collect::<String>());

        Ok(RequestOrigin { ip_address: client_ip(&parts.headers, &parts.extensions), user_agent })
    }
}
