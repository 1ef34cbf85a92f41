use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, post},
    Extension, Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::api::handlers::{
    create_password_handler, create_user_handler, delete_password_handler, delete_user_handler,
    generate_password_handler, get_user_handler, google_login_handler, health_handler,
    list_logs_handler, list_passwords_handler, list_users_handler, login_handler, logout_handler,
    me_handler, retrieve_password_handler, stats_handler, update_user_handler,
};
use crate::api::rate_limit::{limit_by_client_ip, RateLimiter};
use crate::api::state::AppState;
use crate::auth::middleware::{
    authenticate, authenticate_optional, require_admin, TrustedProxies,
};
use crate::config::{RetrievalAccess, ServerConfig};

fn rate_limited(router: Router<AppState>, limiter: Option<RateLimiter>) -> Router<AppState> {
    match limiter {
        Some(limiter) => {
            router.route_layer(middleware::from_fn_with_state(limiter, limit_by_client_ip))
        }
        None => router,
    }
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if config.cors_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}

/// Build the full application router: `/health` plus everything under `/api`.
pub fn build_router(state: AppState) -> Router {
    let auth_layer = || middleware::from_fn_with_state(state.auth.clone(), authenticate);
    let admin_layer = || middleware::from_fn(require_admin);
    let limits = state.rate_limits.clone();

    let login = rate_limited(
        Router::new()
            .route("/auth/login", post(login_handler))
            .route("/auth/google", post(google_login_handler)),
        limits.login.clone(),
    );

    let public = Router::new()
        .route("/health", get(health_handler))
        .route("/passwords/generate", post(generate_password_handler));

    let authenticated = Router::new()
        .route("/auth/me", get(me_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/passwords", post(create_password_handler).get(list_passwords_handler))
        .route("/passwords/{guid}", delete(delete_password_handler))
        .route_layer(auth_layer());

    let retrieval = Router::new().route("/passwords/{guid}", get(retrieve_password_handler));
    let retrieval = match state.config.sharing.retrieval_access {
        RetrievalAccess::Admin => retrieval.route_layer(admin_layer()).route_layer(auth_layer()),
        RetrievalAccess::Authenticated => retrieval.route_layer(auth_layer()),
        RetrievalAccess::Anonymous => retrieval.route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            authenticate_optional,
        )),
    };
    let retrieval = rate_limited(retrieval, limits.retrieval.clone());

    let admin = Router::new()
        .route("/admin/users", get(list_users_handler).post(create_user_handler))
        .route(
            "/admin/users/{id}",
            get(get_user_handler).put(update_user_handler).delete(delete_user_handler),
        )
        .route("/admin/logs", get(list_logs_handler))
        .route("/admin/stats", get(stats_handler))
        .route_layer(admin_layer())
        .route_layer(auth_layer());

    let api = rate_limited(
        Router::new().merge(login).merge(public).merge(authenticated).merge(retrieval).merge(admin),
        limits.api,
    );

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api)
        .layer(Extension(TrustedProxies::new(state.config.server.trusted_proxies.clone())))
        .layer(DefaultBodyLimit::max(state.config.server.max_body_size))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.server))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_origins_skip_invalid_values() {
        let config = ServerConfig {
            cors_origins: vec!["http://localhost:3000".into(), "bad\norigin".into()],
            ..ServerConfig::default()
        };
        // Building must not panic on the invalid entry
        let _ = cors_layer(&config);
    }
}
