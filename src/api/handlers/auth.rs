use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use tracing::info;
use validator::Validate;

use crate::api::error::ApiError;
use crate::api::response::{ok, ApiResponse, MessageResponse};
use crate::api::state::AppState;
use crate::auth::login_service::LoginOutcome;
use crate::auth::models::AuthContext;
use crate::auth::user::{GoogleLoginRequest, LoginRequest, UserProfile};
use crate::errors::Error;

/// `POST /api/auth/login`
pub async fn login_handler(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<LoginOutcome>>, ApiError> {
    let Json(request) = payload?;
    request.validate().map_err(Error::from)?;

    let outcome = state.logins.login(&request).await?;
    Ok(ok(outcome))
}

/// `POST /api/auth/google`
pub async fn google_login_handler(
    State(state): State<AppState>,
    payload: Result<Json<GoogleLoginRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<LoginOutcome>>, ApiError> {
    let Json(request) = payload?;
    request.validate().map_err(Error::from)?;

    let outcome = state.logins.login_with_federated_identity(&request.id_token).await?;
    Ok(ok(outcome))
}

/// `GET /api/auth/me`
pub async fn me_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    let profile = state.logins.current_user(&context).await?;
    Ok(ok(profile))
}

/// `POST /api/auth/logout`. Tokens are stateless; the client discards it.
pub async fn logout_handler(
    Extension(context): Extension<AuthContext>,
) -> Json<ApiResponse<MessageResponse>> {
    info!(user_id = %context.user_id, "User logged out");
    ok(MessageResponse::new("Logged out successfully"))
}
