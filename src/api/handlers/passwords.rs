use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use validator::Validate;

use crate::api::error::ApiError;
use crate::api::handlers::pagination::PaginationQuery;
use crate::api::response::{created, ok, ApiResponse, MessageResponse};
use crate::api::state::AppState;
use crate::auth::middleware::MaybeAuth;
use crate::auth::models::AuthContext;
use crate::crypto::{generate, GenerateOptions, GeneratedPassword};
use crate::domain::{
    CreateSecretRequest, CreatedSecret, Page, RequestOrigin, RetrievedSecret, SecretSummary,
};
use crate::errors::Error;
use crate::services::secret_service::DEFAULT_PAGE_SIZE;

/// `POST /api/passwords/generate`
pub async fn generate_password_handler(
    payload: Result<Json<GenerateOptions>, JsonRejection>,
) -> Result<Json<ApiResponse<GeneratedPassword>>, ApiError> {
    let Json(options) = payload?;
    options.validate().map_err(Error::from)?;

    Ok(ok(generate(&options)?))
}

/// `POST /api/passwords`
pub async fn create_password_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    origin: RequestOrigin,
    payload: Result<Json<CreateSecretRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedSecret>>), ApiError> {
    let Json(request) = payload?;
    let secret = state.secrets.create(&context, request, &origin).await?;
    Ok(created(secret))
}

/// `GET /api/passwords`
pub async fn list_passwords_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    query: Result<Query<PaginationQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Page<SecretSummary>>>, ApiError> {
    let Query(query) = query?;
    let page = query.into_page_request(DEFAULT_PAGE_SIZE)?;

    Ok(ok(state.secrets.list(&context, page).await?))
}

/// `GET /api/passwords/{guid}`. The route layer decides who may call it.
pub async fn retrieve_password_handler(
    State(state): State<AppState>,
    MaybeAuth(context): MaybeAuth,
    origin: RequestOrigin,
    guid: Result<Path<String>, PathRejection>,
) -> Result<Json<ApiResponse<RetrievedSecret>>, ApiError> {
    let Path(guid) = guid?;
    let secret = state.secrets.retrieve(&guid, context.as_ref(), &origin).await?;
    Ok(ok(secret))
}

/// `DELETE /api/passwords/{guid}`
pub async fn delete_password_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    origin: RequestOrigin,
    guid: Result<Path<String>, PathRejection>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let Path(guid) = guid?;
    state.secrets.delete(&context, &guid, &origin).await?;
    Ok(ok(MessageResponse::new("Password deleted successfully")))
}
