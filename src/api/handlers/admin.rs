//! Administrator endpoints. Every route here sits behind `require_admin`.

use std::str::FromStr;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::handlers::pagination::PaginationQuery;
use crate::api::response::{created, ok, ApiResponse, MessageResponse};
use crate::api::state::AppState;
use crate::auth::models::AuthContext;
use crate::auth::user::{CreateUserRequest, UpdateUserRequest, User};
use crate::domain::{
    AccessLogEntry, AccessLogFilter, AccessStatistics, AccessType, Page, SecretId, UserId,
};
use crate::services::admin_service::DEFAULT_PAGE_SIZE;

/// `GET /api/admin/users`
pub async fn list_users_handler(
    State(state): State<AppState>,
    query: Result<Query<PaginationQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Page<User>>>, ApiError> {
    let Query(query) = query?;
    let page = query.into_page_request(DEFAULT_PAGE_SIZE)?;
    Ok(ok(state.admin.list_users(page).await?))
}

/// `GET /api/admin/users/{id}`
pub async fn get_user_handler(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let Path(id) = id?;
    Ok(ok(state.admin.get_user(&UserId::from_string(id)).await?))
}

/// `POST /api/admin/users`
pub async fn create_user_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<User>>), ApiError> {
    let Json(request) = payload?;
    let user = state.admin.create_user(&context, request).await?;
    Ok(created(user))
}

/// `PUT /api/admin/users/{id}`
pub async fn update_user_handler(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let Path(id) = id?;
    let Json(request) = payload?;
    let user = state.admin.update_user(&UserId::from_string(id), request).await?;
    Ok(ok(user))
}

/// `DELETE /api/admin/users/{id}`
pub async fn delete_user_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let Path(id) = id?;
    state.admin.delete_user(&context, &UserId::from_string(id)).await?;
    Ok(ok(MessageResponse::new("User deleted successfully")))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsQuery {
    pub password_id: Option<String>,
    pub user_id: Option<String>,
    pub access_type: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl LogsQuery {
    fn filter(&self) -> Result<AccessLogFilter, ApiError> {
        let access_type = self
            .access_type
            .as_deref()
            .map(AccessType::from_str)
            .transpose()
            .map_err(|_| ApiError::bad_request("accessType must be 'create', 'view' or 'delete'"))?;

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(ApiError::bad_request("startDate must not be after endDate"));
            }
        }

        Ok(AccessLogFilter {
            password_id: self.password_id.clone().map(SecretId::from_string),
            accessed_by: self.user_id.clone().map(UserId::from_string),
            access_type,
            start: self.start_date,
            end: self.end_date,
        })
    }
}

/// `GET /api/admin/logs`
pub async fn list_logs_handler(
    State(state): State<AppState>,
    query: Result<Query<LogsQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Page<AccessLogEntry>>>, ApiError> {
    let Query(query) = query?;
    let filter = query.filter()?;
    let page = PaginationQuery { page: query.page, limit: query.limit }
        .into_page_request(DEFAULT_PAGE_SIZE)?;

    Ok(ok(state.admin.logs(&filter, page).await?))
}

/// `GET /api/admin/stats`
pub async fn stats_handler(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<AccessStatistics>>, ApiError> {
    Ok(ok(state.admin.statistics(Utc::now()).await?))
}
