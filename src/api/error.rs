use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::{error, warn};

use crate::api::response::ApiResponse;
use crate::auth::models::AuthError;
use crate::errors::Error;

const INTERNAL_MESSAGE: &str = "Internal server error";

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Gone(String),
    TooManyRequests { message: String, retry_after_secs: u32 },
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Gone(_) => StatusCode::GONE,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn bad_request<S: Into<String>>(msg: S) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn unauthorized<S: Into<String>>(msg: S) -> Self {
        ApiError::Unauthorized(msg.into())
    }

    pub fn forbidden<S: Into<String>>(msg: S) -> Self {
        ApiError::Forbidden(msg.into())
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn too_many_requests(retry_after_secs: u32) -> Self {
        ApiError::TooManyRequests {
            message: "Too many requests, please try again later".to_string(),
            retry_after_secs,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();

        let (message, retry_after) = match self {
            ApiError::TooManyRequests { message, retry_after_secs } => {
                (message, Some(retry_after_secs))
            }
            ApiError::Internal(_) => (INTERNAL_MESSAGE.to_string(), None),
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::Gone(msg) => (msg, None),
        };

        let mut response = (status, Json(ApiResponse::<()>::failure(message))).into_response();
        if let Some(seconds) = retry_after {
            response.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation { message, .. } => ApiError::BadRequest(message),
            Error::Auth { message, .. } => ApiError::Unauthorized(message),
            Error::Forbidden { message } => ApiError::Forbidden(message),
            Error::NotFound { resource_type, .. } => {
                ApiError::NotFound(format!("{} not found", resource_type))
            }
            Error::Gone { reason } => ApiError::Gone(reason.to_string()),
            Error::Conflict { message, .. } => ApiError::Conflict(message),
            err @ (Error::Config { .. }
            | Error::Database { .. }
            | Error::Io { .. }
            | Error::Serialization { .. }
            | Error::Crypto { .. }
            | Error::Internal { .. }) => {
                error!(error = %err, source = ?std::error::Error::source(&err), "request failed");
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingBearer
            | AuthError::MalformedBearer
            | AuthError::InvalidToken
            | AuthError::ExpiredToken => ApiError::Unauthorized(err.to_string()),
            AuthError::Forbidden => ApiError::Forbidden(err.to_string()),
            AuthError::Persistence(inner) => ApiError::from(inner),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(error = %rejection.body_text(), "rejected request body");
        ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(format!("Invalid query parameters: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(format!("Invalid path parameter: {}", rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::GoneReason;
    use axum::body::to_bytes;

    async fn render(err: ApiError) -> (StatusCode, axum::http::HeaderMap, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn internal_detail_is_hidden() {
        let (status, _, body) =
            render(ApiError::from(Error::crypto("tag mismatch for nonce 00ff"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn gone_uses_reason_message() {
        let (status, _, body) =
            render(ApiError::from(Error::gone(GoneReason::AccessLimitReached))).await;
        assert_eq!(status, StatusCode::GONE);
        assert_eq!(body["error"], "This password has reached its access limit");
    }

    #[tokio::test]
    async fn not_found_names_resource_only() {
        let (status, _, body) = render(ApiError::from(Error::not_found("Password", "abc"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Password not found");
    }

    #[tokio::test]
    async fn rate_limit_sets_retry_after() {
        let (status, headers, body) = render(ApiError::too_many_requests(42)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(headers.get(header::RETRY_AFTER).unwrap(), "42");
        assert_eq!(body["success"], false);
    }

    #[test]
    fn auth_errors_map_to_statuses() {
        assert_eq!(ApiError::from(AuthError::MissingBearer).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::from(AuthError::Forbidden).status_code(), StatusCode::FORBIDDEN);
    }
}
