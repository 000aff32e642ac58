use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::{PasswordError, TokenError};
use crate::config::ConfigError;
use crate::orchestration::{LedgerError, ResetError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Authentication error: {0}")]
    Unauthorized(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl AppError {
    /// Stable classification reported alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) | AppError::Internal(_) => "internal",
            AppError::NotFound(_) => "not_found",
            AppError::Validation(_) => "validation",
            AppError::Unauthorized(_) => "authentication",
            AppError::Conflict(_) => "conflict",
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation(msg) => AppError::Validation(msg),
            LedgerError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            LedgerError::Db(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<ResetError> for AppError {
    fn from(err: ResetError) -> Self {
        match err {
            ResetError::UserNotFound => {
                AppError::NotFound("User with this email does not exist".to_string())
            }
            ResetError::InvalidCode => AppError::Validation("Invalid OTP".to_string()),
            ResetError::Expired => AppError::Validation("OTP has expired".to_string()),
            ResetError::Validation(msg) => AppError::Validation(msg),
            ResetError::Password(e) => AppError::Internal(e.to_string()),
            ResetError::Mail(e) => AppError::Internal(e.to_string()),
            ResetError::Db(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Encode(e) => AppError::Internal(e.to_string()),
            TokenError::Invalid | TokenError::WrongKind { .. } => {
                AppError::Unauthorized("Given token not valid".to_string())
            }
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let (status, error_message) = match self {
            AppError::Config(msg) | AppError::Internal(msg) => {
                tracing::error!(error = %msg, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            // Duplicate registrations are reported as 400 like other bad input.
            AppError::Conflict(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(json!({
            "error": error_message,
            "kind": kind,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let (status, body) = render(AppError::Validation("bad".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad");
        assert_eq!(body["kind"], "validation");

        let (status, body) = render(AppError::Conflict("Email already registered".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "conflict");

        let (status, _) = render(AppError::NotFound("x".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = render(AppError::Unauthorized("x".into())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_service_errors_map_to_taxonomy() {
        let (status, body) = render(LedgerError::NotFound("Order").into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Order not found");

        let (status, body) = render(ResetError::Expired.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "OTP has expired");

        let (status, _) = render(ResetError::UserNotFound.into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = render(TokenError::Invalid.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_internal_details_are_not_leaked() {
        let (status, body) = render(AppError::Internal("disk I/O error".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(body["kind"], "internal");
    }
}
