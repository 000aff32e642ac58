use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::api::AppState;
use crate::auth::TokenKind;
use crate::domain::User;
use crate::error::AppError;

/// The user named by a valid `Authorization: Bearer <access token>` header.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                AppError::Unauthorized("Authentication credentials were not provided".into())
            })?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Invalid authorization header".into()))?;

        let claims = state
            .tokens
            .decode(token, TokenKind::Access)
            .map_err(|_| AppError::Unauthorized("Given token not valid".into()))?;
        let user_id = claims
            .user_id()
            .map_err(|_| AppError::Unauthorized("Given token not valid".into()))?;

        let user = state
            .repo
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

        Ok(CurrentUser(user))
    }
}
