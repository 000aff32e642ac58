use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::api::extract::JsonBody;
use crate::api::AppState;
use crate::auth::{CurrentUser, TokenKind};
use crate::db::repo::is_unique_violation;
use crate::domain::{TimeMs, User};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: Option<String>,
    pub otp: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: Option<String>,
    pub otp: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyTokenRequest {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserSummaryDto {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl From<&User> for UserSummaryDto {
    fn from(user: &User) -> Self {
        UserSummaryDto {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserSummaryDto,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
}

/// Trimmed, non-empty field value or a validation error naming the field.
fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{} is required", field)))
}

pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let username = required(req.username, "username")?;
    let email = required(req.email, "email")?;
    let password = req
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::Validation("password is required".into()))?;
    let phone_number = req
        .phone_number
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());

    if state.repo.find_user_by_email(&email).await?.is_some() {
        warn!(email = %email, "Registration rejected: email taken");
        return Err(AppError::Conflict("Email already registered".into()));
    }
    if state.repo.username_taken(&username).await? {
        warn!(username = %username, "Registration rejected: username taken");
        return Err(AppError::Conflict("Username already taken".into()));
    }

    let password_hash = state.passwords.hash(&password)?;
    let is_superuser = state.config.is_superuser_email(&email);

    let user = state
        .repo
        .insert_user(
            &username,
            &email,
            phone_number.as_deref(),
            &password_hash,
            is_superuser,
        )
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Email already registered".into())
            } else {
                AppError::from(e)
            }
        })?;

    info!(user_id = user.id, is_superuser = user.is_superuser, "User registered");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully",
            "user": UserSummaryDto::from(&user),
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let (Some(email), Some(password)) = (req.email, req.password) else {
        return Err(AppError::Validation("Email and password are required".into()));
    };

    let (user, password_hash) = state
        .repo
        .find_credentials_by_email(email.trim())
        .await?
        .ok_or_else(|| AppError::NotFound("Email not found".into()))?;

    if !state.passwords.verify(&password, &password_hash) {
        warn!(user_id = user.id, "Login rejected: bad password");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    let pair = state.tokens.issue_pair(user.id)?;
    info!(user_id = user.id, "User logged in");

    Ok(Json(LoginResponse {
        user: UserSummaryDto::from(&user),
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    }))
}

/// Blacklist the caller's refresh token.
pub async fn logout(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LogoutRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let invalid = || AppError::Validation("Invalid token".into());

    let token = req.refresh_token.ok_or_else(invalid)?;
    let claims = state
        .tokens
        .decode(token.trim(), TokenKind::Refresh)
        .map_err(|_| invalid())?;
    if claims.user_id().map_err(|_| invalid())? != user.id {
        warn!(user_id = user.id, "Logout rejected: token belongs to another user");
        return Err(invalid());
    }

    let newly_blacklisted = state
        .repo
        .blacklist_token(&claims.jti, user.id, claims.expires_at())
        .await?;
    if !newly_blacklisted {
        return Err(invalid());
    }

    if let Err(e) = state.repo.purge_expired_blacklist(TimeMs::now()).await {
        warn!(error = %e, "Failed to purge expired blacklist entries");
    }

    info!(user_id = user.id, "User logged out");
    Ok(Json(json!({"message": "User logged out"})))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ForgotPasswordRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let email = required(req.email, "email")?;
    state.password_reset.issue(&email).await?;
    Ok(Json(json!({"message": "OTP sent to your email"})))
}

pub async fn verify_otp(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<VerifyOtpRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let email = required(req.email, "email")?;
    let otp = required(req.otp, "otp")?;

    let (user, _) = state
        .password_reset
        .verify(&email, &otp, TimeMs::now())
        .await?;

    Ok(Json(json!({
        "message": "OTP verified",
        "user_id": user.id,
    })))
}

pub async fn reset_password(
    CurrentUser(_caller): CurrentUser,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ResetPasswordRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let email = required(req.email, "email")?;
    let otp = required(req.otp, "otp")?;
    let new_password = req
        .new_password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::Validation("new_password is required".into()))?;

    state
        .password_reset
        .reset(&email, &otp, &new_password, TimeMs::now())
        .await?;

    Ok(Json(json!({"message": "Password reset successful"})))
}

/// Exchange a live refresh token for a new access token.
pub async fn refresh_token(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RefreshRequest>,
) -> Result<Json<AccessTokenResponse>, AppError> {
    let invalid = || AppError::Unauthorized("Token is invalid or expired".into());

    let token = req.refresh_token.ok_or_else(invalid)?;
    let claims = state
        .tokens
        .decode(token.trim(), TokenKind::Refresh)
        .map_err(|_| invalid())?;
    if state.repo.is_token_blacklisted(&claims.jti).await? {
        return Err(invalid());
    }
    let user_id = claims.user_id().map_err(|_| invalid())?;
    if state.repo.find_user_by_id(user_id).await?.is_none() {
        return Err(invalid());
    }

    let (access_token, _) = state.tokens.issue(user_id, TokenKind::Access)?;
    Ok(Json(AccessTokenResponse { access_token }))
}

/// 200 for a live token of either kind, 401 otherwise.
pub async fn verify_token(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<VerifyTokenRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let invalid = || AppError::Unauthorized("Token is invalid or expired".into());

    let token = req.token.ok_or_else(invalid)?;
    let claims = state.tokens.verify(token.trim()).map_err(|_| invalid())?;
    if claims.typ == TokenKind::Refresh && state.repo.is_token_blacklisted(&claims.jti).await? {
        return Err(invalid());
    }

    Ok(Json(json!({})))
}
