use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::extract::JsonBody;
use crate::api::AppState;
use crate::auth::CurrentUser;
use crate::db::repo::{is_unique_violation, UserChanges};
use crate::db::{Repository, Scope};
use crate::domain::{Decimal, User};
use crate::engine::PerformanceStats;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

/// A user together with their trading statistics. Statistics are JSON numbers.
#[derive(Debug, Serialize)]
pub struct UserProfileDto {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub no_of_open_orders: i64,
    pub no_of_closed_orders: i64,
    pub total_no_of_orders: i64,
    pub win_rate: Decimal,
    pub profit_factor: Decimal,
    pub average_profit_loss: Decimal,
    pub average_holding_duration: Decimal,
    pub total_deposits: Decimal,
}

impl UserProfileDto {
    fn build(user: &User, stats: PerformanceStats) -> Self {
        UserProfileDto {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            phone_number: user.phone_number.clone(),
            no_of_open_orders: stats.no_of_open_orders,
            no_of_closed_orders: stats.no_of_closed_orders,
            total_no_of_orders: stats.total_no_of_orders,
            win_rate: stats.win_rate,
            profit_factor: stats.profit_factor,
            average_profit_loss: stats.average_profit_loss,
            average_holding_duration: stats.average_holding_duration,
            total_deposits: stats.total_deposits,
        }
    }
}

/// Statistics as of now, from the current store contents.
pub async fn performance_stats(
    repo: &Repository,
    user_id: i64,
) -> Result<PerformanceStats, sqlx::Error> {
    let trades = repo.trade_aggregates(user_id).await?;
    let orders = repo.order_counts(user_id).await?;
    let total_deposits = repo.sum_deposits(user_id).await?;
    Ok(PerformanceStats::compute(&trades, &orders, total_deposits))
}

async fn profile(repo: &Repository, user: &User) -> Result<UserProfileDto, AppError> {
    let stats = performance_stats(repo, user.id).await?;
    Ok(UserProfileDto::build(user, stats))
}

pub async fn list_users(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserProfileDto>>, AppError> {
    let users = state.repo.list_users(Scope::for_user(&user)).await?;
    let mut profiles = Vec::with_capacity(users.len());
    for u in &users {
        profiles.push(profile(&state.repo, u).await?);
    }
    Ok(Json(profiles))
}

pub async fn me(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<UserProfileDto>, AppError> {
    Ok(Json(profile(&state.repo, &user).await?))
}

pub async fn get_user(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserProfileDto>, AppError> {
    let target = state
        .repo
        .get_user(Scope::for_user(&user), id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(Json(profile(&state.repo, &target).await?))
}

pub async fn update_user(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    JsonBody(req): JsonBody<UpdateUserRequest>,
) -> Result<Json<UserProfileDto>, AppError> {
    if state
        .repo
        .get_user(Scope::for_user(&user), id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound("User not found".into()));
    }

    let trimmed = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let changes = UserChanges {
        username: trimmed(req.username),
        email: trimmed(req.email),
        phone_number: trimmed(req.phone_number),
    };

    let updated = state
        .repo
        .update_user(id, &changes)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Username or email already in use".into())
            } else {
                AppError::from(e)
            }
        })?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    info!(user_id = updated.id, by = user.id, "User updated");
    Ok(Json(profile(&state.repo, &updated).await?))
}

pub async fn delete_user(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if state
        .repo
        .get_user(Scope::for_user(&user), id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound("User not found".into()));
    }
    if !state.repo.delete_user(id).await? {
        return Err(AppError::NotFound("User not found".into()));
    }

    info!(user_id = id, by = user.id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}
