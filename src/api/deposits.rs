use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};

use crate::api::extract::JsonBody;
use crate::api::AppState;
use crate::auth::CurrentUser;
use crate::db::Scope;
use crate::domain::Deposit;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct CreateDepositRequest {
    pub amount: Option<RustDecimal>,
    /// RFC 3339; defaults to now.
    pub deposited_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DepositDto {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub amount: String,
    pub deposited_at: String,
}

impl From<&Deposit> for DepositDto {
    fn from(deposit: &Deposit) -> Self {
        DepositDto {
            id: deposit.id,
            user_id: deposit.user_id,
            username: deposit.username.clone(),
            amount: deposit.amount.to_money_string(),
            deposited_at: deposit.deposited_at.to_rfc3339(),
        }
    }
}

pub async fn list_deposits(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<DepositDto>>, AppError> {
    let deposits = state.repo.list_deposits(Scope::for_user(&user)).await?;
    Ok(Json(deposits.iter().map(DepositDto::from).collect()))
}

pub async fn create_deposit(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateDepositRequest>,
) -> Result<(StatusCode, Json<DepositDto>), AppError> {
    let deposit = state
        .ledger
        .record_deposit(&user, req.amount, req.deposited_at)
        .await?;
    Ok((StatusCode::CREATED, Json(DepositDto::from(&deposit))))
}

pub async fn get_deposit(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DepositDto>, AppError> {
    let deposit = state
        .repo
        .get_deposit(Scope::for_user(&user), id)
        .await?
        .ok_or_else(|| AppError::NotFound("Deposit not found".into()))?;
    Ok(Json(DepositDto::from(&deposit)))
}
