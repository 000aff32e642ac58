use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::extract::JsonBody;
use crate::api::AppState;
use crate::auth::CurrentUser;
use crate::db::Scope;
use crate::domain::primitives::format_date;
use crate::domain::CompletedTrade;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct UpdateTradeRequest {
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompletedTradeDto {
    pub id: i64,
    pub order_id: i64,
    pub symbol: String,
    pub order_type: String,
    pub quantity: i64,
    pub open_price: String,
    pub open_date: String,
    pub close_price: String,
    pub close_date: String,
    pub net_amount: String,
    pub duration: i64,
    pub note: Option<String>,
}

impl From<&CompletedTrade> for CompletedTradeDto {
    fn from(trade: &CompletedTrade) -> Self {
        CompletedTradeDto {
            id: trade.id,
            order_id: trade.order_id,
            symbol: trade.symbol.as_str().to_string(),
            order_type: trade.order_type.as_str().to_string(),
            quantity: trade.quantity,
            open_price: trade.open_price.to_money_string(),
            open_date: format_date(&trade.open_date),
            close_price: trade.close_price.to_money_string(),
            close_date: format_date(&trade.close_date),
            net_amount: trade.net_amount.to_money_string(),
            duration: trade.duration,
            note: trade.note.clone(),
        }
    }
}

pub async fn list_trades(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<CompletedTradeDto>>, AppError> {
    let trades = state.repo.list_trades(Scope::for_user(&user)).await?;
    Ok(Json(trades.iter().map(CompletedTradeDto::from).collect()))
}

pub async fn get_trade(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<CompletedTradeDto>, AppError> {
    let trade = state
        .repo
        .get_trade(Scope::for_user(&user), id)
        .await?
        .ok_or_else(|| AppError::NotFound("Completed trade not found".into()))?;
    Ok(Json(CompletedTradeDto::from(&trade)))
}

/// Only the note of a completed trade is editable.
pub async fn update_trade(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    JsonBody(req): JsonBody<UpdateTradeRequest>,
) -> Result<Json<CompletedTradeDto>, AppError> {
    let not_found = || AppError::NotFound("Completed trade not found".into());

    if state
        .repo
        .get_trade(Scope::for_user(&user), id)
        .await?
        .is_none()
    {
        return Err(not_found());
    }

    let note = req.note.filter(|n| !n.trim().is_empty());
    let trade = state
        .repo
        .update_trade_note(id, note.as_deref())
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(CompletedTradeDto::from(&trade)))
}

/// Deleting a completed trade reopens its order.
pub async fn delete_trade(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.ledger.reopen_trade(Scope::for_user(&user), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
