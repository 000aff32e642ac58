use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::completed_trades::CompletedTradeDto;
use crate::api::extract::JsonBody;
use crate::api::AppState;
use crate::auth::CurrentUser;
use crate::db::Scope;
use crate::domain::primitives::format_date;
use crate::domain::{Order, OrderStatus};
use crate::error::AppError;
use crate::orchestration::{CloseDraft, OrderDraft};

#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderDto {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub stock_id: i64,
    pub symbol: String,
    pub date: String,
    pub quantity: i64,
    pub price: String,
    pub order_type: String,
    pub comment: Option<String>,
    pub status: String,
}

impl From<&Order> for OrderDto {
    fn from(order: &Order) -> Self {
        OrderDto {
            id: order.id,
            user_id: order.user_id,
            username: order.username.clone(),
            stock_id: order.stock_id,
            symbol: order.symbol.as_str().to_string(),
            date: format_date(&order.date),
            quantity: order.quantity,
            price: order.price.to_money_string(),
            order_type: order.order_type.as_str().to_string(),
            comment: order.comment.clone(),
            status: order.status.as_str().to_string(),
        }
    }
}

pub async fn list_orders(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Query(params): Query<OrdersQuery>,
) -> Result<Json<Vec<OrderDto>>, AppError> {
    let status = params
        .status
        .as_deref()
        .map(OrderStatus::from_str)
        .transpose()
        .map_err(AppError::Validation)?;

    let orders = state
        .repo
        .list_orders(Scope::for_user(&user), status)
        .await?;
    Ok(Json(orders.iter().map(OrderDto::from).collect()))
}

pub async fn create_order(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    JsonBody(draft): JsonBody<OrderDraft>,
) -> Result<(StatusCode, Json<OrderDto>), AppError> {
    let order = state.ledger.place_order(&user, draft).await?;
    Ok((StatusCode::CREATED, Json(OrderDto::from(&order))))
}

pub async fn get_order(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<OrderDto>, AppError> {
    let order = state
        .repo
        .get_order(Scope::for_user(&user), id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;
    Ok(Json(OrderDto::from(&order)))
}

pub async fn update_order(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    JsonBody(draft): JsonBody<OrderDraft>,
) -> Result<Json<OrderDto>, AppError> {
    let order = state
        .ledger
        .update_order(Scope::for_user(&user), id, draft)
        .await?;
    Ok(Json(OrderDto::from(&order)))
}

pub async fn delete_order(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.ledger.delete_order(Scope::for_user(&user), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn close_order(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    JsonBody(draft): JsonBody<CloseDraft>,
) -> Result<(StatusCode, Json<CompletedTradeDto>), AppError> {
    let trade = state
        .ledger
        .close_order(Scope::for_user(&user), id, draft)
        .await?;
    Ok((StatusCode::CREATED, Json(CompletedTradeDto::from(&trade))))
}
