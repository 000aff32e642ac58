use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::api::AppState;
use crate::auth::CurrentUser;
use crate::db::Scope;
use crate::domain::OpenPosition;
use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct OpenPositionDto {
    pub id: i64,
    pub stock_id: i64,
    pub symbol: String,
    pub quantity: i64,
    pub total_value: String,
}

impl From<&OpenPosition> for OpenPositionDto {
    fn from(position: &OpenPosition) -> Self {
        OpenPositionDto {
            id: position.id,
            stock_id: position.stock_id,
            symbol: position.symbol.as_str().to_string(),
            quantity: position.quantity,
            total_value: position.total_value.to_money_string(),
        }
    }
}

// Superusers see every row, including drained ones; everyone else sees
// their positions with a positive quantity.
pub async fn list_positions(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<OpenPositionDto>>, AppError> {
    let positions = state
        .repo
        .list_positions(Scope::for_user(&user), !user.is_superuser)
        .await?;
    Ok(Json(positions.iter().map(OpenPositionDto::from).collect()))
}

pub async fn get_position(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<OpenPositionDto>, AppError> {
    let position = state
        .repo
        .get_position(Scope::for_user(&user), id, !user.is_superuser)
        .await?
        .ok_or_else(|| AppError::NotFound("Open position not found".into()))?;
    Ok(Json(OpenPositionDto::from(&position)))
}
