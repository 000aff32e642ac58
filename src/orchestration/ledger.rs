//! Order placement, revision, closing and reopening.
//!
//! The ledger validates caller input, asks the engine for the position and
//! settlement arithmetic, and hands the result to a single repository
//! transaction.

use chrono::NaiveDate;
use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::db::repo::is_check_violation;
use crate::db::{ClosePlan, OrderRevision, Repository, Scope};
use crate::domain::primitives::parse_date;
use crate::domain::{
    CompletedTrade, Decimal, Deposit, NewOrder, Order, OrderChanges, OrderType, Symbol, TimeMs,
    User,
};
use crate::engine::{settle, AmountOutOfRange, PositionDelta};

/// Largest accepted price or deposit: ten integer digits and two decimals.
pub const MAX_MONEY_CENTS: i64 = 9_999_999_999;

/// Largest accepted order quantity.
pub const MAX_QUANTITY: i64 = i32::MAX as i64;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("database error: {0}")]
    Db(sqlx::Error),
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        if is_check_violation(&err) {
            LedgerError::Validation("Resulting position is out of range.".to_string())
        } else {
            LedgerError::Db(err)
        }
    }
}

impl From<AmountOutOfRange> for LedgerError {
    fn from(_: AmountOutOfRange) -> Self {
        LedgerError::Validation("price × quantity is out of range".to_string())
    }
}

/// Unvalidated order fields as received from a client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderDraft {
    pub symbol: Option<String>,
    pub date: Option<String>,
    #[serde(default, deserialize_with = "integer_or_string")]
    pub quantity: Option<i64>,
    pub price: Option<RustDecimal>,
    pub order_type: Option<String>,
    pub comment: Option<String>,
}

/// Unvalidated close request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloseDraft {
    pub close_price: Option<RustDecimal>,
    pub close_date: Option<String>,
    pub note: Option<String>,
}

pub struct Ledger {
    repo: Arc<Repository>,
}

impl Ledger {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    /// Record a new open order for `user` and add it to their position.
    pub async fn place_order(&self, user: &User, draft: OrderDraft) -> Result<Order, LedgerError> {
        let order = validate_new_order(draft)?;
        let delta = PositionDelta::opening(order.quantity, order.price, order.order_type)?;

        let placed = self.repo.place_order_atomic(user.id, &order, delta).await?;
        info!(
            user_id = user.id,
            order_id = placed.id,
            symbol = %placed.symbol.as_str(),
            order_type = %placed.order_type,
            quantity = placed.quantity,
            price = %placed.price,
            "Order placed"
        );
        Ok(placed)
    }

    /// Change an order's fields.
    ///
    /// An open order's old contribution is swapped for the new one in its
    /// position. A closed order only accepts a new comment.
    pub async fn update_order(
        &self,
        scope: Scope,
        order_id: i64,
        draft: OrderDraft,
    ) -> Result<Order, LedgerError> {
        if self.repo.get_order(scope, order_id).await?.is_none() {
            return Err(LedgerError::NotFound("Order"));
        }
        let changes = validate_changes(draft)?;

        let updated = self
            .repo
            .update_order_atomic::<_, LedgerError>(order_id, |current| {
                if !current.is_open() && changes.touches_terms() {
                    return Err(LedgerError::Validation(
                        "Only the comment of a closed order can be changed.".to_string(),
                    ));
                }
                let updated = changes.apply_to(current);
                let position_delta = if current.is_open() {
                    PositionDelta::opening(updated.quantity, updated.price, updated.order_type)?
                        .combine(
                            &PositionDelta::opening(
                                current.quantity,
                                current.price,
                                current.order_type,
                            )?
                            .reversed(),
                        )
                } else {
                    PositionDelta::default()
                };
                Ok(OrderRevision {
                    updated,
                    position_delta,
                })
            })
            .await?
            .ok_or(LedgerError::NotFound("Order"))?;

        info!(user_id = updated.user_id, order_id = updated.id, "Order updated");
        Ok(updated)
    }

    /// Delete an order. An open order's contribution leaves its position; a
    /// closed order takes its completed trade with it.
    pub async fn delete_order(&self, scope: Scope, order_id: i64) -> Result<Order, LedgerError> {
        if self.repo.get_order(scope, order_id).await?.is_none() {
            return Err(LedgerError::NotFound("Order"));
        }

        let deleted = self
            .repo
            .delete_order_atomic::<_, LedgerError>(order_id, |current| {
                if current.is_open() {
                    Ok(
                        PositionDelta::opening(current.quantity, current.price, current.order_type)?
                            .reversed(),
                    )
                } else {
                    Ok(PositionDelta::default())
                }
            })
            .await?
            .ok_or(LedgerError::NotFound("Order"))?;

        info!(
            user_id = deleted.user_id,
            order_id = deleted.id,
            status = %deleted.status,
            "Order deleted"
        );
        Ok(deleted)
    }

    /// Close an open order, recording its completed trade and removing its
    /// contribution from the position.
    pub async fn close_order(
        &self,
        scope: Scope,
        order_id: i64,
        draft: CloseDraft,
    ) -> Result<CompletedTrade, LedgerError> {
        let (Some(close_price), Some(close_date)) = (draft.close_price, draft.close_date) else {
            return Err(LedgerError::Validation(
                "close_price and close_date are required".to_string(),
            ));
        };
        let close_price = money("close_price", close_price)?;
        let close_date = date("close_date", &close_date)?;
        let note = non_blank(draft.note);

        if self.repo.get_order(scope, order_id).await?.is_none() {
            return Err(LedgerError::NotFound("Order"));
        }

        let trade = self
            .repo
            .close_order_atomic::<_, LedgerError>(order_id, |order| {
                let settlement = settle(order, close_price, close_date).map_err(|e| {
                    warn!(order_id = order.id, error = %e, "Close rejected");
                    LedgerError::Validation(e.to_string())
                })?;
                Ok(ClosePlan {
                    close_price,
                    close_date,
                    note,
                    settlement,
                })
            })
            .await?
            .ok_or(LedgerError::NotFound("Order"))?;

        info!(
            user_id = trade.user_id,
            order_id = trade.order_id,
            trade_id = trade.id,
            symbol = %trade.symbol.as_str(),
            net_amount = %trade.net_amount,
            duration = trade.duration,
            "Order closed"
        );
        Ok(trade)
    }

    /// Delete a completed trade and reopen its order. The position is not
    /// touched.
    pub async fn reopen_trade(&self, scope: Scope, trade_id: i64) -> Result<Order, LedgerError> {
        if self.repo.get_trade(scope, trade_id).await?.is_none() {
            return Err(LedgerError::NotFound("Completed trade"));
        }

        let reopened = self
            .repo
            .reopen_trade_atomic(trade_id)
            .await?
            .ok_or(LedgerError::NotFound("Completed trade"))?;

        info!(
            user_id = reopened.user_id,
            order_id = reopened.id,
            trade_id = trade_id,
            "Order reopened"
        );
        Ok(reopened)
    }

    /// Append a deposit for `user`. Without a timestamp the deposit is dated now.
    pub async fn record_deposit(
        &self,
        user: &User,
        amount: Option<RustDecimal>,
        deposited_at: Option<String>,
    ) -> Result<Deposit, LedgerError> {
        let amount = amount
            .ok_or_else(|| LedgerError::Validation("amount is required".to_string()))
            .and_then(|a| money("amount", a))?;
        let deposited_at = match deposited_at {
            None => TimeMs::now(),
            Some(raw) => chrono::DateTime::parse_from_rfc3339(raw.trim())
                .map(|dt| TimeMs::from(dt.with_timezone(&chrono::Utc)))
                .map_err(|_| {
                    LedgerError::Validation("deposited_at must be an RFC 3339 timestamp".to_string())
                })?,
        };

        let deposit = self.repo.insert_deposit(user.id, amount, deposited_at).await?;
        info!(
            user_id = user.id,
            deposit_id = deposit.id,
            amount = %deposit.amount,
            "Deposit recorded"
        );
        Ok(deposit)
    }
}

// =============================================================================
// Input validation
// =============================================================================

fn validate_new_order(draft: OrderDraft) -> Result<NewOrder, LedgerError> {
    let symbol = draft.symbol.ok_or_else(|| required("symbol"))?;
    let date_raw = draft.date.ok_or_else(|| required("date"))?;
    let quantity = draft.quantity.ok_or_else(|| required("quantity"))?;
    let price = draft.price.ok_or_else(|| required("price"))?;
    let order_type = draft.order_type.ok_or_else(|| required("order_type"))?;

    Ok(NewOrder {
        symbol: Symbol::from_str(&symbol)
            .map_err(|e| LedgerError::Validation(format!("symbol: {}", e)))?,
        date: date("date", &date_raw)?,
        quantity: positive_quantity(quantity)?,
        price: money("price", price)?,
        order_type: order_type_field(&order_type)?,
        comment: non_blank(draft.comment),
    })
}

fn validate_changes(draft: OrderDraft) -> Result<OrderChanges, LedgerError> {
    if draft.symbol.is_some() {
        return Err(LedgerError::Validation(
            "The symbol of an order cannot be changed.".to_string(),
        ));
    }
    Ok(OrderChanges {
        date: draft.date.as_deref().map(|d| date("date", d)).transpose()?,
        quantity: draft.quantity.map(positive_quantity).transpose()?,
        price: draft.price.map(|p| money("price", p)).transpose()?,
        order_type: draft
            .order_type
            .as_deref()
            .map(order_type_field)
            .transpose()?,
        comment: draft.comment,
    })
}

fn required(field: &str) -> LedgerError {
    LedgerError::Validation(format!("{} is required", field))
}

/// A positive amount with at most two fractional digits.
pub(crate) fn money(field: &str, value: RustDecimal) -> Result<Decimal, LedgerError> {
    let value = Decimal::from(value);
    if !value.is_positive() {
        return Err(LedgerError::Validation(format!(
            "{} must be greater than zero",
            field
        )));
    }
    match value.to_cents() {
        None if value.round_dp(2) != value => Err(LedgerError::Validation(format!(
            "{} must have at most two decimal places",
            field
        ))),
        Some(cents) if cents <= MAX_MONEY_CENTS => Ok(value),
        _ => Err(LedgerError::Validation(format!(
            "{} must be at most {}",
            field,
            Decimal::from_cents(MAX_MONEY_CENTS).to_money_string()
        ))),
    }
}

fn positive_quantity(quantity: i64) -> Result<i64, LedgerError> {
    if quantity <= 0 {
        return Err(LedgerError::Validation(
            "quantity must be a positive integer".to_string(),
        ));
    }
    if quantity > MAX_QUANTITY {
        return Err(LedgerError::Validation(format!(
            "quantity must be at most {}",
            MAX_QUANTITY
        )));
    }
    Ok(quantity)
}

fn date(field: &str, raw: &str) -> Result<NaiveDate, LedgerError> {
    parse_date(raw.trim())
        .map_err(|_| LedgerError::Validation(format!("{} must be a date in YYYY-MM-DD format", field)))
}

fn order_type_field(raw: &str) -> Result<OrderType, LedgerError> {
    OrderType::from_str(raw.trim()).map_err(LedgerError::Validation)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Form clients post integers as strings; accept both.
fn integer_or_string<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Str(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Int(n)) => Ok(Some(n)),
        Some(Raw::Str(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("expected an integer, got {:?}", s))),
    }
}
