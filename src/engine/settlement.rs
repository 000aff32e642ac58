//! Settlement arithmetic for closing an order.

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{Decimal, Order};
use crate::engine::position::bounded;
use crate::engine::PositionDelta;

/// Result of closing an order at a price and date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    /// `(close_price - price) × quantity`.
    pub net_amount: Decimal,
    /// Whole days between the order date and the close date.
    pub duration: i64,
    /// Delta that removes the order's contribution from its position.
    pub position_delta: PositionDelta,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    #[error("Order is already closed.")]
    AlreadyClosed,
    #[error("Close date cannot be before order date.")]
    CloseBeforeOpen,
    #[error("Net amount of the close is out of range.")]
    AmountOutOfRange,
}

/// Compute the settlement of `order` closed at `close_price` on `close_date`.
///
/// The P/L formula is the same for buy and sell orders.
pub fn settle(
    order: &Order,
    close_price: Decimal,
    close_date: NaiveDate,
) -> Result<Settlement, SettlementError> {
    if !order.is_open() {
        return Err(SettlementError::AlreadyClosed);
    }

    let duration = (close_date - order.date).num_days();
    if duration < 0 {
        return Err(SettlementError::CloseBeforeOpen);
    }

    let net_amount = bounded(
        close_price
            .checked_sub(order.price)
            .and_then(|diff| diff.checked_mul(Decimal::from(order.quantity))),
    )
    .map_err(|_| SettlementError::AmountOutOfRange)?;
    let position_delta = PositionDelta::opening(order.quantity, order.price, order.order_type)
        .map_err(|_| SettlementError::AmountOutOfRange)?
        .reversed();

    Ok(Settlement {
        net_amount,
        duration,
        position_delta,
    })
}
