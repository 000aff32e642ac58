//! Position accumulation for orders placed and closed.

use thiserror::Error;

use crate::domain::{Decimal, OrderType};

/// Largest order notional or trade net amount, in cents (10 trillion).
pub const MAX_AMOUNT_CENTS: i64 = 1_000_000_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("amount exceeds the supported range")]
pub struct AmountOutOfRange;

/// `value`, if it is a whole number of cents within `MAX_AMOUNT_CENTS`.
pub fn bounded(value: Option<Decimal>) -> Result<Decimal, AmountOutOfRange> {
    value
        .filter(|v| {
            v.to_cents()
                .is_some_and(|c| c.checked_abs().is_some_and(|a| a <= MAX_AMOUNT_CENTS))
        })
        .ok_or(AmountOutOfRange)
}

/// A change to apply to one (user, stock) position row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PositionDelta {
    pub quantity: i64,
    pub total_value: Decimal,
}

impl PositionDelta {
    /// Contribution of a newly placed order.
    ///
    /// Buy and sell orders both add `+quantity` and `+price × quantity`;
    /// the ledger does not sign contributions by order type.
    pub fn opening(
        quantity: i64,
        price: Decimal,
        _order_type: OrderType,
    ) -> Result<Self, AmountOutOfRange> {
        Ok(PositionDelta {
            quantity,
            total_value: bounded(price.checked_mul(Decimal::from(quantity)))?,
        })
    }

    /// The delta that cancels this one.
    pub fn reversed(&self) -> Self {
        PositionDelta {
            quantity: -self.quantity,
            total_value: -self.total_value,
        }
    }

    /// Sum of two deltas.
    pub fn combine(&self, other: &PositionDelta) -> Self {
        PositionDelta {
            quantity: self.quantity + other.quantity,
            total_value: self.total_value + other.total_value,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.quantity == 0 && self.total_value.is_zero()
    }

    /// Apply the delta to an in-memory `(quantity, total_value)` pair.
    pub fn apply(&self, quantity: i64, total_value: Decimal) -> (i64, Decimal) {
        (quantity + self.quantity, total_value + self.total_value)
    }
}
