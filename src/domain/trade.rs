//! Completed trade produced by closing an order.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{Decimal, OrderType, Symbol};

/// The settlement record of a closed order, joined with the fields of the
/// originating order that responses flatten in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedTrade {
    pub id: i64,
    pub order_id: i64,
    pub user_id: i64,
    pub symbol: Symbol,
    pub order_type: OrderType,
    pub quantity: i64,
    pub open_price: Decimal,
    pub open_date: NaiveDate,
    pub close_price: Decimal,
    pub close_date: NaiveDate,
    /// Signed: profit positive, loss negative.
    pub net_amount: Decimal,
    /// Holding period in whole days, never negative.
    pub duration: i64,
    pub note: Option<String>,
}
