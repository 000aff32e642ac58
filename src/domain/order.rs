//! Buy/sell orders recorded against a stock symbol.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{Decimal, OrderStatus, OrderType, Symbol};

/// A persisted order, joined with its owner's username and stock symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub stock_id: i64,
    pub symbol: Symbol,
    pub date: NaiveDate,
    pub quantity: i64,
    pub price: Decimal,
    pub order_type: OrderType,
    pub comment: Option<String>,
    pub status: OrderStatus,
}

impl Order {
    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Open
    }

    /// Cost basis of the order: price × quantity.
    pub fn notional(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Validated input for placing an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub symbol: Symbol,
    pub date: NaiveDate,
    pub quantity: i64,
    pub price: Decimal,
    pub order_type: OrderType,
    pub comment: Option<String>,
}

/// Validated partial update of an order. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderChanges {
    pub date: Option<NaiveDate>,
    pub quantity: Option<i64>,
    pub price: Option<Decimal>,
    pub order_type: Option<OrderType>,
    pub comment: Option<String>,
}

impl OrderChanges {
    /// True when the change touches a field that feeds the position ledger
    /// or the settlement of a completed trade.
    pub fn touches_terms(&self) -> bool {
        self.date.is_some()
            || self.quantity.is_some()
            || self.price.is_some()
            || self.order_type.is_some()
    }

    /// Apply the change set to an order, returning the updated copy.
    pub fn apply_to(&self, order: &Order) -> Order {
        let mut updated = order.clone();
        if let Some(date) = self.date {
            updated.date = date;
        }
        if let Some(quantity) = self.quantity {
            updated.quantity = quantity;
        }
        if let Some(price) = self.price {
            updated.price = price;
        }
        if let Some(order_type) = self.order_type {
            updated.order_type = order_type;
        }
        if let Some(comment) = &self.comment {
            updated.comment = Some(comment.clone());
        }
        updated
    }
}
