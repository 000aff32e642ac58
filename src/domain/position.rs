//! Running position per (user, stock).

use serde::{Deserialize, Serialize};

use crate::domain::{Decimal, Symbol, TimeMs};

/// Accumulated (quantity, total_value) for one user and stock.
///
/// A zero quantity means "no active position"; such rows are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub id: i64,
    pub user_id: i64,
    pub stock_id: i64,
    pub symbol: Symbol,
    pub quantity: i64,
    pub total_value: Decimal,
    pub last_updated: TimeMs,
}

impl OpenPosition {
    pub fn is_active(&self) -> bool {
        self.quantity > 0
    }
}
