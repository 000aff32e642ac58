//! Deposit ledger event.

use crate::domain::{Decimal, TimeMs};
use serde::{Deserialize, Serialize};

/// A cash deposit into a user's account. Deposits are append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    pub id: i64,
    pub user_id: i64,
    /// Owner's username, joined for display.
    pub username: String,
    /// Always positive, two fractional digits.
    pub amount: Decimal,
    pub deposited_at: TimeMs,
}
