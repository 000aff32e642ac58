//! Performance statistics over a user's completed trades.

use serde::Serialize;

use crate::domain::Decimal;

const STAT_DP: u32 = 2;

/// Sums over a user's completed trades, as aggregated by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TradeAggregates {
    pub trade_count: i64,
    pub winning_count: i64,
    /// Sum of positive net amounts.
    pub gross_profit: Decimal,
    /// Sum of negative net amounts (zero or negative).
    pub gross_loss: Decimal,
    /// Sum of all net amounts.
    pub net_total: Decimal,
    /// Sum of holding durations in days.
    pub total_duration: i64,
}

/// Order counts for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrderCounts {
    pub open: i64,
    pub closed: i64,
}

impl OrderCounts {
    pub fn total(&self) -> i64 {
        self.open + self.closed
    }
}

/// Derived profile metrics, each rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PerformanceStats {
    pub no_of_open_orders: i64,
    pub no_of_closed_orders: i64,
    pub total_no_of_orders: i64,
    pub win_rate: Decimal,
    pub profit_factor: Decimal,
    pub average_profit_loss: Decimal,
    pub average_holding_duration: Decimal,
    pub total_deposits: Decimal,
}

impl PerformanceStats {
    pub fn compute(trades: &TradeAggregates, orders: &OrderCounts, total_deposits: Decimal) -> Self {
        PerformanceStats {
            no_of_open_orders: orders.open,
            no_of_closed_orders: orders.closed,
            total_no_of_orders: orders.total(),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            average_profit_loss: average_profit_loss(trades),
            average_holding_duration: average_holding_duration(trades),
            total_deposits: total_deposits.round_dp(STAT_DP),
        }
    }
}

/// Percentage of completed trades with a positive net amount.
pub fn win_rate(trades: &TradeAggregates) -> Decimal {
    if trades.trade_count == 0 {
        return Decimal::zero();
    }
    let ratio = Decimal::from(trades.winning_count) / Decimal::from(trades.trade_count);
    (ratio * Decimal::hundred()).round_dp(STAT_DP)
}

/// Gross profit over the magnitude of gross loss.
///
/// Zero when there are no losing trades, including when every trade won.
pub fn profit_factor(trades: &TradeAggregates) -> Decimal {
    if trades.gross_loss.is_zero() {
        return Decimal::zero();
    }
    (trades.gross_profit / trades.gross_loss.abs()).round_dp(STAT_DP)
}

pub fn average_profit_loss(trades: &TradeAggregates) -> Decimal {
    if trades.trade_count == 0 {
        return Decimal::zero();
    }
    (trades.net_total / Decimal::from(trades.trade_count)).round_dp(STAT_DP)
}

pub fn average_holding_duration(trades: &TradeAggregates) -> Decimal {
    if trades.trade_count == 0 {
        return Decimal::zero();
    }
    (Decimal::from(trades.total_duration) / Decimal::from(trades.trade_count)).round_dp(STAT_DP)
}
