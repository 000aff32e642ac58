//! Pure computation engine(s) for the journal's ledger arithmetic.

pub mod position;
pub mod settlement;
pub mod stats;

pub use position::{AmountOutOfRange, PositionDelta, MAX_AMOUNT_CENTS};
pub use settlement::{settle, Settlement, SettlementError};
pub use stats::{OrderCounts, PerformanceStats, TradeAggregates};
