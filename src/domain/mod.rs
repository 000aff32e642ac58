//! Domain types for the trading journal ledger.
//!
//! This module provides:
//! - Lossless money handling via the Decimal wrapper
//! - Domain primitives: TimeMs, Symbol, OrderType, OrderStatus
//! - Ledger records: users, deposits, orders, completed trades, open positions
//! - Password reset one-time codes

pub mod decimal;
pub mod deposit;
pub mod order;
pub mod otp;
pub mod position;
pub mod primitives;
pub mod trade;
pub mod user;

pub use decimal::Decimal;
pub use deposit::Deposit;
pub use order::{NewOrder, Order, OrderChanges};
pub use otp::PasswordResetOtp;
pub use position::OpenPosition;
pub use primitives::{OrderStatus, OrderType, Symbol, SymbolParseError, TimeMs};
pub use trade::CompletedTrade;
pub use user::User;
