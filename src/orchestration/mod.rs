//! Services that combine validation, the engine and the repository.
//!
//! - `ledger` - orders, closes, reopens and deposits
//! - `password_reset` - one-time-code password reset

pub mod ledger;
pub mod password_reset;

pub use ledger::{CloseDraft, Ledger, LedgerError, OrderDraft};
pub use password_reset::{PasswordReset, ResetError};
