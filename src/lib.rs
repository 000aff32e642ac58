pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod mail;
pub mod orchestration;

pub use config::Config;
pub use db::{init_db, Repository, Scope};
pub use domain::{
    CompletedTrade, Decimal, Deposit, OpenPosition, Order, OrderStatus, OrderType, Symbol, TimeMs,
    User,
};
pub use error::AppError;
pub use mail::{LogMailer, Mailer, MockMailer};
