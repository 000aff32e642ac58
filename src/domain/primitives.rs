//! Domain primitives: TimeMs, Symbol, OrderType, OrderStatus.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Maximum length of a ticker symbol.
pub const MAX_SYMBOL_LEN: usize = 10;

/// Wire format for order and close dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Time in milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

impl TimeMs {
    /// Create a TimeMs from milliseconds.
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        TimeMs(Utc::now().timestamp_millis())
    }

    /// Get the underlying milliseconds value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Convert to a UTC datetime. Out-of-range values clamp to the epoch.
    pub fn to_datetime(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.0)
            .single()
            .unwrap_or_default()
    }

    /// RFC 3339 rendering used in API responses.
    pub fn to_rfc3339(&self) -> String {
        self.to_datetime().to_rfc3339()
    }
}

impl From<DateTime<Utc>> for TimeMs {
    fn from(value: DateTime<Utc>) -> Self {
        TimeMs(value.timestamp_millis())
    }
}

/// Ticker symbol, always stored upper-case (e.g. "AAPL").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolParseError {
    #[error("symbol must not be empty")]
    Empty,
    #[error("symbol must be at most {MAX_SYMBOL_LEN} characters")]
    TooLong,
}

impl Symbol {
    /// Create a Symbol from an already-normalized string.
    pub fn new(symbol: String) -> Self {
        Symbol(symbol)
    }

    /// Get the symbol as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Symbol {
    type Err = SymbolParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(SymbolParseError::Empty);
        }
        if trimmed.chars().count() > MAX_SYMBOL_LEN {
            return Err(SymbolParseError::TooLong);
        }
        Ok(Symbol(trimmed.to_uppercase()))
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order direction: Buy or Sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Buy,
    Sell,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Buy => "buy",
            OrderType::Sell => "sell",
        }
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(OrderType::Buy),
            "sell" => Ok(OrderType::Sell),
            other => Err(format!("order_type must be buy or sell, got {}", other)),
        }
    }
}

/// Lifecycle state of an order. `Closed` is terminal unless the completed
/// trade is deleted, which reopens the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Closed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "open",
            OrderStatus::Closed => "closed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(OrderStatus::Open),
            "closed" => Ok(OrderStatus::Closed),
            other => Err(format!("status must be open or closed, got {}", other)),
        }
    }
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
}

/// Render a date as `YYYY-MM-DD`.
pub fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}
