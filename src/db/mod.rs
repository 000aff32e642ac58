//! Database module for SQLite operations.
//!
//! This module provides:
//! - Database initialization and migrations
//! - SQLite pragma configuration
//! - Repository layer for the journal ledger

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::{ClosePlan, OrderRevision, Repository, Scope};
