//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `mod.rs` - Users, deposits, and shared row decoding
//! - `orders.rs` - Orders and the transactional position-ledger writes
//! - `trades.rs` - Completed trades and per-user aggregates
//! - `auth.rs` - Password reset codes and the refresh-token blacklist

mod auth;
mod orders;
mod trades;

pub use orders::{ClosePlan, OrderRevision};

use crate::domain::{Decimal, Deposit, OrderStatus, OrderType, TimeMs, User};
use chrono::NaiveDate;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;

/// Row visibility for a caller: superusers see everything, other users
/// only their own rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    Owner(i64),
}

impl Scope {
    pub fn for_user(user: &User) -> Self {
        if user.is_superuser {
            Scope::All
        } else {
            Scope::Owner(user.id)
        }
    }

    /// Owner filter to bind into `(? IS NULL OR user_id = ?)`.
    pub fn owner_id(&self) -> Option<i64> {
        match self {
            Scope::All => None,
            Scope::Owner(id) => Some(*id),
        }
    }
}

/// Fields a user may change on their profile. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

/// True when `err` is a UNIQUE constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// True when `err` is a CHECK constraint violation, such as a position total
/// leaving its range.
pub fn is_check_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_check_violation())
}

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Connectivity check used by the readiness endpoint.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // =========================================================================
    // User operations
    // =========================================================================

    /// Insert a new user.
    ///
    /// # Errors
    /// Returns a unique-violation database error when the email or username
    /// is already registered.
    pub async fn insert_user(
        &self,
        username: &str,
        email: &str,
        phone_number: Option<&str>,
        password_hash: &str,
        is_superuser: bool,
    ) -> Result<User, sqlx::Error> {
        let date_joined = TimeMs::now();
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, email, phone_number, password_hash, is_superuser, date_joined_ms)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(phone_number)
        .bind(password_hash)
        .bind(is_superuser as i32)
        .bind(date_joined.as_i64())
        .execute(&self.pool)
        .await?;

        Ok(User {
            id: result.last_insert_rowid(),
            username: username.to_string(),
            email: email.to_string(),
            phone_number: phone_number.map(str::to_string),
            is_superuser,
            date_joined,
        })
    }

    pub async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, username, email, phone_number, is_superuser, date_joined_ms
            FROM users WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, username, email, phone_number, is_superuser, date_joined_ms
            FROM users WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    pub async fn username_taken(&self, username: &str) -> Result<bool, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    /// Fetch a user together with their stored password hash.
    pub async fn find_credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<(User, String)>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, username, email, phone_number, is_superuser, date_joined_ms, password_hash
            FROM users WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            let hash: String = r.get("password_hash");
            (user_from_row(&r), hash)
        }))
    }

    /// List users visible in `scope`, ordered by id.
    pub async fn list_users(&self, scope: Scope) -> Result<Vec<User>, sqlx::Error> {
        let owner = scope.owner_id();
        let rows = sqlx::query(
            r#"
            SELECT id, username, email, phone_number, is_superuser, date_joined_ms
            FROM users
            WHERE (? IS NULL OR id = ?)
            ORDER BY id ASC
            "#,
        )
        .bind(owner)
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(user_from_row).collect())
    }

    pub async fn get_user(&self, scope: Scope, id: i64) -> Result<Option<User>, sqlx::Error> {
        match scope {
            Scope::Owner(owner) if owner != id => Ok(None),
            _ => self.find_user_by_id(id).await,
        }
    }

    /// Apply profile changes. Returns the updated user, or `None` if absent.
    pub async fn update_user(
        &self,
        id: i64,
        changes: &UserChanges,
    ) -> Result<Option<User>, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                username = COALESCE(?, username),
                email = COALESCE(?, email),
                phone_number = COALESCE(?, phone_number)
            WHERE id = ?
            "#,
        )
        .bind(changes.username.as_deref())
        .bind(changes.email.as_deref())
        .bind(changes.phone_number.as_deref())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_user_by_id(id).await
    }

    /// Delete a user and, by cascade, every row they own.
    pub async fn delete_user(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Deposit operations
    // =========================================================================

    /// Append a deposit for a user.
    pub async fn insert_deposit(
        &self,
        user_id: i64,
        amount: Decimal,
        deposited_at: TimeMs,
    ) -> Result<Deposit, sqlx::Error> {
        let amount_cents = amount
            .to_cents()
            .ok_or_else(|| sqlx::Error::Protocol("deposit amount has more than two decimals".into()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO deposits (user_id, amount_cents, deposited_at_ms)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(amount_cents)
        .bind(deposited_at.as_i64())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get_deposit(Scope::All, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// List deposits visible in `scope`, oldest first.
    pub async fn list_deposits(&self, scope: Scope) -> Result<Vec<Deposit>, sqlx::Error> {
        let owner = scope.owner_id();
        let rows = sqlx::query(
            r#"
            SELECT d.id, d.user_id, u.username, d.amount_cents, d.deposited_at_ms
            FROM deposits d
            JOIN users u ON u.id = d.user_id
            WHERE (? IS NULL OR d.user_id = ?)
            ORDER BY d.deposited_at_ms ASC, d.id ASC
            "#,
        )
        .bind(owner)
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(deposit_from_row).collect())
    }

    pub async fn get_deposit(&self, scope: Scope, id: i64) -> Result<Option<Deposit>, sqlx::Error> {
        let owner = scope.owner_id();
        let row = sqlx::query(
            r#"
            SELECT d.id, d.user_id, u.username, d.amount_cents, d.deposited_at_ms
            FROM deposits d
            JOIN users u ON u.id = d.user_id
            WHERE d.id = ? AND (? IS NULL OR d.user_id = ?)
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(deposit_from_row))
    }

    /// Sum of all deposits for a user. SQLite sums the integer cents exactly.
    pub async fn sum_deposits(&self, user_id: i64) -> Result<Decimal, sqlx::Error> {
        let (cents,): (i64,) =
            sqlx::query_as("SELECT COALESCE(SUM(amount_cents), 0) FROM deposits WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(Decimal::from_cents(cents))
    }
}

// =============================================================================
// Row decoding
// =============================================================================

fn user_from_row(row: &SqliteRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        phone_number: row.get("phone_number"),
        is_superuser: row.get::<i32, _>("is_superuser") != 0,
        date_joined: TimeMs::new(row.get("date_joined_ms")),
    }
}

fn deposit_from_row(row: &SqliteRow) -> Deposit {
    Deposit {
        id: row.get("id"),
        user_id: row.get("user_id"),
        username: row.get("username"),
        amount: Decimal::from_cents(row.get("amount_cents")),
        deposited_at: TimeMs::new(row.get("deposited_at_ms")),
    }
}

pub(crate) fn date_from_column(row: &SqliteRow, column: &str) -> NaiveDate {
    let raw: String = row.get(column);
    crate::domain::primitives::parse_date(&raw).unwrap_or_else(|e| {
        warn!(column = column, value = %raw, error = %e, "Failed to parse stored date, using default");
        NaiveDate::default()
    })
}

pub(crate) fn order_type_from_column(row: &SqliteRow, column: &str) -> OrderType {
    let raw: String = row.get(column);
    OrderType::from_str(&raw).unwrap_or_else(|e| {
        warn!(column = column, value = %raw, error = %e, "Failed to parse stored order type, using buy");
        OrderType::Buy
    })
}

pub(crate) fn order_status_from_column(row: &SqliteRow, column: &str) -> OrderStatus {
    let raw: String = row.get(column);
    OrderStatus::from_str(&raw).unwrap_or_else(|e| {
        warn!(column = column, value = %raw, error = %e, "Failed to parse stored order status, using open");
        OrderStatus::Open
    })
}


#[cfg(test)]
mod tests {
    use super::test_support::setup_test_db;
    use super::*;

    #[tokio::test]
    async fn test_insert_and_find_user() {
        let (repo, _temp) = setup_test_db().await;

        let user = repo
            .insert_user("alice", "alice@example.com", None, "hash", false)
            .await
            .unwrap();
        let found = repo.find_user_by_email("alice@example.com").await.unwrap();
        assert_eq!(found, Some(user.clone()));

        let (creds_user, hash) = repo
            .find_credentials_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(creds_user.id, user.id);
        assert_eq!(hash, "hash");
    }

    #[tokio::test]
    async fn test_duplicate_email_is_unique_violation() {
        let (repo, _temp) = setup_test_db().await;

        repo.insert_user("alice", "a@example.com", None, "h", false)
            .await
            .unwrap();
        let err = repo
            .insert_user("alice2", "a@example.com", None, "h", false)
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_user_scope() {
        let (repo, _temp) = setup_test_db().await;

        let alice = repo
            .insert_user("alice", "a@example.com", None, "h", false)
            .await
            .unwrap();
        let bob = repo
            .insert_user("bob", "b@example.com", None, "h", false)
            .await
            .unwrap();

        assert_eq!(repo.list_users(Scope::All).await.unwrap().len(), 2);
        let own = repo.list_users(Scope::Owner(alice.id)).await.unwrap();
        assert_eq!(own, vec![alice.clone()]);
        assert!(repo
            .get_user(Scope::Owner(alice.id), bob.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_deposits_sum_and_scope() {
        let (repo, _temp) = setup_test_db().await;

        let alice = repo
            .insert_user("alice", "a@example.com", None, "h", false)
            .await
            .unwrap();
        let bob = repo
            .insert_user("bob", "b@example.com", None, "h", false)
            .await
            .unwrap();

        repo.insert_deposit(alice.id, Decimal::from_cents(10000), TimeMs::new(1))
            .await
            .unwrap();
        repo.insert_deposit(alice.id, Decimal::from_cents(5000), TimeMs::new(2))
            .await
            .unwrap();
        let bobs = repo
            .insert_deposit(bob.id, Decimal::from_cents(123), TimeMs::new(3))
            .await
            .unwrap();
        assert_eq!(bobs.username, "bob");

        assert_eq!(
            repo.sum_deposits(alice.id).await.unwrap(),
            Decimal::from_cents(15000)
        );
        assert_eq!(repo.sum_deposits(999).await.unwrap(), Decimal::zero());
        assert_eq!(
            repo.list_deposits(Scope::Owner(alice.id))
                .await
                .unwrap()
                .len(),
            2
        );
        assert!(repo
            .get_deposit(Scope::Owner(alice.id), bobs.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_update_user_keeps_unset_fields() {
        let (repo, _temp) = setup_test_db().await;

        let alice = repo
            .insert_user("alice", "a@example.com", Some("555"), "h", false)
            .await
            .unwrap();
        let updated = repo
            .update_user(
                alice.id,
                &UserChanges {
                    username: Some("alice_t".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.username, "alice_t");
        assert_eq!(updated.email, "a@example.com");
        assert_eq!(updated.phone_number.as_deref(), Some("555"));

        assert!(repo.delete_user(alice.id).await.unwrap());
        assert!(repo.find_user_by_id(alice.id).await.unwrap().is_none());
    }
}
