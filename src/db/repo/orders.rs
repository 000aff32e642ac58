//! Order, stock, and open-position operations for the repository.
//!
//! Every multi-row write runs in one transaction whose first statement is a
//! write, so SQLite hands out the write lock before anything is read.

use crate::domain::primitives::format_date;
use crate::domain::{
    CompletedTrade, Decimal, NewOrder, OpenPosition, Order, OrderStatus, Symbol, TimeMs,
};
use crate::engine::{PositionDelta, Settlement};
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

use super::{
    date_from_column, order_status_from_column, order_type_from_column, Repository, Scope,
};

const ORDER_SELECT: &str = r#"
    SELECT o.id, o.user_id, u.username, o.stock_id, s.symbol, o.date, o.quantity,
           o.price_cents, o.order_type, o.comment, o.status
    FROM orders o
    JOIN users u ON u.id = o.user_id
    JOIN stocks s ON s.id = o.stock_id
"#;

const POSITION_SELECT: &str = r#"
    SELECT p.id, p.user_id, p.stock_id, s.symbol, p.quantity, p.total_value_cents, p.last_updated_ms
    FROM open_positions p
    JOIN stocks s ON s.id = p.stock_id
"#;

/// Everything needed to record the close of one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosePlan {
    pub close_price: Decimal,
    pub close_date: NaiveDate,
    pub note: Option<String>,
    pub settlement: Settlement,
}

/// Replacement terms for an order plus the position change they imply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRevision {
    pub updated: Order,
    pub position_delta: PositionDelta,
}

impl Repository {
    // =========================================================================
    // Order reads
    // =========================================================================

    /// List orders visible in `scope`, optionally filtered by status.
    pub async fn list_orders(
        &self,
        scope: Scope,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, sqlx::Error> {
        let owner = scope.owner_id();
        let status = status.map(|s| s.as_str());
        let sql = format!(
            "{} WHERE (? IS NULL OR o.user_id = ?) AND (? IS NULL OR o.status = ?) \
             ORDER BY o.date ASC, o.id ASC",
            ORDER_SELECT
        );

        let rows = sqlx::query(&sql)
            .bind(owner)
            .bind(owner)
            .bind(status)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(order_from_row).collect())
    }

    pub async fn get_order(&self, scope: Scope, id: i64) -> Result<Option<Order>, sqlx::Error> {
        let owner = scope.owner_id();
        let sql = format!(
            "{} WHERE o.id = ? AND (? IS NULL OR o.user_id = ?)",
            ORDER_SELECT
        );

        let row = sqlx::query(&sql)
            .bind(id)
            .bind(owner)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(order_from_row))
    }

    // =========================================================================
    // Position reads
    // =========================================================================

    /// List positions visible in `scope`. With `active_only`, rows whose
    /// quantity is not positive are skipped.
    pub async fn list_positions(
        &self,
        scope: Scope,
        active_only: bool,
    ) -> Result<Vec<OpenPosition>, sqlx::Error> {
        let owner = scope.owner_id();
        let sql = format!(
            "{} WHERE (? IS NULL OR p.user_id = ?) AND (? = 0 OR p.quantity > 0) \
             ORDER BY s.symbol ASC, p.user_id ASC",
            POSITION_SELECT
        );

        let rows = sqlx::query(&sql)
            .bind(owner)
            .bind(owner)
            .bind(active_only as i32)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(position_from_row).collect())
    }

    pub async fn get_position(
        &self,
        scope: Scope,
        id: i64,
        active_only: bool,
    ) -> Result<Option<OpenPosition>, sqlx::Error> {
        let owner = scope.owner_id();
        let sql = format!(
            "{} WHERE p.id = ? AND (? IS NULL OR p.user_id = ?) AND (? = 0 OR p.quantity > 0)",
            POSITION_SELECT
        );

        let row = sqlx::query(&sql)
            .bind(id)
            .bind(owner)
            .bind(owner)
            .bind(active_only as i32)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(position_from_row))
    }

    /// The position row for a user and symbol, regardless of quantity.
    pub async fn find_position(
        &self,
        user_id: i64,
        symbol: &Symbol,
    ) -> Result<Option<OpenPosition>, sqlx::Error> {
        let sql = format!("{} WHERE p.user_id = ? AND s.symbol = ?", POSITION_SELECT);

        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(symbol.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(position_from_row))
    }

    // =========================================================================
    // Transactional ledger writes
    // =========================================================================

    /// Insert an order and add `delta` to the owner's position for its stock,
    /// creating the stock and the position row on first use.
    pub async fn place_order_atomic(
        &self,
        user_id: i64,
        order: &NewOrder,
        delta: PositionDelta,
    ) -> Result<Order, sqlx::Error> {
        let price_cents = cents(order.price)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT OR IGNORE INTO stocks (symbol) VALUES (?)")
            .bind(order.symbol.as_str())
            .execute(&mut *tx)
            .await?;

        let (stock_id,): (i64,) = sqlx::query_as("SELECT id FROM stocks WHERE symbol = ?")
            .bind(order.symbol.as_str())
            .fetch_one(&mut *tx)
            .await?;

        let result = sqlx::query(
            r#"
            INSERT INTO orders (user_id, stock_id, date, quantity, price_cents, order_type, comment, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, 'open')
            "#,
        )
        .bind(user_id)
        .bind(stock_id)
        .bind(format_date(&order.date))
        .bind(order.quantity)
        .bind(price_cents)
        .bind(order.order_type.as_str())
        .bind(order.comment.as_deref())
        .execute(&mut *tx)
        .await?;
        let order_id = result.last_insert_rowid();

        apply_position_delta(&mut tx, user_id, stock_id, &delta).await?;

        let placed = fetch_order(&mut tx, order_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        tx.commit().await?;
        Ok(placed)
    }

    /// Close an order: flip it to closed, record its completed trade, and
    /// apply the settlement's position delta.
    ///
    /// `plan` sees the order as it stands under the write lock; returning an
    /// error rolls everything back. Returns `Ok(None)` if the order is absent.
    pub async fn close_order_atomic<F, E>(
        &self,
        order_id: i64,
        plan: F,
    ) -> Result<Option<CompletedTrade>, E>
    where
        F: FnOnce(&Order) -> Result<ClosePlan, E>,
        E: From<sqlx::Error>,
    {
        let mut tx = self.pool.begin().await?;

        if !lock_order(&mut tx, order_id).await? {
            return Ok(None);
        }
        let Some(order) = fetch_order(&mut tx, order_id).await? else {
            return Ok(None);
        };

        let plan = plan(&order)?;
        let close_price_cents = cents(plan.close_price)?;
        let net_amount_cents = cents(plan.settlement.net_amount)?;

        let flipped = sqlx::query("UPDATE orders SET status = 'closed' WHERE id = ? AND status = 'open'")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;
        if flipped.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound.into());
        }

        let result = sqlx::query(
            r#"
            INSERT INTO completed_trades (order_id, close_price_cents, close_date, net_amount_cents, duration, note)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(order_id)
        .bind(close_price_cents)
        .bind(format_date(&plan.close_date))
        .bind(net_amount_cents)
        .bind(plan.settlement.duration)
        .bind(plan.note.as_deref())
        .execute(&mut *tx)
        .await?;
        let trade_id = result.last_insert_rowid();

        apply_position_delta(
            &mut tx,
            order.user_id,
            order.stock_id,
            &plan.settlement.position_delta,
        )
        .await?;

        tx.commit().await?;

        Ok(self.get_trade(Scope::All, trade_id).await?)
    }

    /// Rewrite an order's terms and apply the position change in one
    /// transaction. Returns `Ok(None)` if the order is absent.
    pub async fn update_order_atomic<F, E>(
        &self,
        order_id: i64,
        plan: F,
    ) -> Result<Option<Order>, E>
    where
        F: FnOnce(&Order) -> Result<OrderRevision, E>,
        E: From<sqlx::Error>,
    {
        let mut tx = self.pool.begin().await?;

        if !lock_order(&mut tx, order_id).await? {
            return Ok(None);
        }
        let Some(order) = fetch_order(&mut tx, order_id).await? else {
            return Ok(None);
        };

        let revision = plan(&order)?;
        let updated = &revision.updated;
        let price_cents = cents(updated.price)?;

        sqlx::query(
            r#"
            UPDATE orders
            SET date = ?, quantity = ?, price_cents = ?, order_type = ?, comment = ?
            WHERE id = ?
            "#,
        )
        .bind(format_date(&updated.date))
        .bind(updated.quantity)
        .bind(price_cents)
        .bind(updated.order_type.as_str())
        .bind(updated.comment.as_deref())
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

        if !revision.position_delta.is_zero() {
            apply_position_delta(&mut tx, order.user_id, order.stock_id, &revision.position_delta)
                .await?;
        }

        let stored = fetch_order(&mut tx, order_id).await?;
        tx.commit().await?;
        Ok(stored)
    }

    /// Delete an order and apply the position delta chosen by `plan`.
    /// A completed trade of the order is removed by cascade.
    pub async fn delete_order_atomic<F, E>(
        &self,
        order_id: i64,
        plan: F,
    ) -> Result<Option<Order>, E>
    where
        F: FnOnce(&Order) -> Result<PositionDelta, E>,
        E: From<sqlx::Error>,
    {
        let mut tx = self.pool.begin().await?;

        if !lock_order(&mut tx, order_id).await? {
            return Ok(None);
        }
        let Some(order) = fetch_order(&mut tx, order_id).await? else {
            return Ok(None);
        };

        let delta = plan(&order)?;

        sqlx::query("DELETE FROM orders WHERE id = ?")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        if !delta.is_zero() {
            apply_position_delta(&mut tx, order.user_id, order.stock_id, &delta).await?;
        }

        tx.commit().await?;
        Ok(Some(order))
    }

    /// Delete a completed trade and set its order back to open. The
    /// position is left untouched. Returns the reopened order.
    pub async fn reopen_trade_atomic(&self, trade_id: i64) -> Result<Option<Order>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE orders SET status = 'open'
            WHERE id = (SELECT order_id FROM completed_trades WHERE id = ?)
            "#,
        )
        .bind(trade_id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let (order_id,): (i64,) =
            sqlx::query_as("SELECT order_id FROM completed_trades WHERE id = ?")
                .bind(trade_id)
                .fetch_one(&mut *tx)
                .await?;

        sqlx::query("DELETE FROM completed_trades WHERE id = ?")
            .bind(trade_id)
            .execute(&mut *tx)
            .await?;

        let reopened = fetch_order(&mut tx, order_id).await?;
        tx.commit().await?;
        Ok(reopened)
    }
}

// =============================================================================
// Transaction helpers
// =============================================================================

/// Touch the order row so the transaction holds the write lock before it
/// reads. Returns false when the order does not exist.
async fn lock_order(conn: &mut SqliteConnection, order_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE orders SET status = status WHERE id = ?")
        .bind(order_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

async fn fetch_order(
    conn: &mut SqliteConnection,
    order_id: i64,
) -> Result<Option<Order>, sqlx::Error> {
    let sql = format!("{} WHERE o.id = ?", ORDER_SELECT);
    let row = sqlx::query(&sql)
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.as_ref().map(order_from_row))
}

/// Add `delta` to the (user, stock) position in place, creating the row if
/// needed. The increment happens inside SQLite, so concurrent writers never
/// overwrite each other's contribution.
async fn apply_position_delta(
    conn: &mut SqliteConnection,
    user_id: i64,
    stock_id: i64,
    delta: &PositionDelta,
) -> Result<(), sqlx::Error> {
    let value_cents = cents(delta.total_value)?;

    sqlx::query(
        r#"
        INSERT INTO open_positions (user_id, stock_id, quantity, total_value_cents, last_updated_ms)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(user_id, stock_id) DO UPDATE SET
            quantity = quantity + excluded.quantity,
            total_value_cents = total_value_cents + excluded.total_value_cents,
            last_updated_ms = excluded.last_updated_ms
        "#,
    )
    .bind(user_id)
    .bind(stock_id)
    .bind(delta.quantity)
    .bind(value_cents)
    .bind(TimeMs::now().as_i64())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

fn cents(value: Decimal) -> Result<i64, sqlx::Error> {
    value.to_cents().ok_or_else(|| {
        sqlx::Error::Protocol(format!("{} is not representable in cents", value))
    })
}

// =============================================================================
// Row decoding
// =============================================================================

fn order_from_row(row: &SqliteRow) -> Order {
    Order {
        id: row.get("id"),
        user_id: row.get("user_id"),
        username: row.get("username"),
        stock_id: row.get("stock_id"),
        symbol: Symbol::new(row.get("symbol")),
        date: date_from_column(row, "date"),
        quantity: row.get("quantity"),
        price: Decimal::from_cents(row.get("price_cents")),
        order_type: order_type_from_column(row, "order_type"),
        comment: row.get("comment"),
        status: order_status_from_column(row, "status"),
    }
}

fn position_from_row(row: &SqliteRow) -> OpenPosition {
    OpenPosition {
        id: row.get("id"),
        user_id: row.get("user_id"),
        stock_id: row.get("stock_id"),
        symbol: Symbol::new(row.get("symbol")),
        quantity: row.get("quantity"),
        total_value: Decimal::from_cents(row.get("total_value_cents")),
        last_updated: TimeMs::new(row.get("last_updated_ms")),
    }
}
