//! Completed-trade reads and per-user aggregates for the repository.

use crate::domain::{CompletedTrade, Decimal, Symbol};
use crate::engine::{OrderCounts, TradeAggregates};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{date_from_column, order_type_from_column, Repository, Scope};

const TRADE_SELECT: &str = r#"
    SELECT ct.id, ct.order_id, o.user_id, s.symbol, o.order_type, o.quantity,
           o.price_cents, o.date, ct.close_price_cents, ct.close_date,
           ct.net_amount_cents, ct.duration, ct.note
    FROM completed_trades ct
    JOIN orders o ON o.id = ct.order_id
    JOIN stocks s ON s.id = o.stock_id
"#;

impl Repository {
    /// List completed trades visible in `scope`, most recent close first.
    pub async fn list_trades(&self, scope: Scope) -> Result<Vec<CompletedTrade>, sqlx::Error> {
        let owner = scope.owner_id();
        let sql = format!(
            "{} WHERE (? IS NULL OR o.user_id = ?) ORDER BY ct.close_date DESC, ct.id DESC",
            TRADE_SELECT
        );

        let rows = sqlx::query(&sql)
            .bind(owner)
            .bind(owner)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(trade_from_row).collect())
    }

    pub async fn get_trade(
        &self,
        scope: Scope,
        id: i64,
    ) -> Result<Option<CompletedTrade>, sqlx::Error> {
        let owner = scope.owner_id();
        let sql = format!(
            "{} WHERE ct.id = ? AND (? IS NULL OR o.user_id = ?)",
            TRADE_SELECT
        );

        let row = sqlx::query(&sql)
            .bind(id)
            .bind(owner)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(trade_from_row))
    }

    /// Replace the note on a completed trade. Settlement fields are immutable.
    pub async fn update_trade_note(
        &self,
        id: i64,
        note: Option<&str>,
    ) -> Result<Option<CompletedTrade>, sqlx::Error> {
        let result = sqlx::query("UPDATE completed_trades SET note = ? WHERE id = ?")
            .bind(note)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_trade(Scope::All, id).await
    }

    // =========================================================================
    // Aggregates
    // =========================================================================

    /// Sums over a user's completed trades, computed by SQLite on integer cents.
    pub async fn trade_aggregates(&self, user_id: i64) -> Result<TradeAggregates, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS trade_count,
                COALESCE(SUM(CASE WHEN ct.net_amount_cents > 0 THEN 1 ELSE 0 END), 0) AS winning_count,
                COALESCE(SUM(CASE WHEN ct.net_amount_cents > 0 THEN ct.net_amount_cents ELSE 0 END), 0) AS profit_cents,
                COALESCE(SUM(CASE WHEN ct.net_amount_cents < 0 THEN ct.net_amount_cents ELSE 0 END), 0) AS loss_cents,
                COALESCE(SUM(ct.net_amount_cents), 0) AS net_cents,
                COALESCE(SUM(ct.duration), 0) AS total_duration
            FROM completed_trades ct
            JOIN orders o ON o.id = ct.order_id
            WHERE o.user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(TradeAggregates {
            trade_count: row.get("trade_count"),
            winning_count: row.get("winning_count"),
            gross_profit: Decimal::from_cents(row.get("profit_cents")),
            gross_loss: Decimal::from_cents(row.get("loss_cents")),
            net_total: Decimal::from_cents(row.get("net_cents")),
            total_duration: row.get("total_duration"),
        })
    }

    /// Open and closed order counts for a user.
    pub async fn order_counts(&self, user_id: i64) -> Result<OrderCounts, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN status = 'open' THEN 1 ELSE 0 END), 0) AS open_count,
                COALESCE(SUM(CASE WHEN status = 'closed' THEN 1 ELSE 0 END), 0) AS closed_count
            FROM orders
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(OrderCounts {
            open: row.get("open_count"),
            closed: row.get("closed_count"),
        })
    }
}

fn trade_from_row(row: &SqliteRow) -> CompletedTrade {
    CompletedTrade {
        id: row.get("id"),
        order_id: row.get("order_id"),
        user_id: row.get("user_id"),
        symbol: Symbol::new(row.get("symbol")),
        order_type: order_type_from_column(row, "order_type"),
        quantity: row.get("quantity"),
        open_price: Decimal::from_cents(row.get("price_cents")),
        open_date: date_from_column(row, "date"),
        close_price: Decimal::from_cents(row.get("close_price_cents")),
        close_date: date_from_column(row, "close_date"),
        net_amount: Decimal::from_cents(row.get("net_amount_cents")),
        duration: row.get("duration"),
        note: row.get("note"),
    }
}
