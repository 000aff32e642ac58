//! Password reset codes and the refresh-token blacklist.

use crate::domain::{PasswordResetOtp, TimeMs};
use sqlx::Row;

use super::Repository;

impl Repository {
    /// Store a freshly issued reset code digest.
    pub async fn insert_otp(
        &self,
        user_id: i64,
        code_hash: &str,
        created_at: TimeMs,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO password_reset_otps (user_id, code_hash, created_at_ms, is_used)
            VALUES (?, ?, ?, 0)
            "#,
        )
        .bind(user_id)
        .bind(code_hash)
        .bind(created_at.as_i64())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// The most recently issued unused code for a user matching `code_hash`.
    pub async fn latest_unused_otp(
        &self,
        user_id: i64,
        code_hash: &str,
    ) -> Result<Option<PasswordResetOtp>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, code_hash, created_at_ms, is_used
            FROM password_reset_otps
            WHERE user_id = ? AND code_hash = ? AND is_used = 0
            ORDER BY created_at_ms DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(code_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| PasswordResetOtp {
            id: r.get("id"),
            user_id: r.get("user_id"),
            code_hash: r.get("code_hash"),
            created_at: TimeMs::new(r.get("created_at_ms")),
            is_used: r.get::<i32, _>("is_used") != 0,
        }))
    }

    /// Consume a reset code and store the new password hash together.
    ///
    /// Returns false, changing nothing, if the code was used in the meantime.
    pub async fn reset_password_atomic(
        &self,
        user_id: i64,
        otp_id: i64,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let consumed = sqlx::query(
            "UPDATE password_reset_otps SET is_used = 1 WHERE id = ? AND user_id = ? AND is_used = 0",
        )
        .bind(otp_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        if consumed.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    // =========================================================================
    // Refresh-token blacklist
    // =========================================================================

    /// Blacklist a refresh token by its `jti`. Returns false if it already was.
    pub async fn blacklist_token(
        &self,
        jti: &str,
        user_id: i64,
        expires_at: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO token_blacklist (jti, user_id, expires_at_ms, blacklisted_at_ms)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(jti) DO NOTHING
            "#,
        )
        .bind(jti)
        .bind(user_id)
        .bind(expires_at.as_i64())
        .bind(TimeMs::now().as_i64())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn is_token_blacklisted(&self, jti: &str) -> Result<bool, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM token_blacklist WHERE jti = ?")
            .bind(jti)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    /// Drop blacklist entries for tokens that have expired anyway.
    pub async fn purge_expired_blacklist(&self, now: TimeMs) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM token_blacklist WHERE expires_at_ms < ?")
            .bind(now.as_i64())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
