//! One-time-code password reset.

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::{PasswordError, PasswordService};
use crate::db::Repository;
use crate::domain::otp::{generate_code, hash_code, OTP_TTL_MS};
use crate::domain::{PasswordResetOtp, TimeMs, User};
use crate::mail::{MailError, Mailer, OutgoingMail};

#[derive(Debug, Error)]
pub enum ResetError {
    #[error("User with this email does not exist")]
    UserNotFound,
    #[error("Invalid OTP")]
    InvalidCode,
    #[error("OTP has expired")]
    Expired,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    Mail(#[from] MailError),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

pub struct PasswordReset {
    repo: Arc<Repository>,
    mailer: Arc<dyn Mailer>,
    passwords: Arc<PasswordService>,
    mail_from: String,
}

impl PasswordReset {
    pub fn new(
        repo: Arc<Repository>,
        mailer: Arc<dyn Mailer>,
        passwords: Arc<PasswordService>,
        mail_from: String,
    ) -> Self {
        Self {
            repo,
            mailer,
            passwords,
            mail_from,
        }
    }

    /// Issue a fresh code for the account registered under `email` and mail it.
    /// Earlier unused codes stay valid until they expire.
    pub async fn issue(&self, email: &str) -> Result<(), ResetError> {
        let user = self.user_by_email(email).await?;

        let code = generate_code(&mut rand::thread_rng());
        self.repo
            .insert_otp(user.id, &hash_code(&code), TimeMs::now())
            .await?;

        let mail = OutgoingMail {
            from: self.mail_from.clone(),
            to: user.email.clone(),
            subject: "Your password reset code".to_string(),
            body: format!(
                "Your password reset code is {}. It expires in {} minutes.",
                code,
                OTP_TTL_MS / 60_000
            ),
        };
        self.mailer.send(mail).await?;

        info!(user_id = user.id, "Password reset code issued");
        Ok(())
    }

    /// Check `code` against the newest unused matching code of the account.
    /// The code is not consumed.
    pub async fn verify(
        &self,
        email: &str,
        code: &str,
        now: TimeMs,
    ) -> Result<(User, PasswordResetOtp), ResetError> {
        let user = self.user_by_email(email).await?;

        let otp = self
            .repo
            .latest_unused_otp(user.id, &hash_code(code))
            .await?
            .ok_or_else(|| {
                warn!(user_id = user.id, "Password reset code did not match");
                ResetError::InvalidCode
            })?;

        if otp.is_expired(now) {
            warn!(user_id = user.id, otp_id = otp.id, "Password reset code expired");
            return Err(ResetError::Expired);
        }

        Ok((user, otp))
    }

    /// Verify `code`, then store the new password and consume the code together.
    pub async fn reset(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
        now: TimeMs,
    ) -> Result<User, ResetError> {
        if new_password.is_empty() {
            return Err(ResetError::Validation("new_password is required".to_string()));
        }

        let (user, otp) = self.verify(email, code, now).await?;
        let password_hash = self.passwords.hash(new_password)?;

        if !self
            .repo
            .reset_password_atomic(user.id, otp.id, &password_hash)
            .await?
        {
            return Err(ResetError::InvalidCode);
        }

        info!(user_id = user.id, otp_id = otp.id, "Password reset");
        Ok(user)
    }

    async fn user_by_email(&self, email: &str) -> Result<User, ResetError> {
        self.repo
            .find_user_by_email(email.trim())
            .await?
            .ok_or(ResetError::UserNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repo::test_support::setup_test_db;
    use crate::mail::MockMailer;

    struct Fixture {
        reset: PasswordReset,
        repo: Arc<Repository>,
        mailer: Arc<MockMailer>,
        passwords: Arc<PasswordService>,
        user: User,
        _temp: tempfile::TempDir,
    }

    async fn setup() -> Fixture {
        let (repo, temp) = setup_test_db().await;
        let repo = Arc::new(repo);
        let passwords = Arc::new(PasswordService::new(1024, 1).unwrap());
        let hash = passwords.hash("old-password").unwrap();
        let user = repo
            .insert_user("alice", "alice@example.com", None, &hash, false)
            .await
            .unwrap();
        let mailer = Arc::new(MockMailer::new());
        let reset = PasswordReset::new(
            repo.clone(),
            mailer.clone(),
            passwords.clone(),
            "noreply@tradejournal.local".to_string(),
        );
        Fixture {
            reset,
            repo,
            mailer,
            passwords,
            user,
            _temp: temp,
        }
    }

    #[tokio::test]
    async fn test_issue_mails_a_six_digit_code() {
        let f = setup().await;
        f.reset.issue("alice@example.com").await.unwrap();

        let sent = f.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, "noreply@tradejournal.local");
        let code = f.mailer.last_code_for("alice@example.com").unwrap();
        let numeric: u32 = code.parse().unwrap();
        assert!((100_000..=999_999).contains(&numeric));
    }

    #[tokio::test]
    async fn test_unknown_email() {
        let f = setup().await;
        assert!(matches!(
            f.reset.issue("nobody@example.com").await,
            Err(ResetError::UserNotFound)
        ));
        assert!(matches!(
            f.reset.verify("nobody@example.com", "123456", TimeMs::now()).await,
            Err(ResetError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn test_verify_does_not_consume() {
        let f = setup().await;
        f.reset.issue("alice@example.com").await.unwrap();
        let code = f.mailer.last_code_for("alice@example.com").unwrap();

        let (user, _) = f.reset.verify("alice@example.com", &code, TimeMs::now()).await.unwrap();
        assert_eq!(user.id, f.user.id);
        assert!(f.reset.verify("alice@example.com", &code, TimeMs::now()).await.is_ok());
    }

    #[tokio::test]
    async fn test_wrong_code_is_invalid() {
        let f = setup().await;
        f.repo
            .insert_otp(f.user.id, &hash_code("111111"), TimeMs::now())
            .await
            .unwrap();
        assert!(matches!(
            f.reset.verify("alice@example.com", "222222", TimeMs::now()).await,
            Err(ResetError::InvalidCode)
        ));
    }

    #[tokio::test]
    async fn test_expiry_boundary() {
        let f = setup().await;
        let issued = TimeMs::new(1_000_000);
        f.repo
            .insert_otp(f.user.id, &hash_code("654321"), issued)
            .await
            .unwrap();

        let at_limit = TimeMs::new(issued.as_i64() + OTP_TTL_MS);
        assert!(f.reset.verify("alice@example.com", "654321", at_limit).await.is_ok());

        let past_limit = TimeMs::new(issued.as_i64() + OTP_TTL_MS + 1);
        assert!(matches!(
            f.reset.verify("alice@example.com", "654321", past_limit).await,
            Err(ResetError::Expired)
        ));
    }

    #[tokio::test]
    async fn test_reset_changes_password_once() {
        let f = setup().await;
        f.reset.issue("alice@example.com").await.unwrap();
        let code = f.mailer.last_code_for("alice@example.com").unwrap();

        f.reset
            .reset("alice@example.com", &code, "new-password", TimeMs::now())
            .await
            .unwrap();

        let (_, hash) = f
            .repo
            .find_credentials_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(f.passwords.verify("new-password", &hash));
        assert!(!f.passwords.verify("old-password", &hash));

        assert!(matches!(
            f.reset
                .reset("alice@example.com", &code, "third-password", TimeMs::now())
                .await,
            Err(ResetError::InvalidCode)
        ));
    }

    #[tokio::test]
    async fn test_reset_requires_new_password() {
        let f = setup().await;
        assert!(matches!(
            f.reset.reset("alice@example.com", "123456", "", TimeMs::now()).await,
            Err(ResetError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_mail_failure_surfaces() {
        let f = setup().await;
        let reset = PasswordReset::new(
            f.repo.clone(),
            Arc::new(MockMailer::failing()),
            f.passwords.clone(),
            "noreply@tradejournal.local".to_string(),
        );
        assert!(matches!(
            reset.issue("alice@example.com").await,
            Err(ResetError::Mail(_))
        ));
    }
}
