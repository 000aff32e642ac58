//! Mailer that writes messages to the tracing log instead of sending them.

use async_trait::async_trait;
use tracing::{debug, info};

use super::{MailError, Mailer, OutgoingMail};

#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl LogMailer {
    pub fn new() -> Self {
        LogMailer
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        info!(
            from = %mail.from,
            to = %mail.to,
            subject = %mail.subject,
            "Outgoing mail"
        );
        debug!(to = %mail.to, body = %mail.body, "Outgoing mail body");
        Ok(())
    }
}
