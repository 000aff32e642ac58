//! Mock mailer for testing without a mail transport.

use async_trait::async_trait;
use std::sync::Mutex;

use super::{MailError, Mailer, OutgoingMail};

/// Mailer that records every message it is asked to send.
#[derive(Debug, Default)]
pub struct MockMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    fail: bool,
}

impl MockMailer {
    /// Create a new mock mailer that accepts every message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock mailer whose every delivery fails.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Messages accepted so far, oldest first.
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    /// The six-digit code in the most recent message addressed to `to`.
    pub fn last_code_for(&self, to: &str) -> Option<String> {
        self.sent()
            .iter()
            .rev()
            .find(|mail| mail.to == to)
            .and_then(|mail| {
                mail.body
                    .split(|c: char| !c.is_ascii_digit())
                    .find(|token| token.len() == 6)
                    .map(str::to_string)
            })
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::Delivery("mock transport is down".to_string()));
        }
        self.sent
            .lock()
            .map_err(|_| MailError::Delivery("mock outbox poisoned".to_string()))?
            .push(mail);
        Ok(())
    }
}
