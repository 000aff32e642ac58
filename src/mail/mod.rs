//! Outgoing mail abstraction.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod log;
pub mod mock;

pub use log::LogMailer;
pub use mock::MockMailer;

/// A plain-text message ready to hand to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Error)]
pub enum MailError {
    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

/// Mail transport. Implementations deliver a message or report why not.
#[async_trait]
pub trait Mailer: Send + Sync + fmt::Debug {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}
