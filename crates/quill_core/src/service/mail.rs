//! Outgoing account mail.
//!
//! # Responsibility
//! - Define the delivery seam for activation, reset and secondary-email mails.
//! - Provide a log-backed mailer for local runs and an in-memory outbox for tests.
//!
//! # Invariants
//! - Tokens are logged only at `debug`.

use log::{debug, info};
use parking_lot::Mutex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Purpose of an outgoing mail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailKind {
    Activation,
    PasswordReset,
    SecondaryEmailActivation,
}

impl MailKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Activation => "activation",
            Self::PasswordReset => "password_reset",
            Self::SecondaryEmailActivation => "secondary_email_activation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub username: String,
    pub kind: MailKind,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailError(pub String);

impl Display for MailError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "mail delivery failed: {}", self.0)
    }
}

impl Error for MailError {}

/// Delivery seam for account mails.
pub trait Mailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

impl<M: Mailer + ?Sized> Mailer for &M {
    fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        (**self).send(mail)
    }
}

impl<M: Mailer + ?Sized> Mailer for Arc<M> {
    fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        (**self).send(mail)
    }
}

/// Writes mails to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        info!(
            "event=mail_send module=mail status=ok kind={} username={}",
            mail.kind.as_str(),
            mail.username
        );
        debug!(
            "event=mail_body module=mail kind={} to={} token={}",
            mail.kind.as_str(),
            mail.to,
            mail.token
        );
        Ok(())
    }
}

/// Keeps sent mails in memory.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    outbox: Mutex<Vec<OutgoingMail>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.outbox.lock().clone()
    }

    /// Token of the most recent mail of `kind` sent to `to`.
    pub fn last_token(&self, to: &str, kind: MailKind) -> Option<String> {
        self.outbox
            .lock()
            .iter()
            .rev()
            .find(|mail| mail.kind == kind && mail.to.eq_ignore_ascii_case(to))
            .map(|mail| mail.token.clone())
    }
}

impl Mailer for MemoryMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        self.outbox.lock().push(mail.clone());
        Ok(())
    }
}
