//! Outbound delivery of the rendered digest.

use crate::config::MailConfig;
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use lexicon_shared::digest;
use lexicon_shared::{MailError, VocabularyEntry};
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

/// A fully rendered message, ready for a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html_body: String,
    /// Plain-text alternative
    pub text_body: String,
}

/// Sender, recipient and subject for digests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub from: String,
    pub to: String,
    pub subject: String,
}

impl Envelope {
    /// Addresses from config, defaulting both to the mail account
    pub fn from_config(config: &MailConfig, account: &str) -> Self {
        Self {
            from: config.from.clone().unwrap_or_else(|| account.to_string()),
            to: config.to.clone().unwrap_or_else(|| account.to_string()),
            subject: config.subject.clone(),
        }
    }

    /// Render a digest of `entries` into a message
    pub fn digest(&self, entries: &[VocabularyEntry]) -> MailMessage {
        MailMessage {
            from: self.from.clone(),
            to: self.to.clone(),
            subject: self.subject.clone(),
            html_body: digest::render(entries),
            text_body: digest::render_text(entries),
        }
    }
}

// ============================================================================
// Mailer Trait
// ============================================================================

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

// ============================================================================
// SMTP Mailer (Production)
// ============================================================================

/// SMTP relay over implicit TLS
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig, user: &str, password: &str) -> Result<Self, MailError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(config.smtp_port)
            .credentials(Credentials::new(user.to_string(), password.to_string()))
            .build();
        Ok(Self { transport })
    }
}

fn mailbox(address: &str) -> Result<Mailbox, MailError> {
    address
        .parse()
        .map_err(|_| MailError::Address(address.to_string()))
}

/// Build a multipart/alternative message
pub fn build_message(message: &MailMessage) -> Result<Message, MailError> {
    Message::builder()
        .from(mailbox(&message.from)?)
        .to(mailbox(&message.to)?)
        .subject(message.subject.clone())
        .multipart(MultiPart::alternative_plain_html(
            message.text_body.clone(),
            message.html_body.clone(),
        ))
        .map_err(|e| MailError::Build(e.to_string()))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let email = build_message(message)?;
        self.transport
            .send(email)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        info!("Email sent successfully to {}", message.to);
        Ok(())
    }
}

// ============================================================================
// Console Mailer (--no-mail)
// ============================================================================

/// Prints the plain-text digest to stdout instead of sending it
pub struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        println!("Subject: {}\n", message.subject);
        println!("{}", message.text_body);
        Ok(())
    }
}

// ============================================================================
// Fake Mailer (Testing)
// ============================================================================

/// Records messages instead of sending them. Can be switched to fail or
/// to take a while per send.
#[derive(Default)]
pub struct FakeMailer {
    sent: Mutex<Vec<MailMessage>>,
    failure: Mutex<Option<MailError>>,
    latency: Mutex<Duration>,
}

impl FakeMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every send fails with `error`
    pub fn failing(error: MailError) -> Self {
        let mailer = Self::new();
        mailer.set_failure(Some(error));
        mailer
    }

    pub fn set_failure(&self, error: Option<MailError>) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = error;
    }

    /// Delay every send by `latency` before it completes
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(|e| e.into_inner()) = latency;
    }

    /// Messages delivered so far
    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let latency = *self.latency.lock().unwrap_or_else(|e| e.into_inner());
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if let Some(error) = self.failure.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            return Err(error);
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.clone());
        Ok(())
    }
}
