//! Outbound notification sink.
//!
//! Watchers report state changes through the [`Notifier`] trait; the
//! production implementation delivers email over authenticated SMTP. The
//! sink is constructed once in `main` and handed to each watcher, so there
//! is no process-wide lookup to reason about. Delivery is async end to end;
//! a slow relay stalls only the watcher that is sending, never a runtime
//! worker thread.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials as SmtpCredentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::config::EmailConfig;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, body: &str) -> Result<()>;
}

/// Email notifier over SMTP (TLS relay)
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailNotifier {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .context("failed to configure SMTP relay")?
            .credentials(SmtpCredentials::new(
                config.user.clone(),
                config.password.clone(),
            ))
            .build();

        let from: Mailbox = config.user.parse().context("invalid sender address")?;
        let to: Mailbox = config.to.parse().context("invalid recipient address")?;

        Ok(Self { transport, from, to })
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .body(body.to_string())
            .context("failed to build notification message")?;

        self.transport
            .send(message)
            .await
            .context("failed to send notification email")?;

        info!(subject, "notification email sent");
        Ok(())
    }
}
