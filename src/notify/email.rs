use anyhow::{Context, Result};
use lettre::message::{Mailbox, Message, MultiPart};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{report, Notifier};
use crate::config::EmailConfig;
use crate::diff::ChangeRecord;

pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
    sample_limit: usize,
}

impl EmailNotifier {
    /// SMTP with STARTTLS on the configured port (587 by default).
    pub fn new(cfg: &EmailConfig, sample_limit: usize) -> Result<Self> {
        let creds = Credentials::new(cfg.username.clone(), cfg.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.smtp_host)
            .with_context(|| format!("invalid SMTP host {}", cfg.smtp_host))?
            .port(cfg.smtp_port)
            .credentials(creds)
            .build();

        let from = cfg
            .from
            .parse()
            .with_context(|| format!("invalid sender address {}", cfg.from))?;
        let to = cfg
            .to
            .parse()
            .with_context(|| format!("invalid receiver address {}", cfg.to))?;

        Ok(Self {
            mailer,
            from,
            to,
            sample_limit,
        })
    }

    pub fn build_message(&self, rec: &ChangeRecord) -> Result<Message> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(report::subject(rec))
            .multipart(MultiPart::alternative_plain_html(
                report::render_text(rec, self.sample_limit),
                report::render_html(rec, self.sample_limit),
            ))
            .context("build email")
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, rec: &ChangeRecord) -> Result<()> {
        let msg = self.build_message(rec)?;
        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }
}
