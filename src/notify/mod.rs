// src/notify/mod.rs
pub mod discord;
pub mod email;
pub mod report;
pub mod slack;
pub mod webhook;

use anyhow::Result;
use metrics::counter;

use crate::config::MonitorConfig;
use crate::diff::ChangeRecord;

pub use discord::DiscordNotifier;
pub use email::EmailNotifier;
pub use slack::SlackNotifier;
pub use webhook::{WebhookKind, WebhookNotifier};

/// A delivery channel for change records.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;
    async fn send(&self, rec: &ChangeRecord) -> Result<()>;
}

/// Outcome of one fan-out.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: Vec<&'static str>,
    pub failed: Vec<(&'static str, String)>,
}

impl DeliveryReport {
    pub fn any_delivered(&self) -> bool {
        !self.delivered.is_empty()
    }
}

/// Sends to every configured channel; one failing channel does not stop the rest.
#[derive(Default)]
pub struct NotifierMux {
    sinks: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new(sinks: Vec<Box<dyn Notifier>>) -> Self {
        Self { sinks }
    }

    /// Build the channels present in config. Channels that fail to build are skipped.
    /// Chat webhooks share the HTTP timeout and retry budget of the page fetcher.
    pub fn from_config(monitor: &MonitorConfig) -> Self {
        let cfg = &monitor.notify;
        let sample_limit = monitor.sample_limit;
        let timeout_secs = monitor.http.timeout_secs;
        let mut sinks: Vec<Box<dyn Notifier>> = Vec::new();

        if let Some(email) = &cfg.email {
            match EmailNotifier::new(email, sample_limit) {
                Ok(n) => sinks.push(Box::new(n)),
                Err(e) => tracing::warn!(error = ?e, "email notifier disabled"),
            }
        }
        if let Some(url) = &cfg.slack_webhook_url {
            sinks.push(Box::new(
                SlackNotifier::new(url.clone()).with_timeout(timeout_secs),
            ));
        }
        if let Some(url) = &cfg.discord_webhook_url {
            sinks.push(Box::new(
                DiscordNotifier::new(url.clone())
                    .with_timeout(timeout_secs)
                    .with_retries(monitor.http.max_retries),
            ));
        }
        if let Some(hook) = &cfg.webhook {
            sinks.push(Box::new(WebhookNotifier::new(
                hook.url.clone(),
                hook.kind,
                sample_limit,
            )));
        }

        if sinks.is_empty() {
            tracing::info!("no notification channels configured; changes are only logged");
        }
        Self { sinks }
    }

    pub fn push(&mut self, sink: Box<dyn Notifier>) {
        self.sinks.push(sink);
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub async fn notify(&self, rec: &ChangeRecord) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for sink in &self.sinks {
            match sink.send(rec).await {
                Ok(()) => {
                    tracing::info!(channel = sink.name(), "notification sent");
                    counter!("notify_sent_total").increment(1);
                    report.delivered.push(sink.name());
                }
                Err(e) => {
                    tracing::warn!(channel = sink.name(), error = ?e, "notification failed");
                    counter!("notify_errors_total").increment(1);
                    report.failed.push((sink.name(), format!("{e:#}")));
                }
            }
        }
        report
    }
}
