use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use std::time::Duration;

use super::{report, DiscordNotifier, Notifier, SlackNotifier};
use crate::diff::ChangeRecord;

/// Payload flavour for a user-supplied webhook URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookKind {
    /// `{ "text": <plain report> }`
    #[default]
    Generic,
    Slack,
    Discord,
    /// WeCom (企业微信) group robot markdown message.
    #[serde(alias = "wechat")]
    WeCom,
}

impl FromStr for WebhookKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generic" | "" => Ok(Self::Generic),
            "slack" => Ok(Self::Slack),
            "discord" => Ok(Self::Discord),
            "wecom" | "wechat" => Ok(Self::WeCom),
            other => Err(anyhow!("unknown webhook kind {other:?}")),
        }
    }
}

pub struct WebhookNotifier {
    url: String,
    kind: WebhookKind,
    sample_limit: usize,
    client: Client,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(url: String, kind: WebhookKind, sample_limit: usize) -> Self {
        Self {
            url,
            kind,
            sample_limit,
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn payload(&self, rec: &ChangeRecord) -> Result<Value> {
        let v = match self.kind {
            WebhookKind::Generic => json!({ "text": report::render_text(rec, self.sample_limit) }),
            WebhookKind::Slack => SlackNotifier::payload(rec),
            WebhookKind::Discord => DiscordNotifier::payload_json(rec)?,
            WebhookKind::WeCom => wecom_markdown(rec),
        };
        Ok(v)
    }
}

fn wecom_markdown(rec: &ChangeRecord) -> Value {
    let c = rec.diff.counts();
    let mut content = format!(
        "# Outlet update\n> Checked at: {}\n\n## Statistics\n- Total products: {}\n- New: <font color=\"info\">{}</font>\n- Price changes: <font color=\"warning\">{}</font>\n- Removed: {}\n",
        rec.timestamp.to_rfc3339(),
        rec.total_products,
        c.added,
        c.price_changes,
        c.removed
    );
    if rec.diff.is_empty() {
        content.push_str(&format!("\n{}\n", report::NO_CHANGES));
    }
    json!({ "msgtype": "markdown", "markdown": { "content": content } })
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        match self.kind {
            WebhookKind::Generic => "webhook",
            WebhookKind::Slack => "webhook-slack",
            WebhookKind::Discord => "webhook-discord",
            WebhookKind::WeCom => "webhook-wecom",
        }
    }

    async fn send(&self, rec: &ChangeRecord) -> Result<()> {
        let body = self.payload(rec)?;
        self.client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .context("webhook post")?
            .error_for_status()
            .context("webhook non-2xx")?;
        Ok(())
    }
}
