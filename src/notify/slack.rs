use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use super::{report, Notifier};
use crate::diff::ChangeRecord;

/// New products listed in the Slack message body.
const SLACK_SAMPLE: usize = 5;

pub struct SlackNotifier {
    webhook_url: String,
    client: Client,
    timeout: Duration,
}

impl SlackNotifier {
    pub fn new(url: String) -> Self {
        Self {
            webhook_url: url,
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Block Kit payload: header, a stats field grid, then sample new products.
    pub fn payload(rec: &ChangeRecord) -> Value {
        let c = rec.diff.counts();
        let mut blocks = vec![
            json!({
                "type": "header",
                "text": { "type": "plain_text", "text": "Outlet monitor report" }
            }),
            json!({
                "type": "section",
                "fields": [
                    { "type": "mrkdwn", "text": format!("*Total products:*\n{}", rec.total_products) },
                    { "type": "mrkdwn", "text": format!("*New:*\n{}", c.added) },
                    { "type": "mrkdwn", "text": format!("*Price changes:*\n{}", c.price_changes) },
                    { "type": "mrkdwn", "text": format!("*Removed:*\n{}", c.removed) }
                ]
            }),
        ];

        if !rec.diff.added.is_empty() {
            let lines: String = rec
                .diff
                .added
                .iter()
                .take(SLACK_SAMPLE)
                .map(|p| {
                    let label = match &p.link {
                        Some(l) => format!("<{l}|{}>", p.name),
                        None => p.name.clone(),
                    };
                    format!("• {label}\n  {}\n", p.price.as_deref().unwrap_or("N/A"))
                })
                .collect();
            blocks.push(json!({
                "type": "section",
                "text": { "type": "mrkdwn", "text": format!("*New products:*\n{lines}") }
            }));
        }

        if rec.diff.is_empty() {
            blocks.push(json!({
                "type": "section",
                "text": { "type": "mrkdwn", "text": report::NO_CHANGES }
            }));
        }

        json!({ "text": report::subject(rec), "blocks": blocks })
    }
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn send(&self, rec: &ChangeRecord) -> Result<()> {
        self.client
            .post(&self.webhook_url)
            .timeout(self.timeout)
            .json(&Self::payload(rec))
            .send()
            .await
            .context("slack post")?
            .error_for_status()
            .context("slack non-2xx")?;
        Ok(())
    }
}
