use anyhow::{anyhow, Result};
use chrono::SecondsFormat;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{report, Notifier};
use crate::diff::ChangeRecord;

const EMBED_COLOR: u32 = 3_066_993;

#[derive(Clone)]
pub struct DiscordNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    pub(crate) fn payload_json(rec: &ChangeRecord) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(Self::payload(rec))?)
    }

    fn payload(rec: &ChangeRecord) -> DiscordWebhookPayload {
        let c = rec.diff.counts();
        let field = |name: &str, value: usize| DiscordField {
            name: name.to_string(),
            value: value.to_string(),
            inline: true,
        };
        DiscordWebhookPayload {
            content: Some(report::subject(rec)),
            embeds: vec![DiscordEmbed {
                title: "Outlet monitor report".to_string(),
                description: if rec.diff.is_empty() {
                    Some(report::NO_CHANGES.to_string())
                } else {
                    None
                },
                color: EMBED_COLOR,
                fields: vec![
                    field("Total products", rec.total_products),
                    field("New", c.added),
                    field("Price changes", c.price_changes),
                    field("Removed", c.removed),
                ],
                timestamp: rec.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            }],
        }
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn send(&self, rec: &ChangeRecord) -> Result<()> {
        let payload = Self::payload(rec);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            let err = match res {
                Ok(rsp) => match rsp.error_for_status_ref() {
                    Ok(_) => return Ok(()),
                    Err(e) => anyhow!("Discord webhook HTTP error: {e}"),
                },
                Err(e) => anyhow!("Discord webhook request failed: {e}"),
            };

            if attempt >= self.max_retries {
                return Err(err);
            }
            tracing::debug!(attempt, error = %err, "discord retry");
            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
        }
    }
}

#[derive(Serialize)]
struct DiscordField {
    name: String,
    value: String,
    inline: bool,
}

#[derive(Serialize)]
struct DiscordEmbed {
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    color: u32,
    fields: Vec<DiscordField>,
    timestamp: String,
}

#[derive(Serialize)]
struct DiscordWebhookPayload {
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::DiffResult;
    use chrono::{TimeZone, Utc};

    #[test]
    fn embed_has_count_fields_and_no_change_text() {
        let ts = Utc.with_ymd_and_hms(2025, 10, 1, 8, 0, 0).unwrap();
        let rec = ChangeRecord::new(DiffResult::default(), 40, ts);
        let v = serde_json::to_value(DiscordNotifier::payload(&rec)).unwrap();
        let embed = &v["embeds"][0];
        assert_eq!(embed["fields"][0]["value"], "40");
        assert_eq!(embed["description"], report::NO_CHANGES);
        assert_eq!(embed["timestamp"], "2025-10-01T08:00:00Z");
    }

    #[test]
    fn retries_never_drop_below_one_attempt() {
        let n = DiscordNotifier::new("https://discord.test/api/webhooks/1".into())
            .with_timeout(12)
            .with_retries(0);
        assert_eq!(n.timeout, Duration::from_secs(12));
        assert_eq!(n.max_retries, 1);
    }
}
