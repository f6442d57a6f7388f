// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::notify::webhook::WebhookKind;

pub const ENV_CONFIG_PATH: &str = "MONITOR_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/monitor.toml";

const DEFAULT_TARGET_URL: &str = "https://outlet.arcteryx.com/ca/zh/c/mens";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36";
const DEFAULT_INTERVAL_SECS: u64 = 30 * 60;
const DEFAULT_SAMPLE_LIMIT: usize = 10;
const DEFAULT_HISTORY_LIMIT: usize = 100;
const DEFAULT_LOCK_STALE_SECS: u64 = 2 * 3600;
const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
const DEFAULT_SMTP_PORT: u16 = 587;

/// Everything the pipeline needs, resolved once at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    pub target_url: String,
    pub data_dir: PathBuf,
    pub interval_secs: u64,
    /// Max sample items per category in rendered notifications.
    pub sample_limit: usize,
    /// Max change records kept in `history.json`.
    pub history_limit: usize,
    pub notify_on_first_run: bool,
    pub notify_when_unchanged: bool,
    pub write_reports: bool,
    pub lock_stale_secs: u64,
    pub metrics_addr: Option<SocketAddr>,
    pub http: HttpConfig,
    pub extract: ExtractConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_retries: u8,
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractConfig {
    /// CSS selector for product tile links.
    pub link_selector: String,
    /// Href fragment a tile link must contain to count as a product.
    pub link_contains: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotifyConfig {
    pub email: Option<EmailConfig>,
    pub slack_webhook_url: Option<String>,
    pub discord_webhook_url: Option<String>,
    pub webhook: Option<WebhookConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailConfig {
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default)]
    pub kind: WebhookKind,
}

fn default_smtp_host() -> String {
    DEFAULT_SMTP_HOST.to_string()
}
fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            target_url: DEFAULT_TARGET_URL.to_string(),
            data_dir: PathBuf::from("data"),
            interval_secs: DEFAULT_INTERVAL_SECS,
            sample_limit: DEFAULT_SAMPLE_LIMIT,
            history_limit: DEFAULT_HISTORY_LIMIT,
            notify_on_first_run: false,
            notify_when_unchanged: false,
            write_reports: true,
            lock_stale_secs: DEFAULT_LOCK_STALE_SECS,
            metrics_addr: None,
            http: HttpConfig::default(),
            extract: ExtractConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 30,
            max_retries: 2,
            retry_backoff_ms: 5_000,
        }
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            link_selector: ".qa--product-tile__link, a[href*=\"/shop/\"]".to_string(),
            link_contains: "/shop/".to_string(),
        }
    }
}

impl MonitorConfig {
    /// Parse a TOML config file. Missing keys fall back to defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading monitor config from {}", path.display()))?;
        let cfg: MonitorConfig = toml::from_str(&content)
            .with_context(|| format!("parsing monitor config {}", path.display()))?;
        Ok(cfg)
    }

    /// Resolve the config file, then apply environment overrides:
    /// 1) `explicit` path (must exist)
    /// 2) $MONITOR_CONFIG_PATH (must exist)
    /// 3) config/monitor.toml if present
    /// 4) built-in defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut cfg = match resolve_path(explicit)? {
            Some(p) => Self::load_from_file(&p)?,
            None => Self::default(),
        };
        cfg.apply_env_from(|k| std::env::var(k).ok());
        cfg.sanitize();
        Ok(cfg)
    }

    /// Override fields from environment-style lookups. Empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("MONITOR_TARGET_URL") {
            self.target_url = v;
        }
        if let Some(v) = get("MONITOR_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get("MONITOR_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            self.interval_secs = v;
        }
        if let Some(v) = get("MONITOR_SAMPLE_LIMIT").and_then(|v| v.parse().ok()) {
            self.sample_limit = v;
        }
        if let Some(v) = get("MONITOR_NOTIFY_ON_FIRST_RUN") {
            self.notify_on_first_run = parse_flag(&v);
        }
        if let Some(v) = get("MONITOR_USER_AGENT") {
            self.http.user_agent = v;
        }
        if let Some(v) = get("MONITOR_METRICS_ADDR") {
            match v.parse() {
                Ok(addr) => self.metrics_addr = Some(addr),
                Err(e) => tracing::warn!(value = %v, error = %e, "ignoring invalid MONITOR_METRICS_ADDR"),
            }
        }

        // Email: SENDER_EMAIL + SENDER_PASSWORD enable it; receiver defaults to sender.
        if let (Some(user), Some(pass)) = (get("SENDER_EMAIL"), get("SENDER_PASSWORD")) {
            let base = self.notify.email.take();
            let host = get("SMTP_SERVER")
                .or_else(|| get("SMTP_HOST"))
                .or_else(|| base.as_ref().map(|e| e.smtp_host.clone()))
                .unwrap_or_else(default_smtp_host);
            let port = get("SMTP_PORT")
                .and_then(|p| p.parse().ok())
                .or_else(|| base.as_ref().map(|e| e.smtp_port))
                .unwrap_or(DEFAULT_SMTP_PORT);
            let to = get("RECEIVER_EMAIL").unwrap_or_else(|| user.clone());
            self.notify.email = Some(EmailConfig {
                smtp_host: host,
                smtp_port: port,
                from: user.clone(),
                username: user,
                password: pass,
                to,
            });
        }

        if let Some(v) = get("SLACK_WEBHOOK_URL") {
            self.notify.slack_webhook_url = Some(v);
        }
        if let Some(v) = get("DISCORD_WEBHOOK_URL") {
            self.notify.discord_webhook_url = Some(v);
        }
        if let Some(url) = get("WEBHOOK_URL") {
            let kind = get("WEBHOOK_KIND")
                .and_then(|k| k.parse().ok())
                .unwrap_or_default();
            self.notify.webhook = Some(WebhookConfig { url, kind });
        }
    }

    /// Replace nonsensical values with defaults.
    pub fn sanitize(&mut self) {
        if self.interval_secs == 0 {
            self.interval_secs = DEFAULT_INTERVAL_SECS;
        }
        if self.sample_limit == 0 {
            self.sample_limit = DEFAULT_SAMPLE_LIMIT;
        }
        if self.history_limit == 0 {
            self.history_limit = DEFAULT_HISTORY_LIMIT;
        }
        if self.lock_stale_secs == 0 {
            self.lock_stale_secs = DEFAULT_LOCK_STALE_SECS;
        }
        if self.http.timeout_secs == 0 {
            self.http.timeout_secs = HttpConfig::default().timeout_secs;
        }
        if self.http.max_retries == 0 {
            self.http.max_retries = 1;
        }
        if self.extract.link_selector.trim().is_empty() {
            self.extract.link_selector = ExtractConfig::default().link_selector;
        }
    }
}

fn resolve_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(p) = explicit {
        if !p.exists() {
            return Err(anyhow!("config file {} does not exist", p.display()));
        }
        return Ok(Some(p.to_path_buf()));
    }
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(Some(pb));
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    let fallback = PathBuf::from(DEFAULT_CONFIG_PATH);
    Ok(fallback.exists().then_some(fallback))
}

fn parse_flag(v: &str) -> bool {
    matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
