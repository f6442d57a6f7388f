// src/extract/mod.rs
pub mod cards;
pub mod next_data;
pub mod tiles;

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use once_cell::sync::OnceCell;
use reqwest::{Client, Url};
use scraper::Html;
use sha2::{Digest, Sha256};

use crate::config::{ExtractConfig, MonitorConfig};
use crate::record::ProductRecord;

pub use cards::ProductCardStrategy;
pub use next_data::NextDataStrategy;
pub use tiles::TileLinkStrategy;

/// Anything that can produce the current product list.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self) -> Result<Vec<ProductRecord>>;
    fn name(&self) -> &'static str;
}

/// A fetched listing page, parsed once and shared by all strategies.
pub struct Page {
    pub url: Url,
    pub document: Html,
}

impl Page {
    pub fn parse(url: Url, html: &str) -> Self {
        Self {
            url,
            document: Html::parse_document(html),
        }
    }
}

/// One way of locating products in a page. Returns an empty list when the
/// page does not have the shape this strategy looks for.
pub trait ParseStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn parse(&self, page: &Page) -> Vec<ProductRecord>;
}

/// Default order: embedded JSON first, then DOM heuristics.
pub fn default_strategies(cfg: &ExtractConfig) -> Result<Vec<Box<dyn ParseStrategy>>> {
    Ok(vec![
        Box::new(NextDataStrategy::new()),
        Box::new(TileLinkStrategy::new(&cfg.link_selector, &cfg.link_contains)?),
        Box::new(ProductCardStrategy::new()),
    ])
}

/// Run strategies in order; the first non-empty result wins.
pub fn parse_with(strategies: &[Box<dyn ParseStrategy>], url: &Url, html: &str) -> Vec<ProductRecord> {
    let t0 = std::time::Instant::now();
    let page = Page::parse(url.clone(), html);

    let mut out = Vec::new();
    for s in strategies {
        let found = s.parse(&page);
        if !found.is_empty() {
            tracing::info!(strategy = s.name(), count = found.len(), "products located");
            out = found;
            break;
        }
        tracing::debug!(strategy = s.name(), "strategy found nothing");
    }

    histogram!("extract_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    counter!("extract_products_total").increment(out.len() as u64);
    out
}

enum PageSource {
    Http {
        client: Client,
        max_retries: u8,
        backoff: Duration,
    },
    Fixture(String),
}

/// Fetches one listing page and runs the parse strategies over it.
pub struct PageExtractor {
    url: Url,
    source: PageSource,
    strategies: Vec<Box<dyn ParseStrategy>>,
}

impl PageExtractor {
    pub fn from_config(cfg: &MonitorConfig) -> Result<Self> {
        let url = Url::parse(&cfg.target_url)
            .with_context(|| format!("invalid target url {}", cfg.target_url))?;
        let client = Client::builder()
            .user_agent(&cfg.http.user_agent)
            .timeout(Duration::from_secs(cfg.http.timeout_secs))
            .build()
            .context("build http client")?;
        Ok(Self {
            url,
            source: PageSource::Http {
                client,
                max_retries: cfg.http.max_retries.max(1),
                backoff: Duration::from_millis(cfg.http.retry_backoff_ms),
            },
            strategies: default_strategies(&cfg.extract)?,
        })
    }

    /// Parse a stored page instead of fetching; `url` resolves relative links.
    pub fn from_fixture(url: &str, html: impl Into<String>) -> Result<Self> {
        let url = Url::parse(url).with_context(|| format!("invalid fixture url {url}"))?;
        Ok(Self {
            url,
            source: PageSource::Fixture(html.into()),
            strategies: default_strategies(&ExtractConfig::default())?,
        })
    }

    pub fn with_strategies(mut self, strategies: Vec<Box<dyn ParseStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    async fn fetch(client: &Client, url: &Url) -> Result<String> {
        let resp = client
            .get(url.clone())
            .send()
            .await
            .context("listing http get()")?
            .error_for_status()
            .context("listing non-2xx")?;
        resp.text().await.context("listing http .text()")
    }
}

#[async_trait]
impl Extractor for PageExtractor {
    async fn extract(&self) -> Result<Vec<ProductRecord>> {
        match &self.source {
            PageSource::Fixture(html) => Ok(parse_with(&self.strategies, &self.url, html)),
            PageSource::Http {
                client,
                max_retries,
                backoff,
            } => {
                let mut last_err = None;
                for attempt in 1..=*max_retries {
                    tracing::info!(url = %self.url, attempt, max_retries, "fetching listing");
                    match Self::fetch(client, &self.url).await {
                        Ok(body) => {
                            let products = parse_with(&self.strategies, &self.url, &body);
                            if !products.is_empty() {
                                return Ok(products);
                            }
                            tracing::warn!(attempt, bytes = body.len(), "no products found in page");
                            last_err = None;
                        }
                        Err(e) => {
                            tracing::warn!(attempt, error = ?e, "listing fetch failed");
                            counter!("extract_fetch_errors_total").increment(1);
                            last_err = Some(e);
                        }
                    }
                    if attempt < *max_retries {
                        tokio::time::sleep(*backoff).await;
                    }
                }
                match last_err {
                    Some(e) => Err(e),
                    None => Ok(Vec::new()),
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "page"
    }
}

/// Normalize scraped text: decode entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > 500 {
        out = out.chars().take(500).collect();
    }
    out
}

/// Resolve `href` against the page url; absolute hrefs pass through.
pub fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    base.join(href).ok().map(|u| u.to_string())
}

/// Last non-empty path segment of a product URL, without query or fragment.
pub fn url_slug(link: &str) -> Option<String> {
    if let Ok(u) = Url::parse(link) {
        return u
            .path_segments()
            .and_then(|mut segs| segs.rfind(|s| !s.is_empty()))
            .map(str::to_string);
    }
    let path = link.split(['?', '#']).next().unwrap_or_default();
    path.rsplit('/')
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Stable product id: explicit id, else URL slug, else a hash of the name.
/// Positional indices are never used; they shift whenever the listing reorders.
pub fn derive_id(explicit: Option<&str>, link: Option<&str>, name: &str) -> Option<String> {
    if let Some(id) = explicit.map(str::trim).filter(|s| !s.is_empty()) {
        return Some(id.to_string());
    }
    if let Some(slug) = link.and_then(url_slug) {
        return Some(slug);
    }
    let key = normalize_text(name).to_lowercase();
    if key.is_empty() {
        return None;
    }
    let digest = Sha256::digest(key.as_bytes());
    let hex: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();
    Some(format!("name-{hex}"))
}

/// Parse a CSS selector from config, keeping the error `'static`.
pub(crate) fn parse_selector(s: &str) -> Result<scraper::Selector> {
    scraper::Selector::parse(s).map_err(|e| anyhow!("invalid selector {s:?}: {e:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_collapses_ws_and_entities() {
        let s = "  Beta&nbsp;&nbsp;Jacket\n <span>Men's</span>  ";
        assert_eq!(normalize_text(s), "Beta Jacket Men's");
    }

    #[test]
    fn slug_ignores_query_and_trailing_slash() {
        assert_eq!(
            url_slug("https://shop.example/ca/zh/shop/mens/beta-jacket-9685/?color=black#top"),
            Some("beta-jacket-9685".to_string())
        );
        assert_eq!(url_slug("/shop/mens/atom-hoody"), Some("atom-hoody".to_string()));
        assert_eq!(url_slug("https://shop.example/"), None);
    }

    #[test]
    fn derive_id_prefers_explicit_then_slug_then_name() {
        assert_eq!(
            derive_id(Some(" sku-1 "), Some("https://x.test/p/a"), "A").as_deref(),
            Some("sku-1")
        );
        assert_eq!(
            derive_id(None, Some("https://x.test/p/a"), "A").as_deref(),
            Some("a")
        );
        let by_name = derive_id(None, None, "Beta  Jacket").unwrap();
        assert!(by_name.starts_with("name-"));
        assert_eq!(derive_id(None, None, "beta jacket"), Some(by_name));
        assert_eq!(derive_id(None, None, "   "), None);
    }

    #[test]
    fn resolve_link_handles_relative_and_junk() {
        let base = Url::parse("https://shop.example/ca/zh/c/mens").unwrap();
        assert_eq!(
            resolve_link(&base, "/ca/zh/shop/mens/x").as_deref(),
            Some("https://shop.example/ca/zh/shop/mens/x")
        );
        assert_eq!(resolve_link(&base, "#"), None);
        assert_eq!(resolve_link(&base, "javascript:void(0)"), None);
    }

    #[tokio::test]
    async fn fixture_extractor_uses_first_productive_strategy() {
        let html = r#"<html><body>
            <div class="product-card" data-product-id="p-1">
              <h3>Atom Hoody</h3><span class="price">$220.00</span>
              <a href="/p/atom-hoody">view</a>
            </div>
        </body></html>"#;
        let ex = PageExtractor::from_fixture("https://shop.example/c/mens", html).unwrap();
        let out = ex.extract().await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "p-1");
        assert_eq!(out[0].price.as_deref(), Some("$220.00"));
    }
}
