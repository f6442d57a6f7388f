//! Product tiles located through their links.

use std::collections::HashSet;

use anyhow::Result;
use chrono::Utc;
use once_cell::sync::Lazy;
use reqwest::Url;
use scraper::{ElementRef, Selector};

use super::{derive_id, normalize_text, parse_selector, resolve_link, Page, ParseStrategy};
use crate::record::ProductRecord;

static TILE_NAME: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#".product-tile-name, [class*="tile-name"]"#).expect("static selector")
});
static TILE_PRICE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#".qa--product-tile__prices, [class*="price"]"#).expect("static selector")
});
static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").expect("static selector"));

/// How far up from the link we look for the tile's price.
const PRICE_SEARCH_DEPTH: usize = 5;

pub struct TileLinkStrategy {
    link: Selector,
    link_contains: String,
}

impl TileLinkStrategy {
    pub fn new(link_selector: &str, link_contains: &str) -> Result<Self> {
        Ok(Self {
            link: parse_selector(link_selector)?,
            link_contains: link_contains.to_string(),
        })
    }

    fn tile_name(link: &ElementRef) -> Option<String> {
        let parent = link.parent().and_then(ElementRef::wrap);
        let scopes = std::iter::once(*link).chain(parent);
        for scope in scopes {
            if let Some(n) = scope
                .select(&TILE_NAME)
                .map(|e| normalize_text(&e.text().collect::<String>()))
                .find(|n| !n.is_empty())
            {
                return Some(n);
            }
        }

        let text = normalize_text(&link.text().collect::<String>());
        if !text.is_empty() {
            return Some(text);
        }

        link.select(&IMG)
            .filter_map(|img| img.value().attr("alt"))
            .map(normalize_text)
            .find(|alt| !alt.is_empty())
    }

    /// Nearest price above the link, without leaving the link's own tile.
    fn tile_price(&self, link: &ElementRef, href: &str, base: &Url) -> Option<String> {
        for scope in link
            .ancestors()
            .filter_map(ElementRef::wrap)
            .take(PRICE_SEARCH_DEPTH)
        {
            if self.spans_other_products(&scope, href, base) {
                break;
            }
            if let Some(p) = scope
                .select(&TILE_PRICE)
                .map(|e| normalize_text(&e.text().collect::<String>()))
                .find(|p| !p.is_empty())
            {
                return Some(p);
            }
        }
        None
    }

    fn spans_other_products(&self, scope: &ElementRef, href: &str, base: &Url) -> bool {
        scope
            .select(&self.link)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|h| resolve_link(base, h))
            .any(|h| h != href && h.contains(&self.link_contains))
    }
}

impl ParseStrategy for TileLinkStrategy {
    fn name(&self) -> &'static str {
        "tile-links"
    }

    fn parse(&self, page: &Page) -> Vec<ProductRecord> {
        let now = Utc::now();
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for link in page.document.select(&self.link) {
            let Some(href) = link
                .value()
                .attr("href")
                .and_then(|h| resolve_link(&page.url, h))
            else {
                continue;
            };
            if !href.contains(&self.link_contains) || !seen.insert(href.clone()) {
                continue;
            }

            let name = Self::tile_name(&link).unwrap_or_default();
            let Some(id) = derive_id(None, Some(&href), &name) else {
                continue;
            };
            out.push(ProductRecord {
                name: if name.is_empty() { id.clone() } else { name },
                id,
                price: self.tile_price(&link, &href, &page.url),
                link: Some(href),
                observed_at: now,
            });
        }

        out
    }
}
