//! Generic product-card markup (`.product-card`, `data-testid="product-card"`, ...).

use chrono::Utc;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Selector};

use super::{derive_id, normalize_text, resolve_link, Page, ParseStrategy};
use crate::record::ProductRecord;

fn selectors(list: &[&str]) -> Vec<Selector> {
    list.iter()
        .map(|s| Selector::parse(s).expect("static selector"))
        .collect()
}

static CARD: Lazy<Vec<Selector>> = Lazy::new(|| {
    selectors(&[
        r#"[data-testid="product-card"]"#,
        ".product-card",
        r#"[class*="ProductCard"]"#,
        r#"article[class*="product"]"#,
    ])
});
static NAME: Lazy<Vec<Selector>> = Lazy::new(|| {
    selectors(&[
        "h3",
        "h4",
        ".product-name",
        r#"[class*="productName"]"#,
        r#"[class*="ProductName"]"#,
        r#"[data-testid*="name"]"#,
    ])
});
static PRICE: Lazy<Vec<Selector>> = Lazy::new(|| {
    selectors(&[
        ".price",
        r#"[class*="price"]"#,
        r#"[data-testid*="price"]"#,
        r#"span[class*="Price"]"#,
    ])
});
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("static selector"));

const ID_ATTRS: &[&str] = &["data-product-id", "data-id", "id"];
const CURRENCY_MARKS: &[char] = &['$', '¥', '€', '£', '₩', '₹'];

#[derive(Debug, Default)]
pub struct ProductCardStrategy;

impl ProductCardStrategy {
    pub fn new() -> Self {
        Self
    }

    fn first_text<F>(card: &ElementRef, sels: &[Selector], accept: F) -> Option<String>
    where
        F: Fn(&str) -> bool,
    {
        sels.iter().find_map(|sel| {
            card.select(sel)
                .map(|e| normalize_text(&e.text().collect::<String>()))
                .find(|t| !t.is_empty() && accept(t))
        })
    }

    fn parse_card(card: &ElementRef, page: &Page, now: chrono::DateTime<Utc>) -> Option<ProductRecord> {
        let explicit = ID_ATTRS.iter().find_map(|a| card.value().attr(a));
        let name = Self::first_text(card, &NAME, |_| true).unwrap_or_default();
        let price = Self::first_text(card, &PRICE, |t| t.contains(CURRENCY_MARKS));
        let link = card
            .select(&LINK)
            .filter_map(|a| a.value().attr("href"))
            .find_map(|h| resolve_link(&page.url, h));

        let id = derive_id(explicit, link.as_deref(), &name)?;
        Some(ProductRecord {
            name: if name.is_empty() { id.clone() } else { name },
            id,
            price,
            link,
            observed_at: now,
        })
    }
}

impl ParseStrategy for ProductCardStrategy {
    fn name(&self) -> &'static str {
        "product-cards"
    }

    fn parse(&self, page: &Page) -> Vec<ProductRecord> {
        let Some((sel, cards)) = CARD.iter().find_map(|sel| {
            let found: Vec<_> = page.document.select(sel).collect();
            (!found.is_empty()).then_some((sel, found))
        }) else {
            return Vec::new();
        };
        tracing::debug!(selector = ?sel, count = cards.len(), "product cards matched");

        let now = Utc::now();
        cards
            .iter()
            .filter_map(|c| Self::parse_card(c, page, now))
            .collect()
    }
}
