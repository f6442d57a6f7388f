//! Products embedded in the Next.js `__NEXT_DATA__` JSON blob.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use scraper::Selector;
use serde_json::Value;

use super::{derive_id, normalize_text, resolve_link, Page, ParseStrategy};
use crate::record::ProductRecord;

static SCRIPT: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script#__NEXT_DATA__"#).expect("static selector"));

/// JSON pointers where listing pages have been seen to keep their product array.
const PRODUCT_PATHS: &[&str] = &[
    "/props/pageProps/products",
    "/props/pageProps/productList",
    "/props/pageProps/items",
    "/props/pageProps/data/products",
    "/props/pageProps/catalog/products",
];

const ID_KEYS: &[&str] = &["id", "productId", "sku"];
const NAME_KEYS: &[&str] = &["name", "title", "productName"];
const PRICE_KEYS: &[&str] = &["price", "salePrice", "currentPrice"];
const LINK_KEYS: &[&str] = &["url", "link", "href"];
/// Keys tried when a price is an object rather than a scalar.
const PRICE_OBJECT_KEYS: &[&str] = &["formatted", "display", "value", "amount"];

#[derive(Debug, Default)]
pub struct NextDataStrategy;

impl NextDataStrategy {
    pub fn new() -> Self {
        Self
    }

    fn parse_item(item: &Value, page: &Page, now: DateTime<Utc>) -> Option<ProductRecord> {
        let explicit = first_scalar(item, ID_KEYS);
        let name = first_scalar(item, NAME_KEYS)
            .map(|n| normalize_text(&n))
            .unwrap_or_default();
        let link = first_scalar(item, LINK_KEYS).and_then(|l| resolve_link(&page.url, &l));
        let price = price_of(item);

        let id = derive_id(explicit.as_deref(), link.as_deref(), &name)?;
        Some(ProductRecord {
            name: if name.is_empty() { id.clone() } else { name },
            id,
            price,
            link,
            observed_at: now,
        })
    }
}

impl ParseStrategy for NextDataStrategy {
    fn name(&self) -> &'static str {
        "next-data"
    }

    fn parse(&self, page: &Page) -> Vec<ProductRecord> {
        let Some(script) = page.document.select(&SCRIPT).next() else {
            return Vec::new();
        };
        let raw: String = script.text().collect();
        let data: Value = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "__NEXT_DATA__ is not valid JSON");
                return Vec::new();
            }
        };

        let found = PRODUCT_PATHS.iter().find_map(|p| {
            data.pointer(p)
                .and_then(Value::as_array)
                .filter(|a| !a.is_empty())
                .map(|a| (*p, a))
        });
        let Some((path, items)) = found else {
            tracing::debug!("__NEXT_DATA__ present but no product list at known paths");
            return Vec::new();
        };
        tracing::debug!(path, count = items.len(), "product list found in __NEXT_DATA__");

        let now = Utc::now();
        items
            .iter()
            .filter_map(|it| Self::parse_item(it, page, now))
            .collect()
    }
}

fn scalar_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_scalar(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| item.get(*k))
        .find_map(scalar_to_string)
}

fn price_of(item: &Value) -> Option<String> {
    PRICE_KEYS
        .iter()
        .filter_map(|k| item.get(*k))
        .find_map(|v| match v {
            Value::Object(_) => first_scalar(v, PRICE_OBJECT_KEYS),
            other => scalar_to_string(other),
        })
        .map(|p| normalize_text(&p))
}
