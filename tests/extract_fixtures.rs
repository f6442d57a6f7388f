// tests/extract_fixtures.rs
use outlet_monitor::config::ExtractConfig;
use outlet_monitor::extract::{
    default_strategies, parse_with, Extractor, PageExtractor, ParseStrategy, ProductCardStrategy,
    TileLinkStrategy,
};
use reqwest::Url;

const BASE: &str = "https://outlet.arcteryx.com/ca/zh/c/mens";

async fn extract(html: &str) -> Vec<outlet_monitor::ProductRecord> {
    PageExtractor::from_fixture(BASE, html)
        .unwrap()
        .extract()
        .await
        .unwrap()
}

#[tokio::test]
async fn tile_links_yield_slug_ids_names_and_prices() {
    let out = extract(include_str!("fixtures/listing_tiles.html")).await;
    assert_eq!(out.len(), 3, "{out:#?}");

    assert_eq!(out[0].id, "beta-jacket-9685");
    assert_eq!(out[0].name, "Beta Jacket");
    assert_eq!(out[0].price.as_deref(), Some("CA$ 350.00"));
    assert_eq!(
        out[0].link.as_deref(),
        Some("https://outlet.arcteryx.com/ca/zh/shop/mens/beta-jacket-9685")
    );

    // Image link and text link share an href: one product, named from the alt text.
    assert_eq!(out[1].id, "atom-hoody-8842");
    assert_eq!(out[1].name, "Atom Hoody");
    assert_eq!(out[1].price.as_deref(), Some("CA$ 220.00"));

    // No price inside its own tile; the neighbours' prices must not leak in.
    assert_eq!(out[2].id, "bird-cap");
    assert_eq!(out[2].price, None);
}

#[tokio::test]
async fn next_data_wins_over_dom_tiles() {
    let out = extract(include_str!("fixtures/listing_next_data.html")).await;
    assert_eq!(out.len(), 3);
    assert!(out.iter().all(|p| p.id != "should-not-win"));

    assert_eq!(out[0].id, "X000007451");
    assert_eq!(out[0].name, "Gamma & MX Pant");
    assert_eq!(out[0].price.as_deref(), Some("CA$ 199.00"));
    assert_eq!(
        out[0].link.as_deref(),
        Some("https://outlet.arcteryx.com/ca/zh/shop/mens/gamma-mx-pant")
    );

    assert_eq!(out[1].id, "X000006892");
    assert_eq!(out[1].price.as_deref(), Some("CA$ 240.00"));

    // No id and no link: hashed from the name, stable across runs.
    assert!(out[2].id.starts_with("name-"));
    let again = extract(include_str!("fixtures/listing_next_data.html")).await;
    assert_eq!(out[2].id, again[2].id);
}

#[tokio::test]
async fn product_cards_are_the_last_resort() {
    let out = extract(include_str!("fixtures/listing_cards.html")).await;
    assert_eq!(out.len(), 3);

    assert_eq!(out[0].id, "SKU-100");
    assert_eq!(out[0].name, "Sabre Jacket");
    assert_eq!(out[0].price.as_deref(), Some("$499.00"));
    assert_eq!(
        out[0].link.as_deref(),
        Some("https://outlet.arcteryx.com/p/sabre-jacket")
    );

    assert_eq!(out[1].id, "SKU-200");
    assert_eq!(out[1].price, None, "'Sold out' is not a price");

    assert_eq!(out[2].id, "konseal-hoody");
    assert_eq!(out[2].price.as_deref(), Some("€ 180,00"));
}

#[tokio::test]
async fn page_without_products_extracts_nothing() {
    let out = extract(include_str!("fixtures/listing_empty.html")).await;
    assert!(out.is_empty());
}

#[test]
fn custom_tile_selector_from_config() {
    let cfg = ExtractConfig {
        link_selector: "a.tile".to_string(),
        link_contains: "/item/".to_string(),
    };
    let html = r#"<div><a class="tile" href="/item/42">Answer</a><a class="tile" href="/about">About</a></div>"#;
    let url = Url::parse("https://shop.example/").unwrap();

    let strategies = default_strategies(&cfg).unwrap();
    let out = parse_with(&strategies, &url, html);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].id, "42");
    assert_eq!(out[0].name, "Answer");
}

#[test]
fn invalid_selector_is_rejected() {
    assert!(TileLinkStrategy::new("a[[", "/shop/").is_err());
}

#[test]
fn strategy_order_is_embedded_json_then_dom() {
    let names: Vec<_> = default_strategies(&ExtractConfig::default())
        .unwrap()
        .iter()
        .map(|s| s.name())
        .collect();
    assert_eq!(names, vec!["next-data", "tile-links", "product-cards"]);
}

#[tokio::test]
async fn custom_strategy_order_replaces_the_default() {
    let cfg = ExtractConfig::default();
    let dom_only: Vec<Box<dyn ParseStrategy>> = vec![
        Box::new(TileLinkStrategy::new(&cfg.link_selector, &cfg.link_contains).unwrap()),
        Box::new(ProductCardStrategy::new()),
    ];
    let out = PageExtractor::from_fixture(BASE, include_str!("fixtures/listing_next_data.html"))
        .unwrap()
        .with_strategies(dom_only)
        .extract()
        .await
        .unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].id, "should-not-win");
    assert_eq!(out[0].name, "Ignored tile");
}
