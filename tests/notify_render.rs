// tests/notify_render.rs
use chrono::{TimeZone, Utc};
use outlet_monitor::notify::{report, WebhookKind, WebhookNotifier};
use outlet_monitor::{compute_diff, ChangeRecord, ProductRecord, Snapshot};

fn change_record() -> ChangeRecord {
    let old: Snapshot = vec![
        ProductRecord::new("A", "Jacket").with_price("$100"),
        ProductRecord::new("B", "Pants").with_price("$50"),
    ]
    .into_iter()
    .collect();
    let new: Snapshot = vec![
        ProductRecord::new("A", "Jacket").with_price("$80"),
        ProductRecord::new("C", "Hat")
            .with_price("$20")
            .with_link("https://outlet.example/shop/hat"),
    ]
    .into_iter()
    .collect();
    let ts = Utc.with_ymd_and_hms(2025, 10, 1, 8, 0, 0).unwrap();
    ChangeRecord::new(compute_diff(&old, &new), new.len(), ts)
}

#[test]
fn text_report_lists_every_category() {
    let rec = change_record();
    let text = report::render_text(&rec, 10);

    assert!(text.contains("Total products: 2"));
    assert!(text.contains("New: 1"));
    assert!(text.contains("Price changes: 1"));
    assert!(text.contains("Removed: 1"));
    assert!(text.contains("Hat"));
    assert!(text.contains("Link: https://outlet.example/shop/hat"));
    assert!(text.contains("$100 → $80"));
    assert!(text.contains("Pants ($50)"));
    assert!(!text.contains(report::NO_CHANGES));

    assert_eq!(
        report::subject(&rec),
        "Outlet update: 1 new | 1 price change | 1 removed"
    );
}

#[test]
fn unchanged_run_is_distinguishable() {
    let ts = Utc.with_ymd_and_hms(2025, 10, 1, 8, 0, 0).unwrap();
    let rec = ChangeRecord::new(Default::default(), 57, ts);
    let text = report::render_text(&rec, 10);
    assert!(text.contains(report::NO_CHANGES));
    assert!(text.contains("Total products: 57"));
    assert!(report::render_html(&rec, 10).contains(report::NO_CHANGES));
}

#[test]
fn html_report_links_products() {
    let html = report::render_html(&change_record(), 10);
    assert!(html.contains(r#"<a href="https://outlet.example/shop/hat">Hat</a>"#));
    assert!(html.contains("<s>$100</s>"));
}

#[test]
fn webhook_flavours_shape_their_payloads() {
    let rec = change_record();
    let url = "https://hooks.example/x".to_string();

    let slack = WebhookNotifier::new(url.clone(), WebhookKind::Slack, 10)
        .payload(&rec)
        .unwrap();
    assert!(slack["blocks"].is_array());
    assert!(slack["blocks"][2]["text"]["text"]
        .as_str()
        .unwrap()
        .contains("<https://outlet.example/shop/hat|Hat>"));

    let discord = WebhookNotifier::new(url.clone(), WebhookKind::Discord, 10)
        .payload(&rec)
        .unwrap();
    let fields = discord["embeds"][0]["fields"].as_array().unwrap();
    assert_eq!(fields.len(), 4);
    assert!(discord["embeds"][0].get("description").is_none());

    let generic = WebhookNotifier::new(url, WebhookKind::Generic, 10)
        .payload(&rec)
        .unwrap();
    assert_eq!(generic["text"], report::render_text(&rec, 10));
}
