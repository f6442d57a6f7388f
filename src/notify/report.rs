//! Human-readable rendering of a change record (plain text and HTML).

use html_escape::encode_text;

use crate::diff::ChangeRecord;
use crate::record::ProductRecord;

pub const NO_CHANGES: &str = "No changes detected";
const RULE: &str = "============================================================";

fn or_na(v: Option<&str>) -> &str {
    v.filter(|s| !s.is_empty()).unwrap_or("N/A")
}

/// Mail subject / message title, e.g. "Outlet update: 2 new | 1 price change".
pub fn subject(rec: &ChangeRecord) -> String {
    let c = rec.diff.counts();
    if rec.diff.is_empty() {
        return format!("Outlet update: {}", NO_CHANGES.to_lowercase());
    }
    let mut parts = Vec::new();
    if c.added > 0 {
        parts.push(format!("{} new", c.added));
    }
    if c.price_changes > 0 {
        let noun = if c.price_changes == 1 { "price change" } else { "price changes" };
        parts.push(format!("{} {noun}", c.price_changes));
    }
    if c.removed > 0 {
        parts.push(format!("{} removed", c.removed));
    }
    format!("Outlet update: {}", parts.join(" | "))
}

/// One-line counts summary for logs and chat messages.
pub fn summary_line(rec: &ChangeRecord) -> String {
    let c = rec.diff.counts();
    format!(
        "total {} · new {} · price changes {} · removed {}",
        rec.total_products, c.added, c.price_changes, c.removed
    )
}

fn overflow(lines: &mut Vec<String>, total: usize, shown: usize, what: &str) {
    if total > shown {
        lines.push(format!("  ... and {} more {what}", total - shown));
    }
}

fn product_lines(lines: &mut Vec<String>, p: &ProductRecord, with_details: bool) {
    if with_details {
        lines.push(format!("  • {}", p.name));
        lines.push(format!("    Price: {}", or_na(p.price.as_deref())));
        if let Some(link) = &p.link {
            lines.push(format!("    Link: {link}"));
        }
    } else {
        lines.push(format!("  • {} ({})", p.name, or_na(p.price.as_deref())));
    }
}

/// Plain-text report with counts and up to `limit` samples per category.
pub fn render_text(rec: &ChangeRecord, limit: usize) -> String {
    let d = &rec.diff;
    let c = d.counts();
    let mut lines = vec![
        RULE.to_string(),
        "Outlet monitor report".to_string(),
        RULE.to_string(),
        format!("Checked at: {}", rec.timestamp.to_rfc3339()),
        String::new(),
        "Statistics:".to_string(),
        format!("  Total products: {}", rec.total_products),
        format!("  New: {}", c.added),
        format!("  Price changes: {}", c.price_changes),
        format!("  Removed: {}", c.removed),
        String::new(),
    ];

    if !d.added.is_empty() {
        lines.push("New products:".to_string());
        for p in d.added.iter().take(limit) {
            product_lines(&mut lines, p, true);
        }
        overflow(&mut lines, d.added.len(), limit, "new products");
        lines.push(String::new());
    }

    if !d.price_changes.is_empty() {
        lines.push("Price changes:".to_string());
        for ch in d.price_changes.iter().take(limit) {
            lines.push(format!("  • {}", ch.product.name));
            lines.push(format!("    {} → {}", ch.old_price, ch.new_price));
            if let Some(link) = &ch.product.link {
                lines.push(format!("    Link: {link}"));
            }
        }
        overflow(&mut lines, d.price_changes.len(), limit, "price changes");
        lines.push(String::new());
    }

    if !d.removed.is_empty() {
        lines.push("Removed products:".to_string());
        for p in d.removed.iter().take(limit) {
            product_lines(&mut lines, p, false);
        }
        overflow(&mut lines, d.removed.len(), limit, "removed products");
        lines.push(String::new());
    }

    if d.is_empty() {
        lines.push(NO_CHANGES.to_string());
        lines.push(String::new());
    }

    lines.push(RULE.to_string());
    lines.join("\n")
}

fn html_link(p: &ProductRecord) -> String {
    match &p.link {
        Some(l) => format!(
            r#"<a href="{}">{}</a>"#,
            html_escape::encode_double_quoted_attribute(l),
            encode_text(&p.name)
        ),
        None => encode_text(&p.name).to_string(),
    }
}

fn html_more(out: &mut String, total: usize, shown: usize) {
    if total > shown {
        out.push_str(&format!("<li><em>... and {} more</em></li>", total - shown));
    }
}

/// HTML variant of [`render_text`] for email clients.
pub fn render_html(rec: &ChangeRecord, limit: usize) -> String {
    let d = &rec.diff;
    let c = d.counts();
    let mut out = String::new();
    out.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\"></head><body>");
    out.push_str("<h2>Outlet monitor report</h2>");
    out.push_str(&format!(
        "<p>Checked at: {}</p>",
        encode_text(&rec.timestamp.to_rfc3339())
    ));
    out.push_str(&format!(
        "<table><tr><td>Total products</td><td>{}</td></tr><tr><td>New</td><td>{}</td></tr>\
         <tr><td>Price changes</td><td>{}</td></tr><tr><td>Removed</td><td>{}</td></tr></table>",
        rec.total_products, c.added, c.price_changes, c.removed
    ));

    if !d.added.is_empty() {
        out.push_str("<h3>New products</h3><ul>");
        for p in d.added.iter().take(limit) {
            out.push_str(&format!(
                "<li>{} <strong>{}</strong></li>",
                html_link(p),
                encode_text(or_na(p.price.as_deref()))
            ));
        }
        html_more(&mut out, d.added.len(), limit);
        out.push_str("</ul>");
    }

    if !d.price_changes.is_empty() {
        out.push_str("<h3>Price changes</h3><ul>");
        for ch in d.price_changes.iter().take(limit) {
            out.push_str(&format!(
                "<li>{} <s>{}</s> → <strong>{}</strong></li>",
                html_link(&ch.product),
                encode_text(&ch.old_price),
                encode_text(&ch.new_price)
            ));
        }
        html_more(&mut out, d.price_changes.len(), limit);
        out.push_str("</ul>");
    }

    if !d.removed.is_empty() {
        out.push_str("<h3>Removed products</h3><ul>");
        for p in d.removed.iter().take(limit) {
            out.push_str(&format!("<li>{}</li>", html_link(p)));
        }
        html_more(&mut out, d.removed.len(), limit);
        out.push_str("</ul>");
    }

    if d.is_empty() {
        out.push_str(&format!("<p>{NO_CHANGES}</p>"));
    }

    out.push_str("</body></html>");
    out
}
