use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on the exporter).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("monitor_runs_total", "Pipeline runs started.");
        describe_counter!(
            "monitor_extraction_failures_total",
            "Runs skipped because extraction failed or returned nothing."
        );
        describe_counter!("extract_products_total", "Product records parsed from pages.");
        describe_counter!("extract_fetch_errors_total", "Page fetch attempts that failed.");
        describe_histogram!("extract_parse_ms", "Page parse time in milliseconds.");
        describe_counter!("diff_added_total", "Products reported as added.");
        describe_counter!("diff_removed_total", "Products reported as removed.");
        describe_counter!("diff_price_changes_total", "Price changes reported.");
        describe_counter!("notify_sent_total", "Notifications delivered.");
        describe_counter!("notify_errors_total", "Notification delivery failures.");
        describe_counter!("store_errors_total", "Baseline/change persistence failures.");
        describe_gauge!("monitor_baseline_products", "Products in the current baseline.");
        describe_gauge!("monitor_last_run_ts", "Unix ts when the pipeline last completed.");
    });
}

/// Install the Prometheus recorder with its own HTTP listener on `addr`.
/// Must be called from inside a tokio runtime.
pub fn install_exporter(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("prometheus: install exporter")?;
    ensure_metrics_described();
    tracing::info!(%addr, "metrics exporter listening");
    Ok(())
}
