// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod config;
pub mod diff;
pub mod extract;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod record;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::config::MonitorConfig;
pub use crate::diff::{compute_diff, ChangeRecord, DiffResult, PriceChange};
pub use crate::extract::{Extractor, PageExtractor};
pub use crate::notify::{DeliveryReport, Notifier, NotifierMux};
pub use crate::pipeline::{Monitor, RunLock, RunOutcome};
pub use crate::record::{ProductRecord, Snapshot};
pub use crate::store::{BaselineStore, JsonFileStore};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber shared by both binaries.
/// `RUST_LOG` wins over `default_filter`; `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_target(false)).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}
