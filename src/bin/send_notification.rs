//! Re-send the latest stored change record through the configured channels.
//! Used by schedulers that run the monitor and delivery as separate steps.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

use outlet_monitor::config::MonitorConfig;
use outlet_monitor::notify::{report, NotifierMux};
use outlet_monitor::store::JsonFileStore;

#[derive(Parser, Debug)]
#[command(name = "send-notification", version, about = "Deliver the last change record")]
struct Args {
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Send even if the stored record has no changes.
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    outlet_monitor::init_tracing("outlet_monitor=info,send_notification=info,warn");

    let args = Args::parse();
    let mut cfg = MonitorConfig::load(args.config.as_deref())?;
    if let Some(dir) = args.data_dir {
        cfg.data_dir = dir;
    }

    let store = JsonFileStore::new(&cfg.data_dir);
    let Some(record) = store.load_latest_changes().await? else {
        bail!("no change record at {}", store.changes_path().display());
    };

    if !record.has_changes() && !args.force {
        tracing::info!("latest record has no changes; nothing to send");
        return Ok(());
    }

    let mux = NotifierMux::from_config(&cfg);
    if mux.is_empty() {
        bail!("no notification channels configured");
    }

    tracing::info!(summary = %report::summary_line(&record), channels = mux.len(), "sending");
    let delivery = mux.notify(&record).await;
    for (channel, err) in &delivery.failed {
        tracing::error!(channel, error = %err, "delivery failed");
    }
    if !delivery.any_delivered() {
        bail!("no channel accepted the notification");
    }
    println!("delivered via {}", delivery.delivered.join(", "));
    Ok(())
}
