//! Outlet monitor entrypoint.
//! Runs the scrape → diff → notify pipeline once, or on an interval until Ctrl-C.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use outlet_monitor::config::MonitorConfig;
use outlet_monitor::metrics::install_exporter;
use outlet_monitor::pipeline::{log_outcome, Monitor, RunOutcome};

#[derive(Parser, Debug)]
#[command(name = "outlet-monitor", version, about = "Watch a product listing for new items, removals and price changes")]
struct Args {
    /// Run a single check and exit.
    #[arg(long)]
    once: bool,

    /// Minutes between checks in continuous mode.
    #[arg(long, value_name = "MINUTES")]
    interval_minutes: Option<u64>,

    /// TOML config file (defaults to $MONITOR_CONFIG_PATH, then config/monitor.toml).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory for baseline, change records and reports.
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Listing page to monitor.
    #[arg(long)]
    url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; it usually carries SMTP and webhook secrets.
    let _ = dotenvy::dotenv();
    outlet_monitor::init_tracing("outlet_monitor=info,warn");

    let args = Args::parse();
    let mut cfg = MonitorConfig::load(args.config.as_deref())?;
    if let Some(m) = args.interval_minutes {
        cfg.interval_secs = m.saturating_mul(60);
    }
    if let Some(dir) = args.data_dir {
        cfg.data_dir = dir;
    }
    if let Some(url) = args.url {
        cfg.target_url = url;
    }
    cfg.sanitize();

    if let Some(addr) = cfg.metrics_addr {
        install_exporter(addr)?;
    }

    tracing::info!(
        url = %cfg.target_url,
        data_dir = %cfg.data_dir.display(),
        "outlet monitor starting"
    );
    let monitor = Monitor::from_config(cfg)?;

    if args.once {
        let outcome = monitor.run_once().await?;
        log_outcome(&outcome);
        if let RunOutcome::ExtractionFailed { reason } = outcome {
            anyhow::bail!("extraction failed: {reason}");
        }
        return Ok(());
    }

    monitor
        .run_forever(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;
    Ok(())
}
