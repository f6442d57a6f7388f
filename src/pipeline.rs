//! # Monitor pipeline
//! One run is extract → diff against the baseline → notify → persist.
//! A run never overwrites the baseline with an empty extraction, and the
//! baseline is written last so a failed delivery cannot lose a change.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use metrics::{counter, gauge};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::time::{self, MissedTickBehavior};

use crate::config::MonitorConfig;
use crate::diff::{compute_diff, ChangeRecord};
use crate::extract::{Extractor, PageExtractor};
use crate::metrics::ensure_metrics_described;
use crate::notify::{report, DeliveryReport, NotifierMux};
use crate::record::Snapshot;
use crate::store::{BaselineStore, JsonFileStore};

pub const LOCK_FILE: &str = "monitor.lock";

#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Nothing usable was extracted; the baseline was left untouched.
    ExtractionFailed { reason: String },
    /// No baseline existed; the current snapshot became the baseline.
    BaselineCreated {
        products: usize,
        delivery: Option<DeliveryReport>,
    },
    Compared {
        record: ChangeRecord,
        delivery: Option<DeliveryReport>,
    },
}

pub struct Monitor {
    cfg: MonitorConfig,
    extractor: Box<dyn Extractor>,
    store: Box<dyn BaselineStore>,
    notifier: NotifierMux,
}

impl Monitor {
    pub fn new(
        cfg: MonitorConfig,
        extractor: Box<dyn Extractor>,
        store: Box<dyn BaselineStore>,
        notifier: NotifierMux,
    ) -> Self {
        Self {
            cfg,
            extractor,
            store,
            notifier,
        }
    }

    /// Wire the HTTP extractor, JSON store and configured channels.
    pub fn from_config(cfg: MonitorConfig) -> Result<Self> {
        let extractor = PageExtractor::from_config(&cfg)?;
        let store = JsonFileStore::new(&cfg.data_dir).with_history_limit(cfg.history_limit);
        let notifier = NotifierMux::from_config(&cfg);
        Ok(Self::new(cfg, Box::new(extractor), Box::new(store), notifier))
    }

    fn extraction_failed(&self, reason: String) -> RunOutcome {
        tracing::warn!(extractor = self.extractor.name(), %reason, "extraction failed; keeping previous baseline");
        counter!("monitor_extraction_failures_total").increment(1);
        RunOutcome::ExtractionFailed { reason }
    }

    async fn save_baseline(&self, snapshot: &Snapshot) -> Result<()> {
        if let Err(e) = self.store.save_baseline(snapshot).await {
            counter!("store_errors_total").increment(1);
            return Err(e).context("baseline not updated; the next run will diff against stale data");
        }
        gauge!("monitor_baseline_products").set(snapshot.len() as f64);
        Ok(())
    }

    /// Keep the record for `send-notification` and later inspection. Not fatal.
    async fn archive(&self, record: &ChangeRecord) {
        let text = self
            .cfg
            .write_reports
            .then(|| report::render_text(record, self.cfg.sample_limit));
        if let Err(e) = self.store.archive_changes(record, text.as_deref()).await {
            tracing::warn!(error = ?e, "could not archive change record");
            counter!("store_errors_total").increment(1);
        }
    }

    /// One full pipeline pass under the run lock.
    pub async fn run_once(&self) -> Result<RunOutcome> {
        ensure_metrics_described();
        counter!("monitor_runs_total").increment(1);

        let _lock = RunLock::acquire(
            &self.cfg.data_dir,
            Duration::from_secs(self.cfg.lock_stale_secs),
        )
        .await?;

        let products = match self.extractor.extract().await {
            Ok(v) if !v.is_empty() => v,
            Ok(_) => return Ok(self.extraction_failed("no products extracted".to_string())),
            Err(e) => return Ok(self.extraction_failed(format!("{e:#}"))),
        };

        let (current, issues) = Snapshot::from_records(products);
        if !issues.is_clean() {
            tracing::warn!(
                duplicates = ?issues.duplicate_ids,
                dropped = issues.dropped_without_id,
                "extracted records had data-quality problems"
            );
        }
        if current.is_empty() {
            return Ok(self.extraction_failed("every extracted record lacked an id".to_string()));
        }

        let baseline = self.store.load_baseline().await.context("load baseline")?;
        let now = Utc::now();

        if baseline.is_empty() {
            tracing::info!(products = current.len(), "first run, creating baseline");
            let delivery = if self.cfg.notify_on_first_run {
                let rec = ChangeRecord::new(compute_diff(&baseline, &current), current.len(), now);
                self.archive(&rec).await;
                Some(self.notifier.notify(&rec).await)
            } else {
                None
            };
            self.save_baseline(&current).await?;
            gauge!("monitor_last_run_ts").set(now.timestamp() as f64);
            return Ok(RunOutcome::BaselineCreated {
                products: current.len(),
                delivery,
            });
        }

        tracing::info!(
            baseline = baseline.len(),
            current = current.len(),
            "comparing against baseline"
        );
        let record = ChangeRecord::new(compute_diff(&baseline, &current), current.len(), now);
        let counts = record.diff.counts();
        counter!("diff_added_total").increment(counts.added as u64);
        counter!("diff_removed_total").increment(counts.removed as u64);
        counter!("diff_price_changes_total").increment(counts.price_changes as u64);

        if record.has_changes() {
            tracing::info!(summary = %report::summary_line(&record), "changes detected");
        } else {
            tracing::info!("no changes");
        }
        self.archive(&record).await;

        let delivery = if record.has_changes() || self.cfg.notify_when_unchanged {
            Some(self.notifier.notify(&record).await)
        } else {
            None
        };

        self.save_baseline(&current).await?;
        gauge!("monitor_last_run_ts").set(now.timestamp() as f64);

        Ok(RunOutcome::Compared { record, delivery })
    }

    /// Run on the configured interval until `shutdown` resolves.
    /// The first run starts immediately; failed runs are logged and retried next tick.
    pub async fn run_forever<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let period = Duration::from_secs(self.cfg.interval_secs);
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(interval_secs = self.cfg.interval_secs, "continuous monitoring started");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested, stopping monitor");
                    break;
                }
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(outcome) => log_outcome(&outcome),
                        Err(e) => tracing::error!(error = ?e, "monitor run failed"),
                    }
                    tracing::info!(next_in_secs = period.as_secs(), "waiting for next check");
                }
            }
        }
    }
}

pub fn log_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::ExtractionFailed { reason } => {
            tracing::warn!(%reason, "run skipped")
        }
        RunOutcome::BaselineCreated { products, .. } => {
            tracing::info!(products, "baseline created")
        }
        RunOutcome::Compared { record, delivery } => {
            let c = record.diff.counts();
            tracing::info!(
                added = c.added,
                removed = c.removed,
                price_changes = c.price_changes,
                notified = delivery.as_ref().map(|d| d.delivered.len()).unwrap_or(0),
                "run complete"
            )
        }
    }
}

/// Exclusive lock file held for one pipeline run. Removed on drop, unless
/// another run has taken it over in the meantime.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    stamp: String,
}

impl RunLock {
    /// Fails if another live run holds the lock. A lock file older than
    /// `stale_after` is assumed to be left over from a crash and taken over.
    pub async fn acquire(dir: &Path, stale_after: Duration) -> Result<Self> {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("create dir {}", dir.display()))?;
        let path = dir.join(LOCK_FILE);

        for _ in 0..2 {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut f) => {
                    let stamp = format!("{} {}\n", std::process::id(), Utc::now().to_rfc3339());
                    f.write_all(stamp.as_bytes())
                        .await
                        .with_context(|| format!("write {}", path.display()))?;
                    f.flush()
                        .await
                        .with_context(|| format!("flush {}", path.display()))?;
                    return Ok(Self { path, stamp });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if !Self::is_stale(&path, stale_after).await {
                        bail!("another monitor run holds {}", path.display());
                    }
                    tracing::warn!(path = %path.display(), "removing stale run lock");
                    let _ = fs::remove_file(&path).await;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("create lock {}", path.display()))
                }
            }
        }
        bail!("could not acquire run lock {}", path.display())
    }

    async fn is_stale(path: &Path, stale_after: Duration) -> bool {
        match fs::metadata(path).await.and_then(|m| m.modified()) {
            Ok(modified) => modified
                .elapsed()
                .map(|age| age > stale_after)
                .unwrap_or(false),
            Err(_) => true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        match std::fs::read_to_string(&self.path) {
            Ok(current) if current == self.stamp => {
                let _ = std::fs::remove_file(&self.path);
            }
            Ok(_) => {
                tracing::warn!(path = %self.path.display(), "run lock was taken over; leaving it in place")
            }
            Err(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lock_is_exclusive_and_released_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let stale = Duration::from_secs(3600);

        let first = RunLock::acquire(tmp.path(), stale).await.unwrap();
        assert!(first.path().exists());
        assert!(RunLock::acquire(tmp.path(), stale).await.is_err());

        drop(first);
        let again = RunLock::acquire(tmp.path(), stale).await.unwrap();
        drop(again);
        assert!(!tmp.path().join(LOCK_FILE).exists());
    }

    #[tokio::test]
    async fn lock_taken_over_by_another_run_is_not_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let lock = RunLock::acquire(tmp.path(), Duration::from_secs(3600))
            .await
            .unwrap();
        std::fs::write(lock.path(), "4242 2025-10-01T08:00:00+00:00\n").unwrap();

        drop(lock);
        let left = std::fs::read_to_string(tmp.path().join(LOCK_FILE)).unwrap();
        assert!(left.starts_with("4242 "));
    }

    #[tokio::test]
    async fn stale_lock_is_taken_over() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(LOCK_FILE), "999 old\n").unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let lock = RunLock::acquire(tmp.path(), Duration::from_millis(1)).await;
        assert!(lock.is_ok());
    }
}
