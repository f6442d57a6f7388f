//! JSON persistence for the baseline snapshot, the latest change record and
//! a capped change history. Every write goes to a temp file in the same
//! directory and is renamed over the target.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::diff::ChangeRecord;
use crate::record::{ProductRecord, Snapshot};

pub const BASELINE_FILE: &str = "baseline.json";
pub const CHANGES_FILE: &str = "changes.json";
pub const HISTORY_FILE: &str = "history.json";
pub const REPORTS_DIR: &str = "reports";

#[async_trait]
pub trait BaselineStore: Send + Sync {
    /// Empty snapshot if no baseline has been written yet.
    async fn load_baseline(&self) -> Result<Snapshot>;
    async fn save_baseline(&self, snapshot: &Snapshot) -> Result<()>;

    /// Keep a computed change record (and its rendered report) for later
    /// delivery or inspection. Stores without an archive ignore it.
    async fn archive_changes(&self, _record: &ChangeRecord, _report: Option<&str>) -> Result<()> {
        Ok(())
    }
}

/// On-disk layout of the baseline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineFile {
    pub products: Vec<ProductRecord>,
    pub count: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
    history_limit: usize,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            history_limit: 100,
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    pub fn baseline_path(&self) -> PathBuf {
        self.dir.join(BASELINE_FILE)
    }

    pub fn changes_path(&self) -> PathBuf {
        self.dir.join(CHANGES_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE)
    }

    /// Overwrite `changes.json` with the latest change record.
    pub async fn save_changes(&self, record: &ChangeRecord) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(record).context("serialize change record")?;
        write_atomic(&self.changes_path(), &bytes).await
    }

    pub async fn load_latest_changes(&self) -> Result<Option<ChangeRecord>> {
        let path = self.changes_path();
        match fs::read(&path).await {
            Ok(bytes) => {
                let rec = serde_json::from_slice(&bytes)
                    .with_context(|| format!("parse {}", path.display()))?;
                Ok(Some(rec))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }

    /// Oldest first. A missing or unreadable history starts fresh.
    pub async fn load_history(&self) -> Vec<ChangeRecord> {
        let path = self.history_path();
        match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "history unreadable, starting fresh");
                Vec::new()
            }),
            Err(_) => Vec::new(),
        }
    }

    /// Append to `history.json`, dropping the oldest entries past the cap.
    pub async fn append_history(&self, record: &ChangeRecord) -> Result<()> {
        let mut history = self.load_history().await;
        history.push(record.clone());
        if history.len() > self.history_limit {
            let excess = history.len() - self.history_limit;
            history.drain(0..excess);
        }
        let bytes = serde_json::to_vec_pretty(&history).context("serialize history")?;
        write_atomic(&self.history_path(), &bytes).await
    }

    /// Write a rendered report to `reports/report_YYYYmmdd_HHMMSS.txt`.
    pub async fn save_report(&self, text: &str, at: DateTime<Utc>) -> Result<PathBuf> {
        let dir = self.dir.join(REPORTS_DIR);
        let path = dir.join(format!("report_{}.txt", at.format("%Y%m%d_%H%M%S")));
        write_atomic(&path, text.as_bytes()).await?;
        Ok(path)
    }
}

#[async_trait]
impl BaselineStore for JsonFileStore {
    async fn load_baseline(&self) -> Result<Snapshot> {
        let path = self.baseline_path();
        let bytes = match fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Snapshot::new()),
            Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
        };
        let file: BaselineFile = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse baseline {}", path.display()))?;

        let (snapshot, issues) = Snapshot::from_records(file.products);
        if !issues.is_clean() {
            tracing::warn!(
                duplicates = ?issues.duplicate_ids,
                dropped = issues.dropped_without_id,
                "baseline contained malformed records"
            );
        }
        Ok(snapshot)
    }

    async fn save_baseline(&self, snapshot: &Snapshot) -> Result<()> {
        let products: Vec<ProductRecord> = snapshot.records().cloned().collect();
        let file = BaselineFile {
            count: products.len(),
            products,
            timestamp: Utc::now(),
        };
        let bytes = serde_json::to_vec_pretty(&file).context("serialize baseline")?;
        write_atomic(&self.baseline_path(), &bytes).await?;
        tracing::debug!(count = file.count, "baseline saved");
        Ok(())
    }

    async fn archive_changes(&self, record: &ChangeRecord, report: Option<&str>) -> Result<()> {
        self.save_changes(record).await?;
        self.append_history(record).await?;
        if let Some(text) = report {
            let path = self.save_report(text, record.timestamp).await?;
            tracing::info!(path = %path.display(), "report saved");
        }
        Ok(())
    }
}

/// Write `bytes` to a sibling temp file, fsync, then rename over `path`.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("create dir {}", dir.display()))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("state");
    let tmp = dir.join(format!(".{file_name}.{}.tmp", std::process::id()));

    let res = async {
        let mut f = fs::File::create(&tmp)
            .await
            .with_context(|| format!("create {}", tmp.display()))?;
        f.write_all(bytes)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        f.sync_all()
            .await
            .with_context(|| format!("sync {}", tmp.display()))?;
        drop(f);
        fs::rename(&tmp, path)
            .await
            .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))
    }
    .await;

    if res.is_err() {
        let _ = fs::remove_file(&tmp).await;
    }
    res
}
