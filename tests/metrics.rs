// tests/metrics.rs
use anyhow::Result;
use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusBuilder;

use outlet_monitor::{
    Extractor, JsonFileStore, Monitor, MonitorConfig, NotifierMux, ProductRecord,
};

struct Fixed(Vec<ProductRecord>);

#[async_trait]
impl Extractor for Fixed {
    async fn extract(&self) -> Result<Vec<ProductRecord>> {
        Ok(self.0.clone())
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

#[test]
fn pipeline_runs_show_up_in_prometheus_output() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = MonitorConfig {
        data_dir: tmp.path().to_path_buf(),
        ..MonitorConfig::default()
    };

    // Seed a baseline so the second run has something to diff against.
    let seed = Monitor::new(
        cfg.clone(),
        Box::new(Fixed(vec![ProductRecord::new("a", "Alpha").with_price("$1")])),
        Box::new(JsonFileStore::new(tmp.path())),
        NotifierMux::default(),
    );
    let monitor = Monitor::new(
        cfg,
        Box::new(Fixed(vec![
            ProductRecord::new("a", "Alpha").with_price("$2"),
            ProductRecord::new("b", "Beta").with_price("$3"),
        ])),
        Box::new(JsonFileStore::new(tmp.path())),
        NotifierMux::default(),
    );

    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    metrics::with_local_recorder(&recorder, || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            seed.run_once().await.unwrap();
            monitor.run_once().await.unwrap();
        });
    });

    let text = handle.render();
    for needle in [
        "monitor_runs_total 2",
        "diff_added_total 1",
        "diff_price_changes_total 1",
    ] {
        assert!(text.contains(needle), "missing {needle:?} in:\n{text}");
    }
}
