// tests/config_env.rs
use std::path::{Path, PathBuf};
use std::{env, fs};

use outlet_monitor::config::{MonitorConfig, ENV_CONFIG_PATH};

const TOUCHED: &[&str] = &[
    ENV_CONFIG_PATH,
    "MONITOR_TARGET_URL",
    "MONITOR_DATA_DIR",
    "MONITOR_INTERVAL_SECS",
    "MONITOR_SAMPLE_LIMIT",
    "SENDER_EMAIL",
    "SENDER_PASSWORD",
    "SLACK_WEBHOOK_URL",
    "DISCORD_WEBHOOK_URL",
    "WEBHOOK_URL",
    "WEBHOOK_KIND",
];

fn clear_env() {
    for k in TOUCHED {
        env::remove_var(k);
    }
}

/// Switches into `dir` and restores the previous CWD and env on drop,
/// even when an assertion fails midway.
struct CwdGuard {
    old: PathBuf,
}

impl CwdGuard {
    fn enter(dir: &Path) -> Self {
        let old = env::current_dir().unwrap();
        env::set_current_dir(dir).unwrap();
        Self { old }
    }
}

impl Drop for CwdGuard {
    fn drop(&mut self) {
        clear_env();
        let _ = env::set_current_dir(&self.old);
    }
}

#[serial_test::serial]
#[test]
fn defaults_then_fallback_file_then_env_path_then_env_values() {
    // Isolate CWD so the repo's own config/ is not picked up.
    let tmp = tempfile::tempdir().unwrap();
    let _cwd = CwdGuard::enter(tmp.path());
    clear_env();

    // 1) Nothing present: built-in defaults.
    let cfg = MonitorConfig::load(None).unwrap();
    assert_eq!(cfg, {
        let mut d = MonitorConfig::default();
        d.sanitize();
        d
    });

    // 2) ./config/monitor.toml fallback.
    fs::create_dir_all(tmp.path().join("config")).unwrap();
    fs::write(
        tmp.path().join("config/monitor.toml"),
        r#"
target_url = "https://fallback.example/c/all"
interval_secs = 900
"#,
    )
    .unwrap();
    let cfg = MonitorConfig::load(None).unwrap();
    assert_eq!(cfg.target_url, "https://fallback.example/c/all");
    assert_eq!(cfg.interval_secs, 900);

    // 3) MONITOR_CONFIG_PATH beats the fallback.
    let custom = tmp.path().join("custom.toml");
    fs::write(
        &custom,
        r#"
target_url = "https://custom.example/c/sale"
sample_limit = 3

[notify]
slack_webhook_url = "https://hooks.slack.example/file"
"#,
    )
    .unwrap();
    env::set_var(ENV_CONFIG_PATH, custom.display().to_string());
    let cfg = MonitorConfig::load(None).unwrap();
    assert_eq!(cfg.target_url, "https://custom.example/c/sale");
    assert_eq!(cfg.sample_limit, 3);
    assert_eq!(cfg.interval_secs, 30 * 60);

    // 4) Individual env vars beat file values.
    env::set_var("MONITOR_TARGET_URL", "https://env.example/c/mens");
    env::set_var("SLACK_WEBHOOK_URL", "https://hooks.slack.example/env");
    env::set_var("MONITOR_INTERVAL_SECS", "0");
    let cfg = MonitorConfig::load(None).unwrap();
    assert_eq!(cfg.target_url, "https://env.example/c/mens");
    assert_eq!(
        cfg.notify.slack_webhook_url.as_deref(),
        Some("https://hooks.slack.example/env")
    );
    // Zero interval is sanitized back to the default.
    assert_eq!(cfg.interval_secs, 30 * 60);
}

#[serial_test::serial]
#[test]
fn missing_explicit_or_env_path_is_an_error() {
    clear_env();
    let tmp = tempfile::tempdir().unwrap();
    let missing = tmp.path().join("nope.toml");

    assert!(MonitorConfig::load(Some(&missing)).is_err());

    env::set_var(ENV_CONFIG_PATH, missing.display().to_string());
    assert!(MonitorConfig::load(None).is_err());
    clear_env();
}

#[serial_test::serial]
#[test]
fn malformed_toml_reports_the_path() {
    clear_env();
    let tmp = tempfile::tempdir().unwrap();
    let p = tmp.path().join("bad.toml");
    fs::write(&p, "interval_secs = \"soon\"").unwrap();

    let err = MonitorConfig::load(Some(&p)).unwrap_err();
    assert!(format!("{err:#}").contains("bad.toml"));
}
