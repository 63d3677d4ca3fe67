//! Configuration loading and validation tests.
//!
//! Tests TOML parsing, environment variable overrides, partial configs, and validation.

use std::env;

use serial_test::serial;
use topowatch_core::config::TopowatchConfig;

const FULL_CONFIG: &str = r#"
[general]
log_level = "debug"
log_format = "pretty"
data_dir = "/srv/topowatch"
pid_file = "/run/topowatch.pid"

[discovery]
enabled = true
interval_secs = 120
max_workers = 8
adapter_timeout_secs = 10
retry_max_attempts = 4
retry_backoff_base_ms = 250
retry_backoff_max_ms = 8000
staleness_window_secs = 600
records_dir = "/srv/topowatch/records"
inventory_file = "/etc/topowatch/inventory.json"

[scoring]
lldp_weight = 0.9
cdp_weight = 0.8
snmp_bridge_weight = 0.4
manual_weight = 1.0
conflict_penalty = 0.5

[analysis]
default_k = 5
min_confidence = 0.6
degraded_min_confidence = 0.2
trusted_confidence = 0.9
max_hops = 12
query_timeout_ms = 1500
hop_timeout_ms = 250

[store]
snapshot_history = 32
commit_retries = 4
flush_interval_secs = 30
ingestion_log = false

[metrics]
enabled = true
listen_addr = "0.0.0.0"
port = 9200
endpoint = "/metrics"
"#;

#[test]
fn test_parse_full_config() {
    let config = TopowatchConfig::parse(FULL_CONFIG).expect("full config should parse");
    config.validate().expect("full config should validate");

    assert_eq!(config.general.log_format, "pretty");
    assert_eq!(config.general.data_dir, "/srv/topowatch");
    assert_eq!(config.discovery.max_workers, 8);
    assert_eq!(config.discovery.inventory_file, "/etc/topowatch/inventory.json");
    assert!((config.scoring.snmp_bridge_weight - 0.4).abs() < f64::EPSILON);
    assert_eq!(config.analysis.default_k, 5);
    assert_eq!(config.analysis.max_hops, 12);
    assert_eq!(config.store.snapshot_history, 32);
    assert!(!config.store.ingestion_log);
    assert_eq!(config.metrics.port, 9200);
}

#[test]
fn test_parse_partial_config_with_defaults() {
    let config = TopowatchConfig::parse(
        r#"
[analysis]
default_k = 2
"#,
    )
    .expect("partial config should parse");

    assert_eq!(config.analysis.default_k, 2);
    assert!((config.analysis.min_confidence - 0.5).abs() < f64::EPSILON);
    assert_eq!(config.general.log_level, "info");
    assert!(config.discovery.enabled);
    assert!(config.store.ingestion_log);
}

#[test]
fn test_parse_empty_config() {
    let config = TopowatchConfig::parse("").expect("empty config should parse");
    config.validate().expect("defaults should validate");
}

#[test]
fn test_parse_malformed_toml_fails() {
    let result = TopowatchConfig::parse("[general\nlog_level = ");
    assert!(result.is_err());
}

#[test]
fn test_validation_rejects_degraded_threshold_above_min() {
    let config = TopowatchConfig::parse(
        r#"
[analysis]
min_confidence = 0.4
degraded_min_confidence = 0.6
"#,
    )
    .unwrap();
    let err = config.validate().unwrap_err().to_string();
    assert!(err.contains("analysis.degraded_min_confidence"), "got: {err}");
}

#[test]
fn test_validation_rejects_weight_outside_unit_interval() {
    let config = TopowatchConfig::parse(
        r#"
[scoring]
cdp_weight = 1.5
"#,
    )
    .unwrap();
    assert!(config.validate().is_err());
}

#[test]
#[serial]
fn test_env_override_takes_precedence_over_toml() {
    // SAFETY: serialized by #[serial]; no other thread reads this variable.
    unsafe {
        env::set_var("TOPOWATCH_ANALYSIS_MIN_CONFIDENCE", "0.75");
        env::set_var("TOPOWATCH_GENERAL_LOG_LEVEL", "warn");
    }

    let mut config = TopowatchConfig::parse(FULL_CONFIG).unwrap();
    config.apply_env_overrides();

    unsafe {
        env::remove_var("TOPOWATCH_ANALYSIS_MIN_CONFIDENCE");
        env::remove_var("TOPOWATCH_GENERAL_LOG_LEVEL");
    }

    assert!((config.analysis.min_confidence - 0.75).abs() < f64::EPSILON);
    assert_eq!(config.general.log_level, "warn");
}

#[test]
#[serial]
fn test_env_override_with_unparsable_value_is_ignored() {
    unsafe {
        env::set_var("TOPOWATCH_DISCOVERY_MAX_WORKERS", "many");
    }

    let mut config = TopowatchConfig::parse(FULL_CONFIG).unwrap();
    config.apply_env_overrides();

    unsafe {
        env::remove_var("TOPOWATCH_DISCOVERY_MAX_WORKERS");
    }

    assert_eq!(config.discovery.max_workers, 8);
}

#[tokio::test]
#[serial]
async fn test_load_from_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("topowatch.toml");
    std::fs::write(&path, FULL_CONFIG).unwrap();

    let config = TopowatchConfig::load(&path).await.expect("load should succeed");
    assert_eq!(config.discovery.interval_secs, 120);
}

#[tokio::test]
async fn test_load_missing_file_fails() {
    let result = TopowatchConfig::load("/nonexistent/topowatch.toml").await;
    let err = result.expect_err("missing file should fail").to_string();
    assert!(err.contains("/nonexistent/topowatch.toml"), "got: {err}");
}
