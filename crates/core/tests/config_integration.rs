//! topowatch.toml 통합 설정 테스트
//!
//! - topowatch.toml.example 파싱 테스트
//! - 부분 설정 (일부 섹션만) 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 빈 파일 / 잘못된 형식 에러 테스트

use topowatch_core::config::{TopowatchConfig, MAX_PATH_HOPS};
use topowatch_core::error::{ConfigError, TopowatchError};
use topowatch_core::types::DiscoveryProtocol;

const EXAMPLE: &str = include_str!("../../../topowatch.toml.example");

/// 환경변수를 설정한 상태로 `f`를 실행한 뒤 원래 값으로 되돌립니다.
fn with_env<T>(key: &str, value: &str, f: impl FnOnce() -> T) -> T {
    let original = std::env::var(key).ok();
    // SAFETY: 호출하는 테스트는 모두 #[serial]로 직렬화됩니다.
    unsafe {
        std::env::set_var(key, value);
    }

    let result = f();

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var(key, val),
            None => std::env::remove_var(key),
        }
    }
    result
}

// =============================================================================
// topowatch.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let config = TopowatchConfig::parse(EXAMPLE).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "json");
    assert_eq!(config.general.data_dir, "/var/lib/topowatch");
    assert_eq!(config.general.pid_file, "/var/run/topowatch.pid");
}

#[test]
fn example_config_passes_validation() {
    let config = TopowatchConfig::parse(EXAMPLE).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_has_correct_discovery_defaults() {
    let config = TopowatchConfig::parse(EXAMPLE).expect("should parse");

    assert!(config.discovery.enabled);
    assert_eq!(config.discovery.interval_secs, 300);
    assert_eq!(config.discovery.max_workers, 16);
    assert_eq!(config.discovery.retry_max_attempts, 3);
    assert_eq!(config.discovery.staleness_window_secs, 900);
    assert!(config.discovery.inventory_file.is_empty());
}

#[test]
fn example_config_has_correct_scoring_weights() {
    let config = TopowatchConfig::parse(EXAMPLE).expect("should parse");
    let scoring = &config.scoring;

    // 프로토콜 신뢰 순서: Manual > LLDP > CDP > SNMP 브리지
    assert!(scoring.weight(DiscoveryProtocol::Manual) > scoring.weight(DiscoveryProtocol::Lldp));
    assert!(scoring.weight(DiscoveryProtocol::Lldp) > scoring.weight(DiscoveryProtocol::Cdp));
    assert!(
        scoring.weight(DiscoveryProtocol::Cdp) > scoring.weight(DiscoveryProtocol::SnmpBridge)
    );
    assert!((scoring.conflict_penalty - 0.5).abs() < f64::EPSILON);
}

#[test]
fn example_config_has_correct_analysis_defaults() {
    let config = TopowatchConfig::parse(EXAMPLE).expect("should parse");

    assert_eq!(config.analysis.default_k, 3);
    assert!((config.analysis.min_confidence - 0.5).abs() < f64::EPSILON);
    assert!(config.analysis.degraded_min_confidence <= config.analysis.min_confidence);
    assert!(config.analysis.max_hops <= MAX_PATH_HOPS);
}

#[test]
fn example_config_matches_code_defaults() {
    let from_file = TopowatchConfig::parse(EXAMPLE).expect("should parse");
    let from_code = TopowatchConfig::default();

    // 예시 파일과 Default 구현은 직렬화 결과가 같아야 합니다
    let file_toml = toml::to_string(&from_file).expect("should serialize");
    let code_toml = toml::to_string(&from_code).expect("should serialize");
    assert_eq!(file_toml, code_toml);
}

// =============================================================================
// 부분 설정 테스트
// =============================================================================

#[test]
fn partial_config_general_only() {
    let toml = r#"
[general]
log_level = "debug"
log_format = "pretty"
"#;
    let config = TopowatchConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(config.general.log_level, "debug");
    assert_eq!(config.general.log_format, "pretty");
    // 나머지 섹션은 기본값
    assert!(config.discovery.enabled);
    assert_eq!(config.analysis.default_k, 3);
    assert!(!config.metrics.enabled);
}

#[test]
fn partial_config_analysis_only() {
    let toml = r#"
[analysis]
default_k = 5
min_confidence = 0.7
degraded_min_confidence = 0.3
"#;
    let config = TopowatchConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(config.analysis.default_k, 5);
    assert!((config.analysis.degraded_min_confidence - 0.3).abs() < f64::EPSILON);
    // 같은 섹션의 생략된 필드는 기본값
    assert_eq!(config.analysis.max_hops, 16);
    assert_eq!(config.analysis.hop_timeout_ms, 500);
}

#[test]
fn partial_config_store_and_metrics() {
    let toml = r#"
[store]
flush_interval_secs = 0
ingestion_log = false

[metrics]
enabled = true
port = 9200
"#;
    let config = TopowatchConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(config.store.flush_interval_secs, 0);
    assert!(!config.store.ingestion_log);
    assert_eq!(config.store.commit_retries, 8);
    assert!(config.metrics.enabled);
    assert_eq!(config.metrics.port, 9200);
    assert_eq!(config.metrics.endpoint, "/metrics");
}

#[test]
fn partial_config_disabled_discovery_allows_zero_interval() {
    let toml = r#"
[discovery]
enabled = false
interval_secs = 0
"#;
    let config = TopowatchConfig::parse(toml).expect("should parse");
    config
        .validate()
        .expect("interval is only checked when discovery is enabled");
}

// =============================================================================
// 유효성 검증 테스트
// =============================================================================

#[test]
fn degraded_threshold_above_primary_is_rejected() {
    let toml = r#"
[analysis]
min_confidence = 0.4
degraded_min_confidence = 0.6
"#;
    let config = TopowatchConfig::parse(toml).expect("should parse");
    let err = config.validate().expect_err("should reject");
    match err {
        TopowatchError::Config(ConfigError::InvalidValue { field, .. }) => {
            assert_eq!(field, "analysis.degraded_min_confidence");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn max_hops_above_ceiling_is_rejected() {
    let toml = format!("[analysis]\nmax_hops = {}\n", MAX_PATH_HOPS + 1);
    let config = TopowatchConfig::parse(&toml).expect("should parse");
    assert!(matches!(
        config.validate(),
        Err(TopowatchError::Config(ConfigError::InvalidValue { .. }))
    ));
}

#[test]
fn weight_outside_unit_interval_is_rejected() {
    let config = TopowatchConfig::parse("[scoring]\ncdp_weight = -0.1\n").expect("should parse");
    let err = config.validate().expect_err("negative weight should fail");
    assert!(err.to_string().contains("scoring.cdp_weight"));
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[general]
log_level = "info"
"#;
    let result = with_env("TOPOWATCH_GENERAL_LOG_LEVEL", "error", || {
        let mut config = TopowatchConfig::parse(toml).expect("should parse");
        config.apply_env_overrides();
        config.general.log_level
    });

    assert_eq!(result, "error");
}

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_defaults() {
    let result = with_env("TOPOWATCH_DISCOVERY_RECORDS_DIR", "/srv/records", || {
        let mut config = TopowatchConfig::parse("").expect("should parse");
        config.apply_env_overrides();
        config.discovery.records_dir
    });

    assert_eq!(result, "/srv/records");
}

#[test]
#[serial_test::serial]
fn env_override_float_field() {
    let result = with_env("TOPOWATCH_ANALYSIS_MIN_CONFIDENCE", "0.65", || {
        let mut config = TopowatchConfig::parse("").expect("should parse");
        config.apply_env_overrides();
        config.analysis.min_confidence
    });

    assert!((result - 0.65).abs() < f64::EPSILON);
}

#[test]
#[serial_test::serial]
fn env_override_bool_field() {
    let result = with_env("TOPOWATCH_METRICS_ENABLED", "true", || {
        let mut config = TopowatchConfig::parse("").expect("should parse");
        config.apply_env_overrides();
        config.metrics.enabled
    });

    assert!(result);
}

#[test]
#[serial_test::serial]
fn env_override_numeric_field() {
    let result = with_env("TOPOWATCH_DISCOVERY_MAX_WORKERS", "64", || {
        let mut config = TopowatchConfig::parse("").expect("should parse");
        config.apply_env_overrides();
        config.discovery.max_workers
    });

    assert_eq!(result, 64);
}

#[test]
#[serial_test::serial]
fn env_override_unparsable_value_is_ignored() {
    let toml = r#"
[store]
snapshot_history = 32
"#;
    let result = with_env("TOPOWATCH_STORE_SNAPSHOT_HISTORY", "lots", || {
        let mut config = TopowatchConfig::parse(toml).expect("should parse");
        config.apply_env_overrides();
        config.store.snapshot_history
    });

    assert_eq!(result, 32);
}

#[test]
#[serial_test::serial]
fn env_override_missing_var_keeps_toml_value() {
    let toml = r#"
[general]
log_level = "warn"
"#;

    // SAFETY: #[serial]로 직렬화된 테스트
    unsafe {
        std::env::remove_var("TOPOWATCH_GENERAL_LOG_LEVEL");
    }

    let mut config = TopowatchConfig::parse(toml).expect("should parse");
    config.apply_env_overrides();

    assert_eq!(config.general.log_level, "warn");
}

// =============================================================================
// 빈 파일 / 잘못된 형식 에러 테스트
// =============================================================================

#[test]
fn empty_string_parses_with_defaults() {
    let config = TopowatchConfig::parse("").expect("empty string should parse");
    config.validate().expect("should validate");

    assert_eq!(config.general.log_level, "info");
    assert!(config.discovery.enabled);
    assert!(config.store.ingestion_log);
    assert!(!config.metrics.enabled);
}

#[test]
fn comments_only_parses_with_defaults() {
    let toml = r#"
# 주석만 있는 파일
# [analysis]
"#;
    let config = TopowatchConfig::parse(toml).expect("comments-only should parse");
    config.validate().expect("should validate");
    assert_eq!(config.analysis.default_k, 3);
}

#[test]
fn malformed_toml_returns_parse_error() {
    let result = TopowatchConfig::parse("[invalid toml");
    assert!(matches!(
        result,
        Err(TopowatchError::Config(ConfigError::ParseFailed { .. }))
    ));
}

#[test]
fn wrong_type_for_numeric_field() {
    let toml = r#"
[analysis]
default_k = "three"
"#;
    assert!(matches!(
        TopowatchConfig::parse(toml),
        Err(TopowatchError::Config(ConfigError::ParseFailed { .. }))
    ));
}

#[test]
fn unknown_section_is_ignored() {
    let toml = r#"
[general]
log_level = "debug"

[ebpf]
interface = "eth0"
"#;
    let config = TopowatchConfig::parse(toml).expect("unknown sections are ignored");
    assert_eq!(config.general.log_level, "debug");
}

#[tokio::test]
async fn from_file_nonexistent_returns_file_not_found() {
    let result = TopowatchConfig::from_file("/tmp/topowatch_test_nonexistent_12345.toml").await;
    assert!(matches!(
        result,
        Err(TopowatchError::Config(ConfigError::FileNotFound { .. }))
    ));
}

#[tokio::test]
async fn load_example_config_from_disk() {
    let example_path = format!(
        "{}/../../topowatch.toml.example",
        env!("CARGO_MANIFEST_DIR")
    );
    let config = TopowatchConfig::from_file(&example_path)
        .await
        .expect("example file should load");
    assert_eq!(config.store.snapshot_history, 16);
}

#[tokio::test]
async fn from_file_validates_contents() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let path = dir.path().join("topowatch.toml");
    tokio::fs::write(&path, "[store]\ncommit_retries = 0\n")
        .await
        .expect("should write config");

    let err = TopowatchConfig::from_file(&path)
        .await
        .expect_err("zero retries should fail validation");
    assert!(err.to_string().contains("store.commit_retries"));
}

// =============================================================================
// 직렬화 라운드트립 테스트
// =============================================================================

#[test]
fn serialize_and_reparse_roundtrip() {
    let mut original = TopowatchConfig::default();
    original.discovery.inventory_file = "/etc/topowatch/inventory.json".to_owned();
    original.analysis.default_k = 7;

    let toml_str = toml::to_string_pretty(&original).expect("should serialize");
    let parsed = TopowatchConfig::parse(&toml_str).expect("should reparse");
    parsed.validate().expect("reparsed should validate");

    assert_eq!(parsed.discovery.inventory_file, "/etc/topowatch/inventory.json");
    assert_eq!(parsed.analysis.default_k, 7);
    assert_eq!(parsed.metrics.port, original.metrics.port);
}
