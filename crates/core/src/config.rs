//! 설정 관리 — topowatch.toml 파싱 및 런타임 설정
//!
//! [`TopowatchConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`TOPOWATCH_DISCOVERY_MAX_WORKERS=32` 형식)
//! 3. 설정 파일 (`topowatch.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), topowatch_core::error::TopowatchError> {
//! use topowatch_core::config::TopowatchConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = TopowatchConfig::load("topowatch.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = TopowatchConfig::parse("[analysis]\nmin_confidence = 0.6")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, TopowatchError};
use crate::types::DiscoveryProtocol;

/// 동시 수집 워커 최대 개수
pub const MAX_DISCOVERY_WORKERS: usize = 1024;
/// 재시도 최대 횟수
pub const MAX_RETRY_ATTEMPTS: u32 = 10;
/// 보존 가능한 스냅샷 버전 최대 개수
pub const MAX_SNAPSHOT_HISTORY: usize = 1024;
/// 경로 탐색 최대 홉 수 상한
pub const MAX_PATH_HOPS: usize = 64;

/// Topowatch 통합 설정
///
/// `topowatch.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopowatchConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 탐색/수집 설정
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    /// 신뢰도 점수 설정
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// 경로/도달성 분석 설정
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// 그래프 저장소 설정
    #[serde(default)]
    pub store: StoreConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl TopowatchConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    /// 3. 유효성 검증
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, TopowatchError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, TopowatchError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TopowatchError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                TopowatchError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, TopowatchError> {
        toml::from_str(toml_str).map_err(|e| {
            TopowatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `TOPOWATCH_{SECTION}_{FIELD}`
    /// 예: `TOPOWATCH_ANALYSIS_MIN_CONFIDENCE=0.6`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "TOPOWATCH_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "TOPOWATCH_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.data_dir, "TOPOWATCH_GENERAL_DATA_DIR");
        override_string(&mut self.general.pid_file, "TOPOWATCH_GENERAL_PID_FILE");

        // Discovery
        override_bool(&mut self.discovery.enabled, "TOPOWATCH_DISCOVERY_ENABLED");
        override_u64(
            &mut self.discovery.interval_secs,
            "TOPOWATCH_DISCOVERY_INTERVAL_SECS",
        );
        override_usize(
            &mut self.discovery.max_workers,
            "TOPOWATCH_DISCOVERY_MAX_WORKERS",
        );
        override_u64(
            &mut self.discovery.adapter_timeout_secs,
            "TOPOWATCH_DISCOVERY_ADAPTER_TIMEOUT_SECS",
        );
        override_u32(
            &mut self.discovery.retry_max_attempts,
            "TOPOWATCH_DISCOVERY_RETRY_MAX_ATTEMPTS",
        );
        override_u64(
            &mut self.discovery.retry_backoff_base_ms,
            "TOPOWATCH_DISCOVERY_RETRY_BACKOFF_BASE_MS",
        );
        override_u64(
            &mut self.discovery.retry_backoff_max_ms,
            "TOPOWATCH_DISCOVERY_RETRY_BACKOFF_MAX_MS",
        );
        override_u64(
            &mut self.discovery.staleness_window_secs,
            "TOPOWATCH_DISCOVERY_STALENESS_WINDOW_SECS",
        );
        override_string(
            &mut self.discovery.records_dir,
            "TOPOWATCH_DISCOVERY_RECORDS_DIR",
        );
        override_string(
            &mut self.discovery.inventory_file,
            "TOPOWATCH_DISCOVERY_INVENTORY_FILE",
        );

        // Scoring
        override_f64(&mut self.scoring.lldp_weight, "TOPOWATCH_SCORING_LLDP_WEIGHT");
        override_f64(&mut self.scoring.cdp_weight, "TOPOWATCH_SCORING_CDP_WEIGHT");
        override_f64(
            &mut self.scoring.snmp_bridge_weight,
            "TOPOWATCH_SCORING_SNMP_BRIDGE_WEIGHT",
        );
        override_f64(
            &mut self.scoring.manual_weight,
            "TOPOWATCH_SCORING_MANUAL_WEIGHT",
        );
        override_f64(
            &mut self.scoring.conflict_penalty,
            "TOPOWATCH_SCORING_CONFLICT_PENALTY",
        );

        // Analysis
        override_usize(&mut self.analysis.default_k, "TOPOWATCH_ANALYSIS_DEFAULT_K");
        override_f64(
            &mut self.analysis.min_confidence,
            "TOPOWATCH_ANALYSIS_MIN_CONFIDENCE",
        );
        override_f64(
            &mut self.analysis.degraded_min_confidence,
            "TOPOWATCH_ANALYSIS_DEGRADED_MIN_CONFIDENCE",
        );
        override_f64(
            &mut self.analysis.trusted_confidence,
            "TOPOWATCH_ANALYSIS_TRUSTED_CONFIDENCE",
        );
        override_usize(&mut self.analysis.max_hops, "TOPOWATCH_ANALYSIS_MAX_HOPS");
        override_u64(
            &mut self.analysis.query_timeout_ms,
            "TOPOWATCH_ANALYSIS_QUERY_TIMEOUT_MS",
        );
        override_u64(
            &mut self.analysis.hop_timeout_ms,
            "TOPOWATCH_ANALYSIS_HOP_TIMEOUT_MS",
        );

        // Store
        override_usize(
            &mut self.store.snapshot_history,
            "TOPOWATCH_STORE_SNAPSHOT_HISTORY",
        );
        override_u32(
            &mut self.store.commit_retries,
            "TOPOWATCH_STORE_COMMIT_RETRIES",
        );
        override_u64(
            &mut self.store.flush_interval_secs,
            "TOPOWATCH_STORE_FLUSH_INTERVAL_SECS",
        );
        override_bool(
            &mut self.store.ingestion_log,
            "TOPOWATCH_STORE_INGESTION_LOG",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "TOPOWATCH_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "TOPOWATCH_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "TOPOWATCH_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), TopowatchError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.general.data_dir.is_empty() {
            return Err(invalid("general.data_dir", "must not be empty"));
        }

        self.discovery.validate()?;
        self.scoring.validate()?;
        self.analysis.validate()?;
        self.store.validate()?;

        if self.metrics.enabled && self.metrics.endpoint != "/metrics" {
            return Err(invalid("metrics.endpoint", "only '/metrics' is supported"));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> TopowatchError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

fn check_unit_interval(field: &str, value: f64) -> Result<(), TopowatchError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(field, format!("must be within [0, 1], got {value}")));
    }
    Ok(())
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 데이터 디렉토리 (수집 로그, 스냅샷 테이블)
    pub data_dir: String,
    /// PID 파일 경로
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            data_dir: "/var/lib/topowatch".to_owned(),
            pid_file: "/var/run/topowatch.pid".to_owned(),
        }
    }
}

/// 탐색/수집 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// 주기적 수집 활성화 여부
    pub enabled: bool,
    /// 수집 사이클 간격 (초)
    pub interval_secs: u64,
    /// 동시 수집 워커 수
    pub max_workers: usize,
    /// 수집기 호출 1회 제한 시간 (초)
    pub adapter_timeout_secs: u64,
    /// 재시도 최대 횟수 (첫 시도 제외)
    pub retry_max_attempts: u32,
    /// 지수 백오프 기본 지연 (밀리초)
    pub retry_backoff_base_ms: u64,
    /// 지수 백오프 최대 지연 (밀리초)
    pub retry_backoff_max_ms: u64,
    /// 링크 노후 판정 기간 (초)
    pub staleness_window_secs: u64,
    /// 파일 기반 수집기가 읽는 디렉토리 (`<device_id>.json`)
    pub records_dir: String,
    /// 시작 시 등록할 장비 인벤토리 파일 (JSON 배열)
    pub inventory_file: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
            max_workers: 16,
            adapter_timeout_secs: 30,
            retry_max_attempts: 3,
            retry_backoff_base_ms: 500,
            retry_backoff_max_ms: 30_000,
            staleness_window_secs: 900,
            records_dir: "/var/lib/topowatch/records".to_owned(),
            inventory_file: String::new(),
        }
    }
}

impl DiscoveryConfig {
    fn validate(&self) -> Result<(), TopowatchError> {
        if self.max_workers == 0 || self.max_workers > MAX_DISCOVERY_WORKERS {
            return Err(invalid(
                "discovery.max_workers",
                format!("must be within 1..={MAX_DISCOVERY_WORKERS}"),
            ));
        }
        if self.enabled && self.interval_secs == 0 {
            return Err(invalid("discovery.interval_secs", "must be greater than 0"));
        }
        if self.adapter_timeout_secs == 0 {
            return Err(invalid(
                "discovery.adapter_timeout_secs",
                "must be greater than 0",
            ));
        }
        if self.retry_max_attempts > MAX_RETRY_ATTEMPTS {
            return Err(invalid(
                "discovery.retry_max_attempts",
                format!("must be at most {MAX_RETRY_ATTEMPTS}"),
            ));
        }
        if self.retry_backoff_base_ms > self.retry_backoff_max_ms {
            return Err(invalid(
                "discovery.retry_backoff_base_ms",
                "must not exceed retry_backoff_max_ms",
            ));
        }
        if self.staleness_window_secs == 0 {
            return Err(invalid(
                "discovery.staleness_window_secs",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// 신뢰도 점수 설정
///
/// 프로토콜별 기본 가중치와 충돌 감쇠 계수입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// LLDP 가중치
    pub lldp_weight: f64,
    /// CDP 가중치
    pub cdp_weight: f64,
    /// SNMP 브리지 테이블 상관 가중치
    pub snmp_bridge_weight: f64,
    /// 수동 등록 가중치
    pub manual_weight: f64,
    /// 충돌 시 기존 링크 신뢰도에 곱하는 계수
    pub conflict_penalty: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            lldp_weight: 0.90,
            cdp_weight: 0.80,
            snmp_bridge_weight: 0.50,
            manual_weight: 1.00,
            conflict_penalty: 0.50,
        }
    }
}

impl ScoringConfig {
    /// 프로토콜의 기본 가중치를 반환합니다.
    pub fn weight(&self, protocol: DiscoveryProtocol) -> f64 {
        match protocol {
            DiscoveryProtocol::Lldp => self.lldp_weight,
            DiscoveryProtocol::Cdp => self.cdp_weight,
            DiscoveryProtocol::SnmpBridge => self.snmp_bridge_weight,
            DiscoveryProtocol::Manual => self.manual_weight,
        }
    }

    fn validate(&self) -> Result<(), TopowatchError> {
        check_unit_interval("scoring.lldp_weight", self.lldp_weight)?;
        check_unit_interval("scoring.cdp_weight", self.cdp_weight)?;
        check_unit_interval("scoring.snmp_bridge_weight", self.snmp_bridge_weight)?;
        check_unit_interval("scoring.manual_weight", self.manual_weight)?;
        if !(self.conflict_penalty > 0.0 && self.conflict_penalty <= 1.0) {
            return Err(invalid(
                "scoring.conflict_penalty",
                format!("must be within (0, 1], got {}", self.conflict_penalty),
            ));
        }
        Ok(())
    }
}

/// 경로/도달성 분석 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// 기본 반환 경로 수
    pub default_k: usize,
    /// 기본 최소 링크 신뢰도
    pub min_confidence: f64,
    /// 저하(degraded) 결과 집합의 최소 신뢰도
    pub degraded_min_confidence: f64,
    /// 도달성 판정 시 "신뢰" 링크 기준
    pub trusted_confidence: f64,
    /// 경로 탐색 최대 홉 수
    pub max_hops: usize,
    /// 질의 제한 시간 (밀리초)
    pub query_timeout_ms: u64,
    /// 홉 검사 제한 시간 (밀리초)
    pub hop_timeout_ms: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            default_k: 3,
            min_confidence: 0.5,
            degraded_min_confidence: 0.0,
            trusted_confidence: 0.8,
            max_hops: 16,
            query_timeout_ms: 2_000,
            hop_timeout_ms: 500,
        }
    }
}

impl AnalysisConfig {
    fn validate(&self) -> Result<(), TopowatchError> {
        if self.default_k == 0 {
            return Err(invalid("analysis.default_k", "must be greater than 0"));
        }
        check_unit_interval("analysis.min_confidence", self.min_confidence)?;
        check_unit_interval(
            "analysis.degraded_min_confidence",
            self.degraded_min_confidence,
        )?;
        check_unit_interval("analysis.trusted_confidence", self.trusted_confidence)?;
        if self.degraded_min_confidence > self.min_confidence {
            return Err(invalid(
                "analysis.degraded_min_confidence",
                "must not exceed min_confidence",
            ));
        }
        if self.max_hops == 0 || self.max_hops > MAX_PATH_HOPS {
            return Err(invalid(
                "analysis.max_hops",
                format!("must be within 1..={MAX_PATH_HOPS}"),
            ));
        }
        if self.query_timeout_ms == 0 || self.hop_timeout_ms == 0 {
            return Err(invalid(
                "analysis.query_timeout_ms",
                "query and hop timeouts must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// 그래프 저장소 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// 조회 가능하도록 보존할 최근 스냅샷 수
    pub snapshot_history: usize,
    /// 낙관적 커밋 충돌 시 재계획 최대 횟수
    pub commit_retries: u32,
    /// 스냅샷 테이블 주기적 플러시 간격 (초, 0이면 종료 시에만)
    pub flush_interval_secs: u64,
    /// 추가 전용 수집 로그 기록 여부
    pub ingestion_log: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_history: 16,
            commit_retries: 8,
            flush_interval_secs: 60,
            ingestion_log: true,
        }
    }
}

impl StoreConfig {
    fn validate(&self) -> Result<(), TopowatchError> {
        if self.snapshot_history == 0 || self.snapshot_history > MAX_SNAPSHOT_HISTORY {
            return Err(invalid(
                "store.snapshot_history",
                format!("must be within 1..={MAX_SNAPSHOT_HISTORY}"),
            ));
        }
        if self.commit_retries == 0 {
            return Err(invalid("store.commit_retries", "must be greater than 0"));
        }
        Ok(())
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus 엔드포인트 활성화 여부
    pub enabled: bool,
    /// 바인딩 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9102,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_u32(target: &mut u32, env_key: &str) {
    override_parsed(target, env_key, "u32");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

fn override_f64(target: &mut f64, env_key: &str) {
    override_parsed(target, env_key, "f64");
}
