//! 수집 엔진 설정
//!
//! [`DiscoveryEngineConfig`]는 core의 [`DiscoveryConfig`]를 기반으로
//! 엔진 내부에서 쓰는 밀리초 단위 제한 시간 등을 더한 설정입니다.
//!
//! # 사용 예시
//! ```ignore
//! use topowatch_core::config::TopowatchConfig;
//! use topowatch_discovery::config::DiscoveryEngineConfig;
//!
//! let core_config = TopowatchConfig::default();
//! let config = DiscoveryEngineConfig::from_core(&core_config.discovery);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use topowatch_core::config::DiscoveryConfig;

use crate::error::DiscoveryError;
use crate::retry::{Backoff, RetryPolicy};

/// 설정 상한값 상수
const MAX_WORKERS: usize = 1024;
const MAX_RETRY_ATTEMPTS: u32 = 10;
const MAX_INTERVAL_SECS: u64 = 86_400;
const MAX_ADAPTER_TIMEOUT_MS: u64 = 600_000;

/// 수집 엔진 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryEngineConfig {
    /// 주기적 수집 활성화 여부
    pub enabled: bool,
    /// 수집 사이클 간격 (초)
    pub interval_secs: u64,
    /// 동시 수집 워커 수
    pub max_workers: usize,
    /// 수집기 호출 1회 제한 시간 (밀리초)
    pub adapter_timeout_ms: u64,
    /// 재시도 최대 횟수 (첫 시도 제외)
    pub retry_max_attempts: u32,
    /// 지수 백오프 기본 지연 (밀리초)
    pub retry_backoff_base_ms: u64,
    /// 지수 백오프 최대 지연 (밀리초)
    pub retry_backoff_max_ms: u64,

    // --- 확장 설정 (core에 없는 추가 필드) ---
    /// 사이클마다 노후 링크 정리를 함께 수행할지 여부
    pub sweep_stale: bool,
}

impl Default for DiscoveryEngineConfig {
    fn default() -> Self {
        Self::from_core(&DiscoveryConfig::default())
    }
}

impl DiscoveryEngineConfig {
    /// core의 `DiscoveryConfig`에서 엔진 설정을 생성합니다.
    pub fn from_core(core: &DiscoveryConfig) -> Self {
        Self {
            enabled: core.enabled,
            interval_secs: core.interval_secs,
            max_workers: core.max_workers,
            adapter_timeout_ms: core.adapter_timeout_secs.saturating_mul(1000),
            retry_max_attempts: core.retry_max_attempts,
            retry_backoff_base_ms: core.retry_backoff_base_ms,
            retry_backoff_max_ms: core.retry_backoff_max_ms,
            sweep_stale: true,
        }
    }

    /// 사이클 간격
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// 수집기 재시도 정책
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry_max_attempts,
            timeout: Duration::from_millis(self.adapter_timeout_ms),
            backoff: Backoff::new(
                Duration::from_millis(self.retry_backoff_base_ms),
                Duration::from_millis(self.retry_backoff_max_ms),
            ),
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), DiscoveryError> {
        if self.max_workers == 0 || self.max_workers > MAX_WORKERS {
            return Err(DiscoveryError::Config {
                field: "max_workers".to_owned(),
                reason: format!("must be 1-{MAX_WORKERS}"),
            });
        }
        if self.interval_secs == 0 || self.interval_secs > MAX_INTERVAL_SECS {
            return Err(DiscoveryError::Config {
                field: "interval_secs".to_owned(),
                reason: format!("must be 1-{MAX_INTERVAL_SECS}"),
            });
        }
        if self.adapter_timeout_ms == 0 || self.adapter_timeout_ms > MAX_ADAPTER_TIMEOUT_MS {
            return Err(DiscoveryError::Config {
                field: "adapter_timeout_ms".to_owned(),
                reason: format!("must be 1-{MAX_ADAPTER_TIMEOUT_MS}"),
            });
        }
        if self.retry_max_attempts > MAX_RETRY_ATTEMPTS {
            return Err(DiscoveryError::Config {
                field: "retry_max_attempts".to_owned(),
                reason: format!("must be 0-{MAX_RETRY_ATTEMPTS}"),
            });
        }
        if self.retry_backoff_base_ms > self.retry_backoff_max_ms {
            return Err(DiscoveryError::Config {
                field: "retry_backoff_base_ms".to_owned(),
                reason: "must not exceed retry_backoff_max_ms".to_owned(),
            });
        }
        Ok(())
    }
}

/// 수집 엔진 설정 빌더
#[derive(Default)]
pub struct DiscoveryEngineConfigBuilder {
    config: DiscoveryEngineConfig,
}

impl DiscoveryEngineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 주기적 수집 활성화 여부를 설정합니다.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// 사이클 간격(초)을 설정합니다.
    pub fn interval_secs(mut self, secs: u64) -> Self {
        self.config.interval_secs = secs;
        self
    }

    /// 워커 수를 설정합니다.
    pub fn max_workers(mut self, workers: usize) -> Self {
        self.config.max_workers = workers;
        self
    }

    /// 수집기 제한 시간(밀리초)을 설정합니다.
    pub fn adapter_timeout_ms(mut self, ms: u64) -> Self {
        self.config.adapter_timeout_ms = ms;
        self
    }

    /// 재시도 횟수를 설정합니다.
    pub fn retry_max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry_max_attempts = attempts;
        self
    }

    /// 백오프 기본/최대 지연(밀리초)을 설정합니다.
    pub fn retry_backoff_ms(mut self, base_ms: u64, max_ms: u64) -> Self {
        self.config.retry_backoff_base_ms = base_ms;
        self.config.retry_backoff_max_ms = max_ms;
        self
    }

    /// 노후 정리 수행 여부를 설정합니다.
    pub fn sweep_stale(mut self, sweep: bool) -> Self {
        self.config.sweep_stale = sweep;
        self
    }

    /// 설정을 검증하고 생성합니다.
    pub fn build(self) -> Result<DiscoveryEngineConfig, DiscoveryError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
