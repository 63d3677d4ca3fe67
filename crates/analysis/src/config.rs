//! 분석 엔진 설정
//!
//! core의 [`AnalysisConfig`]를 시간 단위 타입으로 감싸고 질의별 옵션의
//! 기본값을 제공합니다.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use topowatch_core::config::AnalysisConfig;

use crate::error::AnalysisError;
use crate::paths::PathOptions;

/// 설정 상한값 상수
const MAX_K: usize = 64;
const MAX_HOPS: usize = 64;
const MAX_QUERY_TIMEOUT_MS: u64 = 60_000;

/// 분석 엔진 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisEngineConfig {
    /// 기본 반환 경로 수
    pub default_k: usize,
    /// 기본 최소 링크 신뢰도
    pub min_confidence: f64,
    /// 저하 결과 집합의 최소 신뢰도
    pub degraded_min_confidence: f64,
    /// 이 값 미만 신뢰도의 링크는 도달성 판정에서 저하 요인
    pub trusted_confidence: f64,
    /// 경로 탐색 최대 홉 수
    pub max_hops: usize,
    /// 경로 질의 제한 시간 (밀리초)
    pub query_timeout_ms: u64,
    /// 홉 검사 1회 제한 시간 (밀리초)
    pub hop_timeout_ms: u64,
}

impl Default for AnalysisEngineConfig {
    fn default() -> Self {
        Self::from_core(&AnalysisConfig::default())
    }
}

impl AnalysisEngineConfig {
    /// core의 `AnalysisConfig`에서 생성합니다.
    pub fn from_core(core: &AnalysisConfig) -> Self {
        Self {
            default_k: core.default_k,
            min_confidence: core.min_confidence,
            degraded_min_confidence: core.degraded_min_confidence,
            trusted_confidence: core.trusted_confidence,
            max_hops: core.max_hops,
            query_timeout_ms: core.query_timeout_ms,
            hop_timeout_ms: core.hop_timeout_ms,
        }
    }

    /// 질의 제한 시간
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// 홉 검사 제한 시간
    pub fn hop_timeout(&self) -> Duration {
        Duration::from_millis(self.hop_timeout_ms)
    }

    /// 설정 기본값으로 채운 경로 질의 옵션
    pub fn path_options(&self) -> PathOptions {
        PathOptions {
            k: self.default_k,
            min_confidence: self.min_confidence,
            degraded_min_confidence: self.degraded_min_confidence,
            max_hops: self.max_hops,
            timeout: Some(self.query_timeout()),
            include_degraded: false,
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.default_k == 0 || self.default_k > MAX_K {
            return Err(invalid("default_k", format!("must be 1-{MAX_K}")));
        }
        if self.max_hops == 0 || self.max_hops > MAX_HOPS {
            return Err(invalid("max_hops", format!("must be 1-{MAX_HOPS}")));
        }
        for (field, value) in [
            ("min_confidence", self.min_confidence),
            ("degraded_min_confidence", self.degraded_min_confidence),
            ("trusted_confidence", self.trusted_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, "must be within [0, 1]".to_owned()));
            }
        }
        if self.degraded_min_confidence > self.min_confidence {
            return Err(invalid(
                "degraded_min_confidence",
                "must not exceed min_confidence".to_owned(),
            ));
        }
        if self.query_timeout_ms == 0 || self.query_timeout_ms > MAX_QUERY_TIMEOUT_MS {
            return Err(invalid(
                "query_timeout_ms",
                format!("must be 1-{MAX_QUERY_TIMEOUT_MS}"),
            ));
        }
        if self.hop_timeout_ms == 0 || self.hop_timeout_ms > self.query_timeout_ms {
            return Err(invalid(
                "hop_timeout_ms",
                "must be 1-query_timeout_ms".to_owned(),
            ));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> AnalysisError {
    AnalysisError::Config {
        field: field.to_owned(),
        reason,
    }
}

/// 분석 엔진 설정 빌더
#[derive(Default)]
pub struct AnalysisEngineConfigBuilder {
    config: AnalysisEngineConfig,
}

impl AnalysisEngineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 기본 경로 수를 설정합니다.
    pub fn default_k(mut self, k: usize) -> Self {
        self.config.default_k = k;
        self
    }

    /// 최소 신뢰도를 설정합니다.
    pub fn min_confidence(mut self, min: f64) -> Self {
        self.config.min_confidence = min;
        self
    }

    /// 신뢰 기준을 설정합니다.
    pub fn trusted_confidence(mut self, trusted: f64) -> Self {
        self.config.trusted_confidence = trusted;
        self
    }

    /// 최대 홉 수를 설정합니다.
    pub fn max_hops(mut self, hops: usize) -> Self {
        self.config.max_hops = hops;
        self
    }

    /// 질의/홉 제한 시간(밀리초)을 설정합니다.
    pub fn timeouts_ms(mut self, query_ms: u64, hop_ms: u64) -> Self {
        self.config.query_timeout_ms = query_ms;
        self.config.hop_timeout_ms = hop_ms;
        self
    }

    /// 설정을 검증하고 생성합니다.
    pub fn build(self) -> Result<AnalysisEngineConfig, AnalysisError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_core_defaults() {
        let config = AnalysisEngineConfig::default();
        assert_eq!(config.default_k, 3);
        assert!((config.min_confidence - 0.5).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn path_options_carry_timeout() {
        let options = AnalysisEngineConfig::default().path_options();
        assert_eq!(options.timeout, Some(Duration::from_millis(2_000)));
        assert!(!options.include_degraded);
    }

    #[test]
    fn rejects_confidence_out_of_range() {
        let err = AnalysisEngineConfigBuilder::new()
            .min_confidence(1.5)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("min_confidence"));
    }

    #[test]
    fn rejects_hop_timeout_above_query_timeout() {
        let err = AnalysisEngineConfigBuilder::new()
            .timeouts_ms(100, 500)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("hop_timeout_ms"));
    }

    #[test]
    fn rejects_zero_hops() {
        assert!(AnalysisEngineConfigBuilder::new().max_hops(0).build().is_err());
    }
}
