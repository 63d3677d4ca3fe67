//! 토폴로지 저장소 설정
//!
//! [`TopologyConfig`]는 core의 [`TopowatchConfig`]에서 점수/저장소/노후 설정을
//! 모아 저장소가 쓰는 형태로 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use topowatch_core::config::TopowatchConfig;
//! use topowatch_topology::config::TopologyConfig;
//!
//! let core_config = TopowatchConfig::default();
//! let config = TopologyConfig::from_core(&core_config);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use topowatch_core::config::{ScoringConfig, TopowatchConfig};

use crate::error::TopologyError;

/// 보존 가능한 스냅샷 상한
const MAX_SNAPSHOT_HISTORY: usize = 1024;

/// 토폴로지 저장소 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// 프로토콜 가중치와 충돌 패널티
    pub scoring: ScoringConfig,
    /// 보존할 최근 스냅샷 수
    pub snapshot_history: usize,
    /// 낙관적 커밋 재시도 횟수
    pub commit_retries: u32,
    /// 갱신 없이 이 기간이 지나면 링크를 down 처리 (초)
    pub staleness_window_secs: u64,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            snapshot_history: 16,
            commit_retries: 8,
            staleness_window_secs: 900,
        }
    }
}

impl TopologyConfig {
    /// core 설정에서 저장소 설정을 생성합니다.
    pub fn from_core(core: &TopowatchConfig) -> Self {
        Self {
            scoring: core.scoring.clone(),
            snapshot_history: core.store.snapshot_history,
            commit_retries: core.store.commit_retries,
            staleness_window_secs: core.discovery.staleness_window_secs,
        }
    }

    /// 노후 판정 기간
    pub fn staleness_window(&self) -> Duration {
        Duration::from_secs(self.staleness_window_secs)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), TopologyError> {
        if self.snapshot_history == 0 || self.snapshot_history > MAX_SNAPSHOT_HISTORY {
            return Err(TopologyError::InvalidOperation(format!(
                "snapshot_history must be 1-{MAX_SNAPSHOT_HISTORY}"
            )));
        }
        if self.commit_retries == 0 {
            return Err(TopologyError::InvalidOperation(
                "commit_retries must be greater than 0".to_owned(),
            ));
        }
        if !(self.scoring.conflict_penalty > 0.0 && self.scoring.conflict_penalty <= 1.0) {
            return Err(TopologyError::InvalidOperation(
                "conflict_penalty must be within (0, 1]".to_owned(),
            ));
        }
        Ok(())
    }
}

/// 토폴로지 설정 빌더
#[derive(Default)]
pub struct TopologyConfigBuilder {
    config: TopologyConfig,
}

impl TopologyConfigBuilder {
    /// 기본값에서 시작하는 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 점수 설정
    pub fn scoring(mut self, scoring: ScoringConfig) -> Self {
        self.config.scoring = scoring;
        self
    }

    /// 스냅샷 보존 수
    pub fn snapshot_history(mut self, history: usize) -> Self {
        self.config.snapshot_history = history;
        self
    }

    /// 커밋 재시도 횟수
    pub fn commit_retries(mut self, retries: u32) -> Self {
        self.config.commit_retries = retries;
        self
    }

    /// 노후 판정 기간 (초)
    pub fn staleness_window_secs(mut self, secs: u64) -> Self {
        self.config.staleness_window_secs = secs;
        self
    }

    /// 설정을 검증하고 생성합니다.
    pub fn build(self) -> Result<TopologyConfig, TopologyError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_core_copies_store_and_scoring() {
        let mut core = TopowatchConfig::default();
        core.store.snapshot_history = 4;
        core.store.commit_retries = 2;
        core.discovery.staleness_window_secs = 60;
        core.scoring.lldp_weight = 0.7;

        let config = TopologyConfig::from_core(&core);
        assert_eq!(config.snapshot_history, 4);
        assert_eq!(config.commit_retries, 2);
        assert_eq!(config.staleness_window(), Duration::from_secs(60));
        assert!((config.scoring.lldp_weight - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn builder_rejects_zero_history() {
        let result = TopologyConfigBuilder::new().snapshot_history(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn builder_accepts_defaults() {
        let config = TopologyConfigBuilder::new()
            .commit_retries(3)
            .build()
            .unwrap();
        assert_eq!(config.commit_retries, 3);
    }
}
