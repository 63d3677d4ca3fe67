//! 분석 에러 타입
//!
//! [`AnalysisError`]는 경로 탐색과 도달성 질의의 실패를 표현합니다.
//! 질의 시간 초과는 에러가 아니라 결과의 `truncated` 플래그로 전달됩니다.

use topowatch_core::error::{ConfigError, QueryError, TopowatchError};
use topowatch_topology::TopologyError;

/// 분석 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// 그래프에 없는 장비
    #[error("unknown device: {0}")]
    UnknownDevice(String),

    /// 출발지와 목적지가 연결되어 있지 않음
    #[error("no path found from {source_id} to {dest_id}")]
    NoPathFound {
        /// 출발 장비
        source_id: String,
        /// 도착 장비
        dest_id: String,
    },

    /// 요청한 스냅샷 버전이 보존되어 있지 않음
    #[error("snapshot version {version} is not retained")]
    VersionNotRetained {
        /// 요청 버전
        version: u64,
    },

    /// 잘못된 질의 인자
    #[error("invalid query: {0}")]
    InvalidArgument(String),

    /// 설정 오류
    #[error("analysis config error: {field}: {reason}")]
    Config {
        /// 필드 이름
        field: String,
        /// 사유
        reason: String,
    },

    /// 저장소 에러
    #[error(transparent)]
    Store(TopologyError),
}

impl From<TopologyError> for AnalysisError {
    fn from(err: TopologyError) -> Self {
        match err {
            TopologyError::VersionNotRetained(version) => Self::VersionNotRetained { version },
            TopologyError::DeviceNotFound(id) => Self::UnknownDevice(id),
            other => Self::Store(other),
        }
    }
}

impl From<AnalysisError> for TopowatchError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::UnknownDevice(id) => QueryError::UnknownDevice(id).into(),
            AnalysisError::NoPathFound { source_id, dest_id } => {
                QueryError::NoPathFound { source_id, dest_id }.into()
            }
            AnalysisError::VersionNotRetained { version } => {
                QueryError::VersionNotRetained { version }.into()
            }
            AnalysisError::InvalidArgument(msg) => QueryError::InvalidArgument(msg).into(),
            AnalysisError::Config { field, reason } => {
                ConfigError::InvalidValue { field, reason }.into()
            }
            AnalysisError::Store(inner) => inner.into(),
        }
    }
}
