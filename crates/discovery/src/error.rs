//! 수집 에러 타입
//!
//! [`DiscoveryError`]는 수집기 호출, 레코드 파일, 설정, 저장소 커밋에서
//! 발생하는 에러를 표현합니다. `From<DiscoveryError> for TopowatchError`가
//! 구현되어 있어 상위 레이어에서 `?`로 전파할 수 있습니다.

use topowatch_core::error::{CollectError, ConfigError, StorageError, TopowatchError};
use topowatch_topology::TopologyError;

/// 수집 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// 수집기 응답 시간 초과
    #[error("adapter timeout for device {device_id}")]
    AdapterTimeout {
        /// 대상 장비
        device_id: String,
    },

    /// 수집기에 연결할 수 없음 (일시적)
    #[error("adapter unavailable for device {device_id}: {reason}")]
    AdapterUnavailable {
        /// 대상 장비
        device_id: String,
        /// 사유
        reason: String,
    },

    /// 수집기가 요청을 거부함 (재시도해도 같은 결과)
    #[error("adapter rejected device {device_id}: {reason}")]
    AdapterRejected {
        /// 대상 장비
        device_id: String,
        /// 사유
        reason: String,
    },

    /// 레코드 파일 읽기/파싱 실패
    #[error("records file error: {path}: {reason}")]
    Records {
        /// 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 수집이 취소됨
    #[error("collection cancelled")]
    Cancelled,

    /// 저장소 커밋 실패
    #[error("store error: {0}")]
    Store(#[from] TopologyError),
}

impl DiscoveryError {
    /// 백오프 후 다시 시도할 만한 에러인지 여부
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::AdapterTimeout { .. } | Self::AdapterUnavailable { .. }
        )
    }
}

impl From<DiscoveryError> for TopowatchError {
    fn from(err: DiscoveryError) -> Self {
        match err {
            DiscoveryError::AdapterTimeout { device_id } => {
                TopowatchError::Collect(CollectError::AdapterTimeout { device_id })
            }
            DiscoveryError::AdapterUnavailable { device_id, reason } => {
                TopowatchError::Collect(CollectError::AdapterUnavailable { device_id, reason })
            }
            DiscoveryError::AdapterRejected { device_id, reason } => {
                TopowatchError::Collect(CollectError::AdapterUnavailable {
                    device_id,
                    reason: format!("rejected: {reason}"),
                })
            }
            DiscoveryError::Records { path, reason } => {
                TopowatchError::Storage(StorageError::Io { path, reason })
            }
            DiscoveryError::Config { field, reason } => {
                TopowatchError::Config(ConfigError::InvalidValue { field, reason })
            }
            DiscoveryError::Cancelled => TopowatchError::Collect(CollectError::Cancelled),
            DiscoveryError::Store(inner) => inner.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_errors_retry() {
        assert!(
            DiscoveryError::AdapterTimeout {
                device_id: "sw1".to_owned()
            }
            .is_retryable()
        );
        assert!(
            DiscoveryError::AdapterUnavailable {
                device_id: "sw1".to_owned(),
                reason: "connection refused".to_owned(),
            }
            .is_retryable()
        );
        assert!(
            !DiscoveryError::AdapterRejected {
                device_id: "sw1".to_owned(),
                reason: "bad community".to_owned(),
            }
            .is_retryable()
        );
        assert!(!DiscoveryError::Cancelled.is_retryable());
    }

    #[test]
    fn timeout_maps_to_collect_error() {
        let err: TopowatchError = DiscoveryError::AdapterTimeout {
            device_id: "core-1".to_owned(),
        }
        .into();
        assert!(matches!(
            err,
            TopowatchError::Collect(CollectError::AdapterTimeout { .. })
        ));
        assert!(err.to_string().contains("core-1"));
    }

    #[test]
    fn rejected_keeps_reason() {
        let err: TopowatchError = DiscoveryError::AdapterRejected {
            device_id: "edge-2".to_owned(),
            reason: "unsupported protocol".to_owned(),
        }
        .into();
        let msg = err.to_string();
        assert!(msg.contains("rejected"));
        assert!(msg.contains("unsupported protocol"));
    }

    #[test]
    fn store_halt_stays_fatal() {
        let err: TopowatchError =
            DiscoveryError::from(TopologyError::Halted("dangling link".to_owned())).into();
        assert!(err.is_fatal());
    }
}
