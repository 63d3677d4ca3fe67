//! 토폴로지 저장소 에러 타입
//!
//! [`TopologyError`]는 그래프 병합, 커밋, 영속화 중 발생하는 에러를 표현합니다.
//! `From<TopologyError> for TopowatchError` 변환으로 `?` 전파가 가능합니다.

use topowatch_core::error::{GraphError, QueryError, StorageError, TopowatchError};

/// 토폴로지 저장소 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    /// 장비를 찾을 수 없음
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// 인터페이스를 찾을 수 없음
    #[error("interface not found: {device_id}/{interface_id}")]
    InterfaceNotFound {
        /// 장비 ID
        device_id: String,
        /// 인터페이스 ID
        interface_id: String,
    },

    /// 링크를 찾을 수 없음
    #[error("link not found: {0}")]
    LinkNotFound(String),

    /// 해당 링크에 기록된 충돌이 없음
    #[error("no conflict recorded for link {0}")]
    NoConflict(String),

    /// 허용되지 않는 연산
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// 재시도 후에도 동시 커밋과 계속 충돌함
    #[error("commit contention: gave up after {attempts} attempts")]
    CommitContention {
        /// 시도 횟수
        attempts: u32,
    },

    /// 불변식 위반 감지, 저장소가 쓰기를 중단함
    #[error("store corruption: {0}")]
    Corruption(String),

    /// 이전 손상으로 쓰기가 중단된 상태
    #[error("store halted: {0}")]
    Halted(String),

    /// 요청한 버전이 보존 범위를 벗어남
    #[error("snapshot version {0} is not retained")]
    VersionNotRetained(u64),

    /// 파일 I/O 실패
    #[error("persistence io error: {path}: {reason}")]
    Io {
        /// 대상 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 직렬화 실패
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl TopologyError {
    /// 저장소가 쓰기를 거부하는 상태에서 발생한 에러인지 여부
    pub fn is_halt(&self) -> bool {
        matches!(self, Self::Corruption(_) | Self::Halted(_))
    }
}

impl From<TopologyError> for TopowatchError {
    fn from(err: TopologyError) -> Self {
        match err {
            TopologyError::DeviceNotFound(id) => GraphError::NotFound {
                kind: "device",
                id,
            }
            .into(),
            TopologyError::InterfaceNotFound {
                device_id,
                interface_id,
            } => GraphError::NotFound {
                kind: "interface",
                id: format!("{device_id}/{interface_id}"),
            }
            .into(),
            TopologyError::LinkNotFound(id) | TopologyError::NoConflict(id) => {
                GraphError::NotFound { kind: "link", id }.into()
            }
            TopologyError::InvalidOperation(msg) => GraphError::InvalidOperation(msg).into(),
            TopologyError::CommitContention { attempts } => GraphError::InvalidOperation(
                format!("commit contention after {attempts} attempts"),
            )
            .into(),
            TopologyError::Corruption(msg) | TopologyError::Halted(msg) => {
                GraphError::Corruption(msg).into()
            }
            TopologyError::VersionNotRetained(version) => {
                QueryError::VersionNotRetained { version }.into()
            }
            TopologyError::Io { path, reason } => StorageError::Io { path, reason }.into(),
            TopologyError::Serialization(msg) => StorageError::Serialization(msg).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interface_not_found_display() {
        let err = TopologyError::InterfaceNotFound {
            device_id: "core-1".to_owned(),
            interface_id: "eth9".to_owned(),
        };
        assert_eq!(err.to_string(), "interface not found: core-1/eth9");
    }

    #[test]
    fn halt_predicate() {
        assert!(TopologyError::Corruption("dangling".to_owned()).is_halt());
        assert!(TopologyError::Halted("dangling".to_owned()).is_halt());
        assert!(!TopologyError::LinkNotFound("a|b".to_owned()).is_halt());
    }

    #[test]
    fn corruption_is_fatal_at_top_level() {
        let err: TopowatchError = TopologyError::Corruption("bad endpoint".to_owned()).into();
        assert!(err.is_fatal());
    }

    #[test]
    fn version_not_retained_maps_to_query_error() {
        let err: TopowatchError = TopologyError::VersionNotRetained(3).into();
        assert!(matches!(
            err,
            TopowatchError::Query(QueryError::VersionNotRetained { version: 3 })
        ));
    }

    #[test]
    fn io_maps_to_storage_error() {
        let err: TopowatchError = TopologyError::Io {
            path: "/tmp/snapshot.json".to_owned(),
            reason: "permission denied".to_owned(),
        }
        .into();
        assert!(matches!(err, TopowatchError::Storage(_)));
        assert!(err.to_string().contains("snapshot.json"));
    }
}
