//! 에러 타입 — 도메인별 에러 정의
//!
//! 각 크레이트는 자체 에러 enum을 두고 `From<_> for TopowatchError`를
//! 구현하여 상위 레이어로 전파합니다.

/// Topowatch 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum TopowatchError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 생명주기 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 플러그인 레지스트리 에러
    #[error("plugin error: {0}")]
    Plugin(#[from] PluginError),

    /// 토폴로지 그래프 에러
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// 수집 에러
    #[error("collect error: {0}")]
    Collect(#[from] CollectError),

    /// 질의 에러
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    /// 영속화 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TopowatchError {
    /// 서비스 전체를 멈춰야 하는 에러인지 여부
    ///
    /// 저장소 손상만 치명적으로 취급합니다.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Graph(GraphError::Corruption(_)))
    }
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 생명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 이미 실행 중
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline not running")]
    NotRunning,
}

/// 플러그인 레지스트리 에러
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// 같은 이름의 플러그인이 이미 등록됨
    #[error("plugin already registered: {name}")]
    AlreadyRegistered { name: String },

    /// 플러그인을 찾을 수 없음
    #[error("plugin not found: {name}")]
    NotFound { name: String },

    /// 시작 실패 (이미 시작된 플러그인은 정지됨)
    #[error("plugin {name} failed to start: {reason}")]
    StartFailed { name: String, reason: String },

    /// 하나 이상의 플러그인 정지 실패
    #[error("plugin stop failed: {0}")]
    StopFailed(String),
}

/// 토폴로지 그래프 에러
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// 장비/인터페이스/링크를 찾을 수 없음
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// 그래프 충돌 (운영자 조치 필요)
    #[error("graph conflict on link {link_id}: {reason}")]
    Conflict { link_id: String, reason: String },

    /// 불변식 위반, 쓰기 중단
    #[error("store corruption: {0}")]
    Corruption(String),

    /// 허용되지 않는 연산
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

/// 수집 에러
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// 수집기 응답 시간 초과
    #[error("adapter timeout for device {device_id}")]
    AdapterTimeout { device_id: String },

    /// 수집기 사용 불가
    #[error("adapter unavailable for device {device_id}: {reason}")]
    AdapterUnavailable { device_id: String, reason: String },

    /// 원격 식별자가 여러 장비에 매칭됨
    #[error("ambiguous identity '{identifier}': matches {candidates}")]
    IdentityAmbiguous {
        identifier: String,
        candidates: String,
    },

    /// 수집 작업이 취소됨
    #[error("collection cancelled")]
    Cancelled,
}

/// 질의 에러
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// 요청한 스냅샷 버전이 보존되어 있지 않음
    #[error("snapshot version {version} is not retained")]
    VersionNotRetained { version: u64 },

    /// 경로 없음
    #[error("no path found from {source_id} to {dest_id}")]
    NoPathFound { source_id: String, dest_id: String },

    /// 알 수 없는 장비
    #[error("unknown device: {0}")]
    UnknownDevice(String),

    /// 잘못된 질의 인자
    #[error("invalid query: {0}")]
    InvalidArgument(String),
}

/// 영속화 에러
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 파일 읽기/쓰기 실패
    #[error("storage io failed at {path}: {reason}")]
    Io { path: String, reason: String },

    /// 직렬화/역직렬화 실패
    #[error("storage serialization failed: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::InvalidValue {
            field: "scoring.conflict_penalty".to_owned(),
            reason: "must be within (0, 1]".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("scoring.conflict_penalty"));
        assert!(msg.contains("(0, 1]"));
    }

    #[test]
    fn config_error_converts_to_top_level() {
        let err: TopowatchError = ConfigError::FileNotFound {
            path: "/etc/topowatch/topowatch.toml".to_owned(),
        }
        .into();
        assert!(matches!(err, TopowatchError::Config(_)));
        assert!(err.to_string().starts_with("config error"));
    }

    #[test]
    fn graph_not_found_display() {
        let err = GraphError::NotFound {
            kind: "device",
            id: "sw-01".to_owned(),
        };
        assert_eq!(err.to_string(), "device not found: sw-01");
    }

    #[test]
    fn only_corruption_is_fatal() {
        let corrupt: TopowatchError = GraphError::Corruption("dangling endpoint".to_owned()).into();
        assert!(corrupt.is_fatal());

        let conflict: TopowatchError = GraphError::Conflict {
            link_id: "a:1|b:2".to_owned(),
            reason: "remote side changed".to_owned(),
        }
        .into();
        assert!(!conflict.is_fatal());

        let timeout: TopowatchError = CollectError::AdapterTimeout {
            device_id: "sw-01".to_owned(),
        }
        .into();
        assert!(!timeout.is_fatal());
    }

    #[test]
    fn query_error_display() {
        let err = QueryError::NoPathFound {
            source_id: "a".to_owned(),
            dest_id: "c".to_owned(),
        };
        assert_eq!(err.to_string(), "no path found from a to c");
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: TopowatchError = io.into();
        assert!(matches!(err, TopowatchError::Io(_)));
    }
}
