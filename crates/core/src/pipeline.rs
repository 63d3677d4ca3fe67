//! 파이프라인 trait — 장기 실행 모듈의 생명주기 확장 포인트

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::TopowatchError;

/// 박싱된 Send future (dyn-compatible trait 메서드 반환용)
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 모듈 건강 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작하지만 일부 기능 저하
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 여부
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 동작 불가 여부
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// 장기 실행 파이프라인 trait
///
/// 수집 엔진처럼 백그라운드 태스크를 소유하는 모듈이 구현합니다.
pub trait Pipeline: Send + Sync {
    /// 파이프라인을 시작합니다.
    ///
    /// 이미 실행 중이면 `PipelineError::AlreadyRunning`을 반환합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), TopowatchError>> + Send;

    /// 파이프라인을 정지합니다 (graceful).
    fn stop(&mut self) -> impl Future<Output = Result<(), TopowatchError>> + Send;

    /// 건강 상태를 확인합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}
