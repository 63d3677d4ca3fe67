//! 수집기 호출 재시도 — 지수 백오프와 시도별 제한 시간
//!
//! ```text
//! attempt 0 ──timeout──▶ Err(retryable) ──sleep(base·2^0)──▶ attempt 1 ── ... ──▶ 마지막 에러
//!      │                       │
//!      └─ Ok ──▶ 반환           └─ Err(non-retryable) ──▶ 즉시 반환
//! ```

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use topowatch_core::metrics as m;
use topowatch_core::types::DeviceId;

use crate::error::DiscoveryError;

/// 상한이 있는 지수 백오프
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    /// 기본 지연과 상한으로 생성합니다.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// `retry`번째 재시도 전 지연: `base × 2^retry`, 상한 적용
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

/// 재시도 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 첫 시도 이후 재시도 최대 횟수
    pub max_retries: u32,
    /// 시도 1회 제한 시간
    pub timeout: Duration,
    /// 재시도 간 지연
    pub backoff: Backoff,
}

/// 정책에 따라 `op`를 재시도합니다.
///
/// 시간 초과는 [`DiscoveryError::AdapterTimeout`]으로 바뀌고, 재시도할 수 없는
/// 에러는 바로 반환됩니다. 백오프 대기 중 취소되면 [`DiscoveryError::Cancelled`]입니다.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    device_id: &DeviceId,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, DiscoveryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DiscoveryError>>,
{
    let mut last_error = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let delay = policy.backoff.delay(attempt - 1);
            warn!(
                device_id = %device_id,
                attempt,
                backoff_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "retrying adapter call"
            );
            metrics::counter!(m::DISCOVERY_ADAPTER_RETRIES_TOTAL).increment(1);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DiscoveryError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DiscoveryError::Cancelled),
            result = tokio::time::timeout(policy.timeout, op()) => result,
        };
        match outcome {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) if err.is_retryable() => last_error = Some(err),
            Ok(Err(err)) => return Err(err),
            Err(_elapsed) => {
                last_error = Some(DiscoveryError::AdapterTimeout {
                    device_id: device_id.to_string(),
                });
            }
        }
    }

    Err(last_error.unwrap_or_else(|| DiscoveryError::AdapterUnavailable {
        device_id: device_id.to_string(),
        reason: "no attempts made".to_owned(),
    }))
}
