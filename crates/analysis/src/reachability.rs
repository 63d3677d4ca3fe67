//! 도달성 판정 — 최적 경로를 홉 단위로 검사
//!
//! ```text
//! find_paths(k=1) ──▶ 기본 경로 ──┐
//!        │ 없음                    ├──▶ 홉 순회 (장비 → 링크 → 장비 ...)
//!        └──▶ 저하 경로 ───────────┘        │
//!                                   첫 실패 지점에서 중단 → UNREACHABLE_AT(hop)
//!                                   저신뢰/미상/경고        → DEGRADED
//!                                   그 외                   → REACHABLE
//! ```
//!
//! 첫 실패 뒤의 홉은 검사하지 않습니다 (의존성 억제). 각 홉 검사는
//! 제한 시간과 취소를 따로 가지며, 시간 초과된 홉은 `unknown`으로 처리됩니다.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use topowatch_core::types::{Device, DeviceId, DeviceStatus};
use topowatch_topology::{Link, LinkId, TopologySnapshot};

use crate::config::AnalysisEngineConfig;
use crate::error::AnalysisError;
use crate::paths::{Path, PathHop, PathOptions, PathResult, find_paths};

// ─── 홉 검사 ─────────────────────────────────────────────────────────

/// 홉 하나의 검사 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HopState {
    /// 정상
    Up,
    /// 동작하지만 경고 상태
    Warning,
    /// 장애
    Down,
    /// 확인 불가 (상태 미상, 시간 초과, 취소)
    Unknown,
}

/// 장비와 링크의 현재 상태를 확인하는 검사기
///
/// 기본 구현 [`SnapshotProbe`]는 스냅샷에 기록된 상태를 그대로 읽습니다.
/// 능동 검사(ping, SNMP 등)는 이 트레이트를 구현해 주입합니다.
pub trait HopProbe: Send + Sync + 'static {
    /// 장비 상태를 확인합니다.
    fn probe_device(&self, device: &Device) -> impl Future<Output = HopState> + Send;

    /// 링크 상태를 확인합니다.
    fn probe_link(&self, link: &Link) -> impl Future<Output = HopState> + Send;
}

/// 스냅샷 상태 기반 검사기
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotProbe;

impl HopProbe for SnapshotProbe {
    fn probe_device(&self, device: &Device) -> impl Future<Output = HopState> + Send {
        let state = match device.status {
            DeviceStatus::Up => HopState::Up,
            DeviceStatus::Warning => HopState::Warning,
            DeviceStatus::Down => HopState::Down,
            DeviceStatus::Unknown => HopState::Unknown,
        };
        std::future::ready(state)
    }

    fn probe_link(&self, link: &Link) -> impl Future<Output = HopState> + Send {
        std::future::ready(if link.is_up {
            HopState::Up
        } else {
            HopState::Down
        })
    }
}

// ─── 판정 ────────────────────────────────────────────────────────────

/// 판정 근거
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "factor", rename_all = "snake_case")]
pub enum Factor {
    /// 저하 경로로도 연결되지 않음
    NoPath,
    /// 기본 경로가 없어 저하 경로를 사용함
    DegradedPath,
    /// 장비 장애
    DeviceDown {
        /// 장비
        device_id: DeviceId,
    },
    /// 링크 장애
    LinkDown {
        /// 링크
        link_id: LinkId,
    },
    /// 장비 상태가 경고 또는 미상
    DeviceStatus {
        /// 장비
        device_id: DeviceId,
        /// 확인된 상태
        state: HopState,
    },
    /// 신뢰 기준 미만 링크를 지남
    LowConfidence {
        /// 링크
        link_id: LinkId,
        /// 신뢰도
        confidence: f64,
    },
    /// 검사 시간 초과 또는 취소
    HopUnknown {
        /// 장비 ID 또는 링크 ID
        hop: String,
    },
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPath => f.write_str("no path"),
            Self::DegradedPath => f.write_str("degraded path used"),
            Self::DeviceDown { device_id } => write!(f, "device down: {device_id}"),
            Self::LinkDown { link_id } => write!(f, "link down: {link_id}"),
            Self::DeviceStatus { device_id, state } => {
                write!(f, "device {device_id} status {state:?}")
            }
            Self::LowConfidence {
                link_id,
                confidence,
            } => write!(f, "low confidence {confidence:.2}: {link_id}"),
            Self::HopUnknown { hop } => write!(f, "hop unknown: {hop}"),
        }
    }
}

/// 도달성 판정
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// 모든 홉 정상
    Reachable,
    /// 도달 가능하나 저하 요인 있음
    Degraded,
    /// 해당 홉에서 끊김
    UnreachableAt {
        /// 끊긴 지점의 장비
        hop: DeviceId,
    },
}

impl Verdict {
    /// 메트릭 레이블 값
    pub fn label(&self) -> &'static str {
        match self {
            Self::Reachable => "reachable",
            Self::Degraded => "degraded",
            Self::UnreachableAt { .. } => "unreachable",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reachable => f.write_str("REACHABLE"),
            Self::Degraded => f.write_str("DEGRADED"),
            Self::UnreachableAt { hop } => write!(f, "UNREACHABLE_AT({hop})"),
        }
    }
}

/// 도달성 질의 결과
#[derive(Debug, Clone, Serialize)]
pub struct ReachabilityReport {
    /// 출발 장비
    pub source: DeviceId,
    /// 도착 장비
    pub dest: DeviceId,
    /// 질의에 쓰인 스냅샷 버전
    pub snapshot_version: u64,
    /// 판정
    #[serde(flatten)]
    pub verdict: Verdict,
    /// 판정 근거
    pub factors: Vec<Factor>,
    /// 검사한 경로
    pub path: Option<Path>,
}

// ─── 엔진 ────────────────────────────────────────────────────────────

/// 도달성 판정 엔진
pub struct ReachabilityEngine<P: HopProbe = SnapshotProbe> {
    config: AnalysisEngineConfig,
    probe: Arc<P>,
}

impl ReachabilityEngine<SnapshotProbe> {
    /// 스냅샷 검사기로 엔진을 생성합니다.
    pub fn new(config: AnalysisEngineConfig) -> Self {
        Self::with_probe(config, SnapshotProbe)
    }
}

impl<P: HopProbe> ReachabilityEngine<P> {
    /// 검사기를 지정해 엔진을 생성합니다.
    pub fn with_probe(config: AnalysisEngineConfig, probe: P) -> Self {
        Self {
            config,
            probe: Arc::new(probe),
        }
    }

    /// 검사기
    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// 스냅샷 하나 위에서 `source → dest` 도달성을 판정합니다.
    pub async fn check(
        &self,
        snapshot: &TopologySnapshot,
        source: &DeviceId,
        dest: &DeviceId,
        cancel: &CancellationToken,
    ) -> Result<ReachabilityReport, AnalysisError> {
        let (path, degraded) = self.select_path(snapshot, source, dest)?;

        let mut report = ReachabilityReport {
            source: source.clone(),
            dest: dest.clone(),
            snapshot_version: snapshot.version(),
            verdict: Verdict::Reachable,
            factors: Vec::new(),
            path: None,
        };

        let Some(path) = path else {
            report.verdict = Verdict::UnreachableAt {
                hop: source.clone(),
            };
            report.factors.push(Factor::NoPath);
            return Ok(report);
        };

        let mut factors = Vec::new();
        if degraded {
            factors.push(Factor::DegradedPath);
        }
        match self.walk(snapshot, &path, cancel, &mut factors).await {
            Some((hop, failure)) => {
                report.verdict = Verdict::UnreachableAt { hop };
                report.factors = vec![failure];
            }
            None => {
                report.verdict = if factors.is_empty() {
                    Verdict::Reachable
                } else {
                    Verdict::Degraded
                };
                report.factors = factors;
            }
        }
        report.path = Some(path);

        debug!(
            source = %source,
            dest = %dest,
            verdict = %report.verdict,
            factors = report.factors.len(),
            "reachability evaluated"
        );
        Ok(report)
    }

    /// 기본 최적 경로, 없으면 저하 최적 경로를 고릅니다.
    fn select_path(
        &self,
        snapshot: &TopologySnapshot,
        source: &DeviceId,
        dest: &DeviceId,
    ) -> Result<(Option<Path>, bool), AnalysisError> {
        let options = PathOptions {
            k: 1,
            ..self.config.path_options()
        };
        if let Some(best) = best_of(find_paths(snapshot, source, dest, &options), false)? {
            return Ok((Some(best), false));
        }
        let relaxed = PathOptions {
            include_degraded: true,
            ..options
        };
        let degraded = best_of(find_paths(snapshot, source, dest, &relaxed), true)?;
        Ok((degraded, true))
    }

    /// 경로를 따라 홉을 검사합니다.
    ///
    /// 첫 실패 지점(장비)과 실패 근거를 반환합니다. 실패가 없으면 `None`이고
    /// 저하 요인은 `factors`에 쌓입니다.
    async fn walk(
        &self,
        snapshot: &TopologySnapshot,
        path: &Path,
        cancel: &CancellationToken,
        factors: &mut Vec<Factor>,
    ) -> Option<(DeviceId, Factor)> {
        for (index, device_id) in path.devices.iter().enumerate() {
            match snapshot.device(device_id) {
                Some(device) => match self.timed(self.probe.probe_device(device), cancel).await {
                    HopState::Up => {}
                    HopState::Down => {
                        return Some((
                            device_id.clone(),
                            Factor::DeviceDown {
                                device_id: device_id.clone(),
                            },
                        ));
                    }
                    state => factors.push(Factor::DeviceStatus {
                        device_id: device_id.clone(),
                        state,
                    }),
                },
                None => factors.push(Factor::HopUnknown {
                    hop: device_id.to_string(),
                }),
            }

            let Some(hop) = path.hops.get(index) else {
                continue;
            };
            let Some(link) = snapshot.link(&hop.link_id) else {
                factors.push(Factor::HopUnknown {
                    hop: hop.link_id.to_string(),
                });
                continue;
            };
            match self.timed(self.probe.probe_link(link), cancel).await {
                HopState::Down => {
                    return Some((
                        failed_end(snapshot, hop),
                        Factor::LinkDown {
                            link_id: link.id.clone(),
                        },
                    ));
                }
                HopState::Unknown => factors.push(Factor::HopUnknown {
                    hop: link.id.to_string(),
                }),
                HopState::Up | HopState::Warning => {
                    if link.confidence < self.config.trusted_confidence {
                        factors.push(Factor::LowConfidence {
                            link_id: link.id.clone(),
                            confidence: link.confidence,
                        });
                    }
                }
            }
        }
        None
    }

    /// 홉 검사에 제한 시간과 취소를 적용합니다. 둘 다 `Unknown`입니다.
    async fn timed(
        &self,
        probe: impl Future<Output = HopState>,
        cancel: &CancellationToken,
    ) -> HopState {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => HopState::Unknown,
            result = tokio::time::timeout(self.config.hop_timeout(), probe) => {
                result.unwrap_or_else(|_| {
                    warn!(timeout_ms = self.config.hop_timeout_ms, "hop probe timed out");
                    HopState::Unknown
                })
            }
        }
    }
}

/// 끊긴 링크의 책임 장비를 고릅니다.
///
/// down으로 보고된 인터페이스를 가진 쪽이 책임 장비입니다. 양쪽 모두
/// down이 아니거나 상태를 알 수 없으면 상류 장비를 반환합니다.
fn failed_end(snapshot: &TopologySnapshot, hop: &PathHop) -> DeviceId {
    if !snapshot.interface_down(&hop.from) && snapshot.interface_down(&hop.to) {
        hop.to.device_id.clone()
    } else {
        hop.from.device_id.clone()
    }
}

/// 경로 질의 결과에서 최상위 경로를 꺼냅니다. 경로 없음은 `None`입니다.
fn best_of(
    result: Result<PathResult, AnalysisError>,
    degraded: bool,
) -> Result<Option<Path>, AnalysisError> {
    match result {
        Ok(result) if degraded => Ok(result.best_degraded().cloned()),
        Ok(result) => Ok(result.best().cloned()),
        Err(AnalysisError::NoPathFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}
