//! 링크 모델 — 두 인터페이스 사이의 무방향 물리 연결
//!
//! 링크 ID는 정렬된 두 엔드포인트에서 결정적으로 만들어지므로
//! 어느 쪽 장비가 먼저 보고하든 같은 링크로 병합됩니다.
//!
//! ```text
//! (core-1, eth1) ──┐
//!                  ├─▶ LinkId("core-1:eth1|dist-1:ge-0/0/1")
//! (dist-1, ge-0/0/1)┘
//! ```

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use topowatch_core::types::{DeviceId, DiscoveryProtocol, InterfaceId, Timestamp};

/// 수동 링크 증거의 보고자 ID
pub const MANUAL_REPORTER: &str = "@operator";

// ─── Endpoint ────────────────────────────────────────────────────────

/// 링크의 한쪽 끝 (장비 + 인터페이스)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// 장비 ID
    pub device_id: DeviceId,
    /// 인터페이스 ID
    pub interface_id: InterfaceId,
}

impl Endpoint {
    /// 새 엔드포인트를 생성합니다.
    pub fn new(device_id: impl Into<DeviceId>, interface_id: impl Into<InterfaceId>) -> Self {
        Self {
            device_id: device_id.into(),
            interface_id: interface_id.into(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device_id, self.interface_id)
    }
}

// ─── LinkId ──────────────────────────────────────────────────────────

/// 결정적 링크 ID
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(String);

impl LinkId {
    /// 두 엔드포인트에서 정규 순서로 링크 ID를 만듭니다.
    pub fn from_endpoints(a: &Endpoint, b: &Endpoint) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{lo}|{hi}"))
    }

    /// 외부 입력(CLI, 영속 파일)의 문자열을 링크 ID로 받습니다.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// 문자열 참조
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LinkId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ─── Evidence ────────────────────────────────────────────────────────

/// 링크를 뒷받침하는 관측 1건
///
/// `(reporter, protocol)` 쌍마다 최대 하나만 유지됩니다.
/// 보고 장비의 새 사이클은 자기 증거만 교체합니다.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Evidence {
    /// 보고 장비 (수동 링크는 [`MANUAL_REPORTER`])
    pub reporter: DeviceId,
    /// 프로토콜
    pub protocol: DiscoveryProtocol,
    /// 관측 시각
    pub observed_at: Timestamp,
}

impl Evidence {
    /// 새 증거를 생성합니다.
    pub fn new(reporter: DeviceId, protocol: DiscoveryProtocol, observed_at: Timestamp) -> Self {
        Self {
            reporter,
            protocol,
            observed_at,
        }
    }

    /// 운영자가 등록한 수동 증거
    pub fn manual(observed_at: Timestamp) -> Self {
        Self::new(
            DeviceId::new(MANUAL_REPORTER),
            DiscoveryProtocol::Manual,
            observed_at,
        )
    }

    /// 같은 보고자/프로토콜 키인지 확인합니다.
    pub fn same_key(&self, other: &Evidence) -> bool {
        self.reporter == other.reporter && self.protocol == other.protocol
    }
}

// ─── Link ────────────────────────────────────────────────────────────

/// 무방향 물리 링크
///
/// 불변식: `a < b`, `id == LinkId::from_endpoints(a, b)`,
/// `confidence`는 `[0, 1]` 범위.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// 링크 ID
    pub id: LinkId,
    /// 정렬상 앞쪽 엔드포인트
    pub a: Endpoint,
    /// 정렬상 뒤쪽 엔드포인트
    pub b: Endpoint,
    /// 링크를 관측한 프로토콜 집합
    pub discovery_sources: BTreeSet<DiscoveryProtocol>,
    /// 보고자별 증거 (정렬 유지)
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    /// 신뢰도 `[0, 1]`
    pub confidence: f64,
    /// 운용 상태
    pub is_up: bool,
    /// 미해결 충돌 여부
    #[serde(default)]
    pub conflicting: bool,
    /// 링크 속도 (양단 인터페이스 중 작은 값)
    #[serde(default)]
    pub speed_bps: Option<u64>,
    /// 최초 관측 시각
    pub first_seen: Timestamp,
    /// 마지막 관측 시각
    pub last_seen: Timestamp,
    /// 마지막으로 변경된 스냅샷 버전
    #[serde(default)]
    pub revision: u64,
}

impl Link {
    /// 두 엔드포인트로 빈 링크를 만듭니다 (증거 없음, 신뢰도 0).
    pub fn new(x: Endpoint, y: Endpoint, first_seen: Timestamp) -> Self {
        let id = LinkId::from_endpoints(&x, &y);
        let (a, b) = if x <= y { (x, y) } else { (y, x) };
        Self {
            id,
            a,
            b,
            discovery_sources: BTreeSet::new(),
            evidence: Vec::new(),
            confidence: 0.0,
            is_up: true,
            conflicting: false,
            speed_bps: None,
            first_seen,
            last_seen: first_seen,
            revision: 0,
        }
    }

    /// 엔드포인트를 포함하는지 확인합니다.
    pub fn touches(&self, endpoint: &Endpoint) -> bool {
        &self.a == endpoint || &self.b == endpoint
    }

    /// 장비가 양단 중 하나인지 확인합니다.
    pub fn touches_device(&self, device_id: &DeviceId) -> bool {
        &self.a.device_id == device_id || &self.b.device_id == device_id
    }

    /// 주어진 엔드포인트의 반대편을 반환합니다.
    pub fn opposite(&self, endpoint: &Endpoint) -> Option<&Endpoint> {
        if &self.a == endpoint {
            Some(&self.b)
        } else if &self.b == endpoint {
            Some(&self.a)
        } else {
            None
        }
    }

    /// 주어진 장비에서 본 반대편 엔드포인트를 반환합니다.
    ///
    /// 같은 장비의 두 포트를 잇는 루프 링크는 `b`를 반환합니다.
    pub fn far_end(&self, device_id: &DeviceId) -> Option<&Endpoint> {
        if &self.a.device_id == device_id {
            Some(&self.b)
        } else if &self.b.device_id == device_id {
            Some(&self.a)
        } else {
            None
        }
    }

    /// 보고자가 제출한 증거가 있는지 확인합니다.
    pub fn has_evidence_from(&self, reporter: &DeviceId) -> bool {
        self.evidence.iter().any(|e| &e.reporter == reporter)
    }

    /// 보고자의 증거를 새 집합으로 교체합니다.
    ///
    /// 다른 보고자의 증거는 유지되며, 결과는 정렬되고
    /// `discovery_sources`도 함께 다시 계산됩니다.
    pub fn replace_evidence_from(&mut self, reporter: &DeviceId, fresh: Vec<Evidence>) {
        self.evidence.retain(|e| &e.reporter != reporter);
        for item in fresh {
            if let Some(existing) = self.evidence.iter_mut().find(|e| e.same_key(&item)) {
                if item.observed_at > existing.observed_at {
                    existing.observed_at = item.observed_at;
                }
            } else {
                self.evidence.push(item);
            }
        }
        self.evidence.sort();
        self.discovery_sources = self.evidence.iter().map(|e| e.protocol).collect();
    }

    /// 최신 증거 시각
    pub fn newest_evidence(&self) -> Option<Timestamp> {
        self.evidence.iter().map(|e| e.observed_at).max()
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <-> {} confidence={:.2} {}",
            self.a,
            self.b,
            self.confidence,
            if self.is_up { "up" } else { "down" },
        )
    }
}
