//! 후보 링크 — 식별자 해석을 거친 이웃 관측
//!
//! 양쪽이 모두 해석된 후보만 그래프에 병합되고, 나머지는
//! 보고 장비별 미해결 목록으로 스냅샷에 남아 운영자가 조회할 수 있습니다.

use std::fmt;

use serde::{Deserialize, Serialize};

use topowatch_core::types::{DeviceId, DiscoveryProtocol, Timestamp};

use crate::link::Endpoint;

/// 해석 실패 사유
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// 어떤 장비에도 매칭되지 않음
    NoMatch,
    /// 여러 장비에 매칭됨
    Ambiguous {
        /// 후보 장비 목록 (정렬됨)
        candidates: Vec<DeviceId>,
    },
    /// 장비는 찾았지만 포트를 찾지 못함
    UnknownPort,
    /// 보고 장비의 로컬 인터페이스가 등록되어 있지 않음
    UnknownLocalInterface,
    /// 원격이 로컬 인터페이스 자신으로 해석됨
    SelfReference,
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMatch => write!(f, "no matching device"),
            Self::Ambiguous { candidates } => {
                let names: Vec<&str> = candidates.iter().map(DeviceId::as_str).collect();
                write!(f, "ambiguous: {}", names.join(", "))
            }
            Self::UnknownPort => write!(f, "unknown port"),
            Self::UnknownLocalInterface => write!(f, "unknown local interface"),
            Self::SelfReference => write!(f, "resolves to the local interface"),
        }
    }
}

/// 해석되지 않은 한쪽 끝
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedSide {
    /// 장비까지는 해석된 경우 그 장비
    pub device_hint: Option<DeviceId>,
    /// 원래 섀시 식별자
    pub chassis_id: String,
    /// 원래 포트 식별자
    pub port_id: String,
    /// 원격 시스템 이름
    pub system_name: Option<String>,
    /// 실패 사유
    #[serde(flatten)]
    pub reason: UnresolvedReason,
}

/// 후보 링크의 한쪽 끝
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CandidateSide {
    /// 등록된 인터페이스로 해석됨
    Resolved(Endpoint),
    /// 해석 실패
    Unresolved(UnresolvedSide),
}

impl CandidateSide {
    /// 해석된 엔드포인트
    pub fn endpoint(&self) -> Option<&Endpoint> {
        match self {
            Self::Resolved(ep) => Some(ep),
            Self::Unresolved(_) => None,
        }
    }

    /// 해석 실패 정보
    pub fn unresolved(&self) -> Option<&UnresolvedSide> {
        match self {
            Self::Resolved(_) => None,
            Self::Unresolved(side) => Some(side),
        }
    }
}

impl fmt::Display for CandidateSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved(ep) => write!(f, "{ep}"),
            Self::Unresolved(side) => write!(
                f,
                "?{}/{} ({})",
                side.chassis_id, side.port_id, side.reason
            ),
        }
    }
}

/// 식별자 해석을 거친 후보 링크
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateLink {
    /// 보고 장비
    pub reporter: DeviceId,
    /// 로컬 쪽
    pub local: CandidateSide,
    /// 원격 쪽
    pub remote: CandidateSide,
    /// 프로토콜
    pub protocol: DiscoveryProtocol,
    /// 관측 시각
    pub observed_at: Timestamp,
}

impl CandidateLink {
    /// 양쪽이 모두 해석되었으면 `(local, remote)`를 반환합니다.
    pub fn resolved_endpoints(&self) -> Option<(&Endpoint, &Endpoint)> {
        Some((self.local.endpoint()?, self.remote.endpoint()?))
    }

    /// 양쪽이 모두 해석되었는지 여부
    pub fn is_resolved(&self) -> bool {
        self.resolved_endpoints().is_some()
    }

    /// 중복 제거/정렬용 키
    ///
    /// 관측 시각을 제외한 모든 식별 정보를 포함합니다.
    pub fn dedup_key(&self) -> (String, String, String, DiscoveryProtocol) {
        (
            self.reporter.to_string(),
            self.local.to_string(),
            self.remote.to_string(),
            self.protocol,
        )
    }
}

impl fmt::Display for CandidateLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} via {} (reported by {})",
            self.local, self.remote, self.protocol, self.reporter
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn resolved(reporter: &str, local: (&str, &str), remote: (&str, &str)) -> CandidateLink {
        CandidateLink {
            reporter: DeviceId::new(reporter),
            local: CandidateSide::Resolved(Endpoint::new(local.0, local.1)),
            remote: CandidateSide::Resolved(Endpoint::new(remote.0, remote.1)),
            protocol: DiscoveryProtocol::Lldp,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn resolved_candidate_exposes_endpoints() {
        let c = resolved("a", ("a", "1"), ("b", "2"));
        let (l, r) = c.resolved_endpoints().unwrap();
        assert_eq!(l, &Endpoint::new("a", "1"));
        assert_eq!(r, &Endpoint::new("b", "2"));
    }

    #[test]
    fn unresolved_candidate_is_not_resolved() {
        let mut c = resolved("a", ("a", "1"), ("b", "2"));
        c.remote = CandidateSide::Unresolved(UnresolvedSide {
            device_hint: None,
            chassis_id: "00:11:22:33:44:55".to_owned(),
            port_id: "Gi0/1".to_owned(),
            system_name: None,
            reason: UnresolvedReason::Ambiguous {
                candidates: vec![DeviceId::new("b"), DeviceId::new("c")],
            },
        });
        assert!(!c.is_resolved());
        assert!(c.to_string().contains("ambiguous: b, c"));
    }

    #[test]
    fn candidate_serde_roundtrip_keeps_reason() {
        let mut c = resolved("a", ("a", "1"), ("b", "2"));
        c.remote = CandidateSide::Unresolved(UnresolvedSide {
            device_hint: Some(DeviceId::new("b")),
            chassis_id: "b".to_owned(),
            port_id: "xe-9".to_owned(),
            system_name: Some("b.lab".to_owned()),
            reason: UnresolvedReason::UnknownPort,
        });
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("\"state\":\"unresolved\""));
        assert!(json.contains("\"reason\":\"unknown_port\""));
        let back: CandidateLink = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn dedup_key_ignores_observation_time() {
        let a = resolved("a", ("a", "1"), ("b", "2"));
        let mut b = a.clone();
        b.observed_at = a.observed_at + chrono::Duration::seconds(30);
        assert_eq!(a.dedup_key(), b.dedup_key());
    }
}
