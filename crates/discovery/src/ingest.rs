//! 수집 정규화 — 이웃 레코드를 후보 링크로 변환
//!
//! 원격 식별자는 다음 우선순위로 장비에 매칭합니다. 한 단계에서 둘 이상의
//! 장비가 나오면 다음 단계로 넘어가지 않고 모호(ambiguous)로 끝납니다.
//!
//! ```text
//! 1. 섀시 ID 정확 일치 (MAC 형식이면 정규화)
//! 2. 인터페이스 MAC 일치 (섀시 ID, 포트 ID 순)
//! 3. 관리 IP 일치
//! ```
//!
//! 장비가 정해지면 원격 포트를 그 장비의 인터페이스 ID, 이름, ifIndex, MAC
//! 순으로 찾습니다. 같은 스냅샷과 같은 레코드에 대해 결과는 항상 같습니다.

use std::collections::BTreeSet;
use std::net::IpAddr;

use tracing::{debug, warn};

use topowatch_core::event::{EventKind, MODULE_DISCOVERY, TopologyEvent};
use topowatch_core::types::{
    DeviceId, DiscoveryProtocol, Interface, InterfaceId, MacAddress, NeighborRecord,
};
use topowatch_topology::{
    CandidateLink, CandidateSide, Endpoint, IdentityIndex, TopologySnapshot, UnresolvedReason,
    UnresolvedSide,
};

/// 한 장비 배치의 정규화 결과
#[derive(Debug, Clone, Default)]
pub struct Ingested {
    /// 정렬/중복 제거된 후보 링크
    pub candidates: Vec<CandidateLink>,
    /// 거부된 레코드 수 (다른 장비 명의, 수동 프로토콜)
    pub rejected: usize,
    /// 새로 미해결이 된 후보에 대한 경고 이벤트
    pub events: Vec<TopologyEvent>,
}

impl Ingested {
    /// 양쪽이 해석된 후보 수
    pub fn resolved_count(&self) -> usize {
        self.candidates.iter().filter(|c| c.is_resolved()).count()
    }

    /// 미해결 후보 수
    pub fn unresolved_count(&self) -> usize {
        self.candidates.len() - self.resolved_count()
    }
}

/// 원격 장비 매칭 결과
#[derive(Debug, Clone, PartialEq, Eq)]
enum Match {
    /// 장비 하나 (포트 MAC으로 인터페이스까지 정해졌을 수 있음)
    Device(DeviceId, Option<InterfaceId>),
    /// 여러 장비
    Ambiguous(Vec<DeviceId>),
    /// 없음
    NoMatch,
}

fn decide(mut hits: Vec<DeviceId>) -> Option<Match> {
    hits.sort();
    hits.dedup();
    match hits.len() {
        0 => None,
        1 => hits.pop().map(|d| Match::Device(d, None)),
        _ => Some(Match::Ambiguous(hits)),
    }
}

fn resolve_remote(identity: &IdentityIndex, record: &NeighborRecord) -> Match {
    // 1. 섀시 ID
    if let Some(found) = decide(identity.by_chassis(&record.remote_chassis_id)) {
        return found;
    }

    // 2. MAC (섀시 MAC은 장비만, 포트 MAC은 인터페이스까지 정함)
    for (raw, is_port) in [
        (&record.remote_chassis_id, false),
        (&record.remote_port_id, true),
    ] {
        let Ok(mac) = raw.trim().parse::<MacAddress>() else {
            continue;
        };
        let hits = identity.by_mac(&mac);
        let devices: BTreeSet<&DeviceId> = hits.iter().map(|(d, _)| d).collect();
        match devices.len() {
            0 => continue,
            1 => {
                let (device, iface) = &hits[0];
                let iface = (is_port && hits.len() == 1).then(|| iface.clone());
                return Match::Device(device.clone(), iface);
            }
            _ => return Match::Ambiguous(devices.into_iter().cloned().collect()),
        }
    }

    // 3. 관리 IP
    let ips = record
        .remote_mgmt_ip
        .into_iter()
        .chain(record.remote_chassis_id.trim().parse::<IpAddr>().ok());
    for ip in ips {
        if let Some(found) = decide(identity.by_ip(&ip)) {
            return found;
        }
    }
    Match::NoMatch
}

fn unresolved(
    record: &NeighborRecord,
    hint: Option<DeviceId>,
    reason: UnresolvedReason,
) -> CandidateSide {
    CandidateSide::Unresolved(UnresolvedSide {
        device_hint: hint,
        chassis_id: record.remote_chassis_id.clone(),
        port_id: record.remote_port_id.clone(),
        system_name: record.remote_system_name.clone(),
        reason,
    })
}

/// 한 장비의 이웃 레코드를 후보 링크로 정규화합니다.
///
/// `polled`는 같은 사이클에 폴링된 로컬 인터페이스로, 아직 스냅샷에 없는
/// 로컬 포트도 인정하기 위해 씁니다. 다른 장비 명의의 레코드와
/// 수동(manual) 프로토콜 레코드는 거부됩니다.
pub fn ingest(
    snapshot: &TopologySnapshot,
    device_id: &DeviceId,
    records: &[NeighborRecord],
    polled: &[Interface],
) -> Ingested {
    let mut out = Ingested::default();
    let local_device = snapshot.device(device_id);
    let identity = snapshot.identity();

    for record in records {
        if &record.local_device_id != device_id {
            warn!(
                device_id = %device_id,
                claimed = %record.local_device_id,
                "rejecting neighbor record reported under another device id"
            );
            out.rejected += 1;
            continue;
        }
        if !record.protocol.is_collectable() {
            warn!(
                device_id = %device_id,
                protocol = %record.protocol,
                "rejecting neighbor record with non-collectable protocol"
            );
            out.rejected += 1;
            continue;
        }

        let local_ep = Endpoint::new(device_id.clone(), record.local_interface_id.clone());
        let local_known = polled.iter().any(|i| i.id == record.local_interface_id)
            || local_device.is_some_and(|d| d.interface(&record.local_interface_id).is_some());
        let local = if local_known {
            CandidateSide::Resolved(local_ep.clone())
        } else {
            CandidateSide::Unresolved(UnresolvedSide {
                device_hint: Some(device_id.clone()),
                chassis_id: device_id.to_string(),
                port_id: record.local_interface_id.to_string(),
                system_name: None,
                reason: UnresolvedReason::UnknownLocalInterface,
            })
        };

        let remote = match resolve_remote(identity, record) {
            Match::NoMatch => unresolved(record, None, UnresolvedReason::NoMatch),
            Match::Ambiguous(candidates) => {
                unresolved(record, None, UnresolvedReason::Ambiguous { candidates })
            }
            Match::Device(remote_id, iface) => {
                let port = iface.or_else(|| {
                    snapshot
                        .device(&remote_id)
                        .and_then(|d| d.resolve_port(&record.remote_port_id))
                        .map(|i| i.id.clone())
                });
                match port {
                    Some(port) => {
                        let ep = Endpoint::new(remote_id.clone(), port);
                        if ep == local_ep {
                            unresolved(record, Some(remote_id), UnresolvedReason::SelfReference)
                        } else {
                            CandidateSide::Resolved(ep)
                        }
                    }
                    None => unresolved(record, Some(remote_id), UnresolvedReason::UnknownPort),
                }
            }
        };

        out.candidates.push(CandidateLink {
            reporter: device_id.clone(),
            local,
            remote,
            protocol: record.protocol,
            observed_at: record.observed_at,
        });
    }

    // 같은 관측은 최신 시각 하나만 남깁니다.
    out.candidates.sort_by(|a, b| {
        a.dedup_key()
            .cmp(&b.dedup_key())
            .then(b.observed_at.cmp(&a.observed_at))
    });
    out.candidates.dedup_by(|later, kept| later.dedup_key() == kept.dedup_key());

    let known: BTreeSet<(String, String, String, DiscoveryProtocol)> = snapshot
        .unresolved_for(device_id)
        .iter()
        .map(CandidateLink::dedup_key)
        .collect();
    for candidate in out.candidates.iter().filter(|c| !c.is_resolved()) {
        if known.contains(&candidate.dedup_key()) {
            continue;
        }
        out.events.push(unresolved_event(candidate));
    }

    debug!(
        device_id = %device_id,
        records = records.len(),
        candidates = out.candidates.len(),
        unresolved = out.unresolved_count(),
        rejected = out.rejected,
        "neighbor records normalized"
    );
    out
}

fn unresolved_event(candidate: &CandidateLink) -> TopologyEvent {
    let side = candidate
        .remote
        .unresolved()
        .or_else(|| candidate.local.unresolved());
    let kind = match side.map(|s| &s.reason) {
        Some(UnresolvedReason::Ambiguous { .. }) => EventKind::IdentityAmbiguous,
        _ => EventKind::IdentityUnresolved,
    };
    let reason = side.map_or_else(String::new, |s| s.reason.to_string());
    TopologyEvent::new(
        MODULE_DISCOVERY,
        kind,
        format!("unresolved neighbor {candidate}: {reason}"),
    )
    .for_device(candidate.reporter.clone())
}
