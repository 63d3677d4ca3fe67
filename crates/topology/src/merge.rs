//! 병합 계획 — 한 장비의 수집 사이클을 변경 집합으로 변환
//!
//! 계획은 스냅샷을 읽기만 하고 [`ChangeSet`]을 만들어 냅니다.
//! 실제 적용은 저장소의 커밋 단계가 담당하며, 그 사이 다른 커밋이
//! 같은 링크를 건드렸다면 계획을 다시 세웁니다.
//!
//! ```text
//! DeviceCycle ──▶ plan_device_cycle(snapshot) ──▶ ChangeSet ──▶ TopologyStore::commit
//!                   │ 1. 장비/인터페이스 갱신
//!                   │ 2. 로컬 포트별 원격 그룹화
//!                   │ 3. 충돌 판정 (기존 원격 ≠ 새 원격)
//!                   │ 4. 보고자 증거 교체 + 신뢰도 재계산
//!                   └ 5. 미해결 후보 교체
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use topowatch_core::event::{EventKind, MODULE_TOPOLOGY, TopologyEvent};
use topowatch_core::types::{
    Device, DeviceId, DeviceStatus, DiscoveryProtocol, Interface, OperStatus, Timestamp,
};

use crate::candidate::{CandidateLink, CandidateSide, UnresolvedReason, UnresolvedSide};
use crate::link::{Endpoint, Evidence, Link, LinkId};
use crate::scorer::ConfidenceScorer;
use crate::snapshot::{ConflictRecord, TopologySnapshot};

/// 한 장비의 수집 사이클 결과
#[derive(Debug, Clone)]
pub struct DeviceCycle {
    /// 보고 장비
    pub device_id: DeviceId,
    /// 사이클 관측 시각
    pub observed_at: Timestamp,
    /// 식별자 해석을 마친 후보 (정렬/중복 제거됨)
    pub candidates: Vec<CandidateLink>,
    /// 폴링된 인터페이스 상태
    pub interfaces: Vec<Interface>,
}

/// 스냅샷에 적용할 변경 집합
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// 추가/교체할 장비
    pub devices: BTreeMap<DeviceId, Device>,
    /// 추가/교체할 링크
    pub links: BTreeMap<LinkId, Link>,
    /// 제거할 링크
    pub removed_links: BTreeSet<LinkId>,
    /// 보고 장비별 미해결 후보 교체 (빈 목록은 제거)
    pub unresolved: BTreeMap<DeviceId, Vec<CandidateLink>>,
    /// 충돌 기록 변경 (`None`은 제거)
    pub conflicts: BTreeMap<LinkId, Option<ConflictRecord>>,
    /// 커밋 성공 시 발행할 이벤트
    pub events: Vec<TopologyEvent>,
    /// 계획이 읽은 장비 (동시 커밋 충돌 판정용)
    pub read_devices: BTreeSet<DeviceId>,
    /// 계획이 읽은 링크 (동시 커밋 충돌 판정용)
    pub read_links: BTreeSet<LinkId>,
}

impl ChangeSet {
    /// 그래프 상태 변경이 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
            && self.links.is_empty()
            && self.removed_links.is_empty()
            && self.unresolved.is_empty()
            && self.conflicts.is_empty()
    }
}

/// 계획 중 갱신된 보고 장비를 우선 보는 읽기 뷰
pub(crate) struct PlanView<'a> {
    pub snapshot: &'a TopologySnapshot,
    pub overrides: &'a BTreeMap<DeviceId, Device>,
}

impl PlanView<'_> {
    pub fn device(&self, id: &DeviceId) -> Option<&Device> {
        self.overrides
            .get(id)
            .or_else(|| self.snapshot.device(id).map(Arc::as_ref))
    }

    pub fn interface(&self, ep: &Endpoint) -> Option<&Interface> {
        self.device(&ep.device_id)
            .and_then(|d| d.interface(&ep.interface_id))
    }

    pub fn interface_down(&self, ep: &Endpoint) -> bool {
        self.interface(ep)
            .is_some_and(|iface| iface.oper_status == OperStatus::Down)
    }

    /// 양단 인터페이스 속도 중 작은 값 (한쪽만 알려져 있으면 그 값)
    pub fn link_speed(&self, link: &Link) -> Option<u64> {
        let a = self.interface(&link.a).and_then(|i| i.speed_bps);
        let b = self.interface(&link.b).and_then(|i| i.speed_bps);
        match (a, b) {
            (Some(x), Some(y)) => Some(x.min(y)),
            (x, y) => x.or(y),
        }
    }
}

/// 링크가 운영자 고정(수동 증거) 상태인지 여부
pub(crate) fn is_pinned(link: &Link) -> bool {
    link.discovery_sources.contains(&DiscoveryProtocol::Manual)
}

/// 한 장비의 수집 사이클을 변경 집합으로 계획합니다.
///
/// 같은 스냅샷에 같은 사이클을 두 번 계획하면 두 번째는 빈 변경 집합이 됩니다.
pub fn plan_device_cycle(
    snapshot: &TopologySnapshot,
    cycle: &DeviceCycle,
    scorer: &ConfidenceScorer,
) -> ChangeSet {
    let reporter = &cycle.device_id;
    let mut changes = ChangeSet::default();
    changes.read_devices.insert(reporter.clone());

    // 1. 보고 장비 갱신
    let previous = snapshot.device(reporter);
    let mut device = previous
        .map(|d| Device::clone(d))
        .unwrap_or_else(|| Device::new(reporter.clone(), reporter.as_str()));
    for observed in &cycle.interfaces {
        match device.interface_mut(&observed.id) {
            Some(slot) => *slot = observed.clone(),
            None => device.interfaces.push(observed.clone()),
        }
    }
    device.status = DeviceStatus::Up;
    device.last_seen = Some(
        device
            .last_seen
            .map_or(cycle.observed_at, |seen| seen.max(cycle.observed_at)),
    );
    let mut overrides = BTreeMap::new();
    overrides.insert(reporter.clone(), device);
    let view = PlanView {
        snapshot,
        overrides: &overrides,
    };

    // 2. 로컬 포트별 원격 그룹화
    let mut unresolved: Vec<CandidateLink> = Vec::new();
    let mut reported: BTreeMap<Endpoint, BTreeMap<Endpoint, Vec<Evidence>>> = BTreeMap::new();
    for candidate in cycle.candidates.iter().filter(|c| &c.reporter == reporter) {
        let Some((local, remote)) = candidate.resolved_endpoints() else {
            unresolved.push(candidate.clone());
            continue;
        };
        // 원격 장비의 인터페이스 목록도 계획의 전제
        changes.read_devices.insert(remote.device_id.clone());
        if let Some(reason) = recheck_endpoints(&view, reporter, local, remote) {
            unresolved.push(demote(candidate, local, remote, reason));
            continue;
        }
        reported
            .entry(local.clone())
            .or_default()
            .entry(remote.clone())
            .or_default()
            .push(Evidence::new(
                reporter.clone(),
                candidate.protocol,
                candidate.observed_at,
            ));
    }

    // 3. 충돌 판정
    let mut fresh: BTreeMap<LinkId, (Endpoint, Endpoint, Vec<Evidence>)> = BTreeMap::new();
    let mut new_conflicts: BTreeMap<LinkId, ConflictRecord> = BTreeMap::new();
    for (local, remotes) in &reported {
        let existing: Vec<&Arc<Link>> = snapshot.links_at(local).collect();
        let known: BTreeSet<&Endpoint> =
            existing.iter().filter_map(|l| l.opposite(local)).collect();
        let contradicted: Vec<&Arc<Link>> = existing
            .iter()
            .copied()
            .filter(|l| l.opposite(local).is_some_and(|r| !remotes.contains_key(r)))
            .collect();

        for (remote, evidence) in remotes {
            let is_new = !known.contains(remote);
            if is_new && !contradicted.is_empty() {
                for link in &contradicted {
                    changes.read_links.insert(link.id.clone());
                    if link.conflicting || is_pinned(link) || new_conflicts.contains_key(&link.id) {
                        continue;
                    }
                    let Some(recorded_remote) = link.opposite(local) else {
                        continue;
                    };
                    let protocol = evidence
                        .first()
                        .map_or(DiscoveryProtocol::Lldp, |e| e.protocol);
                    new_conflicts.insert(
                        link.id.clone(),
                        ConflictRecord {
                            link_id: link.id.clone(),
                            local: local.clone(),
                            recorded_remote: recorded_remote.clone(),
                            reported_remote: remote.clone(),
                            reporter: reporter.clone(),
                            protocol,
                            detected_at: cycle.observed_at,
                        },
                    );
                }
                continue;
            }
            let id = LinkId::from_endpoints(local, remote);
            fresh
                .entry(id)
                .or_insert_with(|| (local.clone(), remote.clone(), Vec::new()))
                .2
                .extend(evidence.iter().cloned());
        }
    }

    // 4. 영향받는 링크 계산
    let mut touched: BTreeSet<LinkId> = fresh.keys().cloned().collect();
    touched.extend(new_conflicts.keys().cloned());
    for link in snapshot.links_of(reporter) {
        let local_down = [&link.a, &link.b]
            .into_iter()
            .any(|ep| &ep.device_id == reporter && view.interface_down(ep));
        if link.has_evidence_from(reporter) || local_down {
            touched.insert(link.id.clone());
        }
        // 인터페이스 속도 변경 반영
        if view.link_speed(link) != link.speed_bps {
            touched.insert(link.id.clone());
        }
    }

    for id in &touched {
        changes.read_links.insert(id.clone());
        let before = snapshot.link(id);
        let incoming = fresh.get(id).map(|(_, _, e)| e.clone()).unwrap_or_default();
        let mut link = match (before, fresh.get(id)) {
            (Some(existing), _) => Link::clone(existing),
            (None, Some((local, remote, evidence))) => {
                let first = evidence
                    .iter()
                    .map(|e| e.observed_at)
                    .min()
                    .unwrap_or(cycle.observed_at);
                Link::new(local.clone(), remote.clone(), first)
            }
            (None, None) => continue,
        };
        changes.read_devices.insert(link.a.device_id.clone());
        changes.read_devices.insert(link.b.device_id.clone());

        let old_protocols: BTreeSet<DiscoveryProtocol> = link
            .evidence
            .iter()
            .filter(|e| &e.reporter == reporter)
            .map(|e| e.protocol)
            .collect();
        let new_protocols: BTreeSet<DiscoveryProtocol> =
            incoming.iter().map(|e| e.protocol).collect();
        let withdrawn = !old_protocols.is_subset(&new_protocols);
        let evidence_before = link.evidence.clone();
        link.replace_evidence_from(reporter, incoming.clone());
        let evidence_changed = link.evidence != evidence_before;

        let mut base = link.confidence;
        if let Some(record) = new_conflicts.get(id) {
            link.conflicting = true;
            base = scorer.penalize(base);
            changes.conflicts.insert(id.clone(), Some(record.clone()));
            changes.events.push(
                TopologyEvent::new(
                    MODULE_TOPOLOGY,
                    EventKind::GraphConflict,
                    format!(
                        "{} reported neighbor {} but link {} connects {}",
                        record.local, record.reported_remote, id, record.recorded_remote
                    ),
                )
                .for_device(reporter.clone())
                .for_link(id.to_string()),
            );
        }

        link.confidence = if evidence_changed && !link.evidence.is_empty() {
            let recomputed = scorer.score_with_conflict(&link.evidence, link.conflicting);
            if withdrawn || before.is_none() {
                recomputed
            } else {
                recomputed.max(base)
            }
        } else {
            base
        };

        let was_up = before.is_none_or(|b| b.is_up);
        let ends_down = view.interface_down(&link.a) || view.interface_down(&link.b);
        let newest = incoming.iter().map(|e| e.observed_at).max();
        if let Some(newest) = newest.filter(|_| evidence_changed) {
            link.last_seen = link.last_seen.max(newest);
            link.is_up = !ends_down;
        } else if ends_down {
            link.is_up = false;
        }
        if was_up && !link.is_up && ends_down && before.is_some() {
            changes.events.push(
                TopologyEvent::new(
                    MODULE_TOPOLOGY,
                    EventKind::LinkDown,
                    format!("link {id} marked down: interface reported down"),
                )
                .for_device(reporter.clone())
                .for_link(id.to_string()),
            );
        }
        link.speed_bps = view.link_speed(&link);

        if before.map(Arc::as_ref) != Some(&link) {
            changes.links.insert(id.clone(), link);
        }
    }

    // 5. 미해결 후보 교체
    unresolved.sort_by_key(CandidateLink::dedup_key);
    unresolved.dedup_by(|a, b| a.dedup_key() == b.dedup_key());
    if snapshot.unresolved_for(reporter) != unresolved.as_slice() {
        changes.unresolved.insert(reporter.clone(), unresolved);
    }

    let device = overrides.remove(reporter);
    if let Some(device) = device {
        if previous.map(Arc::as_ref) != Some(&device) {
            changes.devices.insert(reporter.clone(), device);
        }
    }
    changes
}

/// 계획 시점의 상태로 해석 결과를 다시 확인합니다.
///
/// 해석 이후 다른 커밋이 장비/인터페이스를 바꿨을 수 있습니다.
fn recheck_endpoints(
    view: &PlanView<'_>,
    reporter: &DeviceId,
    local: &Endpoint,
    remote: &Endpoint,
) -> Option<UnresolvedReason> {
    if &local.device_id != reporter || view.interface(local).is_none() {
        return Some(UnresolvedReason::UnknownLocalInterface);
    }
    if local == remote {
        return Some(UnresolvedReason::SelfReference);
    }
    match view.device(&remote.device_id) {
        None => Some(UnresolvedReason::NoMatch),
        Some(device) if device.interface(&remote.interface_id).is_none() => {
            Some(UnresolvedReason::UnknownPort)
        }
        Some(_) => None,
    }
}

fn demote(
    candidate: &CandidateLink,
    local: &Endpoint,
    remote: &Endpoint,
    reason: UnresolvedReason,
) -> CandidateLink {
    let mut demoted = candidate.clone();
    let (side, ep) = if reason == UnresolvedReason::UnknownLocalInterface {
        (&mut demoted.local, local)
    } else {
        (&mut demoted.remote, remote)
    };
    *side = CandidateSide::Unresolved(UnresolvedSide {
        device_hint: Some(ep.device_id.clone()),
        chassis_id: ep.device_id.to_string(),
        port_id: ep.interface_id.to_string(),
        system_name: None,
        reason,
    });
    demoted
}
