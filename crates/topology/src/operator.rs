//! 운영자 작업과 노후 링크 정리의 변경 계획
//!
//! 충돌은 자동으로 풀리지 않으며, 여기의 수동 링크/삭제/해결 작업으로만
//! 정리됩니다. 수동 증거가 붙은 링크는 고정 링크로 취급되어 수집 결과로
//! 충돌 처리되거나 노후 처리되지 않습니다.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use topowatch_core::event::{EventKind, MODULE_TOPOLOGY, TopologyEvent};
use topowatch_core::types::{Device, DeviceId, DeviceStatus, Interface, Timestamp};

use crate::error::TopologyError;
use crate::link::{Endpoint, Evidence, Link, LinkId, MANUAL_REPORTER};
use crate::merge::{ChangeSet, PlanView, is_pinned};
use crate::scorer::ConfidenceScorer;
use crate::snapshot::TopologySnapshot;

/// 충돌 해결 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// 기존 링크가 맞음: 수동 증거로 고정
    KeepExisting,
    /// 새로 보고된 원격이 맞음: 기존 링크를 지우고 새 링크를 고정
    AcceptReported,
}

impl std::str::FromStr for ConflictResolution {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keep" | "keep-existing" | "keep_existing" => Ok(Self::KeepExisting),
            "accept" | "accept-reported" | "accept_reported" => Ok(Self::AcceptReported),
            other => Err(TopologyError::InvalidOperation(format!(
                "unknown conflict resolution '{other}' (expected keep or accept)"
            ))),
        }
    }
}

/// 장비를 등록하거나 메타데이터를 갱신합니다.
///
/// 링크가 참조하는 인터페이스를 빠뜨린 레코드는 거부합니다.
/// 새 레코드의 상태가 `Unknown`이면 기존 상태와 `last_seen`을 유지합니다.
pub fn plan_register_device(
    snapshot: &TopologySnapshot,
    mut device: Device,
) -> Result<ChangeSet, TopologyError> {
    if device.id.as_str().trim().is_empty() || device.id.as_str() == MANUAL_REPORTER {
        return Err(TopologyError::InvalidOperation(format!(
            "invalid device id '{}'",
            device.id
        )));
    }
    let mut changes = ChangeSet::default();
    changes.read_devices.insert(device.id.clone());

    if let Some(existing) = snapshot.device(&device.id) {
        for link in snapshot.links_of(&device.id) {
            for ep in [&link.a, &link.b] {
                if ep.device_id == device.id && device.interface(&ep.interface_id).is_none() {
                    return Err(TopologyError::InvalidOperation(format!(
                        "registration drops interface {} still used by link {}",
                        ep.interface_id, link.id
                    )));
                }
            }
        }
        if device.status == DeviceStatus::Unknown {
            device.status = existing.status;
        }
        if device.last_seen.is_none() {
            device.last_seen = existing.last_seen;
        }
        if **existing == device {
            return Ok(changes);
        }
    }
    changes.devices.insert(device.id.clone(), device);
    Ok(changes)
}

/// 장비 상태를 바꿉니다 (수집 실패 시 `Unknown` 등).
pub fn plan_device_status(
    snapshot: &TopologySnapshot,
    device_id: &DeviceId,
    status: DeviceStatus,
) -> Result<ChangeSet, TopologyError> {
    let existing = snapshot
        .device(device_id)
        .ok_or_else(|| TopologyError::DeviceNotFound(device_id.to_string()))?;
    let mut changes = ChangeSet::default();
    changes.read_devices.insert(device_id.clone());
    if existing.status != status {
        let mut device = Device::clone(existing);
        device.status = status;
        changes.devices.insert(device_id.clone(), device);
    }
    Ok(changes)
}

/// 인터페이스 상태/속도를 갱신합니다.
///
/// 근거(evidence)는 건드리지 않습니다. down으로 바뀐 인터페이스의 링크는
/// down 처리되고, 양단이 모두 다시 down이 아니게 되면 인터페이스 때문에
/// 내려갔던 링크가 복구됩니다. 단, `last_seen`이 노후 기간을 벗어난 링크는
/// 고정 링크가 아니면 down으로 남습니다.
pub fn plan_update_interfaces(
    snapshot: &TopologySnapshot,
    device_id: &DeviceId,
    interfaces: &[Interface],
    now: Timestamp,
    window: Duration,
) -> Result<ChangeSet, TopologyError> {
    let existing = snapshot
        .device(device_id)
        .ok_or_else(|| TopologyError::DeviceNotFound(device_id.to_string()))?;
    let mut device = Device::clone(existing);
    for observed in interfaces {
        match device.interface_mut(&observed.id) {
            Some(slot) => *slot = observed.clone(),
            None => device.interfaces.push(observed.clone()),
        }
    }

    let mut changes = ChangeSet::default();
    changes.read_devices.insert(device_id.clone());
    if **existing == device {
        return Ok(changes);
    }

    let cutoff = chrono::Duration::from_std(window)
        .ok()
        .map(|window| now - window);
    let empty = BTreeMap::new();
    let before = PlanView {
        snapshot,
        overrides: &empty,
    };
    let mut overrides = BTreeMap::new();
    overrides.insert(device_id.clone(), device);
    let after = PlanView {
        snapshot,
        overrides: &overrides,
    };

    for link in snapshot.links_of(device_id) {
        let was_down = before.interface_down(&link.a) || before.interface_down(&link.b);
        let now_down = after.interface_down(&link.a) || after.interface_down(&link.b);
        let mut next = Link::clone(link);
        next.speed_bps = after.link_speed(link);
        if now_down && next.is_up {
            next.is_up = false;
            changes.events.push(
                TopologyEvent::new(
                    MODULE_TOPOLOGY,
                    EventKind::LinkDown,
                    format!("link {} marked down: interface reported down", link.id),
                )
                .for_device(device_id.clone())
                .for_link(link.id.to_string()),
            );
        } else if was_down && !now_down {
            let fresh = cutoff.is_none_or(|cutoff| link.last_seen >= cutoff);
            next.is_up = fresh || is_pinned(link);
        }
        if next != **link {
            changes.read_links.insert(link.id.clone());
            changes.links.insert(link.id.clone(), next);
        }
    }
    if let Some(device) = overrides.remove(device_id) {
        changes.devices.insert(device_id.clone(), device);
    }
    Ok(changes)
}

fn require_endpoint(snapshot: &TopologySnapshot, ep: &Endpoint) -> Result<(), TopologyError> {
    let device = snapshot
        .device(&ep.device_id)
        .ok_or_else(|| TopologyError::DeviceNotFound(ep.device_id.to_string()))?;
    if device.interface(&ep.interface_id).is_none() {
        return Err(TopologyError::InterfaceNotFound {
            device_id: ep.device_id.to_string(),
            interface_id: ep.interface_id.to_string(),
        });
    }
    Ok(())
}

/// 수동 링크를 추가(또는 기존 링크를 고정)합니다.
///
/// 두 엔드포인트 중 어느 쪽이든 다른 곳으로 이어진 링크는 제거되고,
/// 관련 충돌 기록도 함께 정리됩니다.
pub fn plan_manual_link(
    snapshot: &TopologySnapshot,
    x: &Endpoint,
    y: &Endpoint,
    now: Timestamp,
    scorer: &ConfidenceScorer,
) -> Result<ChangeSet, TopologyError> {
    if x == y {
        return Err(TopologyError::InvalidOperation(format!(
            "cannot link {x} to itself"
        )));
    }
    require_endpoint(snapshot, x)?;
    require_endpoint(snapshot, y)?;

    let id = LinkId::from_endpoints(x, y);
    let mut changes = ChangeSet::default();
    changes.read_devices.insert(x.device_id.clone());
    changes.read_devices.insert(y.device_id.clone());
    changes.read_links.insert(id.clone());

    for ep in [x, y] {
        for link in snapshot.links_at(ep) {
            if link.id != id {
                changes.read_links.insert(link.id.clone());
                changes.removed_links.insert(link.id.clone());
                if snapshot.conflict(&link.id).is_some() {
                    changes.conflicts.insert(link.id.clone(), None);
                }
            }
        }
    }

    let mut link = snapshot
        .link(&id)
        .map(|l| Link::clone(l))
        .unwrap_or_else(|| Link::new(x.clone(), y.clone(), now));
    link.replace_evidence_from(&DeviceId::new(MANUAL_REPORTER), vec![Evidence::manual(now)]);
    link.conflicting = false;
    link.confidence = scorer.score(&link.evidence);
    link.last_seen = link.last_seen.max(now);

    let overrides = BTreeMap::new();
    let view = PlanView {
        snapshot,
        overrides: &overrides,
    };
    link.is_up = !(view.interface_down(&link.a) || view.interface_down(&link.b));
    link.speed_bps = view.link_speed(&link);

    if snapshot.conflict(&id).is_some() {
        changes.conflicts.insert(id.clone(), None);
    }
    changes.links.insert(id, link);
    Ok(changes)
}

/// 링크를 삭제합니다.
pub fn plan_delete_link(
    snapshot: &TopologySnapshot,
    id: &LinkId,
) -> Result<ChangeSet, TopologyError> {
    let link = snapshot
        .link(id)
        .ok_or_else(|| TopologyError::LinkNotFound(id.to_string()))?;
    let mut changes = ChangeSet::default();
    changes.read_links.insert(id.clone());
    changes.read_devices.insert(link.a.device_id.clone());
    changes.read_devices.insert(link.b.device_id.clone());
    changes.removed_links.insert(id.clone());
    if snapshot.conflict(id).is_some() {
        changes.conflicts.insert(id.clone(), None);
    }
    Ok(changes)
}

/// 기록된 충돌을 운영자 판단으로 정리합니다.
pub fn plan_resolve_conflict(
    snapshot: &TopologySnapshot,
    id: &LinkId,
    resolution: ConflictResolution,
    now: Timestamp,
    scorer: &ConfidenceScorer,
) -> Result<ChangeSet, TopologyError> {
    let record = snapshot
        .conflict(id)
        .ok_or_else(|| TopologyError::NoConflict(id.to_string()))?;
    match resolution {
        ConflictResolution::KeepExisting => {
            plan_manual_link(snapshot, &record.local, &record.recorded_remote, now, scorer)
        }
        ConflictResolution::AcceptReported => {
            let mut changes =
                plan_manual_link(snapshot, &record.local, &record.reported_remote, now, scorer)?;
            changes.removed_links.insert(id.clone());
            changes.conflicts.insert(id.clone(), None);
            Ok(changes)
        }
    }
}

/// 노후 기간 동안 갱신되지 않은 링크를 down 처리합니다.
///
/// 고정(수동) 링크와 이미 down인 링크는 건너뜁니다.
pub fn plan_sweep_stale(
    snapshot: &TopologySnapshot,
    now: Timestamp,
    window: Duration,
) -> ChangeSet {
    let mut changes = ChangeSet::default();
    let Ok(window) = chrono::Duration::from_std(window) else {
        return changes;
    };
    let cutoff = now - window;
    for link in snapshot.links() {
        if !link.is_up || is_pinned(link) || link.last_seen >= cutoff {
            continue;
        }
        changes.read_links.insert(link.id.clone());
        let mut stale = Link::clone(link);
        stale.is_up = false;
        changes.events.push(
            TopologyEvent::new(
                MODULE_TOPOLOGY,
                EventKind::LinkStale,
                format!(
                    "link {} not refreshed since {}",
                    link.id,
                    link.last_seen.to_rfc3339()
                ),
            )
            .for_link(link.id.to_string()),
        );
        changes.links.insert(link.id.clone(), stale);
    }
    changes
}
