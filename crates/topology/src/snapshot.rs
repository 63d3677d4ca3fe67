//! 토폴로지 스냅샷 — 커밋 단위의 불변 그래프 뷰
//!
//! 커밋될 때마다 새 [`TopologySnapshot`]이 만들어지며, 독자는 `Arc`로
//! 공유받아 잠금 없이 읽습니다. 장비/링크는 `Arc`로 구조 공유되므로
//! 커밋 비용은 변경된 항목 수와 인덱스 재구성에 비례합니다.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::IpAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use topowatch_core::types::{
    Device, DeviceId, DiscoveryProtocol, InterfaceId, MacAddress, OperStatus, Timestamp,
};

use crate::candidate::CandidateLink;
use crate::link::{Endpoint, Link, LinkId};

// ─── ConflictRecord ──────────────────────────────────────────────────

/// 같은 로컬 포트에 대해 다른 원격 포트가 보고된 기록
///
/// 운영자가 수동 링크 작업이나 충돌 해결로 정리하기 전까지 유지됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// 충돌 중인 기존 링크
    pub link_id: LinkId,
    /// 충돌이 관측된 로컬 엔드포인트
    pub local: Endpoint,
    /// 기존 링크의 원격 엔드포인트
    pub recorded_remote: Endpoint,
    /// 새로 보고된 원격 엔드포인트
    pub reported_remote: Endpoint,
    /// 보고 장비
    pub reporter: DeviceId,
    /// 보고 프로토콜
    pub protocol: DiscoveryProtocol,
    /// 감지 시각
    pub detected_at: Timestamp,
}

// ─── IdentityIndex ───────────────────────────────────────────────────

/// 섀시 식별자를 비교 가능한 형태로 정규화합니다.
///
/// MAC으로 파싱되면 콜론 소문자 형식, 아니면 공백 제거 후 소문자입니다.
pub fn normalize_chassis(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.parse::<MacAddress>() {
        Ok(mac) => mac.to_string(),
        Err(_) => trimmed.to_ascii_lowercase(),
    }
}

/// 원격 식별자 해석용 역색인
///
/// 스냅샷마다 장비 레지스트리에서 다시 만들어집니다.
#[derive(Debug, Clone, Default)]
pub struct IdentityIndex {
    chassis: HashMap<String, BTreeSet<DeviceId>>,
    macs: HashMap<MacAddress, BTreeSet<(DeviceId, InterfaceId)>>,
    ips: HashMap<IpAddr, BTreeSet<DeviceId>>,
}

impl IdentityIndex {
    fn build<'a>(devices: impl Iterator<Item = &'a Device>) -> Self {
        let mut index = Self::default();
        for device in devices {
            if let Some(chassis) = device.chassis_id.as_deref().filter(|c| !c.trim().is_empty()) {
                index
                    .chassis
                    .entry(normalize_chassis(chassis))
                    .or_default()
                    .insert(device.id.clone());
            }
            for iface in &device.interfaces {
                if let Some(mac) = iface.mac {
                    index
                        .macs
                        .entry(mac)
                        .or_default()
                        .insert((device.id.clone(), iface.id.clone()));
                }
            }
            for ip in &device.ip_addresses {
                index.ips.entry(*ip).or_default().insert(device.id.clone());
            }
        }
        index
    }

    /// 섀시 ID 정확 일치 (정규화 후)
    pub fn by_chassis(&self, chassis_id: &str) -> Vec<DeviceId> {
        self.chassis
            .get(&normalize_chassis(chassis_id))
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 인터페이스 MAC 일치
    pub fn by_mac(&self, mac: &MacAddress) -> Vec<(DeviceId, InterfaceId)> {
        self.macs
            .get(mac)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 관리 IP 일치
    pub fn by_ip(&self, ip: &IpAddr) -> Vec<DeviceId> {
        self.ips
            .get(ip)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}

// ─── TopologySnapshot ────────────────────────────────────────────────

/// 특정 버전의 불변 토폴로지 그래프
#[derive(Debug, Clone)]
pub struct TopologySnapshot {
    version: u64,
    committed_at: Timestamp,
    devices: BTreeMap<DeviceId, Arc<Device>>,
    links: BTreeMap<LinkId, Arc<Link>>,
    unresolved: BTreeMap<DeviceId, Arc<Vec<CandidateLink>>>,
    conflicts: BTreeMap<LinkId, ConflictRecord>,
    device_revisions: BTreeMap<DeviceId, u64>,
    identity: IdentityIndex,
    by_device: BTreeMap<DeviceId, Vec<LinkId>>,
    by_endpoint: BTreeMap<Endpoint, Vec<LinkId>>,
}

/// 스냅샷 구성 요소 (커밋 시 조립용)
#[derive(Debug, Clone, Default)]
pub(crate) struct SnapshotParts {
    pub devices: BTreeMap<DeviceId, Arc<Device>>,
    pub links: BTreeMap<LinkId, Arc<Link>>,
    pub unresolved: BTreeMap<DeviceId, Arc<Vec<CandidateLink>>>,
    pub conflicts: BTreeMap<LinkId, ConflictRecord>,
    pub device_revisions: BTreeMap<DeviceId, u64>,
}

impl TopologySnapshot {
    /// 버전 0의 빈 스냅샷
    pub fn empty() -> Self {
        Self::assemble(0, chrono::Utc::now(), SnapshotParts::default())
    }

    pub(crate) fn assemble(version: u64, committed_at: Timestamp, parts: SnapshotParts) -> Self {
        let identity = IdentityIndex::build(parts.devices.values().map(Arc::as_ref));
        let mut by_device: BTreeMap<DeviceId, Vec<LinkId>> = BTreeMap::new();
        let mut by_endpoint: BTreeMap<Endpoint, Vec<LinkId>> = BTreeMap::new();
        for link in parts.links.values() {
            by_device
                .entry(link.a.device_id.clone())
                .or_default()
                .push(link.id.clone());
            if link.b.device_id != link.a.device_id {
                by_device
                    .entry(link.b.device_id.clone())
                    .or_default()
                    .push(link.id.clone());
            }
            by_endpoint
                .entry(link.a.clone())
                .or_default()
                .push(link.id.clone());
            by_endpoint
                .entry(link.b.clone())
                .or_default()
                .push(link.id.clone());
        }
        Self {
            version,
            committed_at,
            devices: parts.devices,
            links: parts.links,
            unresolved: parts.unresolved,
            conflicts: parts.conflicts,
            device_revisions: parts.device_revisions,
            identity,
            by_device,
            by_endpoint,
        }
    }

    pub(crate) fn to_parts(&self) -> SnapshotParts {
        SnapshotParts {
            devices: self.devices.clone(),
            links: self.links.clone(),
            unresolved: self.unresolved.clone(),
            conflicts: self.conflicts.clone(),
            device_revisions: self.device_revisions.clone(),
        }
    }

    /// 스냅샷 버전 (커밋마다 1씩 증가)
    pub fn version(&self) -> u64 {
        self.version
    }

    /// 커밋 시각
    pub fn committed_at(&self) -> Timestamp {
        self.committed_at
    }

    /// 장비 조회
    pub fn device(&self, id: &DeviceId) -> Option<&Arc<Device>> {
        self.devices.get(id)
    }

    /// 전체 장비 (ID 순)
    pub fn devices(&self) -> impl Iterator<Item = &Arc<Device>> {
        self.devices.values()
    }

    /// 장비 수
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// 링크 조회
    pub fn link(&self, id: &LinkId) -> Option<&Arc<Link>> {
        self.links.get(id)
    }

    /// 전체 링크 (ID 순)
    pub fn links(&self) -> impl Iterator<Item = &Arc<Link>> {
        self.links.values()
    }

    /// 링크 수
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// 장비에 연결된 링크 (ID 순)
    pub fn links_of<'a>(
        &'a self,
        device_id: &DeviceId,
    ) -> impl Iterator<Item = &'a Arc<Link>> + use<'a> {
        self.by_device
            .get(device_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.links.get(id))
    }

    /// 엔드포인트에 연결된 링크
    pub fn links_at<'a>(
        &'a self,
        endpoint: &Endpoint,
    ) -> impl Iterator<Item = &'a Arc<Link>> + use<'a> {
        self.by_endpoint
            .get(endpoint)
            .into_iter()
            .flatten()
            .filter_map(|id| self.links.get(id))
    }

    /// 보고 장비별 미해결 후보
    pub fn unresolved_for(&self, reporter: &DeviceId) -> &[CandidateLink] {
        self.unresolved
            .get(reporter)
            .map(|list| list.as_slice())
            .unwrap_or_default()
    }

    /// 전체 미해결 후보 (보고 장비 순)
    pub fn unresolved(&self) -> impl Iterator<Item = &CandidateLink> {
        self.unresolved.values().flat_map(|list| list.iter())
    }

    /// 미해결 후보 수
    pub fn unresolved_count(&self) -> usize {
        self.unresolved.values().map(|list| list.len()).sum()
    }

    /// 링크의 충돌 기록
    pub fn conflict(&self, link_id: &LinkId) -> Option<&ConflictRecord> {
        self.conflicts.get(link_id)
    }

    /// 전체 충돌 기록
    pub fn conflicts(&self) -> impl Iterator<Item = &ConflictRecord> {
        self.conflicts.values()
    }

    /// 식별자 역색인
    pub fn identity(&self) -> &IdentityIndex {
        &self.identity
    }

    /// 장비 또는 그 장비에 연결된 링크가 마지막으로 바뀐 버전
    pub fn device_revision(&self, id: &DeviceId) -> u64 {
        self.device_revisions.get(id).copied().unwrap_or(0)
    }

    /// 인터페이스가 down으로 보고되었는지 확인합니다.
    pub fn interface_down(&self, endpoint: &Endpoint) -> bool {
        self.devices
            .get(&endpoint.device_id)
            .and_then(|d| d.interface(&endpoint.interface_id))
            .is_some_and(|iface| iface.oper_status == OperStatus::Down)
    }

    /// 저장소 불변식을 검사합니다.
    ///
    /// 위반 내용을 사람이 읽을 수 있는 문자열로 반환합니다.
    pub fn validate(&self) -> Result<(), String> {
        for (key, device) in &self.devices {
            if key != &device.id {
                return Err(format!("device key {key} does not match id {}", device.id));
            }
            let mut seen = BTreeSet::new();
            for iface in &device.interfaces {
                if !seen.insert(&iface.id) {
                    return Err(format!("device {key} has duplicate interface {}", iface.id));
                }
            }
        }

        for (key, link) in &self.links {
            if key != &link.id {
                return Err(format!("link key {key} does not match id {}", link.id));
            }
            if let Some(violation) = self.link_violation(link) {
                return Err(violation);
            }
        }

        for (key, record) in &self.conflicts {
            if !self.links.contains_key(key) {
                return Err(format!("conflict references missing link {key}"));
            }
            if key != &record.link_id {
                return Err(format!("conflict key {key} does not match record"));
            }
        }
        Ok(())
    }

    /// 링크 한 개의 불변식 위반 사유
    pub(crate) fn link_violation(&self, link: &Link) -> Option<String> {
        let key = &link.id;
        if link.a == link.b {
            return Some(format!("link {key} connects an interface to itself"));
        }
        if link.a > link.b || link.id != LinkId::from_endpoints(&link.a, &link.b) {
            return Some(format!("link {key} endpoints are not canonical"));
        }
        for ep in [&link.a, &link.b] {
            let Some(device) = self.devices.get(&ep.device_id) else {
                return Some(format!("link {key} references unknown device {}", ep.device_id));
            };
            if device.interface(&ep.interface_id).is_none() {
                return Some(format!("link {key} references unknown interface {ep}"));
            }
        }
        if !link.confidence.is_finite() || !(0.0..=1.0).contains(&link.confidence) {
            return Some(format!(
                "link {key} confidence {} outside [0, 1]",
                link.confidence
            ));
        }
        None
    }

    /// 영속화용 테이블로 변환합니다.
    pub fn to_table(&self) -> SnapshotTable {
        SnapshotTable {
            version: self.version,
            committed_at: self.committed_at,
            devices: self.devices.values().map(|d| Device::clone(d)).collect(),
            links: self
                .links
                .iter()
                .map(|(id, link)| (id.to_string(), Link::clone(link)))
                .collect(),
            unresolved: self.unresolved().cloned().collect(),
            conflicts: self.conflicts.values().cloned().collect(),
        }
    }

    /// 영속화 테이블에서 스냅샷을 복원합니다.
    ///
    /// 불변식 검사는 호출자(저장소)가 수행합니다.
    pub fn from_table(table: SnapshotTable) -> Self {
        let mut parts = SnapshotParts::default();
        for device in table.devices {
            parts.device_revisions.insert(device.id.clone(), table.version);
            parts.devices.insert(device.id.clone(), Arc::new(device));
        }
        for (_, link) in table.links {
            parts.links.insert(link.id.clone(), Arc::new(link));
        }
        let mut unresolved: BTreeMap<DeviceId, Vec<CandidateLink>> = BTreeMap::new();
        for candidate in table.unresolved {
            unresolved
                .entry(candidate.reporter.clone())
                .or_default()
                .push(candidate);
        }
        parts.unresolved = unresolved
            .into_iter()
            .map(|(k, v)| (k, Arc::new(v)))
            .collect();
        parts.conflicts = table
            .conflicts
            .into_iter()
            .map(|c| (c.link_id.clone(), c))
            .collect();
        Self::assemble(table.version, table.committed_at, parts)
    }
}

/// 디스크에 저장되는 최신 스냅샷 테이블
///
/// 링크는 링크 ID를 키로 하는 객체로 저장됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotTable {
    /// 스냅샷 버전
    pub version: u64,
    /// 커밋 시각
    pub committed_at: Timestamp,
    /// 장비 레지스트리
    #[serde(default)]
    pub devices: Vec<Device>,
    /// 링크 테이블 (링크 ID → 링크)
    #[serde(default)]
    pub links: BTreeMap<String, Link>,
    /// 미해결 후보
    #[serde(default)]
    pub unresolved: Vec<CandidateLink>,
    /// 충돌 기록
    #[serde(default)]
    pub conflicts: Vec<ConflictRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use topowatch_core::types::Interface;

    fn device(id: &str, ifaces: &[&str]) -> Device {
        let mut d = Device::new(id, id);
        for (i, name) in ifaces.iter().enumerate() {
            d = d.with_interface(Interface::new(*name, i as u32 + 1, *name));
        }
        d
    }

    fn snapshot_with(devices: Vec<Device>, links: Vec<Link>) -> TopologySnapshot {
        let mut parts = SnapshotParts::default();
        for d in devices {
            parts.devices.insert(d.id.clone(), Arc::new(d));
        }
        for l in links {
            parts.links.insert(l.id.clone(), Arc::new(l));
        }
        TopologySnapshot::assemble(1, Utc::now(), parts)
    }

    #[test]
    fn normalize_chassis_handles_mac_forms() {
        assert_eq!(normalize_chassis("AABB.CCDD.EEFF"), "aa:bb:cc:dd:ee:ff");
        assert_eq!(normalize_chassis(" Core-1 "), "core-1");
    }

    #[test]
    fn identity_index_lookups() {
        let mac: MacAddress = "00:11:22:33:44:55".parse().unwrap();
        let mut a = device("a", &["eth0"]).with_chassis_id("AA-BB-CC-00-00-01");
        a.interfaces[0].mac = Some(mac);
        let a = a.with_ip("10.0.0.1".parse().unwrap());
        let snap = snapshot_with(vec![a], Vec::new());

        assert_eq!(snap.identity().by_chassis("aabb.cc00.0001"), vec![DeviceId::new("a")]);
        assert_eq!(
            snap.identity().by_mac(&mac),
            vec![(DeviceId::new("a"), InterfaceId::new("eth0"))]
        );
        assert_eq!(
            snap.identity().by_ip(&"10.0.0.1".parse().unwrap()),
            vec![DeviceId::new("a")]
        );
        assert!(snap.identity().by_chassis("unknown").is_empty());
    }

    #[test]
    fn adjacency_indexes_both_ends() {
        let link = Link::new(Endpoint::new("a", "1"), Endpoint::new("b", "1"), Utc::now());
        let snap = snapshot_with(vec![device("a", &["1"]), device("b", &["1"])], vec![link]);
        assert_eq!(snap.links_of(&DeviceId::new("a")).count(), 1);
        assert_eq!(snap.links_of(&DeviceId::new("b")).count(), 1);
        assert_eq!(snap.links_at(&Endpoint::new("b", "1")).count(), 1);
        assert_eq!(snap.links_at(&Endpoint::new("b", "2")).count(), 0);
        assert!(snap.validate().is_ok());
    }

    #[test]
    fn validate_rejects_dangling_interface() {
        let link = Link::new(Endpoint::new("a", "1"), Endpoint::new("b", "9"), Utc::now());
        let snap = snapshot_with(vec![device("a", &["1"]), device("b", &["1"])], vec![link]);
        let err = snap.validate().unwrap_err();
        assert!(err.contains("unknown interface"));
    }

    #[test]
    fn validate_rejects_out_of_range_confidence() {
        let mut link = Link::new(Endpoint::new("a", "1"), Endpoint::new("b", "1"), Utc::now());
        link.confidence = 1.5;
        let snap = snapshot_with(vec![device("a", &["1"]), device("b", &["1"])], vec![link]);
        assert!(snap.validate().is_err());
    }

    #[test]
    fn table_roundtrip_preserves_graph() {
        let mut link = Link::new(Endpoint::new("a", "1"), Endpoint::new("b", "1"), Utc::now());
        link.confidence = 0.9;
        let snap = snapshot_with(vec![device("a", &["1"]), device("b", &["1"])], vec![link]);

        let json = serde_json::to_string(&snap.to_table()).unwrap();
        assert!(json.contains("\"a:1|b:1\""));
        let table: SnapshotTable = serde_json::from_str(&json).unwrap();
        let restored = TopologySnapshot::from_table(table);

        assert_eq!(restored.version(), 1);
        assert_eq!(restored.link_count(), 1);
        assert_eq!(restored.links_of(&DeviceId::new("a")).count(), 1);
        assert!(restored.validate().is_ok());
    }
}
