//! 통합 테스트 -- 증거 병합, 철회, 충돌, 영속화 시나리오
//!
//! 공개 API(`TopologyStore`, `Persistence`)만 사용합니다.

use std::sync::Arc;

use chrono::{Duration, Utc};
use topowatch_core::event::{EventKind, MemoryEventSink};
use topowatch_core::types::{
    Device, DeviceId, DeviceStatus, DiscoveryProtocol, Interface, OperStatus, Timestamp,
};
use topowatch_topology::{
    CandidateLink, CandidateSide, ConflictResolution, DeviceCycle, Endpoint, LinkId, Persistence,
    TopologyConfig, TopologyStore,
};

fn device(id: &str, ifaces: &[&str]) -> Device {
    ifaces
        .iter()
        .enumerate()
        .fold(Device::new(id, id), |d, (i, name)| {
            d.with_interface(Interface::new(*name, i as u32 + 1, *name).with_speed(10_000_000_000))
        })
}

fn seen(
    reporter: &str,
    local: &str,
    remote: (&str, &str),
    protocol: DiscoveryProtocol,
    at: Timestamp,
) -> CandidateLink {
    CandidateLink {
        reporter: DeviceId::new(reporter),
        local: CandidateSide::Resolved(Endpoint::new(reporter, local)),
        remote: CandidateSide::Resolved(Endpoint::new(remote.0, remote.1)),
        protocol,
        observed_at: at,
    }
}

fn cycle(reporter: &str, at: Timestamp, candidates: Vec<CandidateLink>) -> DeviceCycle {
    DeviceCycle {
        device_id: DeviceId::new(reporter),
        observed_at: at,
        candidates,
        interfaces: Vec::new(),
    }
}

fn two_switches() -> (TopologyStore, Arc<MemoryEventSink>) {
    let sink = Arc::new(MemoryEventSink::new());
    let store = TopologyStore::new(TopologyConfig::default(), sink.clone());
    store.register_device(device("a", &["eth1"])).unwrap();
    store.register_device(device("b", &["eth1"])).unwrap();
    (store, sink)
}

fn ab() -> LinkId {
    LinkId::from_endpoints(&Endpoint::new("a", "eth1"), &Endpoint::new("b", "eth1"))
}

#[test]
fn both_sides_lldp_combine_to_099() {
    let (store, _) = two_switches();
    let now = Utc::now();
    store
        .apply_device_cycle(&cycle("a", now, vec![seen("a", "eth1", ("b", "eth1"), DiscoveryProtocol::Lldp, now)]))
        .unwrap();
    store
        .apply_device_cycle(&cycle("b", now, vec![seen("b", "eth1", ("a", "eth1"), DiscoveryProtocol::Lldp, now)]))
        .unwrap();

    let snapshot = store.snapshot();
    assert_eq!(snapshot.link_count(), 1);
    let link = snapshot.link(&ab()).unwrap();
    assert!((link.confidence - 0.99).abs() < 1e-9);
    assert!(link.is_up);
    assert_eq!(link.speed_bps, Some(10_000_000_000));
    assert_eq!(
        snapshot.device(&DeviceId::new("a")).unwrap().status,
        DeviceStatus::Up
    );
}

#[test]
fn one_side_withdrawing_keeps_link_at_090() {
    let (store, _) = two_switches();
    let t0 = Utc::now();
    store
        .apply_device_cycle(&cycle("a", t0, vec![seen("a", "eth1", ("b", "eth1"), DiscoveryProtocol::Lldp, t0)]))
        .unwrap();
    store
        .apply_device_cycle(&cycle("b", t0, vec![seen("b", "eth1", ("a", "eth1"), DiscoveryProtocol::Lldp, t0)]))
        .unwrap();

    let t1 = t0 + Duration::seconds(300);
    store.apply_device_cycle(&cycle("b", t1, Vec::new())).unwrap();

    let snapshot = store.snapshot();
    let link = snapshot.link(&ab()).expect("link must survive withdrawal");
    assert!((link.confidence - 0.90).abs() < 1e-9);
    assert!(link.is_up);
}

#[test]
fn replaying_a_batch_publishes_no_new_version() {
    let (store, _) = two_switches();
    let now = Utc::now();
    let batch = cycle("a", now, vec![seen("a", "eth1", ("b", "eth1"), DiscoveryProtocol::Cdp, now)]);
    let first = store.apply_device_cycle(&batch).unwrap();
    let before = store.snapshot();

    let second = store.apply_device_cycle(&batch).unwrap();
    assert!(!second.changed);
    assert_eq!(second.version, first.version);
    let after = store.snapshot();
    assert_eq!(before.version(), after.version());
    assert_eq!(
        before.link(&ab()).map(|l| l.confidence),
        after.link(&ab()).map(|l| l.confidence)
    );
}

#[test]
fn staleness_sweep_marks_link_down_and_emits_event() {
    let (store, sink) = two_switches();
    let t0 = Utc::now() - Duration::hours(2);
    store
        .apply_device_cycle(&cycle("a", t0, vec![seen("a", "eth1", ("b", "eth1"), DiscoveryProtocol::Lldp, t0)]))
        .unwrap();

    let outcome = store.sweep_stale(Utc::now()).unwrap();
    assert!(outcome.changed);
    assert!(!store.snapshot().link(&ab()).unwrap().is_up);
    assert_eq!(sink.count_kind(EventKind::LinkStale), 1);

    // 두 번째 정리는 변화 없음
    assert!(!store.sweep_stale(Utc::now()).unwrap().changed);
}

#[test]
fn interface_down_report_drops_link() {
    let (store, sink) = two_switches();
    let t0 = Utc::now();
    store
        .apply_device_cycle(&cycle("a", t0, vec![seen("a", "eth1", ("b", "eth1"), DiscoveryProtocol::Lldp, t0)]))
        .unwrap();

    let mut down = cycle("b", t0 + Duration::seconds(30), Vec::new());
    down.interfaces = vec![
        Interface::new("eth1", 1, "eth1")
            .with_speed(10_000_000_000)
            .with_oper_status(OperStatus::Down),
    ];
    store.apply_device_cycle(&down).unwrap();

    assert!(!store.snapshot().link(&ab()).unwrap().is_up);
    assert_eq!(sink.count_kind(EventKind::LinkDown), 1);
}

#[test]
fn conflict_resolution_by_operator() {
    let sink = Arc::new(MemoryEventSink::new());
    let store = TopologyStore::new(TopologyConfig::default(), sink.clone());
    for id in ["a", "b", "c"] {
        store.register_device(device(id, &["eth1"])).unwrap();
    }
    let now = Utc::now();
    store
        .apply_device_cycle(&cycle("b", now, vec![seen("b", "eth1", ("a", "eth1"), DiscoveryProtocol::Lldp, now)]))
        .unwrap();
    store
        .apply_device_cycle(&cycle("a", now, vec![seen("a", "eth1", ("c", "eth1"), DiscoveryProtocol::Lldp, now)]))
        .unwrap();

    let snapshot = store.snapshot();
    let link = snapshot.link(&ab()).unwrap();
    assert!(link.conflicting);
    assert_eq!(sink.count_kind(EventKind::GraphConflict), 1);

    store
        .resolve_conflict(&ab(), ConflictResolution::AcceptReported)
        .unwrap();
    let snapshot = store.snapshot();
    assert!(snapshot.link(&ab()).is_none());
    assert_eq!(snapshot.conflicts().count(), 0);
    let ac = LinkId::from_endpoints(&Endpoint::new("a", "eth1"), &Endpoint::new("c", "eth1"));
    assert_eq!(snapshot.link(&ac).unwrap().confidence, 1.0);
}

#[test]
fn manual_link_and_delete() {
    let (store, _) = two_switches();
    store
        .add_manual_link(&Endpoint::new("b", "eth1"), &Endpoint::new("a", "eth1"))
        .unwrap();
    let link = store.snapshot().link(&ab()).cloned().unwrap();
    assert!(link.discovery_sources.contains(&DiscoveryProtocol::Manual));

    store.delete_link(&ab()).unwrap();
    assert!(store.snapshot().link(&ab()).is_none());
    assert!(store.delete_link(&ab()).is_err());
}

#[tokio::test]
async fn flushed_snapshot_restores_into_fresh_store() {
    let dir = tempfile::tempdir().unwrap();
    let persistence = Persistence::new(dir.path(), true);
    let (store, _) = two_switches();
    let now = Utc::now();
    store
        .apply_device_cycle(&cycle("a", now, vec![seen("a", "eth1", ("b", "eth1"), DiscoveryProtocol::Lldp, now)]))
        .unwrap();
    let version = persistence.flush(&store).await.unwrap();

    let restored = TopologyStore::new(TopologyConfig::default(), Arc::new(MemoryEventSink::new()));
    let table = persistence.load_table().await.unwrap().unwrap();
    assert_eq!(restored.restore(table).unwrap(), version);
    let snapshot = restored.snapshot();
    assert_eq!(snapshot.link_count(), 1);
    assert!((snapshot.link(&ab()).unwrap().confidence - 0.9).abs() < 1e-9);

    // 복원 후 같은 사이클 재적용은 변화 없음
    let replay = restored
        .apply_device_cycle(&cycle("a", now, vec![seen("a", "eth1", ("b", "eth1"), DiscoveryProtocol::Lldp, now)]))
        .unwrap();
    assert!(!replay.changed);
}
