//! 통합 테스트 -- 저장소 커밋부터 경로/도달성 질의까지
//!
//! 저장소에 장비 사이클을 커밋해 그래프를 만들고 `QueryApi`로 질의합니다.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use proptest::prelude::*;

use topowatch_analysis::{
    AnalysisEngineConfig, AnalysisError, Factor, PathOptions, QueryApi, Verdict, find_paths,
};
use topowatch_core::event::{EventSink, MemoryEventSink};
use topowatch_core::types::{
    Device, DeviceId, DeviceStatus, DiscoveryProtocol, Interface, OperStatus,
};
use topowatch_topology::{
    CandidateLink, CandidateSide, DeviceCycle, Endpoint, Link, LinkId, SnapshotTable,
    TopologyConfig, TopologySnapshot, TopologyStore,
};

fn store_with(devices: &[&str]) -> Arc<TopologyStore> {
    let sink: Arc<dyn EventSink> = Arc::new(MemoryEventSink::new());
    let store = Arc::new(TopologyStore::new(TopologyConfig::default(), sink));
    for id in devices {
        let device = ["eth1", "eth2"]
            .iter()
            .enumerate()
            .fold(Device::new(*id, *id), |d, (i, name)| {
                d.with_interface(
                    Interface::new(*name, i as u32 + 1, *name)
                        .with_speed(10_000_000_000)
                        .with_oper_status(OperStatus::Up),
                )
            })
            .with_status(DeviceStatus::Up);
        store.register_device(device).unwrap();
    }
    store
}

/// 양쪽 장비가 서로를 LLDP로 보고하는 사이클을 장비별로 한 번씩 커밋
fn wire(store: &TopologyStore, cables: &[((&str, &str), (&str, &str))]) {
    let now = Utc::now();
    let mut by_reporter: BTreeMap<&str, Vec<CandidateLink>> = BTreeMap::new();
    for &((x, xi), (y, yi)) in cables {
        for (local, remote) in [((x, xi), (y, yi)), ((y, yi), (x, xi))] {
            by_reporter.entry(local.0).or_default().push(CandidateLink {
                reporter: DeviceId::new(local.0),
                local: CandidateSide::Resolved(Endpoint::new(local.0, local.1)),
                remote: CandidateSide::Resolved(Endpoint::new(remote.0, remote.1)),
                protocol: DiscoveryProtocol::Lldp,
                observed_at: now,
            });
        }
    }
    for (reporter, candidates) in by_reporter {
        store
            .apply_device_cycle(&DeviceCycle {
                device_id: DeviceId::new(reporter),
                observed_at: now,
                candidates,
                interfaces: Vec::new(),
            })
            .unwrap();
    }
}

/// A–B–C 체인, B의 C 방향 인터페이스 down
fn chain_with_b_down(extra: &[&str]) -> Arc<TopologyStore> {
    let mut devices = vec!["a", "b", "c"];
    devices.extend_from_slice(extra);
    let store = store_with(&devices);
    wire(
        &store,
        &[(("a", "eth1"), ("b", "eth1")), (("b", "eth2"), ("c", "eth1"))],
    );
    store
        .update_interfaces(
            &DeviceId::new("b"),
            &[Interface::new("eth2", 2, "eth2")
                .with_speed(10_000_000_000)
                .with_oper_status(OperStatus::Down)],
        )
        .unwrap();
    store
}

fn api(store: Arc<TopologyStore>) -> QueryApi {
    QueryApi::new(store, AnalysisEngineConfig::default()).unwrap()
}

/// 중간 장비 인터페이스가 down이면 경로 없음
#[test]
fn test_down_interface_breaks_only_path() {
    let api = api(chain_with_b_down(&[]));
    let options = PathOptions {
        min_confidence: 0.5,
        ..api.default_options()
    };
    let err = api
        .find_paths(&"a".into(), &"c".into(), Some(options))
        .unwrap_err();
    assert!(matches!(err, AnalysisError::NoPathFound { .. }));
}

/// 우회 경로 A–D–C가 있으면 그 경로를 반환
#[test]
fn test_alternate_route_is_returned() {
    let store = chain_with_b_down(&["d"]);
    wire(
        &store,
        &[
            (("a", "eth1"), ("b", "eth1")),
            (("a", "eth2"), ("d", "eth1")),
            (("d", "eth2"), ("c", "eth2")),
        ],
    );
    let api = api(store);
    let result = api.find_paths(&"a".into(), &"c".into(), None).unwrap();
    let best = result.best().expect("alternate path");
    let ids: Vec<&str> = best.devices.iter().map(DeviceId::as_str).collect();
    assert_eq!(ids, ["a", "d", "c"]);
    assert!(best.hops.iter().all(|h| h.is_up && h.confidence >= 0.5));
    assert_eq!(result.paths.len(), 1);
}

/// 같은 토폴로지에서 도달성은 B에서 끊김으로 판정되고 C는 따로 보고되지 않음
#[tokio::test]
async fn test_reachability_stops_at_failed_hop() {
    let api = api(chain_with_b_down(&[]));
    let report = api
        .check_reachability(&"a".into(), &"c".into())
        .await
        .unwrap();

    assert_eq!(report.verdict, Verdict::UnreachableAt { hop: "b".into() });
    let bc = LinkId::from_endpoints(&Endpoint::new("b", "eth2"), &Endpoint::new("c", "eth1"));
    assert_eq!(report.factors, vec![Factor::LinkDown { link_id: bc }]);
}

/// B가 A 방향 인터페이스를 down으로 보고하면 A가 아니라 B에서 끊김
#[tokio::test]
async fn test_reachability_blames_device_reporting_ingress_down() {
    let store = store_with(&["a", "b", "c"]);
    wire(
        &store,
        &[(("a", "eth1"), ("b", "eth1")), (("b", "eth2"), ("c", "eth1"))],
    );
    store
        .update_interfaces(
            &DeviceId::new("b"),
            &[Interface::new("eth1", 1, "eth1")
                .with_speed(10_000_000_000)
                .with_oper_status(OperStatus::Down)],
        )
        .unwrap();

    let report = api(store)
        .check_reachability(&"a".into(), &"c".into())
        .await
        .unwrap();
    assert_eq!(report.verdict, Verdict::UnreachableAt { hop: "b".into() });
    let ab = LinkId::from_endpoints(&Endpoint::new("a", "eth1"), &Endpoint::new("b", "eth1"));
    assert_eq!(report.factors, vec![Factor::LinkDown { link_id: ab }]);
}

/// 질의는 호출 시점 스냅샷에 고정됨
#[test]
fn test_query_reads_pinned_snapshot_version() {
    let store = store_with(&["a", "b"]);
    wire(&store, &[(("a", "eth1"), ("b", "eth1"))]);
    let api = api(Arc::clone(&store));
    let version = store.version();
    let pinned = api.get_topology_snapshot(Some(version)).unwrap();

    store
        .delete_link(&LinkId::from_endpoints(
            &Endpoint::new("a", "eth1"),
            &Endpoint::new("b", "eth1"),
        ))
        .unwrap();

    let options = PathOptions {
        timeout: None,
        ..api.default_options()
    };
    let old = find_paths(&pinned, &"a".into(), &"b".into(), &options).unwrap();
    assert_eq!(old.snapshot_version, version);
    assert_eq!(old.paths.len(), 1);
    assert!(api.find_paths(&"a".into(), &"b".into(), None).is_err());
}

/// 상호 LLDP 링크는 신뢰 기준 이상이므로 도달 가능
#[tokio::test]
async fn test_healthy_path_is_reachable() {
    let store = store_with(&["a", "b", "c"]);
    wire(
        &store,
        &[(("a", "eth1"), ("b", "eth1")), (("b", "eth2"), ("c", "eth1"))],
    );
    let report = api(store)
        .check_reachability(&"a".into(), &"c".into())
        .await
        .unwrap();
    assert_eq!(report.verdict, Verdict::Reachable);
}

// ─── 속성 테스트 ─────────────────────────────────────────────────────

/// (a, b, confidence, is_up, speed) 인덱스 기반 링크 행으로 스냅샷 구성
fn random_snapshot(n: usize, rows: &[(usize, usize, f64, bool, Option<u64>)]) -> TopologySnapshot {
    let now = Utc::now();
    let mut links = BTreeMap::new();
    for (idx, (a, b, confidence, is_up, speed)) in rows.iter().enumerate() {
        let (a, b) = (a % n, b % n);
        if a == b {
            continue;
        }
        let mut link = Link::new(
            Endpoint::new(format!("d{a}"), format!("p{idx}")),
            Endpoint::new(format!("d{b}"), format!("p{idx}")),
            now,
        );
        link.confidence = *confidence;
        link.is_up = *is_up;
        link.speed_bps = *speed;
        links.insert(link.id.to_string(), link);
    }
    TopologySnapshot::from_table(SnapshotTable {
        version: 1,
        committed_at: now,
        devices: (0..n)
            .map(|i| Device::new(format!("d{i}"), format!("d{i}")))
            .collect(),
        links,
        unresolved: Vec::new(),
        conflicts: Vec::new(),
    })
}

fn link_rows() -> impl Strategy<Value = Vec<(usize, usize, f64, bool, Option<u64>)>> {
    prop::collection::vec(
        (
            0usize..8,
            0usize..8,
            0.0f64..=1.0,
            any::<bool>(),
            prop::option::of(prop::sample::select(vec![
                100_000_000u64,
                1_000_000_000,
                10_000_000_000,
            ])),
        ),
        0..24,
    )
}

proptest! {
    #[test]
    fn paths_never_use_down_or_weak_links(
        n in 2usize..8,
        rows in link_rows(),
        src in 0usize..8,
        dst in 0usize..8,
        min_confidence in 0.0f64..=1.0,
    ) {
        let snapshot = random_snapshot(n, &rows);
        let options = PathOptions {
            k: 4,
            min_confidence,
            max_hops: 6,
            timeout: None,
            ..PathOptions::default()
        };
        let source = DeviceId::new(format!("d{}", src % n));
        let dest = DeviceId::new(format!("d{}", dst % n));
        if let Ok(result) = find_paths(&snapshot, &source, &dest, &options) {
            prop_assert!(result.paths.len() <= 4);
            for path in &result.paths {
                prop_assert_eq!(path.devices.first(), Some(&source));
                prop_assert_eq!(path.devices.last(), Some(&dest));
                let unique: HashSet<_> = path.devices.iter().collect();
                prop_assert_eq!(unique.len(), path.devices.len());
                for hop in &path.hops {
                    prop_assert!(hop.is_up);
                    prop_assert!(hop.confidence >= min_confidence);
                }
            }
            for pair in result.paths.windows(2) {
                prop_assert!(pair[0].rank_cmp(&pair[1]).is_le());
            }
        }
    }

    #[test]
    fn repeated_queries_are_identical(
        n in 2usize..8,
        rows in link_rows(),
        src in 0usize..8,
        dst in 0usize..8,
    ) {
        let snapshot = random_snapshot(n, &rows);
        let options = PathOptions {
            k: 3,
            timeout: None,
            include_degraded: true,
            ..PathOptions::default()
        };
        let source = DeviceId::new(format!("d{}", src % n));
        let dest = DeviceId::new(format!("d{}", dst % n));
        let first = find_paths(&snapshot, &source, &dest, &options);
        let second = find_paths(&snapshot, &source, &dest, &options);
        match (first, second) {
            (Ok(a), Ok(b)) => {
                prop_assert_eq!(a.paths, b.paths);
                prop_assert_eq!(a.degraded, b.degraded);
            }
            (Err(a), Err(b)) => prop_assert_eq!(a.to_string(), b.to_string()),
            _ => prop_assert!(false, "query outcome changed between runs"),
        }
    }
}
