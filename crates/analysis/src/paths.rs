//! 경로 분석 — 스냅샷 위의 k개 순위 단순 경로
//!
//! # 순위 규칙
//!
//! ```text
//! 1. 홉 수 오름차순
//! 2. 병목 속도 내림차순 (속도 미상은 최하위)
//! 3. 장비 ID 시퀀스 사전순
//! 4. 링크 ID 시퀀스 사전순 (병렬 링크)
//! ```
//!
//! 홉 수가 1차 기준이므로 깊이를 하나씩 늘려 가며 정확히 그 길이의 단순
//! 경로를 모두 찾고, 누적 결과가 `k`개를 넘으면 멈춥니다. 목적지까지의
//! BFS 거리로 가지치기합니다.
//!
//! 기본 결과에는 `is_up`이고 신뢰도가 기준 이상인 링크만 쓰입니다.
//! 저하(degraded) 결과는 down/노후/저신뢰 링크를 허용한 별도 집합이며,
//! 기본 결과와 섞이지 않습니다.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use topowatch_core::types::DeviceId;
use topowatch_topology::{Endpoint, Link, LinkId, TopologySnapshot};

use crate::config::AnalysisEngineConfig;
use crate::error::AnalysisError;

/// 제한 시간 확인 주기 (확장 횟수)
const DEADLINE_CHECK_EVERY: u64 = 64;

// ─── 질의 옵션 ───────────────────────────────────────────────────────

/// 경로 질의 옵션
#[derive(Debug, Clone, PartialEq)]
pub struct PathOptions {
    /// 반환할 최대 경로 수
    pub k: usize,
    /// 기본 결과에 쓰일 링크의 최소 신뢰도
    pub min_confidence: f64,
    /// 저하 결과에 쓰일 링크의 최소 신뢰도
    pub degraded_min_confidence: f64,
    /// 최대 홉 수
    pub max_hops: usize,
    /// 질의 제한 시간 (`None`이면 무제한)
    pub timeout: Option<Duration>,
    /// 저하 결과 집합 계산 여부
    pub include_degraded: bool,
}

impl Default for PathOptions {
    fn default() -> Self {
        AnalysisEngineConfig::default().path_options()
    }
}

impl PathOptions {
    fn validate(&self) -> Result<(), AnalysisError> {
        if self.k == 0 {
            return Err(AnalysisError::InvalidArgument("k must be at least 1".to_owned()));
        }
        for (name, value) in [
            ("min_confidence", self.min_confidence),
            ("degraded_min_confidence", self.degraded_min_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AnalysisError::InvalidArgument(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }

    fn admits(&self, link: &Link) -> bool {
        link.is_up && link.confidence >= self.min_confidence
    }
}

// ─── 결과 타입 ───────────────────────────────────────────────────────

/// 경로의 한 홉 (장비 → 링크 → 장비)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathHop {
    /// 지나는 링크
    pub link_id: LinkId,
    /// 출발 쪽 엔드포인트
    pub from: Endpoint,
    /// 도착 쪽 엔드포인트
    pub to: Endpoint,
    /// 링크 신뢰도
    pub confidence: f64,
    /// 링크 운용 상태
    pub is_up: bool,
    /// 링크 속도
    pub speed_bps: Option<u64>,
}

/// 출발지에서 목적지까지의 단순 경로
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Path {
    /// 지나는 장비 (출발지, 목적지 포함)
    pub devices: Vec<DeviceId>,
    /// 홉 목록 (`devices.len() - 1`개)
    pub hops: Vec<PathHop>,
    /// 병목 속도 (한 링크라도 미상이면 `None`)
    pub bottleneck_bps: Option<u64>,
    /// 경로 위 최저 링크 신뢰도 (0홉이면 1.0)
    pub min_confidence: f64,
}

impl Path {
    fn zero_hop(device: DeviceId) -> Self {
        Self {
            devices: vec![device],
            hops: Vec::new(),
            bottleneck_bps: None,
            min_confidence: 1.0,
        }
    }

    fn from_edges(source: &DeviceId, edges: &[&Edge]) -> Self {
        let mut devices = Vec::with_capacity(edges.len() + 1);
        devices.push(source.clone());
        let hops: Vec<PathHop> = edges
            .iter()
            .map(|edge| {
                devices.push(edge.to.device_id.clone());
                PathHop {
                    link_id: edge.link.id.clone(),
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    confidence: edge.link.confidence,
                    is_up: edge.link.is_up,
                    speed_bps: edge.link.speed_bps,
                }
            })
            .collect();
        let bottleneck_bps = hops
            .iter()
            .map(|h| h.speed_bps)
            .try_fold(u64::MAX, |acc, speed| speed.map(|s| acc.min(s)))
            .filter(|_| !hops.is_empty());
        let min_confidence = hops.iter().map(|h| h.confidence).fold(1.0, f64::min);
        Self {
            devices,
            hops,
            bottleneck_bps,
            min_confidence,
        }
    }

    /// 홉 수
    pub fn hop_count(&self) -> usize {
        self.hops.len()
    }

    /// 링크 ID 시퀀스
    pub fn link_ids(&self) -> impl Iterator<Item = &LinkId> {
        self.hops.iter().map(|h| &h.link_id)
    }

    /// 순위 비교
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        self.hop_count()
            .cmp(&other.hop_count())
            .then_with(|| other.bottleneck_bps.cmp(&self.bottleneck_bps))
            .then_with(|| self.devices.cmp(&other.devices))
            .then_with(|| self.link_ids().cmp(other.link_ids()))
    }
}

/// 경로 질의 결과
#[derive(Debug, Clone, Serialize)]
pub struct PathResult {
    /// 출발 장비
    pub source: DeviceId,
    /// 도착 장비
    pub dest: DeviceId,
    /// 질의에 쓰인 스냅샷 버전
    pub snapshot_version: u64,
    /// 기본 결과 (순위 순)
    pub paths: Vec<Path>,
    /// 저하 결과 (요청 시에만, 기본 결과와 겹치지 않음)
    pub degraded: Vec<Path>,
    /// 제한 시간으로 탐색이 중단되었는지 여부
    pub truncated: bool,
}

impl PathResult {
    /// 최상위 기본 경로
    pub fn best(&self) -> Option<&Path> {
        self.paths.first()
    }

    /// 최상위 저하 경로
    pub fn best_degraded(&self) -> Option<&Path> {
        self.degraded.first()
    }
}

// ─── 그래프 ──────────────────────────────────────────────────────────

struct Edge {
    link: Arc<Link>,
    from: Endpoint,
    to: Endpoint,
}

/// 필터를 통과한 링크로 만든 무방향 인접 리스트
struct Graph {
    adjacency: HashMap<DeviceId, Vec<Edge>>,
}

impl Graph {
    fn build(snapshot: &TopologySnapshot, keep: impl Fn(&Link) -> bool) -> Self {
        let mut adjacency: HashMap<DeviceId, Vec<Edge>> = HashMap::new();
        for link in snapshot.links() {
            // 같은 장비의 두 포트를 잇는 링크는 경로에 쓰이지 않음
            if link.a.device_id == link.b.device_id || !keep(link) {
                continue;
            }
            adjacency
                .entry(link.a.device_id.clone())
                .or_default()
                .push(Edge {
                    link: Arc::clone(link),
                    from: link.a.clone(),
                    to: link.b.clone(),
                });
            adjacency
                .entry(link.b.device_id.clone())
                .or_default()
                .push(Edge {
                    link: Arc::clone(link),
                    from: link.b.clone(),
                    to: link.a.clone(),
                });
        }
        for edges in adjacency.values_mut() {
            edges.sort_by(|x, y| {
                x.to.device_id
                    .cmp(&y.to.device_id)
                    .then_with(|| x.link.id.cmp(&y.link.id))
            });
        }
        Self { adjacency }
    }

    fn edges(&self, device_id: &DeviceId) -> &[Edge] {
        self.adjacency
            .get(device_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// 목적지까지의 홉 거리 (BFS)
    fn distances_to(&self, dest: &DeviceId) -> HashMap<DeviceId, usize> {
        let mut dist = HashMap::from([(dest.clone(), 0)]);
        let mut queue = VecDeque::from([dest.clone()]);
        while let Some(node) = queue.pop_front() {
            let next_dist = dist.get(&node).copied().unwrap_or(0) + 1;
            for edge in self.edges(&node) {
                let next = &edge.to.device_id;
                if !dist.contains_key(next) {
                    dist.insert(next.clone(), next_dist);
                    queue.push_back(next.clone());
                }
            }
        }
        dist
    }
}

// ─── 탐색 ────────────────────────────────────────────────────────────

/// 정확히 `remaining` 홉짜리 단순 경로를 찾는 깊이 우선 탐색기
struct Walker<'g> {
    graph: &'g Graph,
    dist: HashMap<DeviceId, usize>,
    dest: &'g DeviceId,
    deadline: Option<Instant>,
    expansions: u64,
    truncated: bool,
    visited: HashSet<DeviceId>,
    stack: Vec<&'g Edge>,
    found: Vec<Vec<&'g Edge>>,
}

impl<'g> Walker<'g> {
    fn walk(&mut self, at: &'g DeviceId, remaining: usize, accept: &dyn Fn(&[&Edge]) -> bool) {
        if remaining == 0 {
            if at == self.dest && accept(&self.stack) {
                self.found.push(self.stack.clone());
            }
            return;
        }
        if self.expansions % DEADLINE_CHECK_EVERY == 0
            && self.deadline.is_some_and(|d| Instant::now() >= d)
        {
            self.truncated = true;
            return;
        }
        self.expansions += 1;

        let graph = self.graph;
        for edge in graph.edges(at) {
            let next = &edge.to.device_id;
            if self.visited.contains(next) {
                continue;
            }
            match self.dist.get(next) {
                Some(&d) if d < remaining => {}
                _ => continue,
            }
            // 목적지는 마지막 홉에서만 방문
            if next == self.dest && remaining > 1 {
                continue;
            }
            self.visited.insert(next.clone());
            self.stack.push(edge);
            self.walk(next, remaining - 1, accept);
            self.stack.pop();
            self.visited.remove(next);
            if self.truncated {
                return;
            }
        }
    }
}

/// 깊이를 늘려 가며 `k`개 이상 모일 때까지 경로를 수집합니다.
fn collect_ranked(
    graph: &Graph,
    source: &DeviceId,
    dest: &DeviceId,
    k: usize,
    max_hops: usize,
    deadline: Option<Instant>,
    accept: &dyn Fn(&[&Edge]) -> bool,
) -> (Vec<Path>, bool) {
    let dist = graph.distances_to(dest);
    let Some(&shortest) = dist.get(source) else {
        return (Vec::new(), false);
    };
    let mut walker = Walker {
        graph,
        dist,
        dest,
        deadline,
        expansions: 0,
        truncated: false,
        visited: HashSet::from([source.clone()]),
        stack: Vec::new(),
        found: Vec::new(),
    };

    let mut ranked = Vec::new();
    for depth in shortest..=max_hops {
        walker.walk(source, depth, accept);
        let mut level: Vec<Path> = walker
            .found
            .drain(..)
            .map(|edges| Path::from_edges(source, &edges))
            .collect();
        level.sort_by(Path::rank_cmp);
        ranked.extend(level);
        if ranked.len() >= k || walker.truncated {
            break;
        }
    }
    ranked.truncate(k);
    (ranked, walker.truncated)
}

/// `source`에서 `dest`까지 순위가 매겨진 최대 `k`개의 경로를 찾습니다.
///
/// 기본 결과와 (요청 시) 저하 결과가 모두 비어 있고 탐색이 끝까지
/// 진행되었다면 [`AnalysisError::NoPathFound`]입니다. 제한 시간에 걸리면
/// 그때까지 찾은 결과를 `truncated = true`로 반환합니다.
pub fn find_paths(
    snapshot: &TopologySnapshot,
    source: &DeviceId,
    dest: &DeviceId,
    options: &PathOptions,
) -> Result<PathResult, AnalysisError> {
    options.validate()?;
    for id in [source, dest] {
        if snapshot.device(id).is_none() {
            return Err(AnalysisError::UnknownDevice(id.to_string()));
        }
    }

    let mut result = PathResult {
        source: source.clone(),
        dest: dest.clone(),
        snapshot_version: snapshot.version(),
        paths: Vec::new(),
        degraded: Vec::new(),
        truncated: false,
    };
    if source == dest {
        result.paths.push(Path::zero_hop(source.clone()));
        return Ok(result);
    }

    let deadline = options.timeout.map(|t| Instant::now() + t);
    let primary = Graph::build(snapshot, |link| options.admits(link));
    let (paths, truncated) = collect_ranked(
        &primary,
        source,
        dest,
        options.k,
        options.max_hops,
        deadline,
        &|_| true,
    );
    result.paths = paths;
    result.truncated = truncated;

    if options.include_degraded && !result.truncated {
        let relaxed = Graph::build(snapshot, |link| {
            link.confidence >= options.degraded_min_confidence
        });
        let (degraded, truncated) = collect_ranked(
            &relaxed,
            source,
            dest,
            options.k,
            options.max_hops,
            deadline,
            &|edges| edges.iter().any(|e| !options.admits(&e.link)),
        );
        result.degraded = degraded;
        result.truncated = truncated;
    }

    debug!(
        source = %source,
        dest = %dest,
        version = result.snapshot_version,
        paths = result.paths.len(),
        degraded = result.degraded.len(),
        truncated = result.truncated,
        "path query evaluated"
    );

    if result.paths.is_empty() && result.degraded.is_empty() && !result.truncated {
        return Err(AnalysisError::NoPathFound {
            source_id: source.to_string(),
            dest_id: dest.to_string(),
        });
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use topowatch_core::types::{Device, DeviceStatus};
    use topowatch_topology::SnapshotTable;

    /// (a, b, confidence, is_up, speed)
    type LinkRow<'a> = (&'a str, &'a str, f64, bool, Option<u64>);

    fn port(device: &str, peer: &str, n: usize) -> Endpoint {
        Endpoint::new(device, format!("to-{peer}-{n}"))
    }

    fn snapshot(devices: &[&str], links: &[LinkRow<'_>]) -> TopologySnapshot {
        let now = Utc::now();
        let mut table_links = BTreeMap::new();
        let mut seen: HashMap<(String, String), usize> = HashMap::new();
        for (a, b, confidence, is_up, speed) in links {
            let n = seen.entry((a.to_string(), b.to_string())).or_default();
            *n += 1;
            let mut link = Link::new(port(a, b, *n), port(b, a, *n), now);
            link.confidence = *confidence;
            link.is_up = *is_up;
            link.speed_bps = *speed;
            table_links.insert(link.id.to_string(), link);
        }
        TopologySnapshot::from_table(SnapshotTable {
            version: 7,
            committed_at: now,
            devices: devices
                .iter()
                .map(|d| Device::new(*d, *d).with_status(DeviceStatus::Up))
                .collect(),
            links: table_links,
            unresolved: Vec::new(),
            conflicts: Vec::new(),
        })
    }

    fn ids(path: &Path) -> Vec<&str> {
        path.devices.iter().map(DeviceId::as_str).collect()
    }

    fn opts(k: usize) -> PathOptions {
        PathOptions {
            k,
            timeout: None,
            ..PathOptions::default()
        }
    }

    const G10: Option<u64> = Some(10_000_000_000);
    const G1: Option<u64> = Some(1_000_000_000);

    #[test]
    fn fewest_hops_ranks_first() {
        let s = snapshot(
            &["a", "b", "c", "d"],
            &[
                ("a", "b", 0.9, true, G10),
                ("b", "c", 0.9, true, G10),
                ("a", "c", 0.9, true, G1),
                ("c", "d", 0.9, true, G10),
            ],
        );
        let result = find_paths(&s, &"a".into(), &"c".into(), &opts(3)).unwrap();
        assert_eq!(ids(&result.paths[0]), ["a", "c"]);
        assert_eq!(ids(&result.paths[1]), ["a", "b", "c"]);
        assert_eq!(result.paths.len(), 2);
        assert_eq!(result.snapshot_version, 7);
    }

    #[test]
    fn equal_hops_prefer_faster_bottleneck_then_device_ids() {
        let s = snapshot(
            &["a", "b", "c", "x", "y"],
            &[
                ("a", "x", 0.9, true, G1),
                ("x", "c", 0.9, true, G10),
                ("a", "y", 0.9, true, G10),
                ("y", "c", 0.9, true, G10),
                ("a", "b", 0.9, true, G10),
                ("b", "c", 0.9, true, G10),
            ],
        );
        let result = find_paths(&s, &"a".into(), &"c".into(), &opts(3)).unwrap();
        assert_eq!(ids(&result.paths[0]), ["a", "b", "c"]);
        assert_eq!(ids(&result.paths[1]), ["a", "y", "c"]);
        assert_eq!(ids(&result.paths[2]), ["a", "x", "c"]);
    }

    #[test]
    fn unknown_speed_ranks_lowest() {
        let s = snapshot(
            &["a", "b", "c", "z"],
            &[
                ("a", "b", 0.9, true, None),
                ("b", "c", 0.9, true, G10),
                ("a", "z", 0.9, true, G1),
                ("z", "c", 0.9, true, G1),
            ],
        );
        let result = find_paths(&s, &"a".into(), &"c".into(), &opts(2)).unwrap();
        assert_eq!(ids(&result.paths[0]), ["a", "z", "c"]);
        assert_eq!(result.paths[1].bottleneck_bps, None);
    }

    #[test]
    fn parallel_links_break_ties_by_link_id() {
        let s = snapshot(
            &["a", "b"],
            &[("a", "b", 0.9, true, G10), ("a", "b", 0.9, true, G10)],
        );
        let result = find_paths(&s, &"a".into(), &"b".into(), &opts(5)).unwrap();
        assert_eq!(result.paths.len(), 2);
        let first: Vec<_> = result.paths[0].link_ids().collect();
        let second: Vec<_> = result.paths[1].link_ids().collect();
        assert!(first < second);
    }

    #[test]
    fn down_and_weak_links_are_excluded() {
        let s = snapshot(
            &["a", "b", "c"],
            &[("a", "b", 0.9, true, G10), ("b", "c", 0.9, false, G10)],
        );
        let err = find_paths(&s, &"a".into(), &"c".into(), &opts(3)).unwrap_err();
        assert!(matches!(err, AnalysisError::NoPathFound { .. }));

        let weak = snapshot(
            &["a", "b"],
            &[("a", "b", 0.3, true, G10)],
        );
        assert!(find_paths(&weak, &"a".into(), &"b".into(), &opts(1)).is_err());
    }

    #[test]
    fn degraded_set_is_separate() {
        let s = snapshot(
            &["a", "b", "c"],
            &[("a", "b", 0.9, true, G10), ("b", "c", 0.2, false, G10)],
        );
        let options = PathOptions {
            include_degraded: true,
            ..opts(3)
        };
        let result = find_paths(&s, &"a".into(), &"c".into(), &options).unwrap();
        assert!(result.paths.is_empty());
        assert_eq!(ids(&result.degraded[0]), ["a", "b", "c"]);
        assert!(!result.degraded[0].hops[1].is_up);
    }

    #[test]
    fn degraded_set_excludes_primary_paths() {
        let s = snapshot(&["a", "b"], &[("a", "b", 0.9, true, G10)]);
        let options = PathOptions {
            include_degraded: true,
            ..opts(3)
        };
        let result = find_paths(&s, &"a".into(), &"b".into(), &options).unwrap();
        assert_eq!(result.paths.len(), 1);
        assert!(result.degraded.is_empty());
    }

    #[test]
    fn same_source_and_dest_is_zero_hop() {
        let s = snapshot(&["a"], &[]);
        let result = find_paths(&s, &"a".into(), &"a".into(), &opts(3)).unwrap();
        assert_eq!(result.paths.len(), 1);
        assert_eq!(result.paths[0].hop_count(), 0);
    }

    #[test]
    fn unknown_device_is_rejected() {
        let s = snapshot(&["a"], &[]);
        let err = find_paths(&s, &"a".into(), &"ghost".into(), &opts(3)).unwrap_err();
        assert!(matches!(err, AnalysisError::UnknownDevice(id) if id == "ghost"));
    }

    #[test]
    fn max_hops_bounds_search() {
        let s = snapshot(
            &["a", "b", "c", "d"],
            &[
                ("a", "b", 0.9, true, G10),
                ("b", "c", 0.9, true, G10),
                ("c", "d", 0.9, true, G10),
            ],
        );
        let options = PathOptions {
            max_hops: 2,
            ..opts(1)
        };
        assert!(find_paths(&s, &"a".into(), &"d".into(), &options).is_err());
    }

    #[test]
    fn zero_timeout_truncates() {
        let s = snapshot(&["a", "b"], &[("a", "b", 0.9, true, G10)]);
        let options = PathOptions {
            timeout: Some(Duration::ZERO),
            ..opts(1)
        };
        let result = find_paths(&s, &"a".into(), &"b".into(), &options).unwrap();
        assert!(result.truncated);
        assert!(result.paths.is_empty());
    }

    #[test]
    fn zero_k_is_invalid() {
        let s = snapshot(&["a", "b"], &[]);
        let err = find_paths(&s, &"a".into(), &"b".into(), &opts(0)).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidArgument(_)));
    }

    #[test]
    fn paths_are_simple() {
        // 삼각형 + 꼬리: 어떤 경로도 장비를 두 번 지나지 않음
        let s = snapshot(
            &["a", "b", "c", "d"],
            &[
                ("a", "b", 0.9, true, G10),
                ("b", "c", 0.9, true, G10),
                ("a", "c", 0.9, true, G10),
                ("c", "d", 0.9, true, G10),
            ],
        );
        let result = find_paths(&s, &"a".into(), &"d".into(), &opts(10)).unwrap();
        assert_eq!(result.paths.len(), 2);
        for path in &result.paths {
            let unique: HashSet<_> = path.devices.iter().collect();
            assert_eq!(unique.len(), path.devices.len());
        }
    }
}
