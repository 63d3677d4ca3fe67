//! 토폴로지 저장소 — 버전 관리 스냅샷과 낙관적 커밋
//!
//! 독자는 [`TopologyStore::snapshot`]으로 현재 스냅샷 `Arc`를 받아 잠금 없이
//! 읽습니다. 쓰기는 스냅샷 위에서 변경 집합을 계획한 뒤, 짧은 커밋 구간에서
//! 계획이 읽은 장비/링크가 그 사이 바뀌지 않았는지 확인하고 적용합니다.
//! 바뀌었다면 최신 스냅샷으로 다시 계획합니다.
//!
//! ```text
//! plan(snapshot v) ──▶ commit_lock ──▶ 읽은 항목 revision > v ? ──yes──▶ 재계획
//!                                          │ no
//!                                          ▼
//!                          apply → validate ──fail──▶ halt + Critical 이벤트
//!                                          │ ok
//!                                          ▼
//!                              publish v+1, history push, 이벤트 발행
//! ```

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use topowatch_core::event::{EventKind, EventSink, MODULE_TOPOLOGY, TopologyEvent};
use topowatch_core::metrics as m;
use topowatch_core::types::{Device, DeviceId, DeviceStatus, Interface, Timestamp};

use crate::config::TopologyConfig;
use crate::error::TopologyError;
use crate::link::{Endpoint, LinkId};
use crate::merge::{ChangeSet, DeviceCycle, plan_device_cycle};
use crate::operator::{
    ConflictResolution, plan_delete_link, plan_device_status, plan_manual_link,
    plan_register_device, plan_resolve_conflict, plan_sweep_stale, plan_update_interfaces,
};
use crate::scorer::ConfidenceScorer;
use crate::snapshot::{SnapshotTable, TopologySnapshot};

/// 커밋 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitOutcome {
    /// 커밋 후 (또는 변경이 없을 때 현재) 스냅샷 버전
    pub version: u64,
    /// 새 버전이 발행되었는지 여부
    pub changed: bool,
    /// 변경/제거된 링크 수
    pub links_changed: usize,
    /// 동시 커밋 충돌로 재계획한 횟수
    pub retries: u32,
}

/// 버전 관리 토폴로지 그래프 저장소
///
/// 여러 수집 워커가 동시에 쓰고 여러 질의가 동시에 읽을 수 있습니다.
pub struct TopologyStore {
    config: TopologyConfig,
    scorer: ConfidenceScorer,
    current: RwLock<Arc<TopologySnapshot>>,
    history: Mutex<VecDeque<Arc<TopologySnapshot>>>,
    commit_lock: Mutex<()>,
    halted: RwLock<Option<String>>,
    events: Arc<dyn EventSink>,
}

impl TopologyStore {
    /// 빈 그래프로 저장소를 생성합니다.
    pub fn new(config: TopologyConfig, events: Arc<dyn EventSink>) -> Self {
        let initial = Arc::new(TopologySnapshot::empty());
        let mut history = VecDeque::with_capacity(config.snapshot_history);
        history.push_back(Arc::clone(&initial));
        Self {
            scorer: ConfidenceScorer::new(config.scoring.clone()),
            config,
            current: RwLock::new(initial),
            history: Mutex::new(history),
            commit_lock: Mutex::new(()),
            halted: RwLock::new(None),
            events,
        }
    }

    /// 저장소 설정
    pub fn config(&self) -> &TopologyConfig {
        &self.config
    }

    /// 신뢰도 스코어러
    pub fn scorer(&self) -> &ConfidenceScorer {
        &self.scorer
    }

    /// 현재 스냅샷
    pub fn snapshot(&self) -> Arc<TopologySnapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// 현재 스냅샷 버전
    pub fn version(&self) -> u64 {
        self.snapshot().version()
    }

    /// 지정 버전(없으면 최신)의 스냅샷을 조회합니다.
    ///
    /// 보존 범위를 벗어난 버전은 [`TopologyError::VersionNotRetained`]입니다.
    pub fn get_snapshot(
        &self,
        version: Option<u64>,
    ) -> Result<Arc<TopologySnapshot>, TopologyError> {
        let current = self.snapshot();
        let Some(version) = version else {
            return Ok(current);
        };
        if version == current.version() {
            return Ok(current);
        }
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|s| s.version() == version)
            .cloned()
            .ok_or(TopologyError::VersionNotRetained(version))
    }

    /// 보존 중인 스냅샷 버전 목록 (오래된 순)
    pub fn retained_versions(&self) -> Vec<u64> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|s| s.version())
            .collect()
    }

    /// 쓰기 중단 사유 (정상이면 `None`)
    pub fn halted_reason(&self) -> Option<String> {
        self.halted
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 쓰기 중단 여부
    pub fn is_halted(&self) -> bool {
        self.halted_reason().is_some()
    }

    // ─── 쓰기 연산 ───────────────────────────────────────────────────

    /// 한 장비의 수집 사이클을 병합합니다.
    pub fn apply_device_cycle(&self, cycle: &DeviceCycle) -> Result<CommitOutcome, TopologyError> {
        self.commit_with("device_cycle", |snapshot| {
            Ok(plan_device_cycle(snapshot, cycle, &self.scorer))
        })
    }

    /// 장비를 등록하거나 메타데이터를 갱신합니다.
    pub fn register_device(&self, device: Device) -> Result<CommitOutcome, TopologyError> {
        self.commit_with("register_device", |snapshot| {
            plan_register_device(snapshot, device.clone())
        })
    }

    /// 장비 상태를 바꿉니다.
    pub fn update_device_status(
        &self,
        device_id: &DeviceId,
        status: DeviceStatus,
    ) -> Result<CommitOutcome, TopologyError> {
        self.commit_with("device_status", |snapshot| {
            plan_device_status(snapshot, device_id, status)
        })
    }

    /// 인터페이스 상태/속도를 갱신합니다.
    pub fn update_interfaces(
        &self,
        device_id: &DeviceId,
        interfaces: &[Interface],
    ) -> Result<CommitOutcome, TopologyError> {
        let now = Utc::now();
        let window = self.config.staleness_window();
        self.commit_with("update_interfaces", |snapshot| {
            plan_update_interfaces(snapshot, device_id, interfaces, now, window)
        })
    }

    /// 수동 링크를 추가합니다.
    pub fn add_manual_link(
        &self,
        a: &Endpoint,
        b: &Endpoint,
    ) -> Result<CommitOutcome, TopologyError> {
        let now = Utc::now();
        self.commit_with("manual_link", |snapshot| {
            plan_manual_link(snapshot, a, b, now, &self.scorer)
        })
    }

    /// 링크를 삭제합니다.
    pub fn delete_link(&self, id: &LinkId) -> Result<CommitOutcome, TopologyError> {
        self.commit_with("delete_link", |snapshot| plan_delete_link(snapshot, id))
    }

    /// 충돌을 해결합니다.
    pub fn resolve_conflict(
        &self,
        id: &LinkId,
        resolution: ConflictResolution,
    ) -> Result<CommitOutcome, TopologyError> {
        let now = Utc::now();
        self.commit_with("resolve_conflict", |snapshot| {
            plan_resolve_conflict(snapshot, id, resolution, now, &self.scorer)
        })
    }

    /// 노후 링크를 down 처리합니다.
    pub fn sweep_stale(&self, now: Timestamp) -> Result<CommitOutcome, TopologyError> {
        let window = self.config.staleness_window();
        self.commit_with("sweep_stale", |snapshot| {
            Ok(plan_sweep_stale(snapshot, now, window))
        })
    }

    /// 영속 테이블에서 전체 상태를 복원합니다.
    ///
    /// 불변식을 위반하는 테이블도 조회를 위해 설치되지만, 저장소는
    /// 쓰기 중단 상태가 되고 [`TopologyError::Corruption`]을 반환합니다.
    pub fn restore(&self, table: SnapshotTable) -> Result<u64, TopologyError> {
        let _guard = self.commit_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = Arc::new(TopologySnapshot::from_table(table));
        let version = snapshot.version();
        let verdict = snapshot.validate();
        self.publish(Arc::clone(&snapshot));
        info!(
            version,
            devices = snapshot.device_count(),
            links = snapshot.link_count(),
            "topology snapshot restored"
        );
        match verdict {
            Ok(()) => Ok(version),
            Err(reason) => {
                self.halt(&reason);
                Err(TopologyError::Corruption(reason))
            }
        }
    }

    /// 손상 상태를 정리하고 쓰기를 재개합니다.
    ///
    /// 불변식을 위반하는 링크와 고아 충돌 기록을 제거한 스냅샷을
    /// 새 버전으로 발행합니다. 제거된 항목 설명을 반환합니다.
    pub fn clear_corruption(&self) -> Result<Vec<String>, TopologyError> {
        let _guard = self.commit_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot();
        let mut parts = current.to_parts();
        let mut dropped = Vec::new();

        for device in parts.devices.values_mut() {
            let mut seen = BTreeSet::new();
            if device.interfaces.iter().any(|i| !seen.insert(i.id.clone())) {
                let mut fixed = Device::clone(device);
                let mut keep = BTreeSet::new();
                fixed.interfaces.retain(|i| keep.insert(i.id.clone()));
                dropped.push(format!("duplicate interfaces on {}", fixed.id));
                *device = Arc::new(fixed);
            }
        }
        let probe =
            TopologySnapshot::assemble(current.version(), current.committed_at(), parts.clone());
        parts.links.retain(|id, link| match probe.link_violation(link) {
            Some(reason) => {
                dropped.push(reason);
                false
            }
            None if id != &link.id => {
                dropped.push(format!("link key {id} does not match id {}", link.id));
                false
            }
            None => true,
        });
        let links = &parts.links;
        parts.conflicts.retain(|id, _| {
            let keep = links.contains_key(id);
            if !keep {
                dropped.push(format!("orphan conflict record {id}"));
            }
            keep
        });

        if dropped.is_empty() && !self.is_halted() {
            return Ok(dropped);
        }
        let next = TopologySnapshot::assemble(current.version() + 1, Utc::now(), parts);
        next.validate().map_err(TopologyError::Corruption)?;
        self.publish(Arc::new(next));
        *self.halted.write().unwrap_or_else(PoisonError::into_inner) = None;
        metrics::gauge!(m::STORE_HALTED).set(0.0);
        warn!(repaired = dropped.len(), "store corruption cleared; writes resumed");
        Ok(dropped)
    }

    // ─── 커밋 내부 ───────────────────────────────────────────────────

    fn commit_with<F>(&self, op: &'static str, plan: F) -> Result<CommitOutcome, TopologyError>
    where
        F: Fn(&TopologySnapshot) -> Result<ChangeSet, TopologyError>,
    {
        let attempts = self.config.commit_retries.max(1);
        for attempt in 0..attempts {
            if let Some(reason) = self.halted_reason() {
                metrics::counter!(m::STORE_WRITES_REJECTED_TOTAL).increment(1);
                return Err(TopologyError::Halted(reason));
            }
            let base = self.snapshot();
            let changes = plan(&base)?;
            if changes.is_empty() {
                debug!(op, version = base.version(), "commit skipped: no changes");
                self.emit(changes.events);
                return Ok(CommitOutcome {
                    version: base.version(),
                    changed: false,
                    links_changed: 0,
                    retries: attempt,
                });
            }
            match self.try_commit(base.version(), changes)? {
                Some(outcome) => {
                    return Ok(CommitOutcome {
                        retries: attempt,
                        ..outcome
                    });
                }
                None => {
                    metrics::counter!(m::STORE_COMMIT_RETRIES_TOTAL).increment(1);
                    debug!(op, attempt, "commit collided with concurrent writer; replanning");
                }
            }
        }
        warn!(op, attempts, "commit gave up after repeated collisions");
        Err(TopologyError::CommitContention { attempts })
    }

    /// 변경 집합을 적용합니다. 읽은 항목이 그 사이 바뀌었으면 `None`입니다.
    fn try_commit(
        &self,
        base_version: u64,
        changes: ChangeSet,
    ) -> Result<Option<CommitOutcome>, TopologyError> {
        let _guard = self.commit_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(reason) = self.halted_reason() {
            metrics::counter!(m::STORE_WRITES_REJECTED_TOTAL).increment(1);
            return Err(TopologyError::Halted(reason));
        }
        let current = self.snapshot();
        if current.version() != base_version {
            let stale_device = changes
                .read_devices
                .iter()
                .any(|d| current.device_revision(d) > base_version);
            let stale_link = changes
                .read_links
                .iter()
                .chain(changes.links.keys())
                .any(|id| current.link(id).is_some_and(|l| l.revision > base_version));
            if stale_device || stale_link {
                return Ok(None);
            }
        }

        let version = current.version() + 1;
        let mut parts = current.to_parts();
        let mut bumped: BTreeSet<DeviceId> = BTreeSet::new();
        let links_changed = changes.links.len() + changes.removed_links.len();
        let new_conflicts = changes.conflicts.values().filter(|c| c.is_some()).count();

        for (id, device) in changes.devices {
            bumped.insert(id.clone());
            parts.devices.insert(id, Arc::new(device));
        }
        for id in &changes.removed_links {
            if let Some(old) = parts.links.remove(id) {
                bumped.insert(old.a.device_id.clone());
                bumped.insert(old.b.device_id.clone());
            }
            parts.conflicts.remove(id);
        }
        for (id, mut link) in changes.links {
            link.revision = version;
            bumped.insert(link.a.device_id.clone());
            bumped.insert(link.b.device_id.clone());
            parts.links.insert(id, Arc::new(link));
        }
        for (reporter, list) in changes.unresolved {
            if list.is_empty() {
                parts.unresolved.remove(&reporter);
            } else {
                parts.unresolved.insert(reporter, Arc::new(list));
            }
        }
        for (id, record) in changes.conflicts {
            match record {
                Some(record) => {
                    parts.conflicts.insert(id, record);
                }
                None => {
                    parts.conflicts.remove(&id);
                }
            }
        }
        for device in bumped {
            parts.device_revisions.insert(device, version);
        }

        let next = TopologySnapshot::assemble(version, Utc::now(), parts);
        if let Err(reason) = next.validate() {
            self.halt(&reason);
            return Err(TopologyError::Corruption(reason));
        }
        let next = Arc::new(next);
        self.publish(Arc::clone(&next));

        metrics::counter!(m::STORE_COMMITS_TOTAL).increment(1);
        if new_conflicts > 0 {
            metrics::counter!(m::STORE_CONFLICTS_TOTAL).increment(new_conflicts as u64);
        }
        debug!(version, links_changed, "topology committed");
        self.emit(changes.events);

        Ok(Some(CommitOutcome {
            version,
            changed: true,
            links_changed,
            retries: 0,
        }))
    }

    /// 새 스냅샷을 현재 버전으로 설치하고 이력에 보관합니다.
    fn publish(&self, snapshot: Arc<TopologySnapshot>) {
        metrics::gauge!(m::STORE_SNAPSHOT_VERSION).set(snapshot.version() as f64);
        metrics::gauge!(m::STORE_DEVICES).set(snapshot.device_count() as f64);
        metrics::gauge!(m::STORE_LINKS).set(snapshot.link_count() as f64);
        {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            history.push_back(Arc::clone(&snapshot));
            while history.len() > self.config.snapshot_history {
                history.pop_front();
            }
        }
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    fn halt(&self, reason: &str) {
        error!(reason, "topology invariant violated; halting writes");
        *self.halted.write().unwrap_or_else(PoisonError::into_inner) = Some(reason.to_owned());
        metrics::gauge!(m::STORE_HALTED).set(1.0);
        self.events.publish(TopologyEvent::new(
            MODULE_TOPOLOGY,
            EventKind::StoreCorruption,
            format!("store halted: {reason}"),
        ));
    }

    fn emit(&self, events: Vec<TopologyEvent>) {
        for event in events {
            self.events.publish(event);
        }
    }
}
