//! 수집 엔진 — 장비별 워커 풀과 주기적 수집 사이클
//!
//! # 아키텍처
//!
//! ```text
//! interval tick ──▶ DiscoveryHandle::run_cycle
//!                      │  Semaphore(max_workers) + JoinSet
//!                      ├─▶ device A: collect(retry) → ingest → apply_device_cycle
//!                      ├─▶ device B: ...
//!                      └─▶ device N: ...
//!                      ▼
//!                   sweep_stale → CycleReport
//! ```
//!
//! 한 장비의 레코드는 한 태스크 안에서 순서대로 처리되고, 장비끼리는
//! 병렬로 처리됩니다. 취소는 장비 배치 경계와 재시도 대기에서 확인합니다.
//! 수집기 재시도가 모두 실패해도 다른 장비는 계속 진행되며, 실패한 장비는
//! 상태가 `unknown`이 되고 경고 이벤트가 발행됩니다.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use topowatch_core::error::{PipelineError, TopowatchError};
use topowatch_core::event::{EventKind, EventSink, MODULE_DISCOVERY, TopologyEvent};
use topowatch_core::metrics as m;
use topowatch_core::pipeline::{HealthStatus, Pipeline};
use topowatch_core::plugin::{Plugin, PluginInfo, PluginState, PluginType};
use topowatch_core::types::{Device, DeviceId, DeviceStatus, Interface, NeighborRecord, Timestamp};
use topowatch_topology::{
    CommitOutcome, DeviceCycle, IngestionLog, IngestionLogEntry, TopologyError, TopologyStore,
};

use crate::adapter::CollectorAdapter;
use crate::config::DiscoveryEngineConfig;
use crate::error::DiscoveryError;
use crate::ingest::{Ingested, ingest};
use crate::retry::with_retry;

/// 정지 시 실행 중인 사이클을 기다리는 최대 시간
const STOP_GRACE: Duration = Duration::from_secs(30);

// ─── 보고서 ──────────────────────────────────────────────────────────

/// 장비 1대 수집 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// 새 스냅샷 버전이 발행됨
    Committed,
    /// 그래프 변화 없음
    Unchanged,
    /// 재시도 후에도 수집기 호출 실패
    AdapterFailed {
        /// 마지막 에러
        reason: String,
    },
    /// 저장소가 쓰기를 거부함
    StoreRejected {
        /// 거부 사유
        reason: String,
    },
    /// 취소됨
    Cancelled,
}

/// 장비 1대의 수집 보고서
#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    /// 장비
    pub device_id: DeviceId,
    /// 결과
    #[serde(flatten)]
    pub outcome: IngestOutcome,
    /// 받은 이웃 레코드 수
    pub records: usize,
    /// 거부된 레코드 수
    pub rejected: usize,
    /// 해석된 후보 수
    pub resolved: usize,
    /// 미해결 후보 수
    pub unresolved: usize,
    /// 커밋 후 스냅샷 버전
    pub version: u64,
    /// 변경된 링크 수
    pub links_changed: usize,
    /// 소요 시간 (밀리초)
    pub duration_ms: u64,
}

impl IngestionReport {
    fn new(device_id: DeviceId, outcome: IngestOutcome) -> Self {
        Self {
            device_id,
            outcome,
            records: 0,
            rejected: 0,
            resolved: 0,
            unresolved: 0,
            version: 0,
            links_changed: 0,
            duration_ms: 0,
        }
    }

    fn committed(
        device_id: DeviceId,
        records: usize,
        ingested: &Ingested,
        outcome: &CommitOutcome,
    ) -> Self {
        Self {
            records,
            rejected: ingested.rejected,
            resolved: ingested.resolved_count(),
            unresolved: ingested.unresolved_count(),
            version: outcome.version,
            links_changed: outcome.links_changed,
            ..Self::new(
                device_id,
                if outcome.changed {
                    IngestOutcome::Committed
                } else {
                    IngestOutcome::Unchanged
                },
            )
        }
    }

    /// 성공 여부 (커밋 또는 변화 없음)
    pub fn is_success(&self) -> bool {
        matches!(
            self.outcome,
            IngestOutcome::Committed | IngestOutcome::Unchanged
        )
    }
}

/// 수집 사이클 보고서
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// 시작 시각
    pub started_at: Timestamp,
    /// 종료 시각
    pub finished_at: Timestamp,
    /// 장비별 결과 (장비 ID 순)
    pub devices: Vec<IngestionReport>,
    /// 도중에 취소되었는지 여부
    pub cancelled: bool,
    /// 노후 처리된 링크 수
    pub stale_links: usize,
}

impl CycleReport {
    /// 성공한 장비 수
    pub fn succeeded(&self) -> usize {
        self.devices.iter().filter(|r| r.is_success()).count()
    }

    /// 실패한 장비 수 (취소 제외)
    pub fn failed(&self) -> usize {
        self.devices
            .iter()
            .filter(|r| {
                matches!(
                    r.outcome,
                    IngestOutcome::AdapterFailed { .. } | IngestOutcome::StoreRejected { .. }
                )
            })
            .count()
    }

    /// 받은 레코드 총합
    pub fn records(&self) -> usize {
        self.devices.iter().map(|r| r.records).sum()
    }
}

/// 푸시 방식으로 넘겨받은 장비 하나의 수집 결과
#[derive(Debug, Clone)]
pub struct IngestionBatch {
    /// 보고 장비
    pub device_id: DeviceId,
    /// 이웃 레코드
    pub records: Vec<NeighborRecord>,
    /// 인터페이스 상태
    pub interfaces: Vec<Interface>,
}

// ─── DiscoveryHandle ─────────────────────────────────────────────────

/// 수집 작업 핸들
///
/// 복제해서 여러 태스크가 공유할 수 있습니다. 엔진을 플러그인 레지스트리에
/// 넘긴 뒤에도 요청 시 수집(CLI, 관리 API)에 사용합니다.
pub struct DiscoveryHandle<A: CollectorAdapter> {
    config: Arc<DiscoveryEngineConfig>,
    adapter: Arc<A>,
    store: Arc<TopologyStore>,
    events: Arc<dyn EventSink>,
    log: Option<Arc<IngestionLog>>,
    last_cycle: Arc<RwLock<Option<CycleReport>>>,
    cycles: Arc<AtomicU64>,
}

impl<A: CollectorAdapter> Clone for DiscoveryHandle<A> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            adapter: Arc::clone(&self.adapter),
            store: Arc::clone(&self.store),
            events: Arc::clone(&self.events),
            log: self.log.clone(),
            last_cycle: Arc::clone(&self.last_cycle),
            cycles: Arc::clone(&self.cycles),
        }
    }
}

impl<A: CollectorAdapter> DiscoveryHandle<A> {
    /// 엔진 설정
    pub fn config(&self) -> &DiscoveryEngineConfig {
        &self.config
    }

    /// 수집기 어댑터
    pub fn adapter(&self) -> &Arc<A> {
        &self.adapter
    }

    /// 토폴로지 저장소
    pub fn store(&self) -> &Arc<TopologyStore> {
        &self.store
    }

    /// 마지막으로 끝난 사이클 보고서
    pub fn last_cycle(&self) -> Option<CycleReport> {
        self.last_cycle
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 완료된 사이클 수
    pub fn cycles_completed(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// 등록된 모든 장비에 대해 수집 사이클을 실행합니다.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleReport {
        let devices: Vec<Device> = self
            .store
            .snapshot()
            .devices()
            .map(|d| Device::clone(d))
            .collect();
        self.run_cycle_on(devices, cancel).await
    }

    /// 지정한 장비들에 대해 수집 사이클을 실행합니다.
    ///
    /// 아직 등록되지 않은 장비는 첫 수집으로 생성됩니다.
    pub async fn run_cycle_for(
        &self,
        device_ids: &[DeviceId],
        cancel: &CancellationToken,
    ) -> CycleReport {
        let snapshot = self.store.snapshot();
        let devices = device_ids
            .iter()
            .map(|id| {
                snapshot
                    .device(id)
                    .map(|d| Device::clone(d))
                    .unwrap_or_else(|| Device::new(id.clone(), id.as_str()))
            })
            .collect();
        self.run_cycle_on(devices, cancel).await
    }

    async fn run_cycle_on(&self, devices: Vec<Device>, cancel: &CancellationToken) -> CycleReport {
        let started_at = Utc::now();
        info!(devices = devices.len(), adapter = self.adapter.name(), "discovery cycle started");

        let (devices, cancelled) = self
            .fan_out(devices, cancel, |handle, device, token| async move {
                handle.ingest_device(&device, &token).await
            })
            .await;

        let mut stale_links = 0;
        if self.config.sweep_stale && !cancelled {
            match self.store.sweep_stale(Utc::now()) {
                Ok(outcome) => stale_links = outcome.links_changed,
                Err(e) => warn!(error = %e, "staleness sweep failed"),
            }
        }

        let report = CycleReport {
            started_at,
            finished_at: Utc::now(),
            devices,
            cancelled,
            stale_links,
        };
        metrics::counter!(m::DISCOVERY_CYCLES_TOTAL).increment(1);
        self.cycles.fetch_add(1, Ordering::Relaxed);
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            records = report.records(),
            stale_links,
            cancelled,
            "discovery cycle finished"
        );
        *self
            .last_cycle
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(report.clone());
        report
    }

    /// 외부에서 받은 여러 장비의 수집 결과를 워커 풀로 병합합니다.
    pub async fn ingest_bulk(
        &self,
        batches: Vec<IngestionBatch>,
        cancel: &CancellationToken,
    ) -> Vec<IngestionReport> {
        let (reports, _) = self
            .fan_out(batches, cancel, |handle, batch, _token| async move {
                let device_id = batch.device_id.clone();
                match handle
                    .ingest_records(batch.device_id, batch.records, batch.interfaces)
                    .await
                {
                    Ok(report) => report,
                    Err(e) => IngestionReport::new(
                        device_id,
                        IngestOutcome::StoreRejected {
                            reason: e.to_string(),
                        },
                    ),
                }
            })
            .await;
        reports
    }

    /// 항목마다 태스크 하나를 띄우고 동시 실행 수를 `max_workers`로 제한합니다.
    async fn fan_out<I, F, Fut>(
        &self,
        items: Vec<I>,
        cancel: &CancellationToken,
        work: F,
    ) -> (Vec<IngestionReport>, bool)
    where
        I: Send + 'static,
        F: Fn(Self, I, CancellationToken) -> Fut,
        Fut: Future<Output = IngestionReport> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers.max(1)));
        let mut tasks = JoinSet::new();
        let mut cancelled = false;

        for item in items {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                permit = Arc::clone(&semaphore).acquire_owned() => permit,
            };
            let Ok(permit) = permit else {
                break;
            };
            let job = work(self.clone(), item, cancel.clone());
            tasks.spawn(async move {
                let report = job.await;
                drop(permit);
                report
            });
        }

        let mut reports = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => {
                    cancelled |= report.outcome == IngestOutcome::Cancelled;
                    reports.push(report);
                }
                Err(e) => error!(error = %e, "discovery worker task failed"),
            }
        }
        reports.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        (reports, cancelled)
    }

    /// 장비 1대를 수집하고 병합합니다.
    pub async fn ingest_device(
        &self,
        device: &Device,
        cancel: &CancellationToken,
    ) -> IngestionReport {
        let started = Instant::now();
        let policy = self.config.retry_policy();

        let records = match with_retry(&policy, &device.id, cancel, || {
            self.adapter.collect(device)
        })
        .await
        {
            Ok(records) => records,
            Err(DiscoveryError::Cancelled) => {
                return IngestionReport::new(device.id.clone(), IngestOutcome::Cancelled);
            }
            Err(e) => return self.adapter_failed(device, e, started),
        };

        let interfaces = match with_retry(&policy, &device.id, cancel, || {
            self.adapter.poll_interfaces(device)
        })
        .await
        {
            Ok(interfaces) => interfaces,
            Err(DiscoveryError::Cancelled) => {
                return IngestionReport::new(device.id.clone(), IngestOutcome::Cancelled);
            }
            Err(e) => {
                warn!(
                    device_id = %device.id,
                    error = %e,
                    "interface poll failed; merging neighbors without interface state"
                );
                Vec::new()
            }
        };

        for record in &records {
            metrics::counter!(
                m::DISCOVERY_NEIGHBOR_RECORDS_TOTAL,
                m::LABEL_PROTOCOL => record.protocol.to_string()
            )
            .increment(1);
        }

        let mut report = match self
            .ingest_records(device.id.clone(), records, interfaces)
            .await
        {
            Ok(report) => {
                metrics::counter!(m::DISCOVERY_DEVICES_POLLED_TOTAL, m::LABEL_RESULT => "success")
                    .increment(1);
                report
            }
            Err(e) => {
                metrics::counter!(m::DISCOVERY_DEVICES_POLLED_TOTAL, m::LABEL_RESULT => "error")
                    .increment(1);
                error!(device_id = %device.id, error = %e, "device merge rejected by store");
                IngestionReport::new(
                    device.id.clone(),
                    IngestOutcome::StoreRejected {
                        reason: e.to_string(),
                    },
                )
            }
        };
        let elapsed = started.elapsed();
        metrics::histogram!(m::DISCOVERY_DEVICE_DURATION_SECONDS).record(elapsed.as_secs_f64());
        report.duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        report
    }

    fn adapter_failed(
        &self,
        device: &Device,
        err: DiscoveryError,
        started: Instant,
    ) -> IngestionReport {
        metrics::counter!(m::DISCOVERY_ADAPTER_FAILURES_TOTAL).increment(1);
        metrics::counter!(m::DISCOVERY_DEVICES_POLLED_TOTAL, m::LABEL_RESULT => "warning")
            .increment(1);
        warn!(
            device_id = %device.id,
            adapter = self.adapter.name(),
            error = %err,
            "adapter failed after retries; marking device unknown"
        );
        self.events.publish(
            TopologyEvent::new(
                MODULE_DISCOVERY,
                EventKind::AdapterFailure,
                format!("collection failed for {}: {err}", device.id),
            )
            .for_device(device.id.clone()),
        );
        match self
            .store
            .update_device_status(&device.id, DeviceStatus::Unknown)
        {
            Ok(_) | Err(TopologyError::DeviceNotFound(_)) => {}
            Err(e) => warn!(device_id = %device.id, error = %e, "failed to mark device unknown"),
        }
        let mut report = IngestionReport::new(
            device.id.clone(),
            IngestOutcome::AdapterFailed {
                reason: err.to_string(),
            },
        );
        report.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        report
    }

    /// 이미 수집된 레코드를 기록하고 병합합니다.
    ///
    /// 수집 로그가 설정되어 있으면 병합 전에 먼저 추가합니다.
    pub async fn ingest_records(
        &self,
        device_id: DeviceId,
        records: Vec<NeighborRecord>,
        interfaces: Vec<Interface>,
    ) -> Result<IngestionReport, DiscoveryError> {
        let entry = IngestionLogEntry {
            device_id,
            timestamp: Utc::now(),
            records,
            interfaces,
        };
        if let Some(log) = &self.log {
            if let Err(e) = log.append(&entry).await {
                warn!(device_id = %entry.device_id, error = %e, "ingestion log append failed");
            }
        }
        let (ingested, outcome) = self.merge_entry(&entry)?;
        metrics::counter!(m::DISCOVERY_UNRESOLVED_CANDIDATES_TOTAL)
            .increment(ingested.unresolved_count() as u64);
        Ok(IngestionReport::committed(
            entry.device_id,
            entry.records.len(),
            &ingested,
            &outcome,
        ))
    }

    /// 수집 로그 항목을 기록 순서대로 다시 병합합니다.
    ///
    /// 이미 반영된 항목은 변경 없이 지나가므로 여러 번 재생해도 결과가 같습니다.
    /// 새 버전을 발행한 항목 수를 반환합니다.
    pub fn replay(&self, entries: &[IngestionLogEntry]) -> Result<usize, DiscoveryError> {
        let mut committed = 0;
        for entry in entries {
            let (_, outcome) = self.merge_entry(entry)?;
            if outcome.changed {
                committed += 1;
            }
        }
        info!(entries = entries.len(), committed, "ingestion log replayed");
        Ok(committed)
    }

    fn merge_entry(
        &self,
        entry: &IngestionLogEntry,
    ) -> Result<(Ingested, CommitOutcome), DiscoveryError> {
        let snapshot = self.store.snapshot();
        let mut ingested = ingest(&snapshot, &entry.device_id, &entry.records, &entry.interfaces);
        let cycle = DeviceCycle {
            device_id: entry.device_id.clone(),
            observed_at: entry.timestamp,
            candidates: ingested.candidates.clone(),
            interfaces: entry.interfaces.clone(),
        };
        let outcome = self.store.apply_device_cycle(&cycle)?;
        for event in ingested.events.drain(..) {
            self.events.publish(event);
        }
        debug!(
            device_id = %entry.device_id,
            version = outcome.version,
            changed = outcome.changed,
            links_changed = outcome.links_changed,
            "device cycle merged"
        );
        Ok((ingested, outcome))
    }
}

// ─── DiscoveryEngine ─────────────────────────────────────────────────

/// 주기적 수집 엔진 (플러그인)
pub struct DiscoveryEngine<A: CollectorAdapter> {
    info: PluginInfo,
    state: PluginState,
    handle: DiscoveryHandle<A>,
    cancel: CancellationToken,
    run_token: Option<CancellationToken>,
    tasks: Vec<JoinHandle<()>>,
}

impl<A: CollectorAdapter> DiscoveryEngine<A> {
    /// 빌더를 반환합니다.
    pub fn builder() -> DiscoveryEngineBuilder<A> {
        DiscoveryEngineBuilder::new()
    }

    /// 수집 작업 핸들
    pub fn handle(&self) -> DiscoveryHandle<A> {
        self.handle.clone()
    }

    /// 토폴로지 저장소
    pub fn store(&self) -> &Arc<TopologyStore> {
        self.handle.store()
    }

    /// 한 사이클을 즉시 실행합니다.
    pub async fn run_cycle(&self) -> CycleReport {
        let token = self.cancel.child_token();
        self.handle.run_cycle(&token).await
    }

    /// 수집 로그를 재생합니다.
    pub fn replay(&self, entries: &[IngestionLogEntry]) -> Result<usize, DiscoveryError> {
        self.handle.replay(entries)
    }

    async fn start_loop(&mut self) -> Result<(), TopowatchError> {
        if self.state == PluginState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }
        let handle = self.handle.clone();
        let token = self.cancel.child_token();
        self.run_token = Some(token.clone());
        let interval = handle.config().interval();
        let enabled = handle.config().enabled;

        info!(
            interval_secs = interval.as_secs(),
            enabled,
            workers = handle.config().max_workers,
            "starting discovery engine"
        );

        self.tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        info!("discovery loop received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        if enabled {
                            handle.run_cycle(&token).await;
                        } else if let Err(e) = handle.store().sweep_stale(Utc::now()) {
                            warn!(error = %e, "staleness sweep failed");
                        }
                    }
                }
            }
        }));
        self.state = PluginState::Running;
        Ok(())
    }

    async fn stop_loop(&mut self) -> Result<(), TopowatchError> {
        if self.state != PluginState::Running {
            return Err(PipelineError::NotRunning.into());
        }
        info!("stopping discovery engine");
        if let Some(token) = self.run_token.take() {
            token.cancel();
        }
        for mut task in self.tasks.drain(..) {
            if tokio::time::timeout(STOP_GRACE, &mut task).await.is_err() {
                warn!("discovery loop did not stop in time; aborting");
                task.abort();
            }
        }
        self.state = PluginState::Stopped;
        info!("discovery engine stopped");
        Ok(())
    }

    fn health(&self) -> HealthStatus {
        match self.state {
            PluginState::Running => {}
            PluginState::Created | PluginState::Initialized => {
                return HealthStatus::Unhealthy("not started".to_owned());
            }
            PluginState::Stopped => return HealthStatus::Unhealthy("stopped".to_owned()),
            PluginState::Failed => return HealthStatus::Unhealthy("failed".to_owned()),
        }
        if let Some(reason) = self.handle.store().halted_reason() {
            return HealthStatus::Unhealthy(format!("store halted: {reason}"));
        }
        match self.handle.last_cycle() {
            Some(report) if report.failed() > 0 => HealthStatus::Degraded(format!(
                "{} of {} devices failed in the last cycle",
                report.failed(),
                report.devices.len()
            )),
            _ => HealthStatus::Healthy,
        }
    }
}

impl<A: CollectorAdapter> Plugin for DiscoveryEngine<A> {
    fn info(&self) -> &PluginInfo {
        &self.info
    }

    fn state(&self) -> PluginState {
        self.state
    }

    async fn init(&mut self) -> Result<(), TopowatchError> {
        if let Err(e) = self.handle.config().validate() {
            self.state = PluginState::Failed;
            return Err(e.into());
        }
        self.state = PluginState::Initialized;
        Ok(())
    }

    async fn start(&mut self) -> Result<(), TopowatchError> {
        self.start_loop().await
    }

    async fn stop(&mut self) -> Result<(), TopowatchError> {
        self.stop_loop().await
    }

    async fn health_check(&self) -> HealthStatus {
        self.health()
    }
}

impl<A: CollectorAdapter> Pipeline for DiscoveryEngine<A> {
    async fn start(&mut self) -> Result<(), TopowatchError> {
        self.start_loop().await
    }

    async fn stop(&mut self) -> Result<(), TopowatchError> {
        self.stop_loop().await
    }

    async fn health_check(&self) -> HealthStatus {
        self.health()
    }
}

// ─── DiscoveryEngineBuilder ──────────────────────────────────────────

/// 수집 엔진 빌더
pub struct DiscoveryEngineBuilder<A: CollectorAdapter> {
    config: DiscoveryEngineConfig,
    adapter: Option<Arc<A>>,
    store: Option<Arc<TopologyStore>>,
    events: Option<Arc<dyn EventSink>>,
    log: Option<Arc<IngestionLog>>,
    cancel: Option<CancellationToken>,
}

impl<A: CollectorAdapter> DiscoveryEngineBuilder<A> {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: DiscoveryEngineConfig::default(),
            adapter: None,
            store: None,
            events: None,
            log: None,
            cancel: None,
        }
    }

    /// 엔진 설정을 지정합니다.
    pub fn config(mut self, config: DiscoveryEngineConfig) -> Self {
        self.config = config;
        self
    }

    /// 수집기 어댑터를 지정합니다.
    pub fn adapter(mut self, adapter: Arc<A>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// 토폴로지 저장소를 지정합니다.
    pub fn store(mut self, store: Arc<TopologyStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// 이벤트 sink를 지정합니다.
    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// 수집 로그를 지정합니다.
    pub fn ingestion_log(mut self, log: Option<Arc<IngestionLog>>) -> Self {
        self.log = log;
        self
    }

    /// 외부 취소 토큰을 지정합니다 (데몬 종료와 연동).
    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// 엔진을 생성합니다.
    pub fn build(self) -> Result<DiscoveryEngine<A>, DiscoveryError> {
        self.config.validate()?;
        let missing = |field: &str| DiscoveryError::Config {
            field: field.to_owned(),
            reason: "required by the discovery engine".to_owned(),
        };
        let adapter = self.adapter.ok_or_else(|| missing("adapter"))?;
        let store = self.store.ok_or_else(|| missing("store"))?;
        let events = self.events.ok_or_else(|| missing("events"))?;

        Ok(DiscoveryEngine {
            info: PluginInfo {
                name: "discovery".to_owned(),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                description: format!("neighbor discovery via {} adapter", adapter.name()),
                plugin_type: PluginType::Collector,
            },
            state: PluginState::Created,
            handle: DiscoveryHandle {
                config: Arc::new(self.config),
                adapter,
                store,
                events,
                log: self.log,
                last_cycle: Arc::new(RwLock::new(None)),
                cycles: Arc::new(AtomicU64::new(0)),
            },
            cancel: self.cancel.unwrap_or_default(),
            run_token: None,
            tasks: Vec::new(),
        })
    }
}

impl<A: CollectorAdapter> Default for DiscoveryEngineBuilder<A> {
    fn default() -> Self {
        Self::new()
    }
}
