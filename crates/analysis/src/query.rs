//! 질의 API — 스냅샷 조회, 경로 탐색, 도달성 판정
//!
//! 모든 질의는 시작 시점의 불변 스냅샷 하나를 붙잡고 수행되므로
//! 동시에 진행되는 수집 커밋과 경합하지 않습니다.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use topowatch_core::metrics as m;
use topowatch_core::types::DeviceId;
use topowatch_topology::{TopologySnapshot, TopologyStore};

use crate::config::AnalysisEngineConfig;
use crate::error::AnalysisError;
use crate::paths::{PathOptions, PathResult, find_paths};
use crate::reachability::{HopProbe, ReachabilityEngine, ReachabilityReport, SnapshotProbe};

/// 토폴로지 질의 API
pub struct QueryApi<P: HopProbe = SnapshotProbe> {
    store: Arc<TopologyStore>,
    config: AnalysisEngineConfig,
    reachability: ReachabilityEngine<P>,
}

impl QueryApi<SnapshotProbe> {
    /// 스냅샷 검사기로 질의 API를 생성합니다.
    pub fn new(
        store: Arc<TopologyStore>,
        config: AnalysisEngineConfig,
    ) -> Result<Self, AnalysisError> {
        Self::with_probe(store, config, SnapshotProbe)
    }
}

impl<P: HopProbe> QueryApi<P> {
    /// 홉 검사기를 지정해 질의 API를 생성합니다.
    pub fn with_probe(
        store: Arc<TopologyStore>,
        config: AnalysisEngineConfig,
        probe: P,
    ) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self {
            store,
            reachability: ReachabilityEngine::with_probe(config.clone(), probe),
            config,
        })
    }

    /// 분석 설정
    pub fn config(&self) -> &AnalysisEngineConfig {
        &self.config
    }

    /// 설정 기본값으로 채운 경로 질의 옵션
    pub fn default_options(&self) -> PathOptions {
        self.config.path_options()
    }

    /// 지정 버전(없으면 최신)의 스냅샷을 반환합니다.
    pub fn get_topology_snapshot(
        &self,
        version: Option<u64>,
    ) -> Result<Arc<TopologySnapshot>, AnalysisError> {
        Ok(self.store.get_snapshot(version)?)
    }

    /// 최신 스냅샷에서 경로를 찾습니다.
    ///
    /// `options`가 없으면 설정 기본값을 씁니다.
    pub fn find_paths(
        &self,
        source: &DeviceId,
        dest: &DeviceId,
        options: Option<PathOptions>,
    ) -> Result<PathResult, AnalysisError> {
        let options = options.unwrap_or_else(|| self.default_options());
        let snapshot = self.store.snapshot();
        let started = Instant::now();
        let result = find_paths(&snapshot, source, dest, &options);
        metrics::histogram!(m::ANALYSIS_PATH_QUERY_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        let quality = match &result {
            Ok(r) if !r.paths.is_empty() => "primary",
            Ok(r) if !r.degraded.is_empty() => "degraded",
            Ok(_) => "truncated",
            Err(AnalysisError::NoPathFound { .. }) => "none",
            Err(_) => "error",
        };
        metrics::counter!(m::ANALYSIS_PATH_QUERIES_TOTAL, m::LABEL_QUALITY => quality)
            .increment(1);
        if result.as_ref().is_ok_and(|r| r.truncated) {
            metrics::counter!(m::ANALYSIS_TRUNCATED_TOTAL).increment(1);
            info!(source = %source, dest = %dest, "path query truncated by timeout");
        }
        result
    }

    /// 최신 스냅샷에서 도달성을 판정합니다.
    pub async fn check_reachability(
        &self,
        source: &DeviceId,
        dest: &DeviceId,
    ) -> Result<ReachabilityReport, AnalysisError> {
        self.check_reachability_with(source, dest, &CancellationToken::new())
            .await
    }

    /// 취소 토큰을 받아 도달성을 판정합니다. 취소된 홉은 `unknown`입니다.
    pub async fn check_reachability_with(
        &self,
        source: &DeviceId,
        dest: &DeviceId,
        cancel: &CancellationToken,
    ) -> Result<ReachabilityReport, AnalysisError> {
        let snapshot = self.store.snapshot();
        let report = self
            .reachability
            .check(&snapshot, source, dest, cancel)
            .await?;
        metrics::counter!(
            m::ANALYSIS_REACHABILITY_CHECKS_TOTAL,
            m::LABEL_VERDICT => report.verdict.label()
        )
        .increment(1);
        debug!(
            source = %source,
            dest = %dest,
            version = report.snapshot_version,
            verdict = %report.verdict,
            "reachability query served"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use topowatch_core::event::{EventSink, MemoryEventSink};
    use topowatch_core::types::{Device, DeviceStatus, Interface};
    use topowatch_topology::{Endpoint, TopologyConfig};

    fn store() -> Arc<TopologyStore> {
        let sink: Arc<dyn EventSink> = Arc::new(MemoryEventSink::new());
        let store = Arc::new(TopologyStore::new(TopologyConfig::default(), sink));
        for id in ["a", "b"] {
            store
                .register_device(
                    Device::new(id, id)
                        .with_status(DeviceStatus::Up)
                        .with_interface(Interface::new("eth1", 1, "eth1")),
                )
                .unwrap();
        }
        store
    }

    #[test]
    fn rejects_invalid_config() {
        let config = AnalysisEngineConfig {
            default_k: 0,
            ..AnalysisEngineConfig::default()
        };
        assert!(QueryApi::new(store(), config).is_err());
    }

    #[test]
    fn old_version_is_served_until_evicted() {
        let store = store();
        let api = QueryApi::new(Arc::clone(&store), AnalysisEngineConfig::default()).unwrap();
        let before = store.version();
        store
            .add_manual_link(&Endpoint::new("a", "eth1"), &Endpoint::new("b", "eth1"))
            .unwrap();

        let old = api.get_topology_snapshot(Some(before)).unwrap();
        assert_eq!(old.link_count(), 0);
        let latest = api.get_topology_snapshot(None).unwrap();
        assert_eq!(latest.link_count(), 1);
        assert!(matches!(
            api.get_topology_snapshot(Some(9_999)),
            Err(AnalysisError::VersionNotRetained { version: 9_999 })
        ));
    }

    #[tokio::test]
    async fn manual_link_is_reachable() {
        let store = store();
        store
            .add_manual_link(&Endpoint::new("a", "eth1"), &Endpoint::new("b", "eth1"))
            .unwrap();
        let api = QueryApi::new(store, AnalysisEngineConfig::default()).unwrap();

        let paths = api.find_paths(&"a".into(), &"b".into(), None).unwrap();
        assert_eq!(paths.paths.len(), 1);
        let report = api.check_reachability(&"a".into(), &"b".into()).await.unwrap();
        assert_eq!(report.verdict.label(), "reachable");
    }
}
