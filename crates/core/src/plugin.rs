//! 플러그인 시스템 — 장기 실행 모듈의 단계별 구동
//!
//! 데몬의 장기 실행 모듈(수집 엔진, 저장소 유지보수, 이벤트 내보내기)은
//! [`Plugin`]을 구현해 [`PluginRegistry`]에 등록됩니다.
//!
//! 레지스트리는 [`PluginType::stage`] 순서로 구동합니다. 소비자가 먼저
//! 준비되고 생산자가 마지막에 시작하며, 정지는 그 역순입니다. 그래서 수집이
//! 먼저 멈추고 저장소와 이벤트 소비자가 남은 변경을 비울 수 있습니다.
//!
//! ```text
//! Exporter → GraphStore → Analyzer/Custom → Collector   (start)
//! Collector → Analyzer/Custom → GraphStore → Exporter   (stop)
//! ```

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PluginError, TopowatchError};
use crate::pipeline::{BoxFuture, HealthStatus};

// ─── PluginType ──────────────────────────────────────────────────────

/// 플러그인 유형
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginType {
    /// 장비 이웃 정보 수집
    Collector,
    /// 그래프 저장소 유지보수 (플러시, 노후 처리)
    GraphStore,
    /// 경로/도달성 분석
    Analyzer,
    /// 이벤트/메트릭 내보내기
    Exporter,
    /// 사용자 정의
    Custom(String),
}

impl PluginType {
    /// 구동 단계. 낮은 단계가 먼저 시작하고 나중에 정지합니다.
    pub fn stage(&self) -> u8 {
        match self {
            Self::Exporter => 0,
            Self::GraphStore => 1,
            Self::Analyzer | Self::Custom(_) => 2,
            Self::Collector => 3,
        }
    }
}

impl fmt::Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Collector => f.write_str("collector"),
            Self::GraphStore => f.write_str("graph-store"),
            Self::Analyzer => f.write_str("analyzer"),
            Self::Exporter => f.write_str("exporter"),
            Self::Custom(name) => write!(f, "custom:{name}"),
        }
    }
}

// ─── PluginInfo / PluginState ────────────────────────────────────────

/// 플러그인 메타데이터
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInfo {
    /// 레지스트리 안에서 고유한 이름 (예: `"discovery"`)
    pub name: String,
    pub version: String,
    pub description: String,
    pub plugin_type: PluginType,
}

/// 플러그인 생명주기 상태
///
/// `Created → Initialized → Running → Stopped`, 실패 시 `Failed`.
/// 정지된 플러그인은 다시 시작할 수 있습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginState {
    Created,
    Initialized,
    Running,
    Stopped,
    Failed,
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        })
    }
}

// ─── Plugin / DynPlugin ──────────────────────────────────────────────

/// 장기 실행 모듈 trait
pub trait Plugin: Send + Sync {
    fn info(&self) -> &PluginInfo;

    fn state(&self) -> PluginState;

    /// 설정 검증과 리소스 준비
    fn init(&mut self) -> impl Future<Output = Result<(), TopowatchError>> + Send;

    fn start(&mut self) -> impl Future<Output = Result<(), TopowatchError>> + Send;

    /// 진행 중인 작업을 마무리하고 정지합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), TopowatchError>> + Send;

    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// `Box<dyn _>`로 보관하기 위한 object-safe 버전 ([`Plugin`]은 RPITIT 사용)
pub trait DynPlugin: Send + Sync {
    fn info(&self) -> &PluginInfo;
    fn state(&self) -> PluginState;
    fn init(&mut self) -> BoxFuture<'_, Result<(), TopowatchError>>;
    fn start(&mut self) -> BoxFuture<'_, Result<(), TopowatchError>>;
    fn stop(&mut self) -> BoxFuture<'_, Result<(), TopowatchError>>;
    fn health_check(&self) -> BoxFuture<'_, HealthStatus>;
}

impl<T: Plugin> DynPlugin for T {
    fn info(&self) -> &PluginInfo {
        Plugin::info(self)
    }
    fn state(&self) -> PluginState {
        Plugin::state(self)
    }
    fn init(&mut self) -> BoxFuture<'_, Result<(), TopowatchError>> {
        Box::pin(Plugin::init(self))
    }
    fn start(&mut self) -> BoxFuture<'_, Result<(), TopowatchError>> {
        Box::pin(Plugin::start(self))
    }
    fn stop(&mut self) -> BoxFuture<'_, Result<(), TopowatchError>> {
        Box::pin(Plugin::stop(self))
    }
    fn health_check(&self) -> BoxFuture<'_, HealthStatus> {
        Box::pin(Plugin::health_check(self))
    }
}

// ─── PluginRegistry ──────────────────────────────────────────────────

/// 플러그인 하나의 건강 상태 보고
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginHealth {
    pub name: String,
    pub plugin_type: PluginType,
    pub state: PluginState,
    pub status: HealthStatus,
}

/// 플러그인 레지스트리
///
/// 같은 단계 안에서는 등록 순서를 따릅니다.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn DynPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 플러그인을 등록합니다. 이름이 중복되면 에러입니다.
    pub fn register(&mut self, plugin: Box<dyn DynPlugin>) -> Result<(), TopowatchError> {
        let name = plugin.info().name.clone();
        if self.position(&name).is_some() {
            return Err(PluginError::AlreadyRegistered { name }.into());
        }
        debug!(
            plugin = %name,
            plugin_type = %plugin.info().plugin_type,
            "plugin registered"
        );
        self.plugins.push(plugin);
        Ok(())
    }

    /// 플러그인을 해제하고 소유권을 돌려줍니다.
    pub fn unregister(&mut self, name: &str) -> Result<Box<dyn DynPlugin>, TopowatchError> {
        let idx = self.position(name).ok_or_else(|| PluginError::NotFound {
            name: name.to_owned(),
        })?;
        Ok(self.plugins.remove(idx))
    }

    pub fn get(&self, name: &str) -> Option<&dyn DynPlugin> {
        self.position(name).map(|idx| self.plugins[idx].as_ref())
    }

    pub fn count(&self) -> usize {
        self.plugins.len()
    }

    /// 시작 순서대로 정렬한 플러그인 정보
    pub fn list(&self) -> Vec<&PluginInfo> {
        self.start_order()
            .into_iter()
            .map(|idx| self.plugins[idx].info())
            .collect()
    }

    /// `Created` 상태의 플러그인을 시작 순서대로 초기화합니다 (fail-fast).
    pub async fn init_all(&mut self) -> Result<(), TopowatchError> {
        for idx in self.start_order() {
            let plugin = &mut self.plugins[idx];
            if plugin.state() == PluginState::Created {
                plugin.init().await?;
            }
        }
        Ok(())
    }

    /// 실행 중이 아닌 플러그인을 시작 순서대로 시작합니다.
    ///
    /// 하나라도 실패하면 이번 호출에서 시작한 플러그인을 역순으로 정지한 뒤
    /// [`PluginError::StartFailed`]를 반환합니다.
    pub async fn start_all(&mut self) -> Result<(), TopowatchError> {
        let mut started = Vec::new();
        for idx in self.start_order() {
            if self.plugins[idx].state() == PluginState::Running {
                continue;
            }
            if let Err(e) = self.plugins[idx].start().await {
                let name = self.plugins[idx].info().name.clone();
                warn!(plugin = %name, error = %e, "plugin failed to start, rolling back");
                for &prev in started.iter().rev() {
                    let plugin: &mut Box<dyn DynPlugin> = &mut self.plugins[prev];
                    if let Err(stop_err) = plugin.stop().await {
                        warn!(
                            plugin = %plugin.info().name,
                            error = %stop_err,
                            "rollback stop failed"
                        );
                    }
                }
                return Err(PluginError::StartFailed {
                    name,
                    reason: e.to_string(),
                }
                .into());
            }
            started.push(idx);
        }
        Ok(())
    }

    /// 실행 중인 플러그인을 정지 순서대로 정지합니다.
    ///
    /// 실행 중이 아닌 플러그인은 건너뜁니다. 개별 실패가 있어도 나머지를
    /// 계속 정지하고 실패를 모아 반환합니다.
    pub async fn stop_all(&mut self) -> Result<(), TopowatchError> {
        let mut failures = Vec::new();
        for idx in self.start_order().into_iter().rev() {
            let plugin = &mut self.plugins[idx];
            if plugin.state() != PluginState::Running {
                debug!(plugin = %plugin.info().name, state = %plugin.state(), "skip stop");
                continue;
            }
            if let Err(e) = plugin.stop().await {
                failures.push(format!("{}: {}", plugin.info().name, e));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(PluginError::StopFailed(failures.join("; ")).into())
        }
    }

    /// 모든 플러그인의 건강 상태 (시작 순서)
    pub async fn health_check_all(&self) -> Vec<PluginHealth> {
        let mut report = Vec::with_capacity(self.plugins.len());
        for idx in self.start_order() {
            let plugin = &self.plugins[idx];
            report.push(PluginHealth {
                name: plugin.info().name.clone(),
                plugin_type: plugin.info().plugin_type.clone(),
                state: plugin.state(),
                status: plugin.health_check().await,
            });
        }
        report
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.plugins.iter().position(|p| p.info().name == name)
    }

    /// (단계, 등록 순서)로 정렬한 인덱스
    fn start_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.plugins.len()).collect();
        order.sort_by_key(|&idx| self.plugins[idx].info().plugin_type.stage());
        order
    }
}
