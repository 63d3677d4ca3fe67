//! 이벤트 시스템 — 운영자 확인이 필요한 상황을 외부로 알리는 단위
//!
//! 엔진 내부의 경고/오류(식별 실패, 그래프 충돌, 수집기 장애, 저장소 손상)는
//! 모두 [`TopologyEvent`]로 만들어져 [`EventSink`]로 전달됩니다.
//! [`EventMetadata`]는 모든 이벤트에 공통으로 포함되는 메타데이터이며,
//! [`Event`] trait은 모든 이벤트 타입이 구현해야 하는 인터페이스입니다.
//!
//! ```text
//! ingest / merge / store ──publish()──▶ EventSink ──mpsc──▶ daemon event journal
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::types::{DeviceId, Severity, Timestamp};

// --- 모듈명 상수 ---

/// 탐색/수집 모듈명
pub const MODULE_DISCOVERY: &str = "discovery";
/// 그래프 저장소 모듈명
pub const MODULE_TOPOLOGY: &str = "topology-store";
/// 분석 모듈명
pub const MODULE_ANALYSIS: &str = "analysis";

// --- 이벤트 타입 상수 ---

/// 토폴로지 이벤트 타입
pub const EVENT_TYPE_TOPOLOGY: &str = "topology";

/// 이벤트 메타데이터: 모든 이벤트에 공통으로 포함되는 추적 정보
///
/// 같은 수집 사이클에서 발생한 이벤트는 같은 `trace_id`를 공유합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// 이벤트 발생 시각
    pub timestamp: Timestamp,
    /// 이벤트를 생성한 모듈명 (예: "discovery", "topology-store")
    pub source_module: String,
    /// 분산 추적 ID: 같은 흐름의 이벤트를 연결합니다
    pub trace_id: String,
}

impl EventMetadata {
    /// 기존 trace_id를 사용하여 새 메타데이터를 생성합니다.
    pub fn new(source_module: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            source_module: source_module.into(),
            trace_id: trace_id.into(),
        }
    }

    /// 새로운 UUID v4 trace_id를 생성하여 메타데이터를 만듭니다.
    pub fn with_new_trace(source_module: impl Into<String>) -> Self {
        Self::new(source_module, uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for EventMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] source={} trace={}",
            self.timestamp.to_rfc3339(),
            self.source_module,
            self.trace_id,
        )
    }
}

/// 모든 이벤트가 구현해야 하는 기본 trait
///
/// `Send + Sync + 'static` 바운드로 `tokio::mpsc` 채널을 통한
/// 안전한 전송을 보장합니다.
pub trait Event: Send + Sync + 'static {
    /// 이벤트 고유 ID (UUID v4)
    fn event_id(&self) -> &str;

    /// 이벤트 메타데이터 (timestamp, source_module, trace_id)
    fn metadata(&self) -> &EventMetadata;

    /// 이벤트 타입명 (로깅 및 라우팅에 사용)
    fn event_type(&self) -> &str;
}

// ─── EventKind ───────────────────────────────────────────────────────

/// 토폴로지 이벤트 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// 원격 식별자를 어떤 장비에도 매칭하지 못함
    IdentityUnresolved,
    /// 원격 식별자가 둘 이상의 장비에 매칭됨
    IdentityAmbiguous,
    /// 같은 로컬 포트에 대해 다른 원격 포트가 보고됨
    GraphConflict,
    /// 재시도 소진 후 수집 실패
    AdapterFailure,
    /// 노후 기간 초과로 링크가 down 처리됨
    LinkStale,
    /// 인터페이스 down 보고로 링크가 down 처리됨
    LinkDown,
    /// 저장소 불변식 위반, 쓰기 중단
    StoreCorruption,
}

impl EventKind {
    /// 이벤트 종류의 기본 심각도
    pub fn default_severity(self) -> Severity {
        match self {
            Self::IdentityUnresolved
            | Self::IdentityAmbiguous
            | Self::AdapterFailure
            | Self::LinkStale
            | Self::LinkDown => Severity::Warning,
            Self::GraphConflict => Severity::Error,
            Self::StoreCorruption => Severity::Critical,
        }
    }

    /// 문자열 이름
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IdentityUnresolved => "identity_unresolved",
            Self::IdentityAmbiguous => "identity_ambiguous",
            Self::GraphConflict => "graph_conflict",
            Self::AdapterFailure => "adapter_failure",
            Self::LinkStale => "link_stale",
            Self::LinkDown => "link_down",
            Self::StoreCorruption => "store_corruption",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── TopologyEvent ───────────────────────────────────────────────────

/// 운영자 확인이 필요한 구조화 이벤트
///
/// `{severity, kind, device_id?, link_id?, message, timestamp}`에
/// 확인(acknowledged)/해결(resolved) 플래그가 더해진 형태입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyEvent {
    /// 이벤트 고유 ID
    pub id: String,
    /// 이벤트 메타데이터 (timestamp 포함)
    pub metadata: EventMetadata,
    /// 심각도
    pub severity: Severity,
    /// 종류
    pub kind: EventKind,
    /// 관련 장비
    pub device_id: Option<DeviceId>,
    /// 관련 링크 ID
    pub link_id: Option<String>,
    /// 사람이 읽을 메시지
    pub message: String,
    /// 운영자 확인 여부
    #[serde(default)]
    pub acknowledged: bool,
    /// 해결 여부
    #[serde(default)]
    pub resolved: bool,
}

impl TopologyEvent {
    /// 종류의 기본 심각도로 새 trace를 시작하는 이벤트를 생성합니다.
    pub fn new(
        source_module: &str,
        kind: EventKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: EventMetadata::with_new_trace(source_module),
            severity: kind.default_severity(),
            kind,
            device_id: None,
            link_id: None,
            message: message.into(),
            acknowledged: false,
            resolved: false,
        }
    }

    /// 기존 trace에 연결된 이벤트를 생성합니다.
    pub fn with_trace(
        source_module: &str,
        kind: EventKind,
        message: impl Into<String>,
        trace_id: impl Into<String>,
    ) -> Self {
        let mut event = Self::new(source_module, kind, message);
        event.metadata = EventMetadata::new(source_module, trace_id);
        event
    }

    /// 관련 장비를 지정합니다.
    pub fn for_device(mut self, device_id: DeviceId) -> Self {
        self.device_id = Some(device_id);
        self
    }

    /// 관련 링크를 지정합니다.
    pub fn for_link(mut self, link_id: impl Into<String>) -> Self {
        self.link_id = Some(link_id.into());
        self
    }

    /// 심각도를 덮어씁니다.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// 발생 시각
    pub fn timestamp(&self) -> Timestamp {
        self.metadata.timestamp
    }
}

impl Event for TopologyEvent {
    fn event_id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn event_type(&self) -> &str {
        EVENT_TYPE_TOPOLOGY
    }
}

impl fmt::Display for TopologyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TopologyEvent[{}] {} {}",
            &self.id[..8.min(self.id.len())],
            self.severity,
            self.kind,
        )?;
        if let Some(device_id) = &self.device_id {
            write!(f, " device={device_id}")?;
        }
        if let Some(link_id) = &self.link_id {
            write!(f, " link={link_id}")?;
        }
        write!(f, ": {}", self.message)
    }
}

// ─── EventSink ───────────────────────────────────────────────────────

/// 이벤트 수신자
///
/// 발행은 절대 블로킹하지 않습니다. 수집/커밋 경로에서 호출되므로
/// 구현체는 가득 찬 큐에서 이벤트를 버리고 기록만 남겨야 합니다.
pub trait EventSink: Send + Sync {
    /// 이벤트를 발행합니다.
    fn publish(&self, event: TopologyEvent);
}

/// `tokio::mpsc` 채널로 이벤트를 전달하는 sink
pub struct ChannelEventSink {
    tx: mpsc::Sender<TopologyEvent>,
    dropped: AtomicU64,
}

impl ChannelEventSink {
    /// 채널 송신자로 sink를 생성합니다.
    pub fn new(tx: mpsc::Sender<TopologyEvent>) -> Self {
        Self {
            tx,
            dropped: AtomicU64::new(0),
        }
    }

    /// 큐가 가득 차서 버려진 이벤트 수
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EventSink for ChannelEventSink {
    fn publish(&self, event: TopologyEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    event_id = %event.id,
                    kind = %event.kind,
                    "event channel full, dropping event"
                );
            }
            Err(TrySendError::Closed(event)) => {
                debug!(event_id = %event.id, "event channel closed, dropping event");
            }
        }
    }
}

/// 발행된 이벤트를 메모리에 쌓아 두는 sink
///
/// 일회성 CLI 실행과 테스트에서 사용합니다.
#[derive(Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<TopologyEvent>>,
}

impl MemoryEventSink {
    /// 빈 sink를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 지금까지 발행된 이벤트의 복사본
    pub fn events(&self) -> Vec<TopologyEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 쌓인 이벤트를 모두 꺼냅니다.
    pub fn drain(&self) -> Vec<TopologyEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// 특정 종류의 이벤트 수
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }
}

impl EventSink for MemoryEventSink {
    fn publish(&self, event: TopologyEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_metadata_new_preserves_trace_id() {
        let meta = EventMetadata::new("discovery", "trace-abc-123");
        assert_eq!(meta.source_module, "discovery");
        assert_eq!(meta.trace_id, "trace-abc-123");
        assert!(meta.timestamp <= Utc::now());
    }

    #[test]
    fn event_metadata_with_new_trace_generates_uuid() {
        let meta = EventMetadata::with_new_trace("discovery");
        assert_eq!(meta.trace_id.len(), 36);
        assert_eq!(meta.trace_id.chars().filter(|c| *c == '-').count(), 4);
    }

    #[test]
    fn event_kind_default_severities() {
        assert_eq!(
            EventKind::IdentityUnresolved.default_severity(),
            Severity::Warning
        );
        assert_eq!(
            EventKind::IdentityAmbiguous.default_severity(),
            Severity::Warning
        );
        assert_eq!(EventKind::GraphConflict.default_severity(), Severity::Error);
        assert_eq!(
            EventKind::AdapterFailure.default_severity(),
            Severity::Warning
        );
        assert_eq!(
            EventKind::StoreCorruption.default_severity(),
            Severity::Critical
        );
    }

    #[test]
    fn topology_event_implements_event_trait() {
        let event = TopologyEvent::new(MODULE_TOPOLOGY, EventKind::GraphConflict, "conflict")
            .for_device(DeviceId::from("sw1"))
            .for_link("sw1:1|sw2:1");
        assert_eq!(event.event_type(), "topology");
        assert_eq!(event.metadata().source_module, "topology-store");
        assert_eq!(event.severity, Severity::Error);
        assert!(!event.acknowledged);
        assert!(!event.resolved);
    }

    #[test]
    fn topology_event_with_trace() {
        let event = TopologyEvent::with_trace(
            MODULE_DISCOVERY,
            EventKind::AdapterFailure,
            "timeout",
            "cycle-42",
        );
        assert_eq!(event.metadata.trace_id, "cycle-42");
    }

    #[test]
    fn topology_event_display() {
        let event = TopologyEvent::new(
            MODULE_DISCOVERY,
            EventKind::IdentityUnresolved,
            "no device matches chassis 00:11:22:33:44:55",
        )
        .for_device(DeviceId::from("sw1"));
        let display = event.to_string();
        assert!(display.contains("warning"));
        assert!(display.contains("identity_unresolved"));
        assert!(display.contains("device=sw1"));
    }

    #[test]
    fn topology_event_serializes_kind_snake_case() {
        let event = TopologyEvent::new(MODULE_TOPOLOGY, EventKind::LinkStale, "stale");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "link_stale");
        assert_eq!(json["severity"], "warning");
    }

    #[tokio::test]
    async fn channel_sink_delivers_events() {
        let (tx, mut rx) = mpsc::channel(4);
        let sink = ChannelEventSink::new(tx);
        sink.publish(TopologyEvent::new(
            MODULE_DISCOVERY,
            EventKind::AdapterFailure,
            "down",
        ));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, EventKind::AdapterFailure);
    }

    #[test]
    fn channel_sink_drops_when_full() {
        let (tx, _rx) = mpsc::channel(1);
        let sink = ChannelEventSink::new(tx);
        for _ in 0..3 {
            sink.publish(TopologyEvent::new(MODULE_DISCOVERY, EventKind::LinkStale, "x"));
        }
        assert_eq!(sink.dropped_count(), 2);
    }

    #[test]
    fn channel_sink_tolerates_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sink = ChannelEventSink::new(tx);
        sink.publish(TopologyEvent::new(MODULE_DISCOVERY, EventKind::LinkStale, "x"));
        assert_eq!(sink.dropped_count(), 0);
    }

    #[test]
    fn memory_sink_collects_and_drains() {
        let sink = MemoryEventSink::new();
        sink.publish(TopologyEvent::new(MODULE_TOPOLOGY, EventKind::GraphConflict, "a"));
        sink.publish(TopologyEvent::new(MODULE_TOPOLOGY, EventKind::LinkStale, "b"));
        assert_eq!(sink.count_kind(EventKind::GraphConflict), 1);
        assert_eq!(sink.drain().len(), 2);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn events_are_send_sync() {
        fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<TopologyEvent>();
        assert_send_sync::<ChannelEventSink>();
        assert_send_sync::<MemoryEventSink>();
    }
}
