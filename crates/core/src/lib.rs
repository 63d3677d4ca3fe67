//! Topowatch 공통 크레이트 — 도메인 타입, 에러, 설정, 이벤트, 플러그인
//!
//! 모든 topowatch 크레이트가 의존하는 기반 계층입니다.
//!
//! ```text
//! topowatch-discovery ──▶ topowatch-topology ◀── topowatch-analysis
//!           \                    |                    /
//!            └──────────▶ topowatch-core ◀───────────┘
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod pipeline;
pub mod plugin;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{
    CollectError, ConfigError, GraphError, PipelineError, PluginError, QueryError, StorageError,
    TopowatchError,
};

// 설정
pub use config::TopowatchConfig;

// 이벤트
pub use event::{
    ChannelEventSink, Event, EventKind, EventMetadata, EventSink, MemoryEventSink, TopologyEvent,
};

// 파이프라인 / 플러그인
pub use pipeline::{BoxFuture, HealthStatus, Pipeline};
pub use plugin::{
    DynPlugin, Plugin, PluginHealth, PluginInfo, PluginRegistry, PluginState, PluginType,
};

// 도메인 타입
pub use types::{
    Device, DeviceId, DeviceStatus, DiscoveryProtocol, Duplex, Interface, InterfaceId,
    MacAddress, NeighborRecord, OperStatus, Severity, Timestamp, Vendor,
};
