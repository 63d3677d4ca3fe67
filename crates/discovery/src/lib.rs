//! Topowatch 수집 엔진 — 이웃 정보 수집, 식별자 해석, 저장소 병합
//!
//! # 모듈 구성
//!
//! - [`error`]: 도메인 에러 (`DiscoveryError`)
//! - [`config`]: 엔진 설정 (`DiscoveryEngineConfig`, 빌더)
//! - [`adapter`]: 수집기 어댑터 트레이트와 정적/파일 구현
//! - [`retry`]: 지수 백오프 재시도
//! - [`ingest`]: 이웃 레코드 → 후보 링크 해석
//! - [`inventory`]: 폴링 대상 장비 목록 파일
//! - [`engine`]: 워커 풀, 주기 사이클, 수집 로그 재생
//!
//! # 아키텍처
//!
//! ```text
//! CollectorAdapter ──NeighborRecord──▶ ingest ──CandidateLink──▶ TopologyStore
//!        ▲                                │
//!   with_retry                     EventSink (미해결/모호/수집 실패)
//!        │
//! DiscoveryEngine (interval, Semaphore, JoinSet, CancellationToken)
//! ```

pub mod adapter;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod inventory;
pub mod retry;

// --- Public API Re-exports ---

pub use adapter::{CollectorAdapter, DeviceRecords, FileAdapter, StaticAdapter};
pub use config::{DiscoveryEngineConfig, DiscoveryEngineConfigBuilder};
pub use engine::{
    CycleReport, DiscoveryEngine, DiscoveryEngineBuilder, DiscoveryHandle, IngestOutcome,
    IngestionBatch, IngestionReport,
};
pub use error::DiscoveryError;
pub use ingest::{Ingested, ingest};
pub use inventory::{load_inventory, parse_inventory, register_inventory};
pub use retry::{Backoff, RetryPolicy, with_retry};
