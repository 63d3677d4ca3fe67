//! Topowatch 토폴로지 저장소 — 버전 관리 그래프, 신뢰도 병합, 영속화
//!
//! # 모듈 구성
//!
//! - [`error`]: 도메인 에러 (`TopologyError`)
//! - [`config`]: 저장소 설정 (`TopologyConfig`, 빌더)
//! - [`link`]: 링크/엔드포인트/증거 모델
//! - [`candidate`]: 식별자 해석을 거친 후보 링크
//! - [`scorer`]: 증거 결합 신뢰도
//! - [`snapshot`]: 불변 스냅샷, 식별자 역색인, 불변식 검사
//! - [`merge`]: 장비 사이클 병합 계획
//! - [`operator`]: 수동 링크/삭제/충돌 해결/노후 정리 계획
//! - [`store`]: 낙관적 커밋 저장소 (`TopologyStore`)
//! - [`persist`]: 스냅샷 테이블과 수집 로그
//!
//! # 아키텍처
//!
//! ```text
//! discovery ──DeviceCycle──▶ TopologyStore ──Arc<TopologySnapshot>──▶ analysis
//!                                 │
//!                         EventSink (충돌/노후/손상)
//!                                 │
//!                    Persistence (snapshot.json, ingestion.jsonl)
//! ```

pub mod candidate;
pub mod config;
pub mod error;
pub mod link;
pub mod merge;
pub mod operator;
pub mod persist;
pub mod scorer;
pub mod snapshot;
pub mod store;

// --- Public API Re-exports ---

pub use candidate::{CandidateLink, CandidateSide, UnresolvedReason, UnresolvedSide};
pub use config::{TopologyConfig, TopologyConfigBuilder};
pub use error::TopologyError;
pub use link::{Endpoint, Evidence, Link, LinkId, MANUAL_REPORTER};
pub use merge::{ChangeSet, DeviceCycle};
pub use operator::ConflictResolution;
pub use persist::{IngestionLog, IngestionLogEntry, Persistence};
pub use scorer::ConfidenceScorer;
pub use snapshot::{ConflictRecord, IdentityIndex, SnapshotTable, TopologySnapshot};
pub use store::{CommitOutcome, TopologyStore};
