//! Topowatch 분석 엔진 — 경로 탐색과 도달성 판정
//!
//! # 모듈 구성
//!
//! - [`error`]: 도메인 에러 (`AnalysisError`)
//! - [`config`]: 분석 설정 (`AnalysisEngineConfig`, 빌더)
//! - [`paths`]: k개 순위 경로와 저하 결과 집합
//! - [`reachability`]: 홉 검사, 의존성 억제, 판정
//! - [`query`]: 스냅샷 기반 질의 API (`QueryApi`)
//!
//! # 아키텍처
//!
//! ```text
//! TopologyStore ──Arc<TopologySnapshot>──▶ QueryApi
//!                                           ├─▶ find_paths ──▶ PathResult
//!                                           └─▶ ReachabilityEngine<HopProbe> ──▶ ReachabilityReport
//! ```

pub mod config;
pub mod error;
pub mod paths;
pub mod query;
pub mod reachability;

// --- Public API Re-exports ---

pub use config::{AnalysisEngineConfig, AnalysisEngineConfigBuilder};
pub use error::AnalysisError;
pub use paths::{Path, PathHop, PathOptions, PathResult, find_paths};
pub use query::QueryApi;
pub use reachability::{
    Factor, HopProbe, HopState, ReachabilityEngine, ReachabilityReport, SnapshotProbe, Verdict,
};
