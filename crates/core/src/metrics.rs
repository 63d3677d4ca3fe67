//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `topowatch_`
//! - 모듈명: `discovery_`, `store_`, `analysis_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(topowatch_core::metrics::DISCOVERY_CYCLES_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 프로토콜 레이블 키 (lldp, cdp, snmp-bridge, manual)
pub const LABEL_PROTOCOL: &str = "protocol";

/// 결과 레이블 키 (success, warning, error)
pub const LABEL_RESULT: &str = "result";

/// 이벤트 종류 레이블 키
pub const LABEL_KIND: &str = "kind";

/// 질의 결과 집합 레이블 키 (primary, degraded)
pub const LABEL_QUALITY: &str = "quality";

/// 도달성 판정 레이블 키 (reachable, unreachable, degraded)
pub const LABEL_VERDICT: &str = "verdict";

// ─── Discovery 메트릭 ──────────────────────────────────────────────

/// Discovery: 완료된 수집 사이클 수 (counter)
pub const DISCOVERY_CYCLES_TOTAL: &str = "topowatch_discovery_cycles_total";

/// Discovery: 장비별 수집 결과 수 (counter, label: result)
pub const DISCOVERY_DEVICES_POLLED_TOTAL: &str = "topowatch_discovery_devices_polled_total";

/// Discovery: 수집기 재시도 수 (counter)
pub const DISCOVERY_ADAPTER_RETRIES_TOTAL: &str = "topowatch_discovery_adapter_retries_total";

/// Discovery: 재시도 소진 후 수집 실패 수 (counter)
pub const DISCOVERY_ADAPTER_FAILURES_TOTAL: &str = "topowatch_discovery_adapter_failures_total";

/// Discovery: 수집된 이웃 레코드 수 (counter, label: protocol)
pub const DISCOVERY_NEIGHBOR_RECORDS_TOTAL: &str = "topowatch_discovery_neighbor_records_total";

/// Discovery: 미해결 후보 링크 수 (counter)
pub const DISCOVERY_UNRESOLVED_CANDIDATES_TOTAL: &str =
    "topowatch_discovery_unresolved_candidates_total";

/// Discovery: 장비 1대 수집 소요 시간 (histogram, 초)
pub const DISCOVERY_DEVICE_DURATION_SECONDS: &str = "topowatch_discovery_device_duration_seconds";

// ─── Store 메트릭 ──────────────────────────────────────────────────

/// Store: 게시된 커밋 수 (counter)
pub const STORE_COMMITS_TOTAL: &str = "topowatch_store_commits_total";

/// Store: 낙관적 커밋 재계획 수 (counter)
pub const STORE_COMMIT_RETRIES_TOTAL: &str = "topowatch_store_commit_retries_total";

/// Store: 거부된 쓰기 수 (counter)
pub const STORE_WRITES_REJECTED_TOTAL: &str = "topowatch_store_writes_rejected_total";

/// Store: 감지된 그래프 충돌 수 (counter)
pub const STORE_CONFLICTS_TOTAL: &str = "topowatch_store_conflicts_total";

/// Store: 현재 스냅샷 버전 (gauge)
pub const STORE_SNAPSHOT_VERSION: &str = "topowatch_store_snapshot_version";

/// Store: 현재 장비 수 (gauge)
pub const STORE_DEVICES: &str = "topowatch_store_devices";

/// Store: 현재 링크 수 (gauge)
pub const STORE_LINKS: &str = "topowatch_store_links";

/// Store: 쓰기 중단 여부 (gauge, 0/1)
pub const STORE_HALTED: &str = "topowatch_store_halted";

// ─── Analysis 메트릭 ───────────────────────────────────────────────

/// Analysis: 경로 질의 수 (counter, label: quality)
pub const ANALYSIS_PATH_QUERIES_TOTAL: &str = "topowatch_analysis_path_queries_total";

/// Analysis: 잘린(truncated) 질의 수 (counter)
pub const ANALYSIS_TRUNCATED_TOTAL: &str = "topowatch_analysis_truncated_total";

/// Analysis: 경로 질의 소요 시간 (histogram, 초)
pub const ANALYSIS_PATH_QUERY_DURATION_SECONDS: &str =
    "topowatch_analysis_path_query_duration_seconds";

/// Analysis: 도달성 판정 수 (counter, label: verdict)
pub const ANALYSIS_REACHABILITY_CHECKS_TOTAL: &str =
    "topowatch_analysis_reachability_checks_total";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "topowatch_daemon_uptime_seconds";

/// Daemon: 등록된 플러그인 수 (gauge)
pub const DAEMON_PLUGINS_REGISTERED: &str = "topowatch_daemon_plugins_registered";

/// Daemon: 이벤트 저널에 보관된 이벤트 수 (gauge)
pub const DAEMON_EVENTS_RETAINED: &str = "topowatch_daemon_events_retained";

/// Daemon: 수신한 토폴로지 이벤트 수 (counter, label: kind)
pub const DAEMON_EVENTS_TOTAL: &str = "topowatch_daemon_events_total";

/// Daemon: 빌드 정보 (gauge, 항상 1, labels: version)
pub const DAEMON_BUILD_INFO: &str = "topowatch_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 질의 지연 시간 히스토그램 버킷 (초)
///
/// 100us ~ 5s 범위
pub const QUERY_DURATION_BUCKETS: [f64; 9] =
    [0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 1.0, 5.0];

/// 장비 수집 소요 시간 히스토그램 버킷 (초)
///
/// 10ms ~ 120s 범위 (재시도 백오프 포함)
pub const DEVICE_POLL_DURATION_BUCKETS: [f64; 9] =
    [0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 120.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Discovery
    describe_counter!(
        DISCOVERY_CYCLES_TOTAL,
        "Total number of completed discovery cycles"
    );
    describe_counter!(
        DISCOVERY_DEVICES_POLLED_TOTAL,
        "Devices polled, by ingestion result"
    );
    describe_counter!(
        DISCOVERY_ADAPTER_RETRIES_TOTAL,
        "Adapter calls retried after a timeout or unavailability"
    );
    describe_counter!(
        DISCOVERY_ADAPTER_FAILURES_TOTAL,
        "Adapter calls that failed after exhausting retries"
    );
    describe_counter!(
        DISCOVERY_NEIGHBOR_RECORDS_TOTAL,
        "Neighbor records received from adapters, by protocol"
    );
    describe_counter!(
        DISCOVERY_UNRESOLVED_CANDIDATES_TOTAL,
        "Candidate links whose remote identity could not be resolved"
    );
    describe_histogram!(
        DISCOVERY_DEVICE_DURATION_SECONDS,
        "Time to collect and commit a single device in seconds"
    );

    // Store
    describe_counter!(STORE_COMMITS_TOTAL, "Snapshot versions published");
    describe_counter!(
        STORE_COMMIT_RETRIES_TOTAL,
        "Batches re-planned after an optimistic commit collision"
    );
    describe_counter!(
        STORE_WRITES_REJECTED_TOTAL,
        "Writes rejected because the store is halted"
    );
    describe_counter!(
        STORE_CONFLICTS_TOTAL,
        "Links flagged as conflicting by the merge policy"
    );
    describe_gauge!(STORE_SNAPSHOT_VERSION, "Current snapshot version");
    describe_gauge!(STORE_DEVICES, "Devices in the current snapshot");
    describe_gauge!(STORE_LINKS, "Canonical links in the current snapshot");
    describe_gauge!(STORE_HALTED, "1 when the store has halted writes");

    // Analysis
    describe_counter!(
        ANALYSIS_PATH_QUERIES_TOTAL,
        "Path queries served, by result quality"
    );
    describe_counter!(
        ANALYSIS_TRUNCATED_TOTAL,
        "Queries that returned a truncated result after timing out"
    );
    describe_histogram!(
        ANALYSIS_PATH_QUERY_DURATION_SECONDS,
        "Path query latency in seconds"
    );
    describe_counter!(
        ANALYSIS_REACHABILITY_CHECKS_TOTAL,
        "Reachability checks, by verdict"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "Topowatch daemon uptime in seconds");
    describe_gauge!(
        DAEMON_PLUGINS_REGISTERED,
        "Number of plugins registered in the daemon"
    );
    describe_gauge!(
        DAEMON_EVENTS_RETAINED,
        "Events currently held in the recent-events journal"
    );
    describe_counter!(DAEMON_EVENTS_TOTAL, "Topology events received, by kind");
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        DISCOVERY_CYCLES_TOTAL,
        DISCOVERY_DEVICES_POLLED_TOTAL,
        DISCOVERY_ADAPTER_RETRIES_TOTAL,
        DISCOVERY_ADAPTER_FAILURES_TOTAL,
        DISCOVERY_NEIGHBOR_RECORDS_TOTAL,
        DISCOVERY_UNRESOLVED_CANDIDATES_TOTAL,
        DISCOVERY_DEVICE_DURATION_SECONDS,
        STORE_COMMITS_TOTAL,
        STORE_COMMIT_RETRIES_TOTAL,
        STORE_WRITES_REJECTED_TOTAL,
        STORE_CONFLICTS_TOTAL,
        STORE_SNAPSHOT_VERSION,
        STORE_DEVICES,
        STORE_LINKS,
        STORE_HALTED,
        ANALYSIS_PATH_QUERIES_TOTAL,
        ANALYSIS_TRUNCATED_TOTAL,
        ANALYSIS_PATH_QUERY_DURATION_SECONDS,
        ANALYSIS_REACHABILITY_CHECKS_TOTAL,
        DAEMON_UPTIME_SECONDS,
        DAEMON_PLUGINS_REGISTERED,
        DAEMON_EVENTS_RETAINED,
        DAEMON_EVENTS_TOTAL,
        DAEMON_BUILD_INFO,
    ];

    #[test]
    fn all_metrics_start_with_topowatch_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("topowatch_"),
                "Metric '{name}' does not start with 'topowatch_' prefix"
            );
        }
    }

    #[test]
    fn metric_names_are_unique() {
        let unique: std::collections::HashSet<_> = ALL_METRIC_NAMES.iter().collect();
        assert_eq!(unique.len(), ALL_METRIC_NAMES.len());
    }

    #[test]
    fn counters_end_with_total() {
        for name in ALL_METRIC_NAMES {
            if name.contains("_total") {
                assert!(name.ends_with("_total"), "'{name}' has _total mid-name");
            }
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        for label in [
            LABEL_PROTOCOL,
            LABEL_RESULT,
            LABEL_KIND,
            LABEL_QUALITY,
            LABEL_VERDICT,
        ] {
            assert_eq!(label.to_lowercase(), label);
        }
    }

    #[test]
    fn histogram_buckets_are_sorted() {
        for buckets in [
            QUERY_DURATION_BUCKETS.as_slice(),
            DEVICE_POLL_DURATION_BUCKETS.as_slice(),
        ] {
            for pair in buckets.windows(2) {
                assert!(pair[1] > pair[0], "bucket values must ascend");
            }
        }
    }
}
