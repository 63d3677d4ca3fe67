//! Health aggregation tests.

use std::sync::Arc;

use topowatch_core::event::{EventSink, MemoryEventSink};
use topowatch_core::pipeline::HealthStatus;
use topowatch_daemon::health::{ModuleHealth, aggregate_status, store_health};
use topowatch_topology::{TopologyConfig, TopologyStore};

fn module(name: &str, enabled: bool, status: HealthStatus) -> ModuleHealth {
    ModuleHealth {
        name: name.to_owned(),
        enabled,
        status,
    }
}

#[test]
fn test_aggregate_status_all_healthy() {
    let modules = vec![
        module("discovery", true, HealthStatus::Healthy),
        module("topology-store", true, HealthStatus::Healthy),
    ];
    assert!(aggregate_status(&modules).is_healthy());
}

#[test]
fn test_aggregate_status_one_degraded() {
    let modules = vec![
        module(
            "discovery",
            true,
            HealthStatus::Degraded("2 of 10 devices failed in last cycle".to_owned()),
        ),
        module("topology-store", true, HealthStatus::Healthy),
    ];

    match aggregate_status(&modules) {
        HealthStatus::Degraded(reason) => {
            assert!(reason.contains("discovery"));
            assert!(reason.contains("2 of 10"));
        }
        other => panic!("expected Degraded, got {other:?}"),
    }
}

#[test]
fn test_aggregate_status_unhealthy_takes_precedence_over_degraded() {
    let modules = vec![
        module("discovery", true, HealthStatus::Degraded("slow adapter".to_owned())),
        module(
            "topology-store",
            true,
            HealthStatus::Unhealthy("writes halted".to_owned()),
        ),
    ];

    match aggregate_status(&modules) {
        HealthStatus::Unhealthy(reason) => {
            assert!(reason.contains("topology-store: writes halted"));
            assert!(!reason.contains("slow adapter"));
        }
        other => panic!("expected Unhealthy, got {other:?}"),
    }
}

#[test]
fn test_aggregate_status_multiple_unhealthy_reasons_are_joined() {
    let modules = vec![
        module("discovery", true, HealthStatus::Unhealthy("not started".to_owned())),
        module(
            "topology-store",
            true,
            HealthStatus::Unhealthy("writes halted".to_owned()),
        ),
    ];

    match aggregate_status(&modules) {
        HealthStatus::Unhealthy(reason) => {
            assert_eq!(
                reason,
                "discovery: not started; topology-store: writes halted"
            );
        }
        other => panic!("expected Unhealthy, got {other:?}"),
    }
}

#[test]
fn test_aggregate_status_disabled_modules_ignored() {
    let modules = vec![
        module("discovery", false, HealthStatus::Unhealthy("ignored".to_owned())),
        module("topology-store", true, HealthStatus::Healthy),
    ];
    assert!(aggregate_status(&modules).is_healthy());
}

#[test]
fn test_aggregate_status_empty_modules() {
    assert!(aggregate_status(&[]).is_healthy());
}

#[test]
fn test_store_health_reflects_fresh_store() {
    let sink: Arc<dyn EventSink> = Arc::new(MemoryEventSink::new());
    let store = TopologyStore::new(TopologyConfig::default(), sink);
    let health = store_health(&store);
    assert_eq!(health.name, "topology-store");
    assert!(health.status.is_healthy());
}
