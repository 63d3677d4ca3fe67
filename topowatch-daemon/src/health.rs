//! Aggregated health reporting.
//!
//! The daemon reports the worst status among its enabled modules, plus
//! the current snapshot version and event journal counters.

use serde::Serialize;

use topowatch_core::pipeline::HealthStatus;
use topowatch_topology::TopologyStore;

use crate::events::JournalStats;

/// Aggregated health report for the entire daemon.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonHealth {
    /// Overall daemon health status (worst of all modules).
    pub status: HealthStatus,
    /// Daemon uptime in seconds since start.
    pub uptime_secs: u64,
    /// Current topology snapshot version.
    pub snapshot_version: u64,
    /// Per-module health reports.
    pub modules: Vec<ModuleHealth>,
    /// Event journal counters.
    pub events: JournalStats,
}

/// Health status for a single module.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleHealth {
    /// Module name (e.g., "discovery", "topology-store").
    pub name: String,
    /// Whether the module is enabled in configuration.
    pub enabled: bool,
    /// Current health status of the module.
    pub status: HealthStatus,
}

/// Health of the topology store.
///
/// Halted writes are unhealthy. Open link conflicts need an operator and
/// degrade the store without stopping it.
pub fn store_health(store: &TopologyStore) -> ModuleHealth {
    let status = if let Some(reason) = store.halted_reason() {
        HealthStatus::Unhealthy(format!("writes halted: {reason}"))
    } else {
        match store.snapshot().conflicts().count() {
            0 => HealthStatus::Healthy,
            n => HealthStatus::Degraded(format!("{n} open link conflict(s)")),
        }
    };
    ModuleHealth {
        name: "topology-store".to_owned(),
        enabled: true,
        status,
    }
}

fn rank(status: &HealthStatus) -> u8 {
    match status {
        HealthStatus::Healthy => 0,
        HealthStatus::Degraded(_) => 1,
        HealthStatus::Unhealthy(_) => 2,
    }
}

/// Worst status among enabled modules.
///
/// The reason lists every module at that worst level, in input order.
pub fn aggregate_status(modules: &[ModuleHealth]) -> HealthStatus {
    let enabled: Vec<&ModuleHealth> = modules.iter().filter(|m| m.enabled).collect();
    let worst = enabled.iter().map(|m| rank(&m.status)).max().unwrap_or(0);

    let reasons = enabled
        .iter()
        .filter(|m| rank(&m.status) == worst)
        .filter_map(|m| match &m.status {
            HealthStatus::Healthy => None,
            HealthStatus::Degraded(r) | HealthStatus::Unhealthy(r) => {
                Some(format!("{}: {}", m.name, r))
            }
        })
        .collect::<Vec<_>>()
        .join("; ");

    match worst {
        0 => HealthStatus::Healthy,
        1 => HealthStatus::Degraded(reasons),
        _ => HealthStatus::Unhealthy(reasons),
    }
}
