//! `topowatch status` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use topowatch_core::types::DeviceStatus;
use topowatch_topology::TopologySnapshot;

use crate::error::CliError;
use crate::output::{OutputWriter, Render};
use crate::workspace::{Workspace, daemon_pid, load_config};

/// Execute the `status` command.
pub async fn execute(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    let config = load_config(config_path).await?;
    let daemon = daemon_pid(&config.general.pid_file);
    let workspace = Workspace::open(config).await?;

    let report = build_status_report(&workspace, daemon);
    writer.render(&report)
}

fn build_status_report(workspace: &Workspace, daemon_pid: Option<u32>) -> StatusReport {
    let snapshot = workspace.store().snapshot();
    StatusReport {
        daemon_running: daemon_pid.is_some(),
        daemon_pid,
        data_dir: workspace.config().general.data_dir.clone(),
        restored_version: workspace.restored_version(),
        log_entries: workspace.log_entries(),
        halted: workspace.store().halted_reason(),
        topology: TopologySummary::from_snapshot(&snapshot),
    }
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub daemon_running: bool,
    pub daemon_pid: Option<u32>,
    pub data_dir: String,
    /// Version stored in the snapshot table (before log replay).
    pub restored_version: Option<u64>,
    pub log_entries: usize,
    /// Reason writes are halted, if the persisted state is corrupted.
    pub halted: Option<String>,
    pub topology: TopologySummary,
}

/// Counts over one snapshot.
#[derive(Debug, Serialize)]
pub struct TopologySummary {
    pub version: u64,
    pub devices: usize,
    pub devices_up: usize,
    pub links: usize,
    pub links_up: usize,
    pub conflicts: usize,
    pub unresolved: usize,
}

impl TopologySummary {
    pub fn from_snapshot(snapshot: &TopologySnapshot) -> Self {
        Self {
            version: snapshot.version(),
            devices: snapshot.device_count(),
            devices_up: snapshot
                .devices()
                .filter(|d| d.status == DeviceStatus::Up)
                .count(),
            links: snapshot.link_count(),
            links_up: snapshot.links().filter(|l| l.is_up).count(),
            conflicts: snapshot.conflicts().count(),
            unresolved: snapshot.unresolved_count(),
        }
    }
}

impl Render for StatusReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        match self.daemon_pid {
            Some(pid) => writeln!(w, "Daemon: {} (pid {})", "running".green().bold(), pid)?,
            None => writeln!(w, "Daemon: {}", "not running".yellow().bold())?,
        }
        writeln!(w, "Data dir: {}", self.data_dir)?;
        let restored = self
            .restored_version
            .map(|v| v.to_string())
            .unwrap_or_else(|| "none".to_owned());
        writeln!(
            w,
            "Snapshot: v{} (table v{}, {} log entries)",
            self.topology.version, restored, self.log_entries
        )?;
        if let Some(reason) = &self.halted {
            writeln!(w, "Store: {} {}", "HALTED".red().bold(), reason.red())?;
        }

        writeln!(w)?;
        let t = &self.topology;
        writeln!(w, "{:<12} {:>8} {:>8}", "", "total", "up")?;
        writeln!(w, "{}", "-".repeat(30))?;
        writeln!(w, "{:<12} {:>8} {:>8}", "devices", t.devices, t.devices_up)?;
        writeln!(w, "{:<12} {:>8} {:>8}", "links", t.links, t.links_up)?;

        let conflicts = t.conflicts.to_string();
        let unresolved = t.unresolved.to_string();
        writeln!(
            w,
            "conflicts: {}  unresolved candidates: {}",
            if t.conflicts > 0 {
                conflicts.red()
            } else {
                conflicts.normal()
            },
            if t.unresolved > 0 {
                unresolved.yellow()
            } else {
                unresolved.normal()
            },
        )?;
        Ok(())
    }
}
