//! `topowatch devices` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use topowatch_core::types::Device;
use topowatch_discovery::{load_inventory, register_inventory};
use topowatch_topology::TopologySnapshot;

use crate::cli::{DevicesAction, DevicesArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};
use crate::workspace::{Workspace, ensure_daemon_stopped, load_config};

/// Execute the `devices` command.
pub async fn execute(
    args: DevicesArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = load_config(config_path).await?;
    match args.action {
        DevicesAction::List => {
            let workspace = Workspace::open(config).await?;
            writer.render(&DeviceList::from_snapshot(&workspace.store().snapshot()))
        }
        DevicesAction::Register { file } => {
            ensure_daemon_stopped(&config)?;
            let devices = load_inventory(&file).await?;
            let workspace = Workspace::open(config).await?;
            let report = register(&workspace, devices, &file).await?;
            writer.render(&report)
        }
    }
}

/// Register inventory devices and persist the result.
pub async fn register(
    workspace: &Workspace,
    devices: Vec<Device>,
    source: &Path,
) -> Result<RegisterReport, CliError> {
    let total = devices.len();
    let changed = register_inventory(workspace.store(), devices)?;
    let saved_version = workspace.save().await?;
    Ok(RegisterReport {
        source: source.display().to_string(),
        total,
        changed,
        saved_version,
    })
}

#[derive(Debug, Serialize)]
pub struct DeviceList {
    pub version: u64,
    pub devices: Vec<DeviceRow>,
}

#[derive(Debug, Serialize)]
pub struct DeviceRow {
    pub id: String,
    pub hostname: String,
    pub vendor: String,
    pub status: String,
    pub chassis_id: Option<String>,
    pub interfaces: usize,
    pub links: usize,
    pub last_seen: Option<String>,
}

impl DeviceList {
    pub fn from_snapshot(snapshot: &TopologySnapshot) -> Self {
        let devices = snapshot
            .devices()
            .map(|d| DeviceRow {
                id: d.id.to_string(),
                hostname: d.hostname.clone(),
                vendor: d.vendor.label().to_owned(),
                status: d.status.to_string(),
                chassis_id: d.chassis_id.clone(),
                interfaces: d.interfaces.len(),
                links: snapshot.links_of(&d.id).count(),
                last_seen: d.last_seen.map(|t| t.to_rfc3339()),
            })
            .collect();
        Self {
            version: snapshot.version(),
            devices,
        }
    }
}

impl Render for DeviceList {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "{:<20} {:<20} {:<10} {:<8} {:>5} {:>5}",
            "Device", "Hostname", "Vendor", "Status", "Ifs", "Links"
        )?;
        writeln!(w, "{}", "-".repeat(73))?;
        for d in &self.devices {
            let status = match d.status.as_str() {
                "up" => d.status.green(),
                "down" => d.status.red(),
                "warning" => d.status.yellow(),
                _ => d.status.dimmed(),
            };
            writeln!(
                w,
                "{:<20} {:<20} {:<10} {:<8} {:>5} {:>5}",
                d.id, d.hostname, d.vendor, status, d.interfaces, d.links
            )?;
        }
        writeln!(w)?;
        writeln!(w, "{} device(s) at snapshot v{}", self.devices.len(), self.version)?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterReport {
    pub source: String,
    pub total: usize,
    /// Registrations that produced a new version.
    pub changed: usize,
    pub saved_version: u64,
}

impl Render for RegisterReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Inventory: {}", self.source.bold())?;
        writeln!(
            w,
            "  {} device(s), {} changed; saved snapshot v{}",
            self.total, self.changed, self.saved_version
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_list_render_empty() {
        let list = DeviceList::from_snapshot(&TopologySnapshot::empty());
        let mut buffer = Vec::new();
        list.render_text(&mut buffer).unwrap();
        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("0 device(s)"));
    }

    #[test]
    fn test_register_report_json() {
        let report = RegisterReport {
            source: "inventory.json".to_owned(),
            total: 3,
            changed: 2,
            saved_version: 5,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["total"], 3);
        assert_eq!(json["changed"], 2);
    }
}
