//! `topowatch ingest` command handler

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use topowatch_core::types::DeviceId;
use topowatch_discovery::{CycleReport, IngestOutcome, StaticAdapter};

use crate::cli::IngestArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};
use crate::workspace::{Workspace, ensure_daemon_stopped, load_config};

/// Execute the `ingest` command.
pub async fn execute(
    args: IngestArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = load_config(config_path).await?;
    ensure_daemon_stopped(&config)?;

    let adapter = StaticAdapter::from_fixture_file(&args.records).await?;
    let devices: Vec<DeviceId> = if args.devices.is_empty() {
        adapter.device_ids()
    } else {
        args.devices.iter().map(DeviceId::new).collect()
    };
    if devices.is_empty() {
        return Err(CliError::Ingest(format!(
            "{}: no device records to ingest",
            args.records.display()
        )));
    }

    let workspace = Workspace::open_with_adapter(config, adapter).await?;
    let report = ingest(&workspace, &devices, &args.records).await?;
    writer.render(&report)?;

    if report.failed > 0 {
        return Err(CliError::Ingest(format!(
            "{} of {} device(s) failed",
            report.failed,
            report.devices.len()
        )));
    }
    Ok(())
}

/// Run one discovery cycle over `devices` and persist the result.
pub async fn ingest(
    workspace: &Workspace,
    devices: &[DeviceId],
    source: &Path,
) -> Result<IngestReport, CliError> {
    info!(devices = devices.len(), source = %source.display(), "offline ingestion started");
    let cycle = workspace
        .discovery()
        .run_cycle_for(devices, &CancellationToken::new())
        .await;
    let saved_version = workspace.save().await?;

    let mut events: BTreeMap<String, usize> = BTreeMap::new();
    for event in workspace.drain_events() {
        *events.entry(event.kind.as_str().to_owned()).or_default() += 1;
    }
    Ok(IngestReport::new(source, &cycle, saved_version, events))
}

#[derive(Debug, Serialize)]
pub struct IngestReport {
    pub source: String,
    pub succeeded: usize,
    pub failed: usize,
    pub records: usize,
    pub saved_version: u64,
    pub devices: Vec<DeviceLine>,
    /// Raised event counts by kind.
    pub events: BTreeMap<String, usize>,
}

#[derive(Debug, Serialize)]
pub struct DeviceLine {
    pub device_id: String,
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub records: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub rejected: usize,
    pub links_changed: usize,
}

impl IngestReport {
    fn new(
        source: &Path,
        cycle: &CycleReport,
        saved_version: u64,
        events: BTreeMap<String, usize>,
    ) -> Self {
        let devices = cycle
            .devices
            .iter()
            .map(|r| {
                let (outcome, reason) = match &r.outcome {
                    IngestOutcome::Committed => ("committed", None),
                    IngestOutcome::Unchanged => ("unchanged", None),
                    IngestOutcome::AdapterFailed { reason } => {
                        ("adapter_failed", Some(reason.clone()))
                    }
                    IngestOutcome::StoreRejected { reason } => {
                        ("store_rejected", Some(reason.clone()))
                    }
                    IngestOutcome::Cancelled => ("cancelled", None),
                };
                DeviceLine {
                    device_id: r.device_id.to_string(),
                    outcome: outcome.to_owned(),
                    reason,
                    records: r.records,
                    resolved: r.resolved,
                    unresolved: r.unresolved,
                    rejected: r.rejected,
                    links_changed: r.links_changed,
                }
            })
            .collect();
        Self {
            source: source.display().to_string(),
            succeeded: cycle.succeeded(),
            failed: cycle.failed(),
            records: cycle.records(),
            saved_version,
            devices,
            events,
        }
    }
}

impl Render for IngestReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Ingest: {}", self.source.bold())?;
        writeln!(
            w,
            "{:<20} {:<16} {:>7} {:>8} {:>10} {:>6}",
            "Device", "Outcome", "Records", "Resolved", "Unresolved", "Links"
        )?;
        writeln!(w, "{}", "-".repeat(72))?;
        for d in &self.devices {
            let outcome = match d.outcome.as_str() {
                "committed" => d.outcome.green(),
                "unchanged" => d.outcome.normal(),
                _ => d.outcome.red(),
            };
            writeln!(
                w,
                "{:<20} {:<16} {:>7} {:>8} {:>10} {:>6}",
                d.device_id, outcome, d.records, d.resolved, d.unresolved, d.links_changed
            )?;
            if let Some(reason) = &d.reason {
                writeln!(w, "  {}", reason.dimmed())?;
            }
        }
        writeln!(w)?;
        writeln!(
            w,
            "{} succeeded, {} failed, {} record(s); saved snapshot v{}",
            self.succeeded, self.failed, self.records, self.saved_version
        )?;
        for (kind, count) in &self.events {
            writeln!(w, "  event {}: {}", kind.yellow(), count)?;
        }
        Ok(())
    }
}
