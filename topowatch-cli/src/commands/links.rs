//! `topowatch links` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use topowatch_topology::{
    ConflictRecord, ConflictResolution, Endpoint, Link, LinkId, TopologySnapshot,
};

use crate::cli::{LinksAction, LinksArgs, ResolveArgs};
use crate::commands::MutationReport;
use crate::error::CliError;
use crate::output::{OutputWriter, Render, confidence, speed};
use crate::workspace::{Workspace, ensure_daemon_stopped, load_config};

/// Execute the `links` command.
pub async fn execute(
    args: LinksArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = load_config(config_path).await?;
    if !matches!(args.action, LinksAction::List { .. }) {
        ensure_daemon_stopped(&config)?;
    }
    let workspace = Workspace::open(config).await?;

    match args.action {
        LinksAction::List { conflicting } => writer.render(&LinkList::from_snapshot(
            &workspace.store().snapshot(),
            conflicting,
        )),
        LinksAction::Delete { id } => writer.render(&delete(&workspace, &id).await?),
        LinksAction::Manual {
            a_device,
            a_interface,
            b_device,
            b_interface,
        } => {
            let a = Endpoint::new(a_device, a_interface);
            let b = Endpoint::new(b_device, b_interface);
            writer.render(&manual(&workspace, &a, &b).await?)
        }
        LinksAction::Resolve(resolve_args) => {
            writer.render(&resolve(&workspace, &resolve_args).await?)
        }
    }
}

/// Delete a link and persist.
pub async fn delete(workspace: &Workspace, id: &str) -> Result<MutationReport, CliError> {
    let link_id = LinkId::new(id);
    let outcome = workspace.store().delete_link(&link_id)?;
    info!(link_id = %link_id, version = outcome.version, "link deleted");
    let saved = workspace.save().await?;
    Ok(MutationReport::new("delete", id, &outcome, saved))
}

/// Add an operator-asserted link and persist.
pub async fn manual(
    workspace: &Workspace,
    a: &Endpoint,
    b: &Endpoint,
) -> Result<MutationReport, CliError> {
    let outcome = workspace.store().add_manual_link(a, b)?;
    let link_id = LinkId::from_endpoints(a, b);
    info!(link_id = %link_id, version = outcome.version, "manual link added");
    let saved = workspace.save().await?;
    Ok(MutationReport::new("manual", link_id.as_str(), &outcome, saved))
}

/// Resolve a recorded conflict and persist.
pub async fn resolve(
    workspace: &Workspace,
    args: &ResolveArgs,
) -> Result<MutationReport, CliError> {
    let resolution = if args.accept {
        ConflictResolution::AcceptReported
    } else {
        ConflictResolution::KeepExisting
    };
    let link_id = LinkId::new(args.id.as_str());
    let outcome = workspace.store().resolve_conflict(&link_id, resolution)?;
    info!(link_id = %link_id, ?resolution, version = outcome.version, "conflict resolved");
    let saved = workspace.save().await?;
    let action = if args.accept { "accept" } else { "keep" };
    Ok(MutationReport::new(action, args.id.as_str(), &outcome, saved))
}

#[derive(Debug, Serialize)]
pub struct LinkList {
    pub version: u64,
    pub links: Vec<LinkRow>,
    /// Conflict records, listed only with `--conflicting`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<ConflictRecord>,
}

#[derive(Debug, Serialize)]
pub struct LinkRow {
    pub id: String,
    pub a: String,
    pub b: String,
    pub confidence: f64,
    pub is_up: bool,
    pub conflicting: bool,
    pub sources: Vec<String>,
    pub speed_bps: Option<u64>,
    pub last_seen: String,
}

impl From<&Link> for LinkRow {
    fn from(link: &Link) -> Self {
        Self {
            id: link.id.to_string(),
            a: link.a.to_string(),
            b: link.b.to_string(),
            confidence: link.confidence,
            is_up: link.is_up,
            conflicting: link.conflicting,
            sources: link.discovery_sources.iter().map(|p| p.to_string()).collect(),
            speed_bps: link.speed_bps,
            last_seen: link.last_seen.to_rfc3339(),
        }
    }
}

impl LinkList {
    pub fn from_snapshot(snapshot: &TopologySnapshot, conflicting_only: bool) -> Self {
        let links = snapshot
            .links()
            .filter(|l| !conflicting_only || l.conflicting)
            .map(|l| LinkRow::from(l.as_ref()))
            .collect();
        let conflicts = if conflicting_only {
            snapshot.conflicts().cloned().collect()
        } else {
            Vec::new()
        };
        Self {
            version: snapshot.version(),
            links,
            conflicts,
        }
    }
}

impl Render for LinkList {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "{:<44} {:>5} {:<5} {:>6} Sources",
            "Link", "Conf", "State", "Speed"
        )?;
        writeln!(w, "{}", "-".repeat(78))?;
        for l in &self.links {
            let state = if l.is_up { "up".green() } else { "down".red() };
            let id = if l.conflicting {
                format!("{} !", l.id).yellow()
            } else {
                l.id.normal()
            };
            writeln!(
                w,
                "{:<44} {:>5} {:<5} {:>6} {}",
                id,
                confidence(l.confidence),
                state,
                speed(l.speed_bps),
                l.sources.join(",")
            )?;
        }
        for c in &self.conflicts {
            writeln!(
                w,
                "  {} {}: recorded {} / reported {} by {} ({})",
                "conflict".red(),
                c.local,
                c.recorded_remote,
                c.reported_remote,
                c.reporter,
                c.protocol
            )?;
        }
        writeln!(w)?;
        writeln!(w, "{} link(s) at snapshot v{}", self.links.len(), self.version)?;
        Ok(())
    }
}
