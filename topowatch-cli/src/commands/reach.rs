//! `topowatch reach` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use topowatch_analysis::{AnalysisEngineConfig, QueryApi, ReachabilityReport, Verdict};
use topowatch_core::types::DeviceId;

use crate::cli::ReachArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};
use crate::workspace::{Workspace, load_config};

/// Execute the `reach` command.
///
/// The report is always rendered; an unreachable verdict then exits non-zero.
pub async fn execute(
    args: ReachArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = load_config(config_path).await?;
    let analysis = AnalysisEngineConfig::from_core(&config.analysis);
    let workspace = Workspace::open(config).await?;

    let api = QueryApi::new(std::sync::Arc::clone(workspace.store()), analysis)?;
    let report = api
        .check_reachability(&DeviceId::new(args.source.as_str()), &DeviceId::new(args.dest.as_str()))
        .await?;
    writer.render(&ReachReport(report.clone()))?;

    match report.verdict {
        Verdict::UnreachableAt { hop } => Err(CliError::Query(format!(
            "{} cannot reach {} (stopped at {})",
            report.source, report.dest, hop
        ))),
        Verdict::Reachable | Verdict::Degraded => Ok(()),
    }
}

/// Text/JSON wrapper around a reachability report.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ReachReport(pub ReachabilityReport);

impl Render for ReachReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let r = &self.0;
        let verdict = r.verdict.to_string();
        let verdict = match r.verdict {
            Verdict::Reachable => verdict.green().bold(),
            Verdict::Degraded => verdict.yellow().bold(),
            Verdict::UnreachableAt { .. } => verdict.red().bold(),
        };
        writeln!(
            w,
            "{} -> {}: {} (snapshot v{})",
            r.source, r.dest, verdict, r.snapshot_version
        )?;
        for factor in &r.factors {
            writeln!(w, "  - {}", factor)?;
        }
        if let Some(path) = &r.path {
            let route: Vec<&str> = path.devices.iter().map(|d| d.as_str()).collect();
            writeln!(w, "  path: {}", route.join(" -> ").dimmed())?;
        }
        Ok(())
    }
}
