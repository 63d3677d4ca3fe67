//! `topowatch paths` command handler

use std::io::Write;
use std::path::Path as FsPath;
use std::sync::Arc;

use serde::Serialize;

use topowatch_analysis::{AnalysisEngineConfig, Path, PathResult, QueryApi};
use topowatch_core::types::DeviceId;
use topowatch_topology::TopologyStore;

use crate::cli::PathsArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render, confidence, speed};
use crate::workspace::{Workspace, load_config};

/// Execute the `paths` command.
pub async fn execute(
    args: PathsArgs,
    config_path: &FsPath,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = load_config(config_path).await?;
    let analysis = AnalysisEngineConfig::from_core(&config.analysis);
    let workspace = Workspace::open(config).await?;

    let result = find_paths(Arc::clone(workspace.store()), analysis, &args)?;
    writer.render(&PathReport(result))
}

/// Run a path query with CLI overrides applied to the configured defaults.
pub fn find_paths(
    store: Arc<TopologyStore>,
    config: AnalysisEngineConfig,
    args: &PathsArgs,
) -> Result<PathResult, CliError> {
    let api = QueryApi::new(store, config)?;
    let mut options = api.default_options();
    if let Some(k) = args.k {
        options.k = k;
    }
    if let Some(min) = args.min_confidence {
        options.min_confidence = min;
        options.degraded_min_confidence = options.degraded_min_confidence.min(min);
    }
    options.include_degraded = args.degraded;

    let source = DeviceId::new(args.source.as_str());
    let dest = DeviceId::new(args.dest.as_str());
    Ok(api.find_paths(&source, &dest, Some(options))?)
}

/// Text/JSON wrapper around a path query result.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct PathReport(pub PathResult);

fn write_path(w: &mut dyn Write, rank: usize, path: &Path) -> std::io::Result<()> {
    use colored::Colorize;

    writeln!(
        w,
        "#{} {} hop(s), bottleneck {}, min confidence {}",
        rank,
        path.hop_count(),
        speed(path.bottleneck_bps),
        confidence(path.min_confidence)
    )?;
    if path.hops.is_empty() {
        writeln!(w, "   {}", path.devices.first().map(|d| d.as_str()).unwrap_or("-"))?;
    }
    for hop in &path.hops {
        writeln!(
            w,
            "   {} -> {}  [{} {}]",
            hop.from.to_string().bold(),
            hop.to.to_string().bold(),
            confidence(hop.confidence),
            speed(hop.speed_bps)
        )?;
    }
    Ok(())
}

impl Render for PathReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let r = &self.0;
        writeln!(
            w,
            "Paths {} -> {} (snapshot v{})",
            r.source.as_str().bold(),
            r.dest.as_str().bold(),
            r.snapshot_version
        )?;
        if r.truncated {
            writeln!(w, "{}", "search truncated by timeout; results are partial".yellow())?;
        }
        for (i, path) in r.paths.iter().enumerate() {
            write_path(w, i + 1, path)?;
        }
        if !r.degraded.is_empty() {
            writeln!(w, "{}", "Degraded (low-confidence links):".yellow())?;
            for (i, path) in r.degraded.iter().enumerate() {
                write_path(w, i + 1, path)?;
            }
        }
        if r.paths.is_empty() && r.degraded.is_empty() {
            writeln!(w, "{}", "no path found".red())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_report_truncated_empty() {
        let report = PathReport(PathResult {
            source: DeviceId::new("a"),
            dest: DeviceId::new("c"),
            snapshot_version: 9,
            paths: Vec::new(),
            degraded: Vec::new(),
            truncated: true,
        });
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).unwrap();
        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("truncated"));
        assert!(output.contains("no path found"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["truncated"], true);
        assert_eq!(json["snapshot_version"], 9);
    }
}
