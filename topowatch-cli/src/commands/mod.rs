//! Command handlers -- one module per subcommand

pub mod config;
pub mod devices;
pub mod ingest;
pub mod links;
pub mod paths;
pub mod reach;
pub mod repair;
pub mod status;

use std::io::Write;

use serde::Serialize;
use topowatch_topology::CommitOutcome;

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Run the parsed command line.
pub async fn dispatch(cli: Cli, writer: &OutputWriter) -> Result<(), CliError> {
    let config_path = cli.config.as_path();
    match cli.command {
        Commands::Config(args) => config::execute(args, config_path, writer).await,
        Commands::Status => status::execute(config_path, writer).await,
        Commands::Ingest(args) => ingest::execute(args, config_path, writer).await,
        Commands::Devices(args) => devices::execute(args, config_path, writer).await,
        Commands::Links(args) => links::execute(args, config_path, writer).await,
        Commands::Paths(args) => paths::execute(args, config_path, writer).await,
        Commands::Reach(args) => reach::execute(args, config_path, writer).await,
        Commands::Repair => repair::execute(config_path, writer).await,
    }
}

/// Result of a single graph mutation.
#[derive(Debug, Serialize)]
pub struct MutationReport {
    pub action: String,
    pub target: String,
    pub changed: bool,
    pub version: u64,
    pub links_changed: usize,
    /// Version written to the snapshot table.
    pub saved_version: u64,
}

impl MutationReport {
    pub(crate) fn new(
        action: &str,
        target: impl Into<String>,
        outcome: &CommitOutcome,
        saved_version: u64,
    ) -> Self {
        Self {
            action: action.to_owned(),
            target: target.into(),
            changed: outcome.changed,
            version: outcome.version,
            links_changed: outcome.links_changed,
            saved_version,
        }
    }
}

impl Render for MutationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let state = if self.changed {
            "applied".green().bold()
        } else {
            "no change".yellow()
        };
        writeln!(w, "{} {}: {}", self.action.bold(), self.target, state)?;
        writeln!(
            w,
            "  version {} ({} link(s) changed), saved as {}",
            self.version, self.links_changed, self.saved_version
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(changed: bool) -> CommitOutcome {
        CommitOutcome {
            version: 7,
            changed,
            links_changed: usize::from(changed),
            retries: 0,
        }
    }

    #[test]
    fn test_mutation_report_text() {
        let report = MutationReport::new("delete", "a:eth1|b:eth1", &outcome(true), 7);
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).unwrap();
        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("a:eth1|b:eth1"));
        assert!(output.contains("applied"));
        assert!(output.contains("version 7"));
    }

    #[test]
    fn test_mutation_report_unchanged() {
        let report = MutationReport::new("manual", "a:eth1|b:eth1", &outcome(false), 7);
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).unwrap();
        assert!(String::from_utf8(buffer).unwrap().contains("no change"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["changed"], false);
        assert_eq!(json["saved_version"], 7);
    }
}
