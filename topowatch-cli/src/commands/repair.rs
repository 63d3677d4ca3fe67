//! `topowatch repair` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::warn;

use crate::error::CliError;
use crate::output::{OutputWriter, Render};
use crate::workspace::{Workspace, ensure_daemon_stopped, load_config};

/// Execute the `repair` command.
pub async fn execute(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    let config = load_config(config_path).await?;
    ensure_daemon_stopped(&config)?;
    let workspace = Workspace::open(config).await?;
    let report = repair(&workspace).await?;
    writer.render(&report)
}

/// Clear corruption and persist the cleaned snapshot.
///
/// A healthy store is left untouched and nothing is written.
pub async fn repair(workspace: &Workspace) -> Result<RepairReport, CliError> {
    let Some(reason) = workspace.store().halted_reason() else {
        return Ok(RepairReport {
            was_halted: None,
            dropped: Vec::new(),
            saved_version: None,
        });
    };
    let dropped = workspace.store().clear_corruption()?;
    for item in &dropped {
        warn!(item = %item, "dropped during repair");
    }
    let saved = workspace.save().await?;
    Ok(RepairReport {
        was_halted: Some(reason),
        dropped,
        saved_version: Some(saved),
    })
}

#[derive(Debug, Serialize)]
pub struct RepairReport {
    pub was_halted: Option<String>,
    pub dropped: Vec<String>,
    pub saved_version: Option<u64>,
}

impl Render for RepairReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let Some(reason) = &self.was_halted else {
            return writeln!(w, "Store: {} (nothing to repair)", "healthy".green());
        };
        writeln!(w, "Store was halted: {}", reason.red())?;
        for item in &self.dropped {
            writeln!(w, "  dropped {}", item)?;
        }
        if let Some(version) = self.saved_version {
            writeln!(w, "Writes resumed; saved snapshot v{}", version)?;
        }
        Ok(())
    }
}
