//! `topowatch config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use topowatch_core::config::TopowatchConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Section names accepted by `config show --section`.
pub const SECTIONS: &[&str] = &["general", "discovery", "scoring", "analysis", "store", "metrics"];

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer).await,
        ConfigAction::Show { section } => execute_show(config_path, section, writer).await,
    }
}

/// Load and validate the configuration file, reporting any errors.
///
/// # Errors
///
/// Returns `CliError::Config` if the file is missing, malformed or invalid.
async fn execute_validate(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %config_path.display(), "validating configuration");

    let report = match TopowatchConfig::load(config_path).await {
        Ok(_) => ConfigValidationReport {
            source: config_path.display().to_string(),
            valid: true,
            errors: Vec::new(),
        },
        Err(e) => ConfigValidationReport {
            source: config_path.display().to_string(),
            valid: false,
            errors: vec![e.to_string()],
        },
    };

    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }
    Ok(())
}

/// Display the effective configuration (file + env overrides + defaults).
async fn execute_show(
    config_path: &Path,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), "loading configuration");

    let config = TopowatchConfig::load(config_path).await?;
    let report = build_config_report(&config, config_path, section.as_deref())?;
    writer.render(&report)
}

/// Serialize the whole configuration or a single section.
pub fn build_config_report(
    config: &TopowatchConfig,
    config_path: &Path,
    section: Option<&str>,
) -> Result<ConfigReport, CliError> {
    let serialized = match section {
        None => toml::to_string_pretty(config),
        Some("general") => toml::to_string_pretty(&config.general),
        Some("discovery") => toml::to_string_pretty(&config.discovery),
        Some("scoring") => toml::to_string_pretty(&config.scoring),
        Some("analysis") => toml::to_string_pretty(&config.analysis),
        Some("store") => toml::to_string_pretty(&config.store),
        Some("metrics") => toml::to_string_pretty(&config.metrics),
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {} (expected: {})",
                other,
                SECTIONS.join(", ")
            )));
        }
    };

    Ok(ConfigReport {
        source: config_path.display().to_string(),
        section: section.map(str::to_owned),
        config_toml: serialized.map_err(|e| CliError::Command(format!("serialization error: {e}")))?,
    })
}

/// Configuration display report.
///
/// The `config_toml` field is skipped during JSON serialization (only used for text rendering).
#[derive(Debug, Serialize)]
pub struct ConfigReport {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if let Some(ref section) = self.section {
            let section_label = format!("[{}]", section);
            writeln!(
                w,
                "Configuration {} (source: {})",
                section_label.bold(),
                self.source
            )?;
        } else {
            writeln!(w, "Configuration (source: {})", self.source.bold())?;
        }

        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;
        Ok(())
    }
}

/// Configuration validation report.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    pub source: String,
    pub valid: bool,
    /// Empty if valid.
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;
        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }
        Ok(())
    }
}
