//! CLI argument definitions for topowatch-daemon.

use std::path::PathBuf;

use clap::Parser;

/// Topowatch network topology daemon.
///
/// Runs periodic neighbor discovery against the device inventory,
/// keeps the topology graph current, and persists it across restarts.
#[derive(Parser, Debug)]
#[command(name = "topowatch-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to topowatch.toml configuration file.
    #[arg(short, long, default_value = "/etc/topowatch/topowatch.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Override PID file path (takes precedence over config file).
    #[arg(long)]
    pub pid_file: Option<String>,

    /// Override the data directory holding the snapshot table and ingestion log.
    #[arg(long)]
    pub data_dir: Option<String>,
}

impl DaemonCli {
    /// Apply command-line overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut topowatch_core::TopowatchConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level.clone_from(level);
        }
        if let Some(format) = &self.log_format {
            config.general.log_format.clone_from(format);
        }
        if let Some(pid_file) = &self.pid_file {
            config.general.pid_file.clone_from(pid_file);
        }
        if let Some(data_dir) = &self.data_dir {
            config.general.data_dir.clone_from(data_dir);
        }
    }
}
