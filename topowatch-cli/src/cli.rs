//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};

/// topowatch -- network topology discovery and path analysis.
///
/// Every command works offline against the persisted topology in
/// `general.data_dir`. Use `topowatch <COMMAND> --help` for details.
#[derive(Parser, Debug)]
#[command(name = "topowatch", version, about, long_about = None)]
pub struct Cli {
    /// Path to the topowatch.toml configuration file.
    #[arg(short, long, default_value = "topowatch.toml", global = true)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage configuration.
    Config(ConfigArgs),

    /// Summarize the persisted topology and daemon liveness.
    Status,

    /// Ingest neighbor records from a JSON fixture.
    Ingest(IngestArgs),

    /// List or register devices.
    Devices(DevicesArgs),

    /// Inspect and edit links.
    Links(LinksArgs),

    /// Find ranked paths between two devices.
    Paths(PathsArgs),

    /// Check reachability between two devices.
    Reach(ReachArgs),

    /// Drop invariant-violating state and resume writes after corruption.
    Repair,
}

// ---- config ----

/// Manage topowatch configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, discovery, scoring, analysis, store, metrics).
        #[arg(long)]
        section: Option<String>,
    },
}

// ---- ingest ----

/// Offline ingestion from a records fixture.
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// JSON fixture with neighbor records (flat list or keyed by device).
    #[arg(long)]
    pub records: PathBuf,

    /// Restrict ingestion to these devices (repeatable). Defaults to every device in the fixture.
    #[arg(long = "device", value_name = "ID")]
    pub devices: Vec<String>,
}

// ---- devices ----

#[derive(Args, Debug)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub action: DevicesAction,
}

#[derive(Subcommand, Debug)]
pub enum DevicesAction {
    /// List known devices.
    List,
    /// Register devices from an inventory file.
    Register {
        /// JSON inventory (a device list or `{ "devices": [...] }`).
        #[arg(long)]
        file: PathBuf,
    },
}

// ---- links ----

#[derive(Args, Debug)]
pub struct LinksArgs {
    #[command(subcommand)]
    pub action: LinksAction,
}

#[derive(Subcommand, Debug)]
pub enum LinksAction {
    /// List links.
    List {
        /// Only links flagged as conflicting.
        #[arg(long)]
        conflicting: bool,
    },
    /// Delete a link by id.
    Delete {
        /// Link id (`dev:if|dev:if`).
        id: String,
    },
    /// Add an operator-asserted link.
    Manual {
        a_device: String,
        a_interface: String,
        b_device: String,
        b_interface: String,
    },
    /// Resolve a conflicting link.
    Resolve(ResolveArgs),
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("resolution").required(true).args(["accept", "keep"])))]
pub struct ResolveArgs {
    /// Link id (`dev:if|dev:if`).
    pub id: String,

    /// Replace the recorded link with the reported one.
    #[arg(long)]
    pub accept: bool,

    /// Keep the recorded link and discard the report.
    #[arg(long)]
    pub keep: bool,
}

// ---- paths / reach ----

#[derive(Args, Debug)]
pub struct PathsArgs {
    /// Source device id.
    pub source: String,

    /// Destination device id.
    pub dest: String,

    /// Maximum number of paths (defaults to `analysis.default_k`).
    #[arg(short)]
    pub k: Option<usize>,

    /// Minimum link confidence (defaults to `analysis.min_confidence`).
    #[arg(long)]
    pub min_confidence: Option<f64>,

    /// Also compute paths over low-confidence links.
    #[arg(long)]
    pub degraded: bool,
}

#[derive(Args, Debug)]
pub struct ReachArgs {
    /// Source device id.
    pub source: String,

    /// Destination device id.
    pub dest: String,
}
