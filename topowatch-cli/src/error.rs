//! CLI-specific error types and exit code mapping

use topowatch_analysis::AnalysisError;
use topowatch_core::error::TopowatchError;
use topowatch_discovery::DiscoveryError;
use topowatch_topology::TopologyError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to standard Unix exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// The daemon owns the data directory; offline writes would race it.
    #[error("daemon is running (pid {pid}); stop it before modifying persisted topology")]
    DaemonRunning { pid: u32 },

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from topowatch-core.
    #[error("{0}")]
    Core(#[from] TopowatchError),

    /// Query produced no usable answer (unknown device, no path, unreachable).
    #[error("query error: {0}")]
    Query(String),

    /// The topology store refused a write or holds corrupted state.
    #[error("store error: {0}")]
    Store(String),

    /// Offline ingestion failed.
    #[error("ingest error: {0}")]
    Ingest(String),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                               |
    /// |------|---------------------------------------|
    /// | 0    | Success                               |
    /// | 1    | General / command error               |
    /// | 2    | Configuration error                   |
    /// | 3    | Daemon running, offline write refused |
    /// | 4    | No path / unreachable / unknown device|
    /// | 5    | Store halted or write rejected        |
    /// | 10   | IO error                              |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::DaemonRunning { .. } => 3,
            Self::Query(_) => 4,
            Self::Store(_) => 5,
            Self::Io(_) => 10,
            Self::JsonSerialize(_) | Self::Command(_) | Self::Core(_) | Self::Ingest(_) => 1,
        }
    }
}

impl From<TopologyError> for CliError {
    fn from(e: TopologyError) -> Self {
        match e {
            TopologyError::DeviceNotFound(_)
            | TopologyError::InterfaceNotFound { .. }
            | TopologyError::LinkNotFound(_)
            | TopologyError::NoConflict(_)
            | TopologyError::InvalidOperation(_) => Self::Command(e.to_string()),
            other => Self::Store(other.to_string()),
        }
    }
}

impl From<AnalysisError> for CliError {
    fn from(e: AnalysisError) -> Self {
        match e {
            AnalysisError::Config { .. } => Self::Config(e.to_string()),
            AnalysisError::Store(inner) => inner.into(),
            other => Self::Query(other.to_string()),
        }
    }
}

impl From<DiscoveryError> for CliError {
    fn from(e: DiscoveryError) -> Self {
        Self::Ingest(e.to_string())
    }
}
