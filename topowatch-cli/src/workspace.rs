//! Offline access to the persisted topology
//!
//! A [`Workspace`] rebuilds the store from `general.data_dir` the same way the
//! daemon does on startup: load the snapshot table, then replay the ingestion
//! log. Commands that change the graph call [`Workspace::save`] afterwards so
//! the next reader (CLI or daemon) sees the result.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use topowatch_core::config::TopowatchConfig;
use topowatch_core::event::{EventSink, MemoryEventSink, TopologyEvent};
use topowatch_discovery::{DiscoveryEngine, DiscoveryEngineConfig, DiscoveryHandle, StaticAdapter};
use topowatch_topology::{Persistence, TopologyConfig, TopologyStore};

use crate::error::CliError;

/// Load the configuration file, applying env overrides and validation.
pub async fn load_config(path: &Path) -> Result<TopowatchConfig, CliError> {
    TopowatchConfig::load(path)
        .await
        .map_err(|e| CliError::Config(e.to_string()))
}

/// Persisted topology opened for offline reads and writes.
pub struct Workspace {
    config: TopowatchConfig,
    store: Arc<TopologyStore>,
    persistence: Persistence,
    discovery: DiscoveryHandle<StaticAdapter>,
    events: Arc<MemoryEventSink>,
    restored_version: Option<u64>,
    log_entries: usize,
}

impl Workspace {
    /// Open the data directory with an empty adapter.
    pub async fn open(config: TopowatchConfig) -> Result<Self, CliError> {
        Self::open_with_adapter(config, StaticAdapter::new()).await
    }

    /// Open the data directory, wiring `adapter` into the discovery path.
    ///
    /// A snapshot that fails validation is still installed for reads; the
    /// store stays halted and log replay is skipped.
    pub async fn open_with_adapter(
        config: TopowatchConfig,
        adapter: StaticAdapter,
    ) -> Result<Self, CliError> {
        let events = Arc::new(MemoryEventSink::new());
        let sink: Arc<dyn EventSink> = events.clone();
        let store = Arc::new(TopologyStore::new(
            TopologyConfig::from_core(&config),
            Arc::clone(&sink),
        ));
        let persistence = Persistence::new(&config.general.data_dir, config.store.ingestion_log);

        // Offline runs cover a subset of devices at arbitrary times, so the
        // staleness sweep is left to the daemon.
        let mut engine_config = DiscoveryEngineConfig::from_core(&config.discovery);
        engine_config.sweep_stale = false;
        let discovery = DiscoveryEngine::builder()
            .config(engine_config)
            .adapter(Arc::new(adapter))
            .store(Arc::clone(&store))
            .events(sink)
            .ingestion_log(persistence.log())
            .build()?
            .handle();

        let mut workspace = Self {
            config,
            store,
            persistence,
            discovery,
            events,
            restored_version: None,
            log_entries: 0,
        };
        workspace.restore().await?;
        Ok(workspace)
    }

    async fn restore(&mut self) -> Result<(), CliError> {
        if let Some(table) = self.persistence.load_table().await? {
            match self.store.restore(table) {
                Ok(version) => self.restored_version = Some(version),
                Err(e) if e.is_halt() => {
                    error!(error = %e, "persisted snapshot failed validation, writes halted");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            debug!(
                path = %self.persistence.snapshot_path().display(),
                "no snapshot table found"
            );
        }

        if let Some(log) = self.persistence.log() {
            let entries = log.read_all().await?;
            self.log_entries = entries.len();
            let replayed = self.discovery.replay(&entries)?;
            debug!(entries = entries.len(), replayed, "ingestion log replayed");
        }
        Ok(())
    }

    /// Write the snapshot table and compact the ingestion log.
    pub async fn save(&self) -> Result<u64, CliError> {
        let version = self.persistence.flush(&self.store).await?;
        info!(version, "topology saved");
        Ok(version)
    }

    /// Effective configuration.
    pub fn config(&self) -> &TopowatchConfig {
        &self.config
    }

    /// Topology store.
    pub fn store(&self) -> &Arc<TopologyStore> {
        &self.store
    }

    /// Discovery handle bound to the workspace adapter.
    pub fn discovery(&self) -> &DiscoveryHandle<StaticAdapter> {
        &self.discovery
    }

    /// Version loaded from the snapshot table, if any.
    pub fn restored_version(&self) -> Option<u64> {
        self.restored_version
    }

    /// Number of ingestion log entries replayed on open.
    pub fn log_entries(&self) -> usize {
        self.log_entries
    }

    /// Take the events raised since the last call.
    pub fn drain_events(&self) -> Vec<TopologyEvent> {
        self.events.drain()
    }
}

// ─── Daemon liveness ─────────────────────────────────────────────────

/// PID of a live daemon recorded in `pid_file`, if any.
pub fn daemon_pid(pid_file: &str) -> Option<u32> {
    if pid_file.is_empty() {
        return None;
    }
    let content = match std::fs::read_to_string(pid_file) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(pid_file, "pid file does not exist");
            return None;
        }
        Err(e) => {
            warn!(pid_file, error = %e, "failed to read pid file");
            return None;
        }
    };
    match content.trim().parse::<u32>() {
        Ok(pid) if is_process_alive(pid) => Some(pid),
        Ok(pid) => {
            debug!(pid_file, pid, "stale pid file");
            None
        }
        Err(e) => {
            warn!(pid_file, error = %e, "failed to parse pid");
            None
        }
    }
}

/// Refuse offline writes while the daemon owns the data directory.
pub fn ensure_daemon_stopped(config: &TopowatchConfig) -> Result<(), CliError> {
    match daemon_pid(&config.general.pid_file) {
        Some(pid) => Err(CliError::DaemonRunning { pid }),
        None => Ok(()),
    }
}

/// Check if a process with the given PID is alive.
#[cfg(unix)]
fn is_process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: kill(2) with signal 0 performs only the existence and permission check.
    let result = unsafe { libc::kill(pid, 0) };
    if result == 0 {
        true
    } else {
        // EPERM: the process exists but belongs to another user.
        std::io::Error::last_os_error().kind() == std::io::ErrorKind::PermissionDenied
    }
}

#[cfg(not(unix))]
fn is_process_alive(_pid: u32) -> bool {
    warn!("process liveness check not supported on this platform");
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daemon_pid_missing_file() {
        assert_eq!(daemon_pid("/nonexistent/topowatch.pid"), None);
        assert_eq!(daemon_pid(""), None);
    }

    #[test]
    fn test_daemon_pid_garbage_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topowatch.pid");
        std::fs::write(&path, "not-a-pid").unwrap();
        assert_eq!(daemon_pid(path.to_str().unwrap()), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_daemon_pid_detects_live_process() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topowatch.pid");
        std::fs::write(&path, std::process::id().to_string()).unwrap();
        assert_eq!(daemon_pid(path.to_str().unwrap()), Some(std::process::id()));

        let mut config = TopowatchConfig::default();
        config.general.pid_file = path.display().to_string();
        let err = ensure_daemon_stopped(&config).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[tokio::test]
    async fn test_open_empty_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = TopowatchConfig::default();
        config.general.data_dir = dir.path().display().to_string();

        let workspace = Workspace::open(config).await.unwrap();
        assert_eq!(workspace.restored_version(), None);
        assert_eq!(workspace.log_entries(), 0);
        assert_eq!(workspace.store().snapshot().device_count(), 0);
    }
}
