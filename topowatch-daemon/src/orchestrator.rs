//! Daemon orchestration -- assembly, restore, and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `topowatch-daemon`.
//! It loads configuration, restores persisted topology, registers the
//! device inventory, wires the discovery engine into the plugin registry,
//! and runs background tasks until shutdown.
//!
//! # Startup
//!
//! 1. Load the snapshot table and publish it as the current snapshot
//! 2. Replay the ingestion log on top of it
//! 3. Register devices from the inventory file
//! 4. Start the discovery plugin (periodic cycles)
//! 5. Start the event journal, flush and uptime tasks
//!
//! # Shutdown
//!
//! 1. Stop the discovery plugin (in-flight cycle is cancelled)
//! 2. Flush the snapshot table and compact the ingestion log
//! 3. Stop background tasks (the journal drains queued events)
//! 4. Remove the PID file

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use topowatch_core::config::TopowatchConfig;
use topowatch_core::event::{ChannelEventSink, EventSink, TopologyEvent};
use topowatch_core::metrics as m;
use topowatch_core::plugin::PluginRegistry;
use topowatch_discovery::{
    DiscoveryEngine, DiscoveryEngineConfig, DiscoveryHandle, FileAdapter, load_inventory,
    register_inventory,
};
use topowatch_topology::{Persistence, TopologyConfig, TopologyStore};

use crate::events::{DEFAULT_JOURNAL_CAPACITY, EventJournal, spawn_event_journal};
use crate::health::{DaemonHealth, ModuleHealth, aggregate_status, store_health};
use crate::metrics_server;

/// Capacity of the event channel between the store/engine and the journal.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Interval between uptime gauge updates.
const UPTIME_UPDATE_INTERVAL: Duration = Duration::from_secs(10);

/// Summary of state recovered at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    /// Version of the restored snapshot table, if one was found.
    pub restored_version: Option<u64>,
    /// Ingestion log entries read.
    pub log_entries: usize,
    /// Log entries that changed the graph when replayed.
    pub replayed: usize,
    /// Inventory devices whose registration produced a new version.
    pub registered: usize,
}

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: TopowatchConfig,
    /// Registry of all plugins.
    plugins: PluginRegistry,
    /// The topology graph store.
    store: Arc<TopologyStore>,
    /// Snapshot table and ingestion log files.
    persistence: Arc<Persistence>,
    /// Handle to the discovery engine owned by the registry.
    discovery: DiscoveryHandle<FileAdapter>,
    /// Recent topology events.
    journal: Arc<EventJournal>,
    /// Receiving side of the event channel, taken by `run`.
    event_rx: Option<mpsc::Receiver<TopologyEvent>>,
    /// Event sink shared with the store and engine.
    sink: Arc<ChannelEventSink>,
    /// Cancels background tasks.
    cancel: CancellationToken,
    /// What startup recovered.
    restore: RestoreSummary,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration from `config_path` and build the orchestrator.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = TopowatchConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    ///
    /// Restores persisted state and registers the inventory, so the
    /// returned orchestrator already serves the recovered topology.
    pub async fn build_from_config(config: TopowatchConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let sink = Arc::new(ChannelEventSink::new(event_tx));
        let events: Arc<dyn EventSink> = sink.clone();

        let store = Arc::new(TopologyStore::new(
            TopologyConfig::from_core(&config),
            Arc::clone(&events),
        ));
        let persistence = Arc::new(Persistence::new(
            &config.general.data_dir,
            config.store.ingestion_log,
        ));
        let cancel = CancellationToken::new();

        let engine_config = DiscoveryEngineConfig::from_core(&config.discovery);
        let engine = DiscoveryEngine::builder()
            .config(engine_config)
            .adapter(Arc::new(FileAdapter::new(&config.discovery.records_dir)))
            .store(Arc::clone(&store))
            .events(events)
            .ingestion_log(persistence.log())
            .cancel_token(cancel.child_token())
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build discovery engine: {}", e))?;
        let discovery = engine.handle();

        let mut restore = restore_state(&store, &persistence, &discovery).await?;

        if !config.discovery.inventory_file.is_empty() {
            let devices = load_inventory(&config.discovery.inventory_file)
                .await
                .map_err(|e| anyhow::anyhow!("failed to load inventory: {}", e))?;
            match register_inventory(&store, devices) {
                Ok(changed) => restore.registered = changed,
                Err(e) => tracing::error!(error = %e, "inventory registration stopped"),
            }
        }

        let mut plugins = PluginRegistry::new();
        plugins.register(Box::new(engine))?;

        tracing::info!(
            total_plugins = plugins.count(),
            version = store.version(),
            devices = store.snapshot().device_count(),
            links = store.snapshot().link_count(),
            "orchestrator initialized"
        );

        if config.metrics.enabled {
            record_daemon_metrics(plugins.count());
        }

        Ok(Self {
            config,
            plugins,
            store,
            persistence,
            discovery,
            journal: Arc::new(EventJournal::new(DEFAULT_JOURNAL_CAPACITY)),
            event_rx: Some(event_rx),
            sink,
            cancel,
            restore,
            start_time: Instant::now(),
        })
    }

    /// Start all plugins and run until SIGTERM or SIGINT.
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(wait_for_shutdown_signal()).await
    }

    /// Start all plugins and run until `shutdown` resolves.
    ///
    /// `shutdown` yields the name of the trigger, used only for logging.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = Result<&'static str>>,
    {
        let pid_file = self.pid_file().map(Path::to_path_buf);
        if let Some(path) = &pid_file {
            write_pid_file(path)?;
        }

        let journal_task = self.event_rx.take().map(|rx| {
            spawn_event_journal(rx, Arc::clone(&self.journal), self.cancel.child_token())
        });

        if let Err(e) = self.start_plugins().await {
            self.cancel.cancel();
            if let Some(task) = journal_task {
                let _ = task.await;
            }
            if let Some(path) = &pid_file {
                remove_pid_file(path);
            }
            return Err(e);
        }

        let mut tasks: Vec<JoinHandle<()>> = Vec::new();
        if self.config.store.flush_interval_secs > 0 {
            tasks.push(spawn_flusher(
                Arc::clone(&self.persistence),
                Arc::clone(&self.store),
                Duration::from_secs(self.config.store.flush_interval_secs),
                self.cancel.child_token(),
            ));
        }
        if self.config.metrics.enabled {
            tasks.push(spawn_uptime_updater(
                self.start_time,
                self.cancel.child_token(),
            ));
        }

        tracing::info!("entering main loop");
        let trigger = shutdown.await;
        match &trigger {
            Ok(name) => tracing::info!(signal = name, "shutdown requested"),
            Err(e) => tracing::error!(error = %e, "shutdown trigger failed, stopping"),
        }

        let stopped = self.shutdown().await;

        self.cancel.cancel();
        for task in tasks {
            let _ = task.await;
        }
        if let Some(task) = journal_task {
            let _ = task.await;
        }
        if self.sink.dropped_count() > 0 {
            tracing::warn!(
                dropped = self.sink.dropped_count(),
                "events dropped because the journal channel was full"
            );
        }

        if let Some(path) = &pid_file {
            remove_pid_file(path);
        }
        trigger.map(|_| ())?;
        stopped
    }

    async fn start_plugins(&mut self) -> Result<()> {
        tracing::info!("initializing all plugins");
        self.plugins.init_all().await?;

        tracing::info!("starting all plugins");
        self.plugins.start_all().await?;
        Ok(())
    }

    /// Stop all plugins and flush the snapshot table.
    ///
    /// A flush failure is reported after the plugins are stopped.
    async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("stopping all plugins");
        let stopped = self.plugins.stop_all().await;
        let flushed = self.persistence.flush(&self.store).await;
        if let Err(e) = &flushed {
            tracing::error!(error = %e, "final snapshot flush failed");
        }
        stopped?;
        flushed?;
        Ok(())
    }

    /// Current aggregated health.
    pub async fn health(&self) -> DaemonHealth {
        let mut modules: Vec<ModuleHealth> = self
            .plugins
            .health_check_all()
            .await
            .into_iter()
            .map(|plugin| ModuleHealth {
                name: plugin.name,
                enabled: true,
                status: plugin.status,
            })
            .collect();
        modules.push(store_health(&self.store));

        let uptime_secs = self.start_time.elapsed().as_secs();
        if self.config.metrics.enabled {
            #[allow(clippy::cast_precision_loss)]
            metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);
        }

        DaemonHealth {
            status: aggregate_status(&modules),
            uptime_secs,
            snapshot_version: self.store.version(),
            modules,
            events: self.journal.stats(),
        }
    }

    /// Loaded configuration.
    pub fn config(&self) -> &TopowatchConfig {
        &self.config
    }

    /// The topology store.
    pub fn store(&self) -> &Arc<TopologyStore> {
        &self.store
    }

    /// Handle to the discovery engine.
    pub fn discovery(&self) -> &DiscoveryHandle<FileAdapter> {
        &self.discovery
    }

    /// The recent-events journal.
    pub fn events(&self) -> &Arc<EventJournal> {
        &self.journal
    }

    /// What startup recovered.
    pub fn restore_summary(&self) -> RestoreSummary {
        self.restore
    }

    /// Number of registered plugins.
    pub fn plugin_count(&self) -> usize {
        self.plugins.count()
    }

    fn pid_file(&self) -> Option<&Path> {
        let path = self.config.general.pid_file.as_str();
        (!path.is_empty()).then(|| Path::new(path))
    }
}

/// Load the snapshot table and replay the ingestion log on top of it.
///
/// A corrupted table halts store writes but does not stop the daemon:
/// the recovered snapshot stays readable and replay is skipped.
async fn restore_state(
    store: &TopologyStore,
    persistence: &Persistence,
    discovery: &DiscoveryHandle<FileAdapter>,
) -> Result<RestoreSummary> {
    let mut summary = RestoreSummary::default();

    if let Some(table) = persistence.load_table().await? {
        match store.restore(table) {
            Ok(version) => summary.restored_version = Some(version),
            Err(e) if e.is_halt() => {
                tracing::error!(error = %e, "restored snapshot failed validation, writes halted");
                return Ok(summary);
            }
            Err(e) => return Err(e.into()),
        }
    } else {
        tracing::info!(
            path = %persistence.snapshot_path().display(),
            "no snapshot table found, starting empty"
        );
    }

    if let Some(log) = persistence.log() {
        let entries = log.read_all().await?;
        summary.log_entries = entries.len();
        match discovery.replay(&entries) {
            Ok(replayed) => summary.replayed = replayed,
            Err(e) => tracing::error!(error = %e, "ingestion log replay stopped"),
        }
    }
    Ok(summary)
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Write the current process PID to a file.
///
/// # Security
///
/// - `create_new(true)` creates the file atomically (no TOCTOU race)
/// - The created file must be a regular file (no symlink following)
/// - The parent directory is created with mode 0o700, the file with 0o600
pub fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            fs::DirBuilder::new()
                .mode(0o700)
                .recursive(true)
                .create(parent)?;
        }
        #[cfg(not(unix))]
        fs::create_dir_all(parent)?;
    }

    let pid = std::process::id();

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing_pid = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_owned());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing_pid.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    if !file.metadata()?.is_file() {
        let _ = fs::remove_file(path);
        return Err(anyhow::anyhow!(
            "PID file {} is not a regular file",
            path.display()
        ));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    writeln!(file, "{}", pid)?;
    tracing::info!(pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file. Logs a warning instead of failing.
pub fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove PID file");
    } else {
        tracing::info!(path = %path.display(), "PID file removed");
    }
}

/// Spawn the periodic snapshot flush.
///
/// A tick is skipped when the snapshot version has not moved since the
/// last successful flush.
fn spawn_flusher(
    persistence: Arc<Persistence>,
    store: Arc<TopologyStore>,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut flushed_version = None;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("snapshot flusher shutting down");
                    break;
                }
                _ = interval.tick() => {
                    let version = store.version();
                    if flushed_version == Some(version) {
                        continue;
                    }
                    match persistence.flush(&store).await {
                        Ok(v) => flushed_version = Some(v),
                        Err(e) => tracing::error!(error = %e, "periodic snapshot flush failed"),
                    }
                }
            }
        }
    })
}

/// Record daemon-level metrics (build info, plugins registered).
fn record_daemon_metrics(plugin_count: usize) {
    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    #[allow(clippy::cast_precision_loss)]
    metrics::gauge!(m::DAEMON_PLUGINS_REGISTERED).set(plugin_count as f64);
    tracing::debug!(
        plugin_count,
        version = env!("CARGO_PKG_VERSION"),
        "daemon metrics recorded"
    );
}

/// Spawn a task that keeps the uptime gauge fresh for scrapes.
fn spawn_uptime_updater(start_time: Instant, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(UPTIME_UPDATE_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS)
                        .set(start_time.elapsed().as_secs() as f64);
                }
            }
        }
    })
}
