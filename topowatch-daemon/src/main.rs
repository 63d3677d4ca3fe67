use anyhow::Result;
use clap::Parser;

use topowatch_core::TopowatchConfig;
use topowatch_daemon::cli::DaemonCli;
use topowatch_daemon::logging::init_tracing;
use topowatch_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = TopowatchConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load {}: {}", cli.config.display(), e))?;
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;

    if cli.validate {
        println!("configuration OK: {}", cli.config.display());
        return Ok(());
    }

    init_tracing(&config.general)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "topowatch-daemon starting"
    );

    let mut orchestrator = Orchestrator::build_from_config(config).await?;
    let restore = orchestrator.restore_summary();
    tracing::info!(
        restored_version = ?restore.restored_version,
        log_entries = restore.log_entries,
        replayed = restore.replayed,
        registered = restore.registered,
        "topology state recovered"
    );

    orchestrator.run().await?;

    tracing::info!("topowatch-daemon shut down");
    Ok(())
}
