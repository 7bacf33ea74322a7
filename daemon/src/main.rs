use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use sysmon_daemon::{
    cli::Args,
    collector::LinuxMetricsProvider,
    config::Config,
    csv_log::CsvLog,
    sampler::{self, Sampler},
};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn load_config(args: &Args) -> Result<Config> {
    if let Some(path) = &args.config {
        return Config::load(path).with_context(|| format!("loading config {:?}", path));
    }
    let config_path = Config::config_path();
    if !config_path.exists() {
        info!("No config file found, using defaults");
        return Ok(Config::default());
    }
    Ok(Config::load(&config_path).unwrap_or_else(|e| {
        warn!("Failed to load config: {}, using defaults", e);
        Config::default()
    }))
}

async fn wait_for_shutdown() -> Result<()> {
    let mut sigterm = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.context("listening for Ctrl-C")?,
        _ = sigterm.recv() => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = load_config(&args)?.resolve(&args)?;

    // The only fatal runtime error: the log must be writable before sampling starts
    let log = Arc::new(
        CsvLog::open(&settings.log_file, settings.top_n)
            .with_context(|| format!("cannot open log file {:?}", settings.log_file))?,
    );

    let provider = LinuxMetricsProvider::new(&settings.disk_path);
    let sampler = Sampler::new(provider, Arc::clone(&log), settings.top_n).quiet(args.quiet);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(sampler::run(sampler, settings.interval, shutdown_rx));
    info!(
        "System monitor started. Logging to {:?}. Press Ctrl+C to stop.",
        log.path()
    );

    wait_for_shutdown().await?;
    info!("Received shutdown signal, stopping monitor...");
    let _ = shutdown_tx.send(true);

    let rows = worker.await.context("sampler task panicked")?;
    info!("System monitor stopped, {} rows written this run", rows);
    Ok(())
}
