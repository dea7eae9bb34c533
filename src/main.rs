use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

use watchtower::collector;
use watchtower::config::Config;
use watchtower::scheduler::Scheduler;
use watchtower::sink::log::LogSink;
use watchtower::sink::statsd::StatsdSink;
use watchtower::sink::MetricSink;
use watchtower::types::MetricName;

#[derive(Parser, Debug)]
#[command(name = "watchtower", about = "Host metrics daemon reporting to StatsD")]
struct Cli {
    /// Path to configuration file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<String>,

    /// Validate config and exit
    #[arg(long)]
    check: bool,

    /// Print version and exit
    #[arg(short, long)]
    version: bool,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Log metrics instead of sending them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("watchtower {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if cli.check {
        println!("Configuration is valid.");
        return Ok(());
    }

    init_logging(&config)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        hostname = %config.agent.hostname,
        "Starting watchtower"
    );

    if let Err(e) = run(config, &cli).await {
        error!(error = %e, "Watchtower terminated with error");
        return Err(e);
    }

    Ok(())
}

fn init_logging(config: &Config) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(&config.agent.log_level)
        });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    Ok(())
}

/// Prefix for every metric: the configured one, or the sanitised hostname
fn metric_prefix(config: &Config) -> MetricName {
    match &config.sink.prefix {
        Some(prefix) => MetricName::new(prefix.split('.')),
        None => MetricName::host_prefix(&config.agent.hostname),
    }
}

async fn run(config: Config, cli: &Cli) -> Result<()> {
    let sink: Arc<dyn MetricSink> = if cli.dry_run {
        Arc::new(LogSink)
    } else {
        Arc::new(StatsdSink::connect(&config.sink, Some(metric_prefix(&config))).await?)
    };

    let collectors = collector::create_collectors(&config)?;
    let mut scheduler = Scheduler::new(collectors, sink.clone(), &config.scheduler);

    if cli.once {
        let timing = scheduler.run_cycle().await;
        info!(
            started_at = %timing.started_at,
            elapsed_ms = timing.elapsed.as_millis() as u64,
            "Single cycle complete"
        );
    } else {
        tokio::select! {
            _ = scheduler.run() => {}
            signal = shutdown_signal() => signal?,
        }
    }

    if let Err(e) = sink.close().await {
        warn!(error = %e, "Failed to close sink");
    }

    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    #[cfg(unix)]
    let terminate = terminate.recv();

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Option<()>>();

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Received Ctrl+C, exiting");
        }
        _ = terminate => info!("Received SIGTERM, exiting"),
    }
    Ok(())
}
