//! Prometheus re-exporter for MediaMTX metrics.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use mediamtx_exporter::config::{AuthMode, LogFormat};
use mediamtx_exporter::{
    ExporterConfig, Fetcher, HttpServer, MetricFilter, RefreshScheduler, Refresher, SnapshotStore,
};

/// Prometheus re-exporter for MediaMTX metrics.
#[derive(Parser, Debug)]
#[command(name = "mediamtx-exporter")]
#[command(about = "Re-export MediaMTX metrics for Prometheus")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// MediaMTX metrics URL (overrides config).
    #[arg(long)]
    upstream_url: Option<String>,

    /// Authentication variant: "probe" or "external" (overrides config).
    #[arg(long)]
    auth: Option<AuthMode>,

    /// Log level (trace, debug, info, warn, error; overrides config).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };

    // Apply CLI overrides
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    if let Some(url) = args.upstream_url {
        config.upstream.url = Some(url);
    }
    if let Some(auth) = args.auth {
        config.upstream.auth = auth;
    }
    config.validate()?;

    // Initialize logging
    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    let log_level = level.parse().unwrap_or(Level::INFO);
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("mediamtx_exporter={}", log_level).parse()?)
        .add_directive(format!("hyper={}", Level::WARN).parse()?)
        .add_directive(format!("reqwest={}", Level::WARN).parse()?);

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }

    info!(
        upstream = config.upstream.url(),
        auth = ?config.upstream.auth,
        "Starting MediaMTX exporter"
    );

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Create components
    let store = Arc::new(SnapshotStore::new());
    let fetcher = Fetcher::new(&config.upstream)
        .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;
    let refresher = Arc::new(Refresher::new(
        fetcher,
        MetricFilter::new(&config.filters),
        store,
    ));

    let listen_addr: SocketAddr = config
        .server
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    let http_server = HttpServer::new(
        refresher.clone(),
        listen_addr,
        config.server.path.clone(),
        config.server.health_path.clone(),
    )
    .refresh_on_scrape(config.refresh.on_scrape);
    let scheduler = RefreshScheduler::new(refresher.clone(), &config.refresh);

    // Start background refresh
    let scheduler_task = tokio::spawn(scheduler.run(shutdown_rx.clone()));

    // Start HTTP server
    let http_shutdown = shutdown_rx.clone();
    let mut http_task = tokio::spawn(async move { http_server.run(http_shutdown).await });

    // Wait for shutdown signal, or for the server to fail on its own
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
        result = &mut http_task => {
            let _ = shutdown_tx.send(true);
            let _ = scheduler_task.await;
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    error!("HTTP server error: {}", e);
                    Err(e)
                }
                Err(e) => Err(anyhow::anyhow!("HTTP server task failed: {}", e)),
            };
        }
    }

    // Signal shutdown
    shutdown_tx.send(true)?;

    // Wait for tasks to complete
    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        let _ = scheduler_task.await;
        let _ = http_task.await;
    })
    .await;

    // Print final stats
    let stats = refresher.stats();
    info!(
        cycles = stats.cycles,
        successes = stats.successes,
        failures = stats.failures,
        coalesced = stats.coalesced,
        lines_skipped = stats.lines_skipped,
        "Final statistics"
    );

    info!("Exporter stopped");
    Ok(())
}

#[cfg(unix)]
async fn terminate() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
