//! kube-ssh-auth session exporter

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ksa_core::config::{self, ConfigFile, ExporterConfig};
use ksa_exporter::{run_refresh, serve, SessionGauge};

#[derive(Parser)]
#[command(name = "ksa-exporter")]
#[command(about = "Export the active SSH session count for Prometheus")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "KSA_CONFIG")]
    config: Option<PathBuf>,

    /// Authentication log to scan (overrides config)
    #[arg(long, env = "KSA_AUTH_LOG")]
    log_path: Option<PathBuf>,

    /// Address to serve /metrics on (overrides config)
    #[arg(short, long, env = "KSA_METRICS_BIND")]
    bind: Option<String>,

    /// Seconds between log scans (overrides config)
    #[arg(short, long)]
    interval: Option<u64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn apply(&self, config: &mut ExporterConfig) {
        if let Some(path) = &self.log_path {
            config.log_path = path.clone();
        }
        if let Some(bind) = &self.bind {
            config.bind_address = bind.clone();
        }
        if let Some(secs) = self.interval {
            config.interval = Duration::from_secs(secs);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let file: ConfigFile = config::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;
    let mut config = file.exporter;
    args.apply(&mut config);
    config.validate().context("Invalid exporter configuration")?;

    let listener = TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;

    tracing::info!(
        "kube-ssh-auth exporter starting (log: {:?}, interval: {:?})",
        config.log_path,
        config.interval
    );

    let gauge = Arc::new(SessionGauge::new());
    let cancel = CancellationToken::new();

    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        cancel_clone.cancel();
    });

    let refresh = tokio::spawn(run_refresh(
        config.log_path.clone(),
        config.interval,
        gauge.clone(),
        cancel.clone(),
    ));

    serve(listener, gauge, cancel.clone())
        .await
        .context("Metrics server failed")?;

    cancel.cancel();
    if let Err(e) = refresh.await {
        tracing::warn!("Session refresh task ended abnormally: {}", e);
    }

    tracing::info!("Exporter shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
