//! kube-ssh-auth sync daemon
//!
//! Mirrors labelled Kubernetes secrets into the local credential cache that
//! the login hook reads.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ksa_core::config::{self, ConfigFile, SyncConfig};
use ksa_core::FileStore;
use ksa_sync::{CycleOutcome, IntervalTicks, KubeSecretSource, SyncLoop};

#[derive(Parser)]
#[command(name = "ksa-sync")]
#[command(about = "Sync Kubernetes credential secrets into the local login cache")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "KSA_CONFIG")]
    config: Option<PathBuf>,

    /// Only sync secrets from this namespace (overrides config)
    #[arg(short, long, env = "KSA_NAMESPACE")]
    namespace: Option<String>,

    /// Label selector for credential secrets (overrides config)
    #[arg(short, long, env = "KSA_LABEL_SELECTOR")]
    label_selector: Option<String>,

    /// Seconds between sync cycles (overrides config)
    #[arg(short, long, env = "KSA_SYNC_INTERVAL")]
    interval: Option<u64>,

    /// Cache file to write (overrides config)
    #[arg(long, env = "KSA_CACHE_PATH")]
    cache_path: Option<PathBuf>,

    /// API server URL (overrides config and in-cluster discovery)
    #[arg(long, env = "KSA_API_SERVER")]
    api_server: Option<String>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn apply(&self, config: &mut SyncConfig) {
        if let Some(namespace) = &self.namespace {
            config.namespace = Some(namespace.clone());
        }
        if let Some(selector) = &self.label_selector {
            config.label_selector = selector.clone();
        }
        if let Some(secs) = self.interval {
            config.interval = Duration::from_secs(secs);
        }
        if let Some(path) = &self.cache_path {
            config.cache_path = path.clone();
        }
        if let Some(url) = &self.api_server {
            config.api_server = Some(url.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let file: ConfigFile = config::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;
    let mut config = file.sync;
    args.apply(&mut config);
    config.validate().context("Invalid sync configuration")?;

    tracing::info!(
        "kube-ssh-auth sync starting (selector: {}, namespace: {}, interval: {:?})",
        config.label_selector,
        config.namespace.as_deref().unwrap_or("<all>"),
        config.interval
    );

    let store = FileStore::open(&config.cache_path)
        .with_context(|| format!("Failed to open cache at {:?}", config.cache_path))?;
    let source = KubeSecretSource::from_config(&config)
        .context("Failed to set up Kubernetes API client")?;
    let sync = SyncLoop::new(Arc::new(source), Arc::new(store), config.fetch_timeout);

    if args.once {
        return Ok(match sync.run_cycle().await {
            CycleOutcome::Committed(_) => ExitCode::SUCCESS,
            _ => ExitCode::FAILURE,
        });
    }

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Setup signal handlers
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
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

        cancel_clone.cancel();
    });

    sync.run(IntervalTicks::new(config.interval), cancel).await;

    tracing::info!("Sync daemon shutdown complete");
    Ok(ExitCode::SUCCESS)
}
