//! kube-ssh-auth login hook
//!
//! Stdout carries only the hook protocol; logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ksa_auth::{authorized_keys, check_login, env_assignment, read_secret};
use ksa_core::config::{self, AuthConfig, ConfigFile};
use ksa_core::FileStore;

#[derive(Parser)]
#[command(name = "ksa-auth")]
#[command(author, version, about = "Check logins against the kube-ssh-auth credential cache")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "KSA_CONFIG")]
    config: Option<PathBuf>,

    /// Cache file to read (overrides config)
    #[arg(long, global = true, env = "KSA_CACHE_PATH")]
    cache_path: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a password read from stdin (pam_exec expose_authtok)
    Check {
        /// User to authenticate
        #[arg(short, long, env = "PAM_USER")]
        user: String,
    },

    /// Print cached public keys for a user (sshd AuthorizedKeysCommand)
    Keys {
        /// User to look up
        user: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| cli.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Every failure path denies
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let file: ConfigFile =
        config::load_or_default(cli.config.as_deref()).context("Failed to load configuration")?;
    let mut config: AuthConfig = file.auth;
    if let Some(path) = cli.cache_path {
        config.cache_path = path;
    }

    match cli.command {
        Commands::Check { user } => {
            let secret = read_secret(std::io::stdin().lock()).context("Failed to read secret")?;
            let decision = check_login(&config, &user, &secret);

            match env_assignment(&config, &decision) {
                Some(line) => {
                    println!("{}", line);
                    Ok(ExitCode::SUCCESS)
                }
                None => Ok(ExitCode::FAILURE),
            }
        }

        Commands::Keys { user } => {
            let store = FileStore::new(&config.cache_path);
            match authorized_keys(&store, &user) {
                Ok(keys) => {
                    for key in keys {
                        println!("{}", key);
                    }
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    tracing::info!("No keys for {}: {}", user, e);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}
