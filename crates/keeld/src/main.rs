//! keeld - the Keel desired-state daemon.
//!
//! Opens the redb state store and serves the desired LRP and task API.
//!
//! # Usage
//!
//! ```text
//! keeld serve --config /etc/keel/keel.toml
//! keeld serve --listen 127.0.0.1:8887 --in-memory
//! ```

mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use keel_api::{ApiState, build_router};
use keel_state::StateStore;

use crate::config::{KeelConfig, LogFormat, LoggingConfig};

#[derive(Parser)]
#[command(name = "keeld", about = "Keel desired-state daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the desired-state API.
    Serve {
        /// TOML configuration file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Address to listen on (overrides `server.listen`).
        #[arg(long)]
        listen: Option<SocketAddr>,

        /// Data directory for persistent state (overrides `store.data_dir`).
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Keep all state in memory.
        #[arg(long)]
        in_memory: bool,

        /// Log output format (overrides `log.format`).
        #[arg(long, value_enum)]
        log_format: Option<LogFormat>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            listen,
            data_dir,
            in_memory,
            log_format,
        } => {
            let mut config = match config {
                Some(path) => KeelConfig::load(&path)?,
                None => KeelConfig::default(),
            };
            if let Some(listen) = listen {
                config.server.listen = listen;
            }
            if let Some(data_dir) = data_dir {
                config.store.data_dir = data_dir;
            }
            if in_memory {
                config.store.in_memory = true;
            }
            if let Some(format) = log_format {
                config.log.format = format;
            }

            init_tracing(&config.log)?;
            serve(config).await
        }
    }
}

fn init_tracing(log: &LoggingConfig) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&log.filter)?,
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

async fn serve(config: KeelConfig) -> anyhow::Result<()> {
    info!("keel daemon starting");

    let store = if config.store.in_memory {
        info!("state store is in memory");
        StateStore::open_in_memory()?
    } else {
        std::fs::create_dir_all(&config.store.data_dir)?;
        let db_path = config.store.db_path();
        let store = StateStore::open(&db_path)?;
        info!(path = ?db_path, "state store opened");
        store
    };

    let state = ApiState::new(Arc::new(store)).with_store_timeout(config.store.timeout());
    let router = build_router(state);

    let addr = config.server.listen;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, timeout_ms = config.store.timeout_ms, "API server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("keel daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => error!(error = %e, "failed to listen for shutdown signal"),
    }
}
