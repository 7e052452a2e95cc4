//! Daemon configuration.
//!
//! Loaded from an optional TOML file; every field has a default so an empty
//! file (or no file) yields a working in-place configuration. Command-line
//! flags are applied on top by `main`.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct KeelConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub log: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8887)),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Directory holding `keel.redb`.
    pub data_dir: PathBuf,
    /// Keep state in memory only; nothing survives a restart.
    pub in_memory: bool,
    /// Deadline for a single store call.
    pub timeout_ms: u64,
}

impl StoreConfig {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("keel.redb")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/keel"),
            in_memory: false,
            timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence when set.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,keeld=debug,keel_api=debug".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl KeelConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(raw)?;
        if config.store.timeout_ms == 0 {
            anyhow::bail!("store.timeout_ms must be greater than zero");
        }
        Ok(config)
    }
}
