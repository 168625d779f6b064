use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use config::{Config, ConfigBuilder, Environment, File, Source, builder::DefaultState};
use one_provider_google::{DEFAULT_API_BASE_URL, DEFAULT_TOKEN_URL, GoogleConfig};
use serde::Deserialize;

const DEFAULT_BIND: &str = "127.0.0.1:4096";
const DEFAULT_DATABASE_PATH: &str = "~/.local/share/one/one.db";
const DEFAULT_MAX_STALENESS_SECS: i64 = 300;

/// Server settings, layered: defaults, then the TOML file, then `ONE__*` env vars.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub bind: SocketAddr,
    database_path: String,
    pub google: GoogleConfig,
    pub assistant: AssistantSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantSettings {
    /// Re-sync before answering `get_events` when the last sync is older than this
    pub max_staleness_secs: u64,
}

/// Get the default config file path (~/.config/one/config.toml)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("one").join("config.toml"))
}

impl Settings {
    /// Load settings. An explicit `--config` path must exist; the default one may not.
    pub fn load(config_path: Option<&Path>, bind: Option<String>) -> Result<Self> {
        let file = match config_path {
            Some(path) => Some(File::from(path).required(true)),
            None => default_config_path().map(|path| File::from(path).required(false)),
        };

        Self::build(file, bind)
    }

    fn build<S>(file: Option<S>, bind: Option<String>) -> Result<Self>
    where
        S: Source + Send + Sync + 'static,
    {
        let mut builder = defaults()?;
        if let Some(file) = file {
            builder = builder.add_source(file);
        }

        builder
            .add_source(
                Environment::with_prefix("ONE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .set_override_option("bind", bind)?
            .build()
            .context("Failed to read configuration")?
            .try_deserialize::<Settings>()
            .context("Invalid configuration (google.client_id and google.client_secret are required)")?
            .validate()
    }

    fn validate(self) -> Result<Self> {
        let secs = self.assistant.max_staleness_secs;
        if staleness(secs).is_none() {
            bail!("Invalid configuration: assistant.max_staleness_secs = {secs} is out of range");
        }
        Ok(self)
    }

    /// Database location with `~` expanded.
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.database_path).into_owned())
    }

    pub fn max_staleness(&self) -> chrono::Duration {
        staleness(self.assistant.max_staleness_secs).unwrap_or(chrono::Duration::MAX)
    }
}

fn staleness(secs: u64) -> Option<chrono::Duration> {
    i64::try_from(secs).ok().and_then(chrono::Duration::try_seconds)
}

fn defaults() -> Result<ConfigBuilder<DefaultState>> {
    Ok(Config::builder()
        .set_default("bind", DEFAULT_BIND)?
        .set_default("database_path", DEFAULT_DATABASE_PATH)?
        .set_default("google.api_base_url", DEFAULT_API_BASE_URL)?
        .set_default("google.token_url", DEFAULT_TOKEN_URL)?
        .set_default("assistant.max_staleness_secs", DEFAULT_MAX_STALENESS_SECS)?)
}
