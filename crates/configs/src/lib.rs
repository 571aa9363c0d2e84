//! # configs
//!
//! Layered application settings. Later layers override earlier ones:
//!
//! 1. built-in defaults
//! 2. `config/default.toml` (optional)
//! 3. `config/{GIVE_ENV}.toml` (optional)
//! 4. environment variables, e.g. `GIVE_SERVER__PORT=8080`
//!
//! Call [`load_dotenv`] before [`Settings::load`] so a `.env` file in the
//! working directory can feed the environment layer.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    pub backend: StoreBackend,
    pub url: Option<SecretString>,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
}

impl DatabaseSettings {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthSettings {
    pub jwt_secret: SecretString,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoteSettings {
    /// Enforce one counted vote per identity per poll.
    pub unique_voters: bool,
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl VoteSettings {
    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub format: LogFormat,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub votes: VoteSettings,
    pub log: LogSettings,
}

impl Settings {
    /// Loads files and environment, then validates the result.
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("GIVE_ENV").unwrap_or_else(|_| "local".into());
        let builder = defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                Environment::with_prefix("GIVE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        Self::build(builder)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.votes.max_attempts == 0 {
            return Err(ConfigError::Invalid("votes.max_attempts must be at least 1".into()));
        }
        if self.votes.max_backoff_ms < self.votes.base_backoff_ms {
            return Err(ConfigError::Invalid(
                "votes.max_backoff_ms must not be below votes.base_backoff_ms".into(),
            ));
        }
        if self.database.backend == StoreBackend::Postgres && self.database.url.is_none() {
            return Err(ConfigError::Invalid("database.url is required for postgres".into()));
        }
        if self.auth.jwt_secret.expose_secret().is_empty() {
            return Err(ConfigError::Invalid("auth.jwt_secret must be set".into()));
        }
        Ok(())
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(Config::builder()
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 5000)?
        .set_default("database.backend", "memory")?
        .set_default("database.max_connections", 10)?
        .set_default("database.acquire_timeout_ms", 3000)?
        .set_default("auth.jwt_secret", "")?
        .set_default("votes.unique_voters", true)?
        .set_default("votes.max_attempts", 5)?
        .set_default("votes.base_backoff_ms", 10)?
        .set_default("votes.max_backoff_ms", 200)?
        .set_default("log.format", "json")?
        .set_default("log.filter", "info,tower_http=info")?)
}

/// Loads the nearest `.env` into the process environment. Returns its path so
/// the caller can log it once logging is up.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}

/// Like [`load_dotenv`] for an explicit file.
pub fn load_dotenv_from(path: &Path) -> Option<PathBuf> {
    dotenvy::from_path(path).ok().map(|()| path.to_path_buf())
}
