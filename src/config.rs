//! Configuration management for Formguard.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{FormguardError, Result};
use crate::ratelimit::{Blocklist, Policy, DEFAULT_SWEEP_INTERVAL};

/// Prefix for environment overrides, e.g. `FORMGUARD__SERVER__BIND_ADDR`.
const ENV_PREFIX: &str = "FORMGUARD";

/// Main configuration for the Formguard service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Authoritative server-side limits
    #[serde(default)]
    pub limits: Policy,

    /// Limits the browser mirror runs with, served at `GET /api/limits`
    #[serde(default = "Policy::client_default")]
    pub client_limits: Policy,

    /// Background cleanup configuration
    #[serde(default)]
    pub sweeper: SweeperConfig,

    /// Identities that are always denied
    #[serde(default)]
    pub blocklist: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            limits: Policy::default(),
            client_limits: Policy::client_default(),
            sweeper: SweeperConfig::default(),
            blocklist: Vec::new(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP bind address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Sweeper configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperConfig {
    /// Seconds between sweep passes
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval(),
        }
    }
}

fn default_sweep_interval() -> u64 {
    DEFAULT_SWEEP_INTERVAL.as_secs()
}

impl SweeperConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl AppConfig {
    /// Load configuration from a YAML file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(yaml)
            .map_err(|e| FormguardError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an optional file, then apply
    /// `FORMGUARD__*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("blocklist")
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.limits
            .validate()
            .map_err(|e| FormguardError::Config(format!("limits: {}", e)))?;
        self.client_limits
            .validate()
            .map_err(|e| FormguardError::Config(format!("client_limits: {}", e)))?;
        if self.sweeper.interval_secs == 0 {
            return Err(FormguardError::Config(
                "sweeper.interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the blocklist described by this configuration.
    pub fn build_blocklist(&self) -> Blocklist {
        self.blocklist.iter().cloned().collect()
    }
}
