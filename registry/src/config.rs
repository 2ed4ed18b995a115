//! Registry configuration.
//!
//! Layered the 12-factor way:
//! 1. Defaults (from code)
//! 2. Config file (`botnet.toml`)
//! 3. Environment variables (`BOTNET_*`, `__` for nesting), e.g.
//!    `BOTNET_SWEEP__INTERVAL_SECS=5`

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::{CONFIG_FILENAME, ENV_PREFIX};

/// Upper bound on ping nonce size.
pub const MAX_NONCE_BYTES: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found at path: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Failed to encode default configuration: {0}")]
    Defaults(#[from] serde_json::Error),

    #[error("Invalid configuration value: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotnetConfig {
    #[serde(default)]
    pub sweep: SweepConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

/// Keep-alive sweep settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Seconds between sweeps.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Random bytes per ping nonce (hex encoded on the wire).
    #[serde(default = "default_nonce_bytes")]
    pub nonce_bytes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Log every store mutation at debug level.
    #[serde(default)]
    pub trace_queries: bool,
}

fn default_interval_secs() -> u64 {
    30
}
fn default_nonce_bytes() -> usize {
    8
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            nonce_bytes: default_nonce_bytes(),
        }
    }
}

impl SweepConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl BotnetConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sweep.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sweep.interval_secs must be greater than 0".to_string(),
            ));
        }
        if !(1..=MAX_NONCE_BYTES).contains(&self.sweep.nonce_bytes) {
            return Err(ConfigError::Invalid(format!(
                "sweep.nonce_bytes must be between 1 and {MAX_NONCE_BYTES}, got {}",
                self.sweep.nonce_bytes
            )));
        }
        Ok(())
    }
}

/// Configuration loader with layered merging.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Merge defaults, the config file (if set) and `BOTNET_*` overrides,
    /// then validate.
    pub fn load(&self) -> Result<BotnetConfig> {
        let defaults = serde_json::to_string(&BotnetConfig::default())?;
        let mut builder =
            Config::builder().add_source(File::from_str(&defaults, FileFormat::Json));

        if let Some(ref path) = self.config_path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            builder = builder.add_source(File::from(path.as_path()));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: BotnetConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Look for a config file in:
    /// 1. `./botnet.toml`
    /// 2. `<config dir>/botnet/config.toml`
    pub fn find_config_file() -> Option<PathBuf> {
        let cwd_config = PathBuf::from(format!("./{CONFIG_FILENAME}"));
        if cwd_config.exists() {
            return Some(cwd_config);
        }

        let xdg_config = dirs::config_dir()?.join("botnet").join("config.toml");
        xdg_config.exists().then_some(xdg_config)
    }

    pub fn load_default() -> Result<BotnetConfig> {
        match Self::find_config_file() {
            Some(path) => Self::new().with_file(path).load(),
            None => Self::new().load(),
        }
    }
}
