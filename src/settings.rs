/// Engine configuration
///
/// Settings are layered: built-in defaults, then an optional TOML file, then
/// `RECOVERY_*` environment variables (nested keys use `__`, e.g.
/// `RECOVERY_BACKOFF__BASE_DELAY_MS=250`).
use crate::{EngineError, EngineResult};
use ::config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default number of strategy passes before escalation
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default recovery log capacity
pub const DEFAULT_LOG_CAPACITY: usize = 100;

/// Exponential backoff settings for the wait-and-retry strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    /// Delay before the first retry
    pub base_delay_ms: u64,

    /// Upper bound on any single delay
    pub max_delay_ms: u64,

    /// Random spread applied to each delay (0.0 - 1.0)
    pub jitter: f64,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            jitter: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Strategy passes allowed per failure identity before escalation
    pub max_attempts: u32,

    /// Recovery log entries retained (oldest evicted first)
    pub log_capacity: usize,

    /// Hex characters kept from the failure identity digest
    pub error_id_length: usize,

    pub backoff: BackoffSettings,

    /// Starting timeout for the timeout-doubling strategy
    pub default_timeout_ms: u64,

    /// Endpoint rotation list used by the endpoint-switching strategies
    pub endpoints: Vec<String>,

    /// Operation runs allowed by guarded execution
    pub guard_attempts: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            log_capacity: DEFAULT_LOG_CAPACITY,
            error_id_length: 32,
            backoff: BackoffSettings::default(),
            default_timeout_ms: 5000,
            endpoints: vec![
                "https://cloudflare-eth.com".to_string(),
                "https://rpc.ankr.com/eth".to_string(),
                "https://eth.llamarpc.com".to_string(),
            ],
            guard_attempts: 3,
        }
    }
}

impl RecoveryConfig {
    /// Environment variable prefix
    pub const ENV_PREFIX: &'static str = "RECOVERY";

    /// Load layered settings.
    ///
    /// An explicit `path` must exist; the platform default path is optional.
    pub fn load(path: Option<&Path>) -> EngineResult<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        match path {
            Some(explicit) => {
                builder = builder.add_source(File::from(explicit).required(true));
            }
            None => {
                if let Some(default_path) = Self::default_path() {
                    builder = builder.add_source(File::from(default_path).required(false));
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(Self::ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("endpoints"),
        );

        let settings: Self = builder.build()?.try_deserialize()?;
        settings.validate()?;

        tracing::debug!(
            max_attempts = settings.max_attempts,
            log_capacity = settings.log_capacity,
            endpoints = settings.endpoints.len(),
            "Configuration loaded"
        );

        Ok(settings)
    }

    /// Platform configuration file (e.g. `~/.config/recovery-chain/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "recovery-chain", "recovery-chain")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> EngineResult<()> {
        if self.max_attempts == 0 {
            return Err(EngineError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.log_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "log_capacity must be at least 1".to_string(),
            ));
        }
        if self.error_id_length == 0 {
            return Err(EngineError::InvalidConfig(
                "error_id_length must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.backoff.jitter) {
            return Err(EngineError::InvalidConfig(format!(
                "backoff.jitter must be within 0.0..=1.0, got {}",
                self.backoff.jitter
            )));
        }
        if self.backoff.base_delay_ms > self.backoff.max_delay_ms {
            return Err(EngineError::InvalidConfig(format!(
                "backoff.base_delay_ms ({}) exceeds backoff.max_delay_ms ({})",
                self.backoff.base_delay_ms, self.backoff.max_delay_ms
            )));
        }
        if self.guard_attempts == 0 {
            return Err(EngineError::InvalidConfig(
                "guard_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
