//! Configuration management for Midge
//!
//! Sources, lowest to highest priority:
//! - Hardcoded defaults
//! - ./config/midge.{yaml,toml,json}
//! - File named by the MIDGE_CONFIG env var
//! - Environment variables (e.g. MIDGE__SWARM__WARMUP_STEPS=20)

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure for Midge
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct MidgeConfig {
    #[serde(default)]
    pub swarm: SwarmConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl MidgeConfig {
    /// Load configuration from all layered sources and validate it.
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Self::set_defaults(Config::builder())?;

        builder = builder.add_source(File::with_name("./config/midge").required(false));

        if let Ok(config_path) = std::env::var("MIDGE_CONFIG") {
            builder = builder.add_source(File::with_name(&config_path).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix("MIDGE")
                .separator("__")
                .try_parsing(true),
        );

        let config: MidgeConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file path, on top of the defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: MidgeConfig = Self::set_defaults(Config::builder())?
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    fn set_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("swarm.warmup_steps", i64::from(DEFAULT_WARMUP_STEPS))?
            .set_default("swarm.cycle_ms", DEFAULT_CYCLE_MS as i64)?
            .set_default("swarm.keep_warmup_logs", false)?
            .set_default("output.dir", ".")?
            .set_default("output.pretty", true)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.swarm.warmup_steps == 0 {
            return Err(ConfigError::Message(
                "swarm.warmup_steps must be > 0".to_string(),
            ));
        }

        if self.swarm.cycle_ms == 0 || self.swarm.cycle_ms > 1000 {
            return Err(ConfigError::Message(
                "swarm.cycle_ms must be within 1..=1000".to_string(),
            ));
        }

        Ok(())
    }
}

const DEFAULT_WARMUP_STEPS: u32 = 10;
const DEFAULT_CYCLE_MS: u64 = 990;

/// Defaults applied to every swarm built with this configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SwarmConfig {
    /// Number of equal steps in the warm-up ramp
    pub warmup_steps: u32,

    /// Nominal length of one rate-limited tick, kept under one second
    /// to absorb scheduling overhead
    pub cycle_ms: u64,

    /// Prepend warm-up logs to the measured log collection
    pub keep_warmup_logs: bool,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            warmup_steps: DEFAULT_WARMUP_STEPS,
            cycle_ms: DEFAULT_CYCLE_MS,
            keep_warmup_logs: false,
        }
    }
}

impl SwarmConfig {
    pub fn cycle(&self) -> Duration {
        Duration::from_millis(self.cycle_ms)
    }
}

/// Where and how logs and reports are written
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    pub dir: PathBuf,

    /// Indent JSON output
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            pretty: true,
        }
    }
}
