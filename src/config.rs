use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::discovery::MAX_SUPPORTED_DEPTH;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub kgbridge: KgbridgeConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
}

/// General settings
#[derive(Debug, Clone, Deserialize)]
pub struct KgbridgeConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for KgbridgeConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Relationship source (remote query API) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Query endpoint; `subject`, `predicate` and `object` are sent as query parameters.
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Namespaces whose identifiers are too noisy to keep (e.g. allele registry ids).
    #[serde(default = "default_unreliable_namespaces")]
    pub unreliable_namespaces: Vec<String>,
    /// Predicates that carry too little information to connect entities.
    #[serde(default = "default_excluded_predicates")]
    pub excluded_predicates: Vec<String>,
}

/// Frontier expansion tuning
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_fan_out_cap")]
    pub fan_out_cap: usize,
    /// Maximum in-flight source queries during the parallel pass.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Sequential retry passes over queries that failed in the parallel pass.
    #[serde(default = "default_retry_passes")]
    pub retry_passes: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            fan_out_cap: default_fan_out_cap(),
            concurrency: default_concurrency(),
            retry_passes: default_retry_passes(),
            retry_delay_ms: default_retry_delay_ms(),
            cache_enabled: true,
        }
    }
}

/// Checkpoint persistence for long runs
#[derive(Debug, Clone, Deserialize)]
pub struct CheckpointConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_checkpoint_dir")]
    pub dir: PathBuf,
    /// Persist after this many expanded nodes.
    #[serde(default = "default_checkpoint_interval")]
    pub interval: usize,
    #[serde(default = "default_freshness_hours")]
    pub freshness_hours: u64,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_checkpoint_dir(),
            interval: default_checkpoint_interval(),
            freshness_hours: default_freshness_hours(),
        }
    }
}

impl CheckpointConfig {
    /// Maximum checkpoint age; saturates instead of overflowing.
    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.freshness_hours.saturating_mul(3600))
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_unreliable_namespaces() -> Vec<String> {
    vec!["CAID".to_string()]
}

fn default_excluded_predicates() -> Vec<String> {
    vec![
        "biolink:transcribed_from".to_string(),
        "biolink:transcribed_to".to_string(),
    ]
}

fn default_max_depth() -> usize {
    2
}

fn default_fan_out_cap() -> usize {
    50
}

fn default_concurrency() -> usize {
    5
}

fn default_retry_passes() -> usize {
    1
}

fn default_retry_delay_ms() -> u64 {
    1200
}

fn default_true() -> bool {
    true
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from(".kgbridge/checkpoints")
}

fn default_checkpoint_interval() -> usize {
    25
}

fn default_freshness_hours() -> u64 {
    24
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in KGBRIDGE_CONFIG environment variable
    /// 2. ./kgbridge.toml in current directory
    ///
    /// `KGBRIDGE_SOURCE_URL`, when set, overrides `source.base_url`.
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let config_path = std::env::var("KGBRIDGE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("kgbridge.toml"));

        let mut config = Self::from_path(&config_path)?;

        if let Ok(url) = std::env::var("KGBRIDGE_SOURCE_URL") {
            config.source.base_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a config file without consulting the environment.
    pub fn from_path(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&config_str)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Parse and validate TOML text.
    pub fn parse(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).context("Invalid TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        url::Url::parse(&self.source.base_url).with_context(|| {
            format!(
                "source.base_url is not a valid URL: '{}'",
                self.source.base_url
            )
        })?;

        if self.source.timeout_secs == 0 {
            anyhow::bail!("source.timeout_secs must be greater than 0");
        }

        if self.discovery.max_depth == 0 || self.discovery.max_depth > MAX_SUPPORTED_DEPTH {
            anyhow::bail!(
                "discovery.max_depth must be between 1 and {}",
                MAX_SUPPORTED_DEPTH
            );
        }

        if self.discovery.fan_out_cap == 0 {
            anyhow::bail!("discovery.fan_out_cap must be greater than 0");
        }

        if self.discovery.concurrency == 0 {
            anyhow::bail!("discovery.concurrency must be greater than 0");
        }

        if self.checkpoint.enabled && self.checkpoint.interval == 0 {
            anyhow::bail!("checkpoint.interval must be greater than 0");
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.source.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.discovery.retry_delay_ms)
    }
}
