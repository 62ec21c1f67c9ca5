//! Settings structs and loading logic.
//!
//! All settings have sensible defaults and can be overridden via
//! environment variables or configuration files.

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Chains this process indexes. One Ingestor task per entry.
    pub chains: Vec<ChainSettings>,
    /// Database configuration.
    pub database: DatabaseSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
    /// Size of the per-block worker pool used for concurrent decoding
    /// (§4.4; default equal to CPU count, set by the caller before
    /// loading if `0` is undesirable).
    pub worker_pool_size: usize,
}

impl Settings {
    /// Load settings from configuration files and environment variables.
    ///
    /// Files are loaded in this order (later overrides earlier):
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (if exists)
    /// 3. Environment variables with `INDEXER__` prefix (double underscore
    ///    separator, so `INDEXER__DATABASE__URL` sets `database.url`).
    ///
    /// # Errors
    /// Returns `ConfigError` if configuration is invalid or cannot be loaded.
    pub fn load(environment: &str) -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".into());

        let builder = Config::builder()
            .set_default("database.max_connections", 10)?
            .set_default("database.connect_timeout_seconds", 5)?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("logging.file_path", Option::<String>::None)?
            .set_default("worker_pool_size", num_cpus())?
            .add_source(File::with_name(&format!("{config_dir}/default")).required(false))
            .add_source(File::with_name(&format!("{config_dir}/{environment}")).required(false))
            .add_source(Environment::with_prefix("INDEXER").separator("__").try_parsing(true));

        builder.build()?.try_deserialize()
    }

    /// Load settings from a specific file path, skipping the environment
    /// layering (used by `validate-config` against an arbitrary file).
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        Config::builder().add_source(File::from(path.as_ref())).build()?.try_deserialize()
    }

    /// Validate settings and return every violation found, rather than
    /// failing on the first (§10.3).
    ///
    /// # Errors
    /// Returns a list of validation error messages.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.chains.is_empty() {
            errors.push("chains must contain at least one entry".into());
        }
        for chain in &self.chains {
            chain.validate(&mut errors);
        }

        if self.database.url.is_empty() {
            errors.push("database.url cannot be empty".into());
        }
        if self.database.max_connections == 0 {
            errors.push("database.max_connections must be non-zero".into());
        }
        if self.worker_pool_size == 0 {
            errors.push("worker_pool_size must be non-zero".into());
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

fn num_cpus() -> i64 {
    std::thread::available_parallelism().map_or(1, |n| n.get() as i64)
}

/// Per-chain configuration: one Ingestor per entry (§6, §10.3).
#[derive(Debug, Clone, Deserialize)]
pub struct ChainSettings {
    /// Chain id, used to key the block cursor and reorg tickets.
    pub chain_id: u64,
    /// HTTP JSON-RPC endpoint for this chain.
    pub rpc_endpoint: String,
    /// Optional bearer token for authenticated RPC endpoints.
    pub api_key: Option<String>,
    /// Height to start from when no cursor exists yet. Required if the
    /// chain has never been indexed before.
    pub start_block: Option<u64>,
    /// Blocks behind the chain head the indexer treats as its safe tip.
    #[serde(default = "default_finalization_depth")]
    pub finalization_depth: u64,
    /// Sleep duration between polling iterations when caught up to the
    /// safe tip.
    #[serde(default = "default_polling_interval_seconds")]
    pub polling_interval_seconds: u64,
    /// Maximum contiguous blocks fetched per Ingestor iteration.
    #[serde(default = "default_max_blocks_batch_size")]
    pub max_blocks_batch_size: u64,
    /// Maximum depth the Reorg Coordinator will walk back before failing
    /// fatally.
    #[serde(default = "default_max_reorg_depth")]
    pub max_reorg_depth: u64,
    /// Path to this chain's Trigger Registry YAML file.
    pub events_file_path: PathBuf,
}

const fn default_finalization_depth() -> u64 {
    900
}
const fn default_polling_interval_seconds() -> u64 {
    15
}
const fn default_max_blocks_batch_size() -> u64 {
    10
}
const fn default_max_reorg_depth() -> u64 {
    1000
}

impl ChainSettings {
    /// Polling interval as a `Duration`.
    #[must_use]
    pub const fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval_seconds)
    }

    fn validate(&self, errors: &mut Vec<String>) {
        if self.rpc_endpoint.is_empty() {
            errors.push(format!("chain {}: rpc_endpoint cannot be empty", self.chain_id));
        }
        if self.max_blocks_batch_size == 0 {
            errors.push(format!("chain {}: max_blocks_batch_size must be non-zero", self.chain_id));
        }
        if self.max_reorg_depth == 0 {
            errors.push(format!("chain {}: max_reorg_depth must be non-zero", self.chain_id));
        }
        if !self.events_file_path.as_os_str().is_empty() && self.events_file_path.extension().is_none() {
            errors.push(format!("chain {}: events_file_path {:?} has no extension", self.chain_id, self.events_file_path));
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum connections in the pool.
    pub max_connections: u32,
    /// Connection timeout in seconds.
    pub connect_timeout_seconds: u64,
}

impl DatabaseSettings {
    /// Connection timeout as a `Duration`.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

/// Logging configuration (§10.1).
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Emit JSON-formatted log lines instead of the human-readable
    /// console format.
    pub json: bool,
    /// Optional file path for rolling file output via `tracing-appender`.
    pub file_path: Option<PathBuf>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample_chain() -> ChainSettings {
        ChainSettings {
            chain_id: 314,
            rpc_endpoint: "https://api.node.glif.io/rpc/v1".into(),
            api_key: None,
            start_block: Some(1_000_000),
            finalization_depth: 900,
            polling_interval_seconds: 15,
            max_blocks_batch_size: 10,
            max_reorg_depth: 1000,
            events_file_path: PathBuf::from("config/triggers.yaml"),
        }
    }

    fn sample_settings() -> Settings {
        Settings {
            chains: vec![sample_chain()],
            database: DatabaseSettings { url: "postgres://localhost/pdp_indexer".into(), max_connections: 10, connect_timeout_seconds: 5 },
            logging: LoggingSettings { level: "info".into(), json: false, file_path: None },
            worker_pool_size: 4,
        }
    }

    #[test]
    fn polling_interval_duration() {
        let chain = sample_chain();
        assert_eq!(chain.polling_interval(), Duration::from_secs(15));
    }

    #[test]
    fn validation_passes_for_sample_settings() {
        assert!(sample_settings().validate().is_ok());
    }

    #[test]
    fn validation_catches_empty_chains() {
        let mut settings = sample_settings();
        settings.chains.clear();
        let errors = settings.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("chains")));
    }

    #[test]
    fn validation_catches_zero_batch_size() {
        let mut settings = sample_settings();
        settings.chains[0].max_blocks_batch_size = 0;
        let errors = settings.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("max_blocks_batch_size")));
    }

    #[test]
    fn validation_collects_multiple_errors() {
        let mut settings = sample_settings();
        settings.database.url.clear();
        settings.worker_pool_size = 0;
        let errors = settings.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
